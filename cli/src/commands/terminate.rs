//! `wincloud terminate <name|id>`: tear down every owned resource.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::poll::PollPolicies;
use crate::application::services::teardown;

#[derive(Args, Debug)]
pub struct TerminateArgs {
    /// Logical name or instance id
    pub target: String,

    /// Region to search when no local record exists [default: defaults.region]
    #[arg(long)]
    pub region: Option<String>,
}

/// Run `wincloud terminate`.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or the prompt fails.
/// An incomplete teardown is rendered and reported through the exit code.
pub async fn run(app: &AppContext, args: &TerminateArgs) -> Result<ExitCode> {
    let config = app.config()?;

    let proceed = app.non_interactive
        || app.confirm(
            &format!(
                "Terminate {} and delete its network, key pair and local key?",
                args.target
            ),
            false,
        )?;
    if !proceed {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let fallback_region = args.region.as_deref().or(config.defaults.region.as_deref());
    let polls = PollPolicies::from_config(&config.timeouts);
    let report = teardown::terminate(
        &app.remote(&config),
        &app.records,
        &app.keys,
        &polls.teardown,
        &args.target,
        fallback_region,
    )
    .await?;

    app.renderer().render_teardown(&report)?;
    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
