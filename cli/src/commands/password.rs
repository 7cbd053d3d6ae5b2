//! `wincloud password <name|id>`: wait for and decrypt the administrator password.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::password;
use crate::application::services::poll::PollPolicies;

#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// Logical name or instance id
    pub target: String,

    /// Give up after this many seconds [default: timeouts.password_secs]
    #[arg(long, value_name = "SECS")]
    pub wait_secs: Option<u64>,
}

/// Run `wincloud password`.
///
/// # Errors
///
/// Returns an error if the instance is unknown, its local key is missing,
/// the password is not published in time, or it cannot be decrypted.
pub async fn run(app: &AppContext, args: &PasswordArgs) -> Result<ExitCode> {
    let config = app.config()?;
    let mut policy = PollPolicies::from_config(&config.timeouts).password;
    if let Some(secs) = args.wait_secs {
        policy = policy.with_timeout(Duration::from_secs(secs));
    }

    app.output
        .info(&format!("Waiting for the password of {}...", args.target));
    let retrieved = password::retrieve(
        &app.remote(&config),
        &app.records,
        &app.keys,
        &policy,
        &args.target,
    )
    .await?;
    app.renderer().render_password(&retrieved)?;
    Ok(ExitCode::SUCCESS)
}
