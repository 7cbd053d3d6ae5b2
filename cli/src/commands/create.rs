//! `wincloud create`: provision a Windows instance end to end.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::poll::PollPolicies;
use crate::application::services::provision::{self, ProvisionSettings};
use crate::domain::{CreateOverrides, CreateRequest};
use crate::infra::template::WINDOWS_INSTANCE_TEMPLATE;
use crate::output::TerminalReporter;

/// Arguments for the create command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Logical name (lowercase letters, digits and hyphens)
    #[arg(long)]
    pub name: String,

    /// Region to create in [default: defaults.region]
    #[arg(long)]
    pub region: Option<String>,

    /// Instance type [default: defaults.instance_type]
    #[arg(long = "type", value_name = "TYPE")]
    pub instance_type: Option<String>,

    /// Windows image id [default: defaults.image_id]
    #[arg(long, value_name = "AMI_ID")]
    pub ami: Option<String>,

    /// Root volume size in GB [default: defaults.volume_size_gb]
    #[arg(long, value_name = "GB", value_parser = clap::value_parser!(u32).range(1..))]
    pub volume_size: Option<u32>,

    /// Source CIDR allowed to reach RDP [default: defaults.rdp_cidr]
    #[arg(long, value_name = "CIDR")]
    pub rdp_cidr: Option<String>,

    /// Stop once the instance is launched; fetch the password later
    #[arg(long)]
    pub skip_password: bool,
}

impl CreateArgs {
    fn overrides(self) -> CreateOverrides {
        CreateOverrides {
            name: self.name,
            region: self.region,
            instance_type: self.instance_type,
            image_id: self.ami,
            volume_size_gb: self.volume_size,
            rdp_cidr: self.rdp_cidr,
            skip_password: self.skip_password,
        }
    }
}

/// Run `wincloud create`.
///
/// # Errors
///
/// Returns an error for invalid input or a pre-flight failure. A failed
/// provisioning run is rendered and reported through the exit code.
pub async fn run(app: &AppContext, args: CreateArgs) -> Result<ExitCode> {
    let config = app.config()?;
    let request = CreateRequest::resolve(args.overrides(), &config)?;
    let settings = ProvisionSettings {
        template_body: WINDOWS_INSTANCE_TEMPLATE,
        key_bits: usize::try_from(config.keys.bits)?,
        polls: PollPolicies::from_config(&config.timeouts),
    };

    app.output.header(&format!(
        "Creating {} ({}, {})",
        request.name, request.instance_type, request.region
    ));
    let reporter = TerminalReporter::new(&app.output);
    let outcome = provision::provision(
        &app.remote(&config),
        &app.records,
        &app.keys,
        &reporter,
        &settings,
        &request,
    )
    .await?;
    drop(reporter);

    app.renderer().render_outcome(&outcome)?;
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
