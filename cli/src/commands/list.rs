//! `wincloud list`: managed instances with live state.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::inventory;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show instances in this region
    #[arg(long)]
    pub region: Option<String>,
}

/// Run `wincloud list`.
///
/// # Errors
///
/// Returns an error if the local records cannot be read.
pub async fn run(app: &AppContext, args: &ListArgs) -> Result<ExitCode> {
    let config = app.config()?;
    let instances =
        inventory::list(&app.remote(&config), &app.records, args.region.as_deref()).await?;
    app.renderer().render_list(&instances)?;
    Ok(ExitCode::SUCCESS)
}
