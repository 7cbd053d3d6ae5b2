//! `wincloud status <name|id>`: record plus live describe.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::inventory;
use crate::commands::TargetArgs;

/// Run `wincloud status`.
///
/// # Errors
///
/// Returns an error for unknown instances or a rejected describe call.
pub async fn run(app: &AppContext, args: &TargetArgs) -> Result<ExitCode> {
    let config = app.config()?;
    let status = inventory::status(&app.remote(&config), &app.records, &args.target).await?;
    app.renderer().render_status(&status)?;
    Ok(ExitCode::SUCCESS)
}
