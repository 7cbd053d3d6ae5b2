//! `wincloud stop <name|id>`

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::lifecycle;
use crate::commands::TargetArgs;

/// Run `wincloud stop`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or cannot be stopped from
/// its current state.
pub async fn run(app: &AppContext, args: &TargetArgs) -> Result<ExitCode> {
    let config = app.config()?;
    let change = lifecycle::stop(&app.remote(&config), &app.records, &args.target).await?;
    app.renderer().render_lifecycle(&change, "Stop")?;
    Ok(ExitCode::SUCCESS)
}
