//! Command implementations
//!
//! Each module is a thin wrapper: build the inputs from flags and config,
//! call one application service, render the result.

pub mod config;
pub mod create;
pub mod list;
pub mod password;
pub mod start;
pub mod status;
pub mod stop;
pub mod terminate;
pub mod version;

use clap::Args;

/// Positional target shared by every per-instance command.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Logical name or instance id
    pub target: String,
}
