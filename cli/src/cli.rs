//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Provision and manage Windows instances on AWS
#[derive(Parser, Debug)]
#[command(
    name = "wincloud",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        action = ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a Windows instance with its own network and key pair
    Create(commands::create::CreateArgs),

    /// List managed instances
    List(commands::list::ListArgs),

    /// Show live state and connection details
    Status(commands::TargetArgs),

    /// Start a stopped instance
    Start(commands::TargetArgs),

    /// Stop a running instance
    Stop(commands::TargetArgs),

    /// Delete an instance and everything created for it
    Terminate(commands::terminate::TerminateArgs),

    /// Retrieve the Administrator password
    Password(commands::password::PasswordArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    fn flags(&self) -> AppFlags {
        AppFlags {
            output: OutputFlags {
                no_color: self.no_color,
                quiet: self.quiet,
                json: self.json,
            },
            behaviour: BehaviourFlags { yes: self.yes },
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let app = AppContext::new(&self.flags())?;
        match self.command {
            Command::Create(args) => commands::create::run(&app, args).await,
            Command::List(args) => commands::list::run(&app, &args).await,
            Command::Status(args) => commands::status::run(&app, &args).await,
            Command::Start(args) => commands::start::run(&app, &args).await,
            Command::Stop(args) => commands::stop::run(&app, &args).await,
            Command::Terminate(args) => commands::terminate::run(&app, &args).await,
            Command::Password(args) => commands::password::run(&app, &args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
