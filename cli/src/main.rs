//! wincloud - Windows instances on AWS from the command line

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wincloud_cli::cli::Cli;
use wincloud_cli::output::json;

/// Diagnostics go to stderr. `WINCLOUD_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("WINCLOUD_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_mode = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match json::format_error(&message, json::error_code(&e)) {
                Ok(obj) if json_mode => println!("{obj}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}
