//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the production adapters (the `aws` CLI control plane,
//! the tokio clock, and the local record, key and config stores) plus the
//! output settings. Commands borrow what they need from it.

use anyhow::Result;

use crate::application::services::Remote;
use crate::application::services::config_service;
use crate::application::services::retry::RetryPolicy;
use crate::domain::WincloudConfig;
use crate::infra::aws_cli::AwsCliControlPlane;
use crate::infra::clock::TokioClock;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::keys::FsKeyStore;
use crate::infra::records::JsonRecordStore;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `WINCLOUD_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    pub output: OutputContext,
    pub mode: OutputMode,
    pub control_plane: AwsCliControlPlane<TokioCommandRunner>,
    pub clock: TokioClock,
    pub records: JsonRecordStore,
    pub keys: FsKeyStore,
    pub config_store: YamlConfigStore,
    /// When `true`, confirmations are answered with their default.
    ///
    /// Set when `--yes` is passed, or when the `CI` or `WINCLOUD_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the wincloud home directory cannot be determined.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("WINCLOUD_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        // JSON mode prints only the final document on stdout.
        let quiet = flags.output.quiet || flags.output.json;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, quiet),
            mode,
            control_plane: AwsCliControlPlane::default_runner(),
            clock: TokioClock,
            records: JsonRecordStore::new()?,
            keys: FsKeyStore::new()?,
            config_store: YamlConfigStore,
            non_interactive,
        })
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Effective configuration from the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn config(&self) -> Result<WincloudConfig> {
        config_service::load_config(&self.config_store)
    }

    /// Control plane bundled with the clock and the configured retry policy.
    #[must_use]
    pub fn remote(
        &self,
        config: &WincloudConfig,
    ) -> Remote<'_, AwsCliControlPlane<TokioCommandRunner>, TokioClock> {
        Remote::new(
            &self.control_plane,
            &self.clock,
            RetryPolicy::from_config(&config.retry),
        )
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true`, returns `default` without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
