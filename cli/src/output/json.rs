//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed document on
//! stdout: the command's payload on success, an error object on failure.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::{ProvisionError, ProvisionOutcome, WincloudConfig};

/// Machine code for an error: the `ProvisionError` category when the chain
/// carries one, `"error"` otherwise.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ProvisionError>())
        .map_or("error", |e| e.category().code())
}

/// Format a JSON error object.
///
/// ```json
/// { "error": true, "message": "...", "code": "..." }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Payload for a finished `create`.
#[must_use]
pub fn outcome_value(outcome: &ProvisionOutcome) -> Value {
    match outcome {
        ProvisionOutcome::Complete {
            name,
            instance_id,
            resource_group_id,
            key_name,
            password,
        } => json!({
            "status": "complete",
            "name": name,
            "instance_id": instance_id,
            "resource_group_id": resource_group_id,
            "key_name": key_name,
            "username": crate::application::services::password::ADMIN_USERNAME,
            "password": password,
        }),
        ProvisionOutcome::Launched {
            name,
            instance_id,
            resource_group_id,
            key_name,
        } => json!({
            "status": "launched",
            "name": name,
            "instance_id": instance_id,
            "resource_group_id": resource_group_id,
            "key_name": key_name,
        }),
        ProvisionOutcome::RolledBack {
            name,
            error,
            created,
            cleanup,
        } => json!({
            "status": "rolled_back",
            "name": name,
            "error": { "message": error.to_string(), "code": error.category().code() },
            "created": created,
            "cleanup": cleanup,
            "cleanup_complete": cleanup.is_complete(),
        }),
        ProvisionOutcome::PartialFailure {
            name,
            error,
            created,
        } => json!({
            "status": "partial_failure",
            "name": name,
            "error": { "message": error.to_string(), "code": error.category().code() },
            "created": created,
        }),
    }
}

/// Renders payloads as pretty JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print any serializable payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_outcome(&self, outcome: &ProvisionOutcome) -> Result<()> {
        self.render(&outcome_value(outcome))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &WincloudConfig, path: &Path) -> Result<()> {
        self.render(&json!({
            "path": path.display().to_string(),
            "config": config,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        self.render(&json!({ "version": version }))
    }
}
