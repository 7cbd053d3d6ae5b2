//! Domain types and validators for wincloud configuration.
//!
//! Pure functions only, no I/O.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "defaults.region",
    "defaults.instance_type",
    "defaults.image_id",
    "defaults.volume_size_gb",
    "defaults.rdp_cidr",
    "timeouts.template_secs",
    "timeouts.boot_secs",
    "timeouts.password_secs",
    "timeouts.teardown_secs",
    "timeouts.poll_interval_secs",
    "retry.max_attempts",
    "retry.base_delay_ms",
    "keys.bits",
];

pub const VALID_KEY_BITS: &[u32] = &[2048, 3072, 4096];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.wincloud/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct WincloudConfig {
    pub defaults: DefaultsConfig,
    pub timeouts: TimeoutsConfig,
    pub retry: RetryConfig,
    pub keys: KeysConfig,
}

/// Defaults for `wincloud create` flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub instance_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub volume_size_gb: u32,
    pub rdp_cidr: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            region: None,
            instance_type: "t3.medium".to_string(),
            image_id: None,
            volume_size_gb: 50,
            rdp_cidr: "0.0.0.0/0".to_string(),
        }
    }
}

/// Poll deadlines, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub template_secs: u64,
    pub boot_secs: u64,
    pub password_secs: u64,
    pub teardown_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            template_secs: 600,
            boot_secs: 600,
            password_secs: 300,
            teardown_secs: 600,
            poll_interval_secs: 10,
        }
    }
}

impl TimeoutsConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Backoff for transient control-plane failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
        }
    }
}

/// Local key generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeysConfig {
    pub bits: u32,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self { bits: 2048 }
    }
}

impl WincloudConfig {
    /// Apply a validated `key = value` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid for it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "defaults.region" => self.defaults.region = Some(value.to_string()),
            "defaults.instance_type" => self.defaults.instance_type = value.to_string(),
            "defaults.image_id" => self.defaults.image_id = Some(value.to_string()),
            "defaults.volume_size_gb" => self.defaults.volume_size_gb = value.parse()?,
            "defaults.rdp_cidr" => self.defaults.rdp_cidr = value.to_string(),
            "timeouts.template_secs" => self.timeouts.template_secs = value.parse()?,
            "timeouts.boot_secs" => self.timeouts.boot_secs = value.parse()?,
            "timeouts.password_secs" => self.timeouts.password_secs = value.parse()?,
            "timeouts.teardown_secs" => self.timeouts.teardown_secs = value.parse()?,
            "timeouts.poll_interval_secs" => self.timeouts.poll_interval_secs = value.parse()?,
            "retry.max_attempts" => self.retry.max_attempts = value.parse()?,
            "retry.base_delay_ms" => self.retry.base_delay_ms = value.parse()?,
            "keys.bits" => self.keys.bits = value.parse()?,
            _ => anyhow::bail!("Unknown setting: {key}"),
        }
        Ok(())
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |expected: &str| -> Result<()> {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
        .into())
    };
    match key {
        "defaults.region" if !is_region(value) => invalid("Expected a region such as us-east-1"),
        "defaults.rdp_cidr" if !is_ipv4_cidr(value) => {
            invalid("Expected an IPv4 CIDR such as 203.0.113.7/32")
        }
        "defaults.image_id" if !value.starts_with("ami-") => {
            invalid("Expected an image id such as ami-0123456789abcdef0")
        }
        "defaults.instance_type" if !value.contains('.') => {
            invalid("Expected an instance type such as t3.medium")
        }
        "keys.bits" if !value.parse::<u32>().is_ok_and(|b| VALID_KEY_BITS.contains(&b)) => {
            invalid("Expected one of: 2048, 3072, 4096")
        }
        "defaults.volume_size_gb"
        | "timeouts.template_secs"
        | "timeouts.boot_secs"
        | "timeouts.password_secs"
        | "timeouts.teardown_secs"
        | "timeouts.poll_interval_secs"
        | "retry.max_attempts"
        | "retry.base_delay_ms"
            if !value.parse::<u64>().is_ok_and(|n| n > 0 && n <= u64::from(u32::MAX)) =>
        {
            invalid("Expected a positive integer")
        }
        _ => Ok(()),
    }
}

/// `xx-name-N` region shape, e.g. `us-east-1`, `ap-southeast-2`.
fn is_region(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    parts.len() >= 3
        && parts[..parts.len() - 1]
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase()))
        && parts[parts.len() - 1].parse::<u8>().is_ok()
}

fn is_ipv4_cidr(value: &str) -> bool {
    let Some((addr, prefix)) = value.split_once('/') else {
        return false;
    };
    addr.parse::<std::net::Ipv4Addr>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
}

// ── Unit tests ───────────────────────────────────────────────────────────────
