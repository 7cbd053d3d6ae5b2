//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;
use wincloud_common::{InstanceStatus, InstanceSummary, LifecycleState};

use crate::application::services::lifecycle::{LifecycleChange, Transition};
use crate::application::services::password::{ADMIN_USERNAME, RDP_PORT, RetrievedPassword};
use crate::domain::config::WincloudConfig;
use crate::domain::{
    CreatedResources, ErrorCategory, ProvisionError, ProvisionOutcome, StepResult, TeardownReport,
};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_version(&self, version: &str) {
        if !self.ctx.quiet {
            println!("wincloud {version}");
        }
    }

    /// Render the terminal result of `create`. Failures always print, even
    /// when quiet, so the user learns which identifiers exist.
    pub fn render_outcome(&self, outcome: &ProvisionOutcome) {
        match outcome {
            ProvisionOutcome::Complete {
                name,
                instance_id,
                resource_group_id,
                key_name,
                password,
            } => {
                println!();
                self.ctx.success(&format!("Instance {name} is ready"));
                self.ctx.kv("Instance ID:   ", instance_id);
                self.ctx.kv("Resource group:", resource_group_id);
                self.ctx.kv("Key pair:      ", key_name);
                self.ctx.kv("Username:      ", ADMIN_USERNAME);
                self.secret("Password:      ", password);
                println!();
                self.ctx
                    .info(&format!("Connection details: wincloud status {name}"));
            }
            ProvisionOutcome::Launched {
                name,
                instance_id,
                resource_group_id,
                key_name,
            } => {
                println!();
                self.ctx.success(&format!("Instance {name} launched"));
                self.ctx.kv("Instance ID:   ", instance_id);
                self.ctx.kv("Resource group:", resource_group_id);
                self.ctx.kv("Key pair:      ", key_name);
                println!();
                self.ctx
                    .info(&format!("Once Windows has booted: wincloud password {name}"));
            }
            ProvisionOutcome::RolledBack {
                name,
                error,
                created,
                cleanup,
            } => {
                self.ctx.error(&format!("Creating {name} failed: {error}"));
                if created.is_empty() {
                    return;
                }
                self.print_created(created);
                eprintln!("  Rollback:");
                self.print_steps(cleanup);
                if !cleanup.is_complete() {
                    eprintln!();
                    eprintln!("  Finish cleanup: wincloud terminate {name}");
                }
            }
            ProvisionOutcome::PartialFailure {
                name,
                error,
                created,
            } => {
                self.ctx.error(&format!("Creating {name} did not finish: {error}"));
                self.print_created(created);
                eprintln!("  The instance was kept.");
                if let Some(hint) = resume_hint(error, name) {
                    eprintln!("  Resume:  {hint}");
                }
                eprintln!("  Discard: wincloud terminate {name}");
            }
        }
    }

    fn print_created(&self, created: &CreatedResources) {
        eprintln!();
        eprintln!("  Created before the failure:");
        for (label, value) in created_lines(created) {
            eprintln!("    {}  {value}", label.style(self.ctx.styles.dim));
        }
        eprintln!();
    }

    fn print_steps(&self, report: &TeardownReport) {
        for (step, result) in &report.steps {
            let marker = if result.is_ok() {
                "✓".style(self.ctx.styles.success).to_string()
            } else {
                "✗".style(self.ctx.styles.error).to_string()
            };
            eprintln!(
                "    {marker} {:<15} {}",
                step.label(),
                step_result_display(result)
            );
        }
    }

    fn secret(&self, key: &str, value: &str) {
        // Printed even when quiet.
        println!(
            "  {}  {}",
            key.style(self.ctx.styles.dim),
            value.style(self.ctx.styles.secret)
        );
    }

    /// Render `wincloud list`.
    pub fn render_list(&self, instances: &[InstanceSummary]) {
        if instances.is_empty() {
            if !self.ctx.quiet {
                println!("No managed instances. Create one: wincloud create --name <name>");
            }
            return;
        }
        println!(
            "{}",
            format!(
                "{:<20} {:<21} {:<14} {:<12} {:<13} {}",
                "NAME", "INSTANCE ID", "REGION", "TYPE", "STATE", "PUBLIC IP"
            )
            .style(self.ctx.styles.bold)
        );
        for i in instances {
            let state = format!("{:<13}", i.state.as_str());
            println!(
                "{:<20} {:<21} {:<14} {:<12} {} {}",
                i.name,
                i.instance_id.as_deref().unwrap_or("-"),
                i.region,
                i.instance_type.as_deref().unwrap_or("-"),
                state.style(self.ctx.styles.state(i.state)),
                i.public_ip.as_deref().unwrap_or("-"),
            );
        }
    }

    /// Render `wincloud status`.
    pub fn render_status(&self, status: &InstanceStatus) {
        let details = status.details.clone().unwrap_or_default();
        let dash = |v: Option<&str>| v.unwrap_or("-").to_string();

        self.ctx.header(&status.name);
        self.ctx.kv(
            "State:            ",
            &status.state.as_str().style(self.ctx.styles.state(status.state)).to_string(),
        );
        self.ctx
            .kv("Instance ID:      ", &dash(status.instance_id.as_deref()));
        self.ctx.kv("Region:           ", &status.region);
        self.ctx
            .kv("Type:             ", &dash(details.instance_type.as_deref()));
        self.ctx
            .kv("Public IP:        ", &dash(details.public_ip.as_deref()));
        self.ctx
            .kv("Private IP:       ", &dash(details.private_ip.as_deref()));
        self.ctx.kv(
            "Availability zone:",
            &dash(details.availability_zone.as_deref()),
        );
        self.ctx
            .kv("Subnet:           ", &dash(details.subnet_id.as_deref()));
        self.ctx
            .kv("Launched:         ", &dash(details.launch_time.as_deref()));
        self.ctx.kv("Resource group:   ", &status.resource_group);
        self.ctx.kv("Key pair:         ", &status.key_name);

        if status.state != LifecycleState::Running {
            return;
        }
        if let Some(ip) = details.public_ip.as_deref() {
            println!();
            self.ctx.info(&format!("Connect: {}", rdp_hint(ip)));
            self.ctx
                .info(&format!("Password: wincloud password {}", status.name));
        }
    }

    /// Render a start or stop.
    pub fn render_lifecycle(&self, change: &LifecycleChange, verb: &str) {
        match change.transition {
            Transition::Requested => self.ctx.success(&format!(
                "{verb} requested for {} ({}, was {})",
                change.name, change.instance_id, change.previous
            )),
            Transition::AlreadyInState => self.ctx.info(&format!(
                "{} is already {}; nothing to do",
                change.name, change.previous
            )),
        }
    }

    /// Render a teardown report.
    pub fn render_teardown(&self, report: &TeardownReport) {
        if report.is_complete() {
            if !self.ctx.quiet {
                for (step, result) in &report.steps {
                    println!(
                        "  {} {:<15} {}",
                        "✓".style(self.ctx.styles.success),
                        step.label(),
                        step_result_display(result)
                    );
                }
            }
            self.ctx.success(&format!("{} terminated", report.name));
            return;
        }
        self.ctx
            .error(&format!("Teardown of {} is incomplete", report.name));
        self.print_steps(report);
        eprintln!();
        eprintln!("  Retry: wincloud terminate {}", report.name);
    }

    /// Render `wincloud password`.
    pub fn render_password(&self, retrieved: &RetrievedPassword) {
        self.ctx.kv("Instance ID:", &retrieved.instance_id);
        self.ctx.kv("Username:   ", retrieved.username);
        self.secret("Password:   ", &retrieved.password);
        if let Some(ip) = retrieved.public_ip.as_deref() {
            self.ctx.info(&format!("Connect: {}", rdp_hint(ip)));
        }
    }

    pub fn render_config_set(&self, key: &str, value: &str) {
        self.ctx.success(&format!("Set {key} = {value}"));
    }

    /// Render the effective configuration.
    pub fn render_config(&self, config: &WincloudConfig, path: &Path) {
        let d = &config.defaults;
        let t = &config.timeouts;
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        let rows: [(&str, String); 13] = [
            (
                "defaults.region",
                d.region.clone().unwrap_or_else(|| "(not set)".into()),
            ),
            ("defaults.instance_type", d.instance_type.clone()),
            (
                "defaults.image_id",
                d.image_id.clone().unwrap_or_else(|| "(not set)".into()),
            ),
            ("defaults.volume_size_gb", d.volume_size_gb.to_string()),
            ("defaults.rdp_cidr", d.rdp_cidr.clone()),
            ("timeouts.template_secs", t.template_secs.to_string()),
            ("timeouts.boot_secs", t.boot_secs.to_string()),
            ("timeouts.password_secs", t.password_secs.to_string()),
            ("timeouts.teardown_secs", t.teardown_secs.to_string()),
            ("timeouts.poll_interval_secs", t.poll_interval_secs.to_string()),
            ("retry.max_attempts", config.retry.max_attempts.to_string()),
            ("retry.base_delay_ms", config.retry.base_delay_ms.to_string()),
            ("keys.bits", config.keys.bits.to_string()),
        ];
        for (key, value) in rows {
            println!("  {:<30} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["WINCLOUD_HOME", "WINCLOUD_CONFIG", "WINCLOUD_LOG", "NO_COLOR"] {
            println!(
                "    {:<18} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }
}

// ── Display helpers ──────────────────────────────────────────────────────────

/// Command line that opens a Remote Desktop session to `ip`.
#[must_use]
pub fn rdp_hint(ip: &str) -> String {
    format!("mstsc /v:{ip}:{RDP_PORT}")
}

#[must_use]
pub fn step_result_display(result: &StepResult) -> String {
    match result {
        StepResult::Deleted => "deleted".to_string(),
        StepResult::AlreadyGone => "already gone".to_string(),
        StepResult::Skipped(why) => format!("skipped: {why}"),
        StepResult::Failed(why) => format!("failed: {why}"),
    }
}

/// Label/value pairs for every identifier in `created`, in allocation order.
#[must_use]
pub fn created_lines(created: &CreatedResources) -> Vec<(&'static str, &str)> {
    [
        ("Key pair:      ", created.key_name.as_deref()),
        ("Resource group:", created.resource_group.as_deref()),
        ("Stack id:      ", created.resource_group_id.as_deref()),
        ("Instance ID:   ", created.instance_id.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| (label, v)))
    .collect()
}

/// Command that picks up where a partially failed `create` stopped.
#[must_use]
pub fn resume_hint(error: &ProvisionError, name: &str) -> Option<String> {
    match error {
        ProvisionError::PasswordMaterialTimeout { .. } | ProvisionError::Decryption(_) => {
            Some(format!("wincloud password {name}"))
        }
        e if e.category() == ErrorCategory::TransientNetwork => {
            Some(format!("wincloud password {name}"))
        }
        _ => None,
    }
}
