//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;
use wincloud_common::LifecycleState;

/// Centralized stylesheet for CLI output colors.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Dimmed/secondary text
    pub dim: Style,
    pub bold: Style,
    /// Headers/section titles
    pub header: Style,
    /// Secrets shown once (the decrypted password)
    pub secret: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.secret = Style::new().bold().magenta();
    }

    /// Style for a lifecycle state in tables and status output.
    #[must_use]
    pub fn state(&self, state: LifecycleState) -> Style {
        match state {
            LifecycleState::Running => self.success,
            LifecycleState::Stopped | LifecycleState::Provisioning => self.warning,
            LifecycleState::Terminating => self.info,
            LifecycleState::Failed => self.error,
            LifecycleState::Terminated => self.dim,
        }
    }
}
