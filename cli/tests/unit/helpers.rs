//! Shared test helpers: process output constructors and a scripted runner.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use wincloud_cli::application::ports::CommandRunner;

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// On Unix the raw wait-status encodes the exit code in bits 8–15, so we shift.
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

/// Provider-style CLI failure for `code` on `operation`.
pub fn aws_error(code: &str, operation: &str, message: &str) -> Output {
    err_output(
        254,
        format!("\nAn error occurred ({code}) when calling the {operation} operation: {message}\n")
            .as_bytes(),
    )
}

// ── Scripted runner ──────────────────────────────────────────────────────────

/// Replays queued results in order and records every invocation.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: RefCell<VecDeque<Result<Output>>>,
    pub calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new(replies: impl IntoIterator<Item = Output>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(Ok).collect()),
            calls: RefCell::default(),
        }
    }

    /// A runner whose next invocation fails to produce output at all.
    pub fn failing(message: &str) -> Self {
        let runner = Self::default();
        runner
            .replies
            .borrow_mut()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
        runner
    }

    /// Arguments of call number `n` (0-based).
    pub fn args(&self, n: usize) -> Vec<String> {
        self.calls
            .borrow()
            .get(n)
            .map(|(_, args)| args.clone())
            .unwrap_or_default()
    }

    /// Value that follows `flag` in call `n`.
    pub fn flag_value(&self, n: usize, flag: &str) -> Option<String> {
        let args = self.args(n);
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, Duration::from_secs(60))
            .await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<Output> {
        self.calls.borrow_mut().push((
            program.to_string(),
            args.iter().map(|a| (*a).to_string()).collect(),
        ));
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("unexpected call: {program} {args:?}")))
    }
}
