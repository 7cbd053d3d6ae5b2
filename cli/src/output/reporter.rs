//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`.
//!
//! On a TTY each `step()` opens a spinner that the next `success()` or
//! `warn()` closes; otherwise steps print as plain `→` lines. Nothing is
//! printed when the context is quiet.

use std::cell::RefCell;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    active: RefCell<Option<(ProgressBar, String)>>,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            active: RefCell::new(None),
        }
    }

    /// Close any open spinner as done, keeping its step text.
    fn settle(&self) {
        if let Some((pb, msg)) = self.active.borrow_mut().take() {
            progress::finish_ok(&pb, &msg);
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.settle();
        if self.ctx.show_progress() {
            let pb = progress::spinner(message);
            *self.active.borrow_mut() = Some((pb, message.to_string()));
        } else {
            println!("  {} {message}", "→".style(self.ctx.styles.info));
        }
    }

    fn success(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        match self.active.borrow_mut().take() {
            Some((pb, _)) => progress::finish_ok(&pb, message),
            None => self.ctx.success(message),
        }
    }

    fn warn(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        match self.active.borrow_mut().take() {
            Some((pb, _)) => progress::finish_warn(&pb, message),
            None => self.ctx.warn(message),
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        if let Some((pb, _)) = self.active.get_mut().take() {
            pb.finish_and_clear();
        }
    }
}
