//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! `aws` CLI control plane, local record/key/config files, and the clock.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod aws_cli;
pub mod clock;
pub mod command_runner;
pub mod config;
pub mod keys;
pub mod paths;
pub mod records;
pub mod template;
