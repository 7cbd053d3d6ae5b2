//! Unit tests for wincloud CLI
//!
//! These tests use scripted dependencies and run fast without network I/O.

mod architecture;
mod aws_cli_adapter;
mod helpers;
