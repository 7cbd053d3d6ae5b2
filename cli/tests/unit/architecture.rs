//! Structural tests for layer boundaries.
//!
//! These scan the source tree so a stray import or a shortcut around the
//! renderer fails CI instead of slipping through review.

use std::path::{Path, PathBuf};

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

/// Tracks brace depth to tell whether a line sits inside a `#[cfg(test)]` item.
#[derive(Default)]
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    start_depth: i32,
}

impl CfgTestTracker {
    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().starts_with("#[cfg(test)]") {
            self.in_test_block = true;
            self.start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Production lines of a file: comments and `#[cfg(test)]` items removed,
/// paired with their 1-based line number.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::default();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            let is_comment = trimmed.starts_with("//") || trimmed.starts_with("/*");
            (!in_test && !is_comment).then(|| (i + 1, line.to_string()))
        })
        .collect()
}

/// Every production line under `dir` matching one of `patterns`.
fn scan(dir: &Path, patterns: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        let rel = relative(&file);
        for (lineno, line) in production_lines(&file) {
            if let Some(pattern) = patterns.iter().find(|p| line.contains(*p)) {
                violations.push(format!("{rel}:{lineno}: `{pattern}`: {}", line.trim()));
            }
        }
    }
    violations
}

// ── Presentation ─────────────────────────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations = scan(&src_dir().join("commands"), &["json: bool", "is_json("]);
    for file in collect_rs_files(&src_dir().join("commands")) {
        for (lineno, line) in production_lines(&file) {
            let trimmed = line.trim();
            if trimmed.starts_with("if json") || trimmed.starts_with("if !json") {
                violations.push(format!("{}:{lineno}: inline JSON branch", relative(&file)));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "commands/ must render through app.renderer():\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_use_standardized_confirmation() {
    let violations = scan(
        &src_dir().join("commands"),
        &["stdin().lock()", "Confirm::new()", "dialoguer::"],
    );
    assert!(
        violations.is_empty(),
        "commands/ must prompt through app.confirm():\n{}",
        violations.join("\n")
    );
}

#[test]
fn command_handlers_accept_app_context() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir().join("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        if !content.contains("pub async fn run(") && !content.contains("pub fn run(") {
            continue;
        }
        if !content.contains("app: &AppContext") {
            violations.push(relative(&file));
        }
    }
    assert!(
        violations.is_empty(),
        "command handlers must take `app: &AppContext`:\n{}",
        violations.join("\n")
    );
}

#[test]
fn aws_is_only_spawned_by_infra() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir()) {
        let rel = relative(&file);
        if rel.contains("/infra/") || rel.ends_with("/app.rs") {
            continue;
        }
        for (lineno, line) in production_lines(&file) {
            if line.contains("TokioCommandRunner::new") || line.contains("Command::new(") {
                violations.push(format!("{rel}:{lineno}: {}", line.trim()));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "process spawning belongs in infra/:\n{}",
        violations.join("\n")
    );
}

// ── Infrastructure ───────────────────────────────────────────────────────────

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = scan(
        &src_dir().join("infra"),
        &["crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "infra/ must not import from outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = scan(&src_dir().join("infra"), &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ reports through tracing, never stdout/stderr directly:\n{}",
        violations.join("\n")
    );
}

// ── Application and domain ───────────────────────────────────────────────────

#[test]
fn application_depends_only_on_domain_and_ports() {
    let violations = scan(
        &src_dir().join("application"),
        &[
            "crate::infra",
            "crate::commands",
            "crate::output",
            "crate::app::",
            "std::process::Command",
            "std::fs::",
            "println!",
        ],
    );
    assert!(
        violations.is_empty(),
        "application/ must reach I/O through port traits:\n{}",
        violations.join("\n")
    );
}

#[test]
fn domain_is_pure() {
    let violations = scan(
        &src_dir().join("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net::Tcp",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_module_level_dead_code_allows_in_layers() {
    let mut violations = Vec::new();
    for layer in ["domain", "application", "infra"] {
        violations.extend(scan(&src_dir().join(layer), &["#![allow(dead_code)]"]));
    }
    assert!(
        violations.is_empty(),
        "remove unused code instead of silencing it:\n{}",
        violations.join("\n")
    );
}
