//! Structural tests for layer boundaries.
//!
//! These tests scan source files so that the domain, application, infra and
//! presentation layers keep depending on each other in one direction only.

use std::path::{Path, PathBuf};

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

fn src_dir(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Lines outside `#[cfg(test)]` blocks that contain any of `needles`.
fn find_outside_tests(dir: &Path, needles: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = relative(&file);
        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            if in_test || line.trim().starts_with("//") {
                continue;
            }
            for needle in needles {
                if line.contains(needle) {
                    violations.push(format!("{rel}:{}: `{needle}`: {line}", i + 1));
                }
            }
        }
    }
    violations
}

// ── Presentation ──────────────────────────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("commands")) {
        let rel = relative(&file);
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            let lineno = i + 1;
            if line.contains("json: bool") {
                violations.push(format!("{rel}:{lineno}: found `json: bool` parameter: {line}"));
            }
            let trimmed = line.trim();
            if trimmed.starts_with("if json") || trimmed.starts_with("if !json") {
                violations.push(format!("{rel}:{lineno}: found inline JSON branch: {line}"));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found inline JSON branching in commands/: use app.renderer() instead\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_use_standardized_confirmation() {
    let violations = find_outside_tests(&src_dir("commands"), &["Confirm::new()"]);
    assert!(
        violations.is_empty(),
        "Commands must use app.confirm() for yes/no prompts:\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_do_not_open_sessions_directly() {
    let violations = find_outside_tests(&src_dir("commands"), &[".open(&", "SshTransport::new"]);
    assert!(
        violations.is_empty(),
        "Commands must reach hosts through dispatch or the fleet coordinator:\n{}",
        violations.join("\n")
    );
}

// ── Infra ─────────────────────────────────────────────────────────────────────

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_outside_tests(&src_dir("infra"), &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_outside_tests(&src_dir("infra"), &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

/// Track whether a line is inside an async fn and outside `spawn_blocking`.
struct AsyncContextTracker {
    in_async_fn: bool,
    in_spawn_blocking: bool,
    brace_depth: i32,
    async_fn_start_depth: i32,
    spawn_blocking_start_depth: i32,
}

impl AsyncContextTracker {
    fn new() -> Self {
        Self {
            in_async_fn: false,
            in_spawn_blocking: false,
            brace_depth: 0,
            async_fn_start_depth: 0,
            spawn_blocking_start_depth: 0,
        }
    }

    /// Returns `true` if the line is in an async fn but not in `spawn_blocking`.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("async fn ") && !trimmed.starts_with("//") {
            self.in_async_fn = true;
            self.async_fn_start_depth = self.brace_depth;
        } else if trimmed.contains("fn ") && !trimmed.contains("async ") && !trimmed.starts_with("//")
        {
            self.in_async_fn = false;
            self.in_spawn_blocking = false;
        }
        if self.in_async_fn && line.contains("spawn_blocking") {
            self.in_spawn_blocking = true;
            self.spawn_blocking_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_spawn_blocking && self.brace_depth <= self.spawn_blocking_start_depth
                    {
                        self.in_spawn_blocking = false;
                    }
                    if self.in_async_fn && self.brace_depth <= self.async_fn_start_depth {
                        self.in_async_fn = false;
                    }
                }
                _ => {}
            }
        }
        self.in_async_fn && !self.in_spawn_blocking
    }
}

/// libssh2 calls block; every one of them must run on the blocking pool.
#[test]
fn infra_async_functions_do_not_block() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("infra")) {
        let rel = relative(&file);
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };

        let mut tracker = AsyncContextTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_unguarded_async = tracker.process_line(line);
            if !in_unguarded_async || line.trim().starts_with("//") {
                continue;
            }
            for needle in ["std::fs::", "TcpStream::connect", ".handshake(", ".channel_session("] {
                if line.contains(needle) {
                    violations.push(format!(
                        "{rel}:{}: `{needle}` in async fn outside spawn_blocking: {line}",
                        i + 1
                    ));
                }
            }
        }
    }

    assert!(
        violations.is_empty(),
        "infra/ async functions must not block outside spawn_blocking:\n{}",
        violations.join("\n")
    );
}

// ── Domain and application ────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let violations = find_outside_tests(
        &src_dir("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "ssh2::",
            "std::fs::",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must not do I/O or import outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_outer_layer_imports() {
    let violations = find_outside_tests(
        &src_dir("application"),
        &["crate::infra", "crate::commands", "crate::output", "crate::app::", "ssh2::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must only depend on domain/ and its own ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_blocking_io() {
    let violations = find_outside_tests(
        &src_dir("application"),
        &["std::fs::", "std::process::Command", "std::net::TcpStream"],
    );
    assert!(
        violations.is_empty(),
        "application/ must reach the outside world through ports:\n{}",
        violations.join("\n")
    );
}
