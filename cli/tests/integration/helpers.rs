//! Shared helpers for spawning the binary against a scratch data directory.

#![allow(clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

/// Command for the `tgfleet` binary with colors off and no inherited state.
pub fn tgfleet(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tgfleet"));
    cmd.env("NO_COLOR", "1")
        .env("TGFLEET_HOME", home)
        .env_remove("TGFLEET_SETTINGS")
        .env_remove("TGFLEET_YES")
        .env_remove("CI")
        .env_remove("RUST_LOG");
    cmd
}

pub fn home() -> TempDir {
    TempDir::new().expect("tempdir")
}

/// Register `name` at `ip:port` with a password read from stdin.
pub fn add_host(home: &Path, name: &str, ip: &str, port: u16) {
    tgfleet(home)
        .args(["hosts", "add", name, "--ip", ip, "--port", &port.to_string(), "--password-stdin"])
        .write_stdin("s3cret\n")
        .assert()
        .success();
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
