//! Remote command construction and stderr classification.
//!
//! Every command here is a single string handed to the remote login shell, so
//! every interpolated value goes through [`shell_quote`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::domain::error::ServiceError;
use crate::domain::host::Host;
use crate::domain::operation::ServiceAction;
use crate::domain::settings::AgentSettings;

/// Properties read by the health check.
pub const UNIT_PROPERTIES: &str = "LoadState,ActiveState,UnitFileState";

/// Where the agent lives on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLayout {
    pub config_path: String,
    pub binary: String,
    pub service: String,
    pub use_sudo: bool,
}

impl AgentLayout {
    /// Fleet-wide agent settings with the host's own config path applied.
    #[must_use]
    pub fn for_host(settings: &AgentSettings, host: &Host) -> Self {
        Self {
            config_path: host
                .config_path
                .clone()
                .unwrap_or_else(|| settings.config_path.clone()),
            binary: settings.binary.clone(),
            service: settings.service.clone(),
            use_sudo: settings.use_sudo,
        }
    }

    /// `<binary> --config <path> --test`
    #[must_use]
    pub fn test_command(&self, config_path: &str) -> String {
        privileged(
            &format!(
                "{} --config {} --test",
                shell_quote(&self.binary),
                shell_quote(config_path)
            ),
            self.use_sudo,
        )
    }

    #[must_use]
    pub fn service_command(&self, action: ServiceAction) -> String {
        privileged(
            &format!("systemctl {action} {}", shell_quote(&self.service)),
            self.use_sudo,
        )
    }

    #[must_use]
    pub fn unit_state_command(&self) -> String {
        format!(
            "systemctl show {} --property={UNIT_PROPERTIES}",
            shell_quote(&self.service)
        )
    }
}

/// Quote `value` for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '@' | ':' | '='));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Prefix `command` with non-interactive sudo when requested.
#[must_use]
pub fn privileged(command: &str, use_sudo: bool) -> String {
    if use_sudo {
        format!("sudo -n {command}")
    } else {
        command.to_string()
    }
}

#[must_use]
pub fn read_file_command(path: &str, use_sudo: bool) -> String {
    privileged(&format!("cat -- {}", shell_quote(path)), use_sudo)
}

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique suffix for temporary remote files.
#[must_use]
pub fn scratch_nonce() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:x}-{seq}")
}

/// Temporary sibling of `path`. Same directory, so the final rename stays on
/// one filesystem.
#[must_use]
pub fn temp_path_for(path: &str, nonce: &str) -> String {
    format!("{path}.tgfleet-{nonce}.tmp")
}

/// Scratch location for a candidate configuration under test.
#[must_use]
pub fn candidate_path(nonce: &str) -> String {
    format!("/tmp/tgfleet-candidate-{nonce}.conf")
}

// Reads the new content from stdin into $1 and checks that exactly $3 bytes
// arrived, then copies owner and mode from $2 when it exists and renames $1
// over $2. $1 is removed on any failure, so a dropped stream never replaces
// the target.
const WRITE_SCRIPT: &str = "umask 077; \
cat > \"$1\" || { rm -f -- \"$1\"; exit 1; }; \
got=$(wc -c < \"$1\") || { rm -f -- \"$1\"; exit 1; }; \
if [ $got -ne \"$3\" ]; then rm -f -- \"$1\"; echo \"tgfleet: incomplete write: received $got of $3 bytes\" >&2; exit 1; fi; \
if [ -e \"$2\" ]; then chown --reference=\"$2\" -- \"$1\" 2>/dev/null; chmod --reference=\"$2\" -- \"$1\"; fi; \
mv -f -- \"$1\" \"$2\" || { rm -f -- \"$1\"; exit 1; }";

/// Atomic replace of `path` with the `expected_len` bytes supplied on stdin.
/// A short stream fails the command and leaves `path` untouched.
#[must_use]
pub fn write_file_command(path: &str, temp_path: &str, expected_len: usize, use_sudo: bool) -> String {
    privileged(
        &format!(
            "sh -c {} tgfleet-write {} {} {expected_len}",
            shell_quote(WRITE_SCRIPT),
            shell_quote(temp_path),
            shell_quote(path)
        ),
        use_sudo,
    )
}

/// Copy `path` to `<path>.bak`, preserving mode. A missing file is not an
/// error.
#[must_use]
pub fn backup_command(path: &str, use_sudo: bool) -> String {
    let quoted = shell_quote(path);
    let backup = shell_quote(&backup_path(path));
    privileged(
        &format!(
            "sh -c {}",
            shell_quote(&format!("[ ! -e {quoted} ] || cp -p -- {quoted} {backup}"))
        ),
        use_sudo,
    )
}

#[must_use]
pub fn backup_path(path: &str) -> String {
    format!("{path}.bak")
}

#[must_use]
pub fn remove_file_command(path: &str, use_sudo: bool) -> String {
    privileged(&format!("rm -f -- {}", shell_quote(path)), use_sudo)
}

// ── Classification ───────────────────────────────────────────────────────────

/// Category of a failed remote file command, decided from its stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFailure {
    NotFound,
    PermissionDenied,
    Other,
}

#[must_use]
pub fn classify_file_failure(stderr: &str) -> FileFailure {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("no such file") {
        FileFailure::NotFound
    } else if is_permission_message(&lower) {
        FileFailure::PermissionDenied
    } else {
        FileFailure::Other
    }
}

fn is_permission_message(lower: &str) -> bool {
    [
        "permission denied",
        "access denied",
        "interactive authentication required",
        "password is required",
        "a terminal is required",
        "operation not permitted",
        "read-only file system",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Map a failed `systemctl <action>` run onto a [`ServiceError`].
#[must_use]
pub fn classify_service_failure(
    action: ServiceAction,
    service: &str,
    exit_code: i32,
    stderr: &str,
) -> ServiceError {
    let lower = stderr.to_ascii_lowercase();
    let detail = stderr.trim().to_string();
    if is_permission_message(&lower) {
        ServiceError::PermissionDenied {
            action,
            service: service.to_string(),
            detail,
        }
    } else if lower.contains("not found") || lower.contains("not loaded") {
        ServiceError::NotInstalled {
            service: service.to_string(),
        }
    } else {
        ServiceError::Failed {
            action,
            service: service.to_string(),
            exit_code,
            stderr: detail,
        }
    }
}
