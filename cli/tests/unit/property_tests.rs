//! Property-based tests for validation, parsing and quoting.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use tgfleet_cli::domain::host::coerce_port;
use tgfleet_cli::domain::remote::shell_quote;
use tgfleet_cli::domain::settings::{VALID_SETTINGS_KEYS, validate_settings_key};
use tgfleet_cli::domain::{HostStatus, ServiceAction, Settings, parse_unit_state, validate_hostname};

// ============================================================================
// validate_hostname()
// ============================================================================

proptest! {
    /// Names built from the allowed alphabet are accepted.
    #[test]
    fn prop_well_formed_hostnames_accepted(name in "[a-z0-9]([a-z0-9._-]{0,30}[a-z0-9])?") {
        prop_assert!(validate_hostname(&name).is_ok(), "rejected {name}");
    }

    /// Any whitespace, slash or shell metacharacter is rejected.
    #[test]
    fn prop_hostnames_with_metacharacters_rejected(
        prefix in "[a-z]{1,8}",
        bad in prop::sample::select(vec![' ', '/', ';', '$', '`', '\'', '"', '|', '&']),
        suffix in "[a-z]{1,8}",
    ) {
        let name = format!("{prefix}{bad}{suffix}");
        prop_assert!(validate_hostname(&name).is_err(), "accepted {name:?}");
    }
}

#[test]
fn test_empty_hostname_rejected() {
    assert!(validate_hostname("").is_err());
    assert!(validate_hostname("-leading").is_err());
    assert!(validate_hostname("trailing.").is_err());
}

// ============================================================================
// coerce_port()
// ============================================================================

proptest! {
    /// Ports inside 1..=65535 pass through unchanged.
    #[test]
    fn prop_valid_ports_unchanged(port in 1u32..=65535) {
        prop_assert_eq!(u32::from(coerce_port("h", port)), port);
    }

    /// Anything outside falls back to 22.
    #[test]
    fn prop_out_of_range_ports_fall_back(port in 65536u32..) {
        prop_assert_eq!(coerce_port("h", port), 22);
    }
}

#[test]
fn test_port_zero_falls_back() {
    assert_eq!(coerce_port("h", 0), 22);
}

// ============================================================================
// parse_unit_state()
// ============================================================================

proptest! {
    /// Any active-like state on a loaded unit is Active, whatever the file state.
    #[test]
    fn prop_running_units_are_active(
        active in prop::sample::select(vec!["active", "reloading", "activating"]),
        file in "[a-z-]{0,12}",
    ) {
        let out = format!("LoadState=loaded\nActiveState={active}\nUnitFileState={file}\n");
        let unit = parse_unit_state(&out).unwrap();
        prop_assert_eq!(unit.host_status(), HostStatus::Active);
    }

    /// A missing unit is Down regardless of the other properties.
    #[test]
    fn prop_missing_unit_is_down(active in "[a-z]{1,12}", file in "[a-z]{0,12}") {
        let out = format!("LoadState=not-found\nActiveState={active}\nUnitFileState={file}\n");
        prop_assert_eq!(parse_unit_state(&out).unwrap().host_status(), HostStatus::Down);
    }

    /// Property order and surrounding noise do not matter.
    #[test]
    fn prop_parse_ignores_unrelated_lines(noise in "[A-Za-z]{1,10}=[a-z]{0,10}") {
        let out = format!("{noise}\nActiveState=failed\n{noise}\nUnitFileState=disabled\nLoadState=loaded\n");
        prop_assert_eq!(parse_unit_state(&out).unwrap().host_status(), HostStatus::Inactive);
    }

    /// Output without both required keys never parses.
    #[test]
    fn prop_garbage_never_parses(text in "[a-z ]{0,40}") {
        prop_assert!(parse_unit_state(&text).is_none());
    }
}

// ============================================================================
// Settings keys and values
// ============================================================================

proptest! {
    /// Keys outside the whitelist are rejected by both validate and set.
    #[test]
    fn prop_unknown_settings_keys_rejected(key in "[a-z]{1,12}\\.[a-z_]{1,20}") {
        if !VALID_SETTINGS_KEYS.contains(&key.as_str()) {
            prop_assert!(validate_settings_key(&key).is_err());
            let mut settings = Settings::default();
            prop_assert!(settings.set(&key, "1").is_err());
            prop_assert_eq!(settings, Settings::default());
        }
    }

    /// Concurrency outside 1..=64 is refused and leaves settings unchanged.
    #[test]
    fn prop_concurrency_range_enforced(value in 65usize..10_000) {
        let mut settings = Settings::default();
        prop_assert!(settings.set("fleet.concurrency", &value.to_string()).is_err());
        prop_assert_eq!(settings.fleet.concurrency, 10);
    }

    /// Accepted values read back unchanged.
    #[test]
    fn prop_set_then_get_roundtrips_timeouts(secs in 1u64..=300) {
        let mut settings = Settings::default();
        settings.set("transport.connect_timeout_secs", &secs.to_string()).unwrap();
        prop_assert_eq!(settings.get("transport.connect_timeout_secs").unwrap(), secs.to_string());
    }
}

#[test]
fn test_every_whitelisted_key_is_readable() {
    let settings = Settings::default();
    for key in VALID_SETTINGS_KEYS {
        assert!(settings.get(key).is_ok(), "{key} not readable");
    }
    assert_eq!(settings.entries().len(), VALID_SETTINGS_KEYS.len());
}

// ============================================================================
// Service action whitelist
// ============================================================================

proptest! {
    /// Only the four lowercase action names parse.
    #[test]
    fn prop_action_whitelist(action in "[a-zA-Z-]{1,12}") {
        let parsed = action.parse::<ServiceAction>();
        let allowed = ["start", "stop", "restart", "reload"].contains(&action.as_str());
        prop_assert_eq!(parsed.is_ok(), allowed, "action {}", action);
    }
}

#[test]
fn test_action_error_lists_allowed_actions() {
    let err = "enable".parse::<ServiceAction>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid action 'enable'. Allowed actions are: start, stop, restart, reload"
    );
}

// ============================================================================
// shell_quote()
// ============================================================================

proptest! {
    /// Quoted values never let a single quote escape the quoting.
    #[test]
    fn prop_shell_quote_wraps_unsafe_values(value in ".{1,30}") {
        let quoted = shell_quote(&value);
        let safe = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/.-_@:=".contains(c));
        if safe {
            prop_assert_eq!(quoted, value);
        } else {
            prop_assert!(quoted.len() >= 2 && quoted.starts_with('\'') && quoted.ends_with('\''));
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert!(!inner.replace(r"'\''", "").contains('\''), "unescaped quote in {}", quoted);
        }
    }
}
