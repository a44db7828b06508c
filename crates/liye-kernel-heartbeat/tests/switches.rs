// liye-kernel-heartbeat/tests/switches.rs
// ============================================================================
// Module: Switch Resolver Tests
// Description: Tests for fail-closed switch resolution and precedence.
// ============================================================================
//! ## Overview
//! Validates boolean spellings, numeric ranges, notify policies, and the
//! kill-switch > ENV > state > default precedence.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use liye_kernel_heartbeat::MapEnv;
use liye_kernel_heartbeat::NotifyPolicy;
use liye_kernel_heartbeat::StateOverrides;
use liye_kernel_heartbeat::SwitchErrorCode;
use liye_kernel_heartbeat::SwitchResolver;
use liye_kernel_heartbeat::parse_bool;
use liye_kernel_heartbeat::switches::SwitchSource;

/// Builds an env map from pairs.
fn env(pairs: &[(&str, &str)]) -> MapEnv {
    MapEnv {
        vars: pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Tests every accepted boolean spelling, both cases.
#[test]
fn test_boolean_spellings() {
    for raw in ["true", "1", "yes", "on", "TRUE", "Yes", "ON"] {
        assert_eq!(parse_bool(raw), Some(true), "{raw}");
    }
    for raw in ["false", "0", "no", "off", "FALSE", "No", "OFF"] {
        assert_eq!(parse_bool(raw), Some(false), "{raw}");
    }
    for raw in ["maybe", "", "2", "enabled"] {
        assert_eq!(parse_bool(raw), None, "{raw}");
    }
}

/// Tests an invalid boolean env fails closed with the stable code.
#[test]
fn test_invalid_bool_env_fails_closed() {
    let env = env(&[("LIYE_HEARTBEAT_ENABLED", "maybe")]);
    let resolver = SwitchResolver::new(&env);
    let result = resolver.resolve_heartbeat(&StateOverrides::default());
    let err = result.unwrap_err();
    assert_eq!(err.code, SwitchErrorCode::EnvBoolInvalid);
    assert_eq!(err.variable, "LIYE_HEARTBEAT_ENABLED");
}

/// Tests cooldown bounds fail closed outside 1..=1440.
#[test]
fn test_cooldown_out_of_range_fails_closed() {
    for raw in ["0", "1441", "-5", "abc"] {
        let env = env(&[("LIYE_HEARTBEAT_COOLDOWN_MINUTES", raw)]);
        let resolver = SwitchResolver::new(&env);
        let err = resolver.resolve_heartbeat(&StateOverrides::default()).unwrap_err();
        assert_eq!(err.code, SwitchErrorCode::EnvNumberOutOfRange, "{raw}");
    }
}

/// Tests budget bounds fail closed at 0 and 10001.
#[test]
fn test_budget_out_of_range_fails_closed() {
    for raw in ["0", "10001"] {
        let env = env(&[("LIYE_COST_DAILY_BUDGET_UNITS", raw)]);
        let resolver = SwitchResolver::new(&env);
        let err = resolver.resolve_cost(&StateOverrides::default()).unwrap_err();
        assert_eq!(err.code, SwitchErrorCode::EnvNumberOutOfRange, "{raw}");
    }
}

/// Tests an invalid notify policy fails closed.
#[test]
fn test_invalid_notify_policy_fails_closed() {
    let env = env(&[("LIYE_HEARTBEAT_NOTIFY_POLICY", "loudly")]);
    let resolver = SwitchResolver::new(&env);
    let err = resolver.resolve_heartbeat(&StateOverrides::default()).unwrap_err();
    assert_eq!(err.code, SwitchErrorCode::EnvNotifyPolicyInvalid);
}

/// Tests ENV outranks the state override, which outranks the default.
#[test]
fn test_precedence_env_over_state_over_default() {
    let overrides = StateOverrides {
        enabled: Some(false),
        cooldown_minutes: Some(30),
        ..StateOverrides::default()
    };

    let with_env = env(&[("LIYE_HEARTBEAT_ENABLED", "true")]);
    let resolved = SwitchResolver::new(&with_env).resolve_heartbeat(&overrides).unwrap();
    assert!(resolved.enabled.value);
    assert_eq!(resolved.enabled.source, SwitchSource::Env);
    assert_eq!(resolved.cooldown_minutes.value, 30);
    assert_eq!(resolved.cooldown_minutes.source, SwitchSource::State);

    let empty = env(&[]);
    let resolved = SwitchResolver::new(&empty)
        .resolve_heartbeat(&StateOverrides::default())
        .unwrap();
    assert_eq!(resolved.notify_policy.value, NotifyPolicy::BundleOrError);
    assert_eq!(resolved.notify_policy.source, SwitchSource::Default);
    assert_eq!(resolved.cooldown_minutes.value, 60);
}

/// Tests the kill switch engages from env or state.
#[test]
fn test_kill_switch_precedence() {
    let with_env = env(&[("LIYE_KILL_SWITCH", "on")]);
    let resolved =
        SwitchResolver::new(&with_env).resolve_heartbeat(&StateOverrides::default()).unwrap();
    assert!(resolved.kill_switch);

    let overrides = StateOverrides {
        kill_switch: Some(true),
        ..StateOverrides::default()
    };
    let empty = env(&[]);
    let resolved = SwitchResolver::new(&empty).resolve_heartbeat(&overrides).unwrap();
    assert!(resolved.kill_switch);
}

/// Tests deny action parsing accepts the two documented values.
#[test]
fn test_deny_action_values() {
    let env_ok = env(&[("LIYE_COST_DENY_ACTION", "skip_notify_only")]);
    let resolved =
        SwitchResolver::new(&env_ok).resolve_cost(&StateOverrides::default()).unwrap();
    assert_eq!(
        resolved.deny_action.value,
        liye_kernel_heartbeat::DenyAction::SkipNotifyOnly
    );

    let env_bad = env(&[("LIYE_COST_DENY_ACTION", "explode")]);
    let err = SwitchResolver::new(&env_bad).resolve_cost(&StateOverrides::default()).unwrap_err();
    assert_eq!(err.code, SwitchErrorCode::EnvDenyActionInvalid);
}
