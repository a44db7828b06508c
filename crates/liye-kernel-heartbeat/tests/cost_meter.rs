// liye-kernel-heartbeat/tests/cost_meter.rs
// ============================================================================
// Module: Cost Meter Tests
// Description: Tests for budget preflight, recording, and day rollover.
// ============================================================================
//! ## Overview
//! Validates projected-cost math, the exceed path, per-step recording, and
//! the UTC day reset fact.

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

use liye_kernel_core::FixedClock;
use liye_kernel_heartbeat::CostMeter;
use liye_kernel_heartbeat::MapEnv;
use liye_kernel_heartbeat::MemoryFactSink;
use liye_kernel_heartbeat::StateStore;
use time::macros::datetime;

/// Builds an env map from pairs.
fn env(pairs: &[(&str, &str)]) -> MapEnv {
    MapEnv {
        vars: pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Tests the preflight passes inside the budget and denies beyond it.
#[test]
fn test_budget_preflight() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let facts = MemoryFactSink::new();
    let clock = FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    };
    let env = env(&[("LIYE_COST_DAILY_BUDGET_UNITS", "10")]);
    let meter = CostMeter::resolve(&env, &store, &facts, &clock).unwrap();

    // discover(1) + crystallize(3) + bundle_build(5) = 9 <= 10.
    let inside = meter
        .check_budget(&[
            ("discover".to_string(), 1),
            ("crystallize".to_string(), 1),
            ("bundle_build".to_string(), 1),
        ])
        .unwrap();
    assert!(inside.passed);
    assert_eq!(inside.projected_cost, 9);

    let outside = meter
        .check_budget(&[("bundle_build".to_string(), 3)])
        .unwrap();
    assert!(!outside.passed);
    assert!(facts.snapshot().iter().any(|fact| fact.fact == "cost_budget_exceeded"));
}

/// Tests recording consumes budget and appends one fact per step.
#[test]
fn test_record_costs_updates_usage() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let facts = MemoryFactSink::new();
    let clock = FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    };
    let env = env(&[("LIYE_COST_DAILY_BUDGET_UNITS", "100")]);
    let meter = CostMeter::resolve(&env, &store, &facts, &clock).unwrap();

    let total = meter
        .record_costs(
            "run-1",
            &[("discover".to_string(), 2), ("notify".to_string(), 1)],
            Some("ab12"),
        )
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(
        facts.snapshot().iter().filter(|fact| fact.fact == "cost_event_recorded").count(),
        2
    );

    let decision = meter.check_budget(&[("discover".to_string(), 1)]).unwrap();
    assert_eq!(decision.remaining_budget, 97);
}

/// Tests the UTC day rollover resets usage and records one fact.
#[test]
fn test_day_rollover_resets_usage_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let env = env(&[("LIYE_COST_DAILY_BUDGET_UNITS", "100")]);

    let day_one = FixedClock {
        instant: datetime!(2026-08-01 23:00:00 UTC),
    };
    let facts_one = MemoryFactSink::new();
    let meter = CostMeter::resolve(&env, &store, &facts_one, &day_one).unwrap();
    meter.record_costs("run-1", &[("discover".to_string(), 5)], None).unwrap();

    let day_two = FixedClock {
        instant: datetime!(2026-08-02 00:05:00 UTC),
    };
    let facts_two = MemoryFactSink::new();
    let meter = CostMeter::resolve(&env, &store, &facts_two, &day_two).unwrap();
    let decision = meter.check_budget(&[("discover".to_string(), 1)]).unwrap();

    assert_eq!(decision.remaining_budget, 100);
    assert_eq!(
        facts_two.snapshot().iter().filter(|fact| fact.fact == "cost_day_reset").count(),
        1
    );

    // A second check within the same day must not reset again.
    let _ = meter.check_budget(&[("discover".to_string(), 1)]).unwrap();
    assert_eq!(
        facts_two.snapshot().iter().filter(|fact| fact.fact == "cost_day_reset").count(),
        1
    );
}

/// Tests a disabled meter passes trivially and records nothing.
#[test]
fn test_disabled_meter_is_inert() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let facts = MemoryFactSink::new();
    let clock = FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    };
    let env = env(&[("LIYE_COST_METER_ENABLED", "off")]);
    let meter = CostMeter::resolve(&env, &store, &facts, &clock).unwrap();

    assert!(meter.disabled());
    let decision = meter.check_budget(&[("bundle_build".to_string(), 100)]).unwrap();
    assert!(decision.passed);
    assert_eq!(meter.record_costs("run-1", &[("notify".to_string(), 1)], None).unwrap(), 0);
    assert!(facts.snapshot().is_empty());
}
