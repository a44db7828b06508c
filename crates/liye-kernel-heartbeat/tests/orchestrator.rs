// liye-kernel-heartbeat/tests/orchestrator.rs
// ============================================================================
// Module: Heartbeat Orchestrator Tests
// Description: Tests for tick gating, the learning stages, and bundling.
// ============================================================================
//! ## Overview
//! Drives full ticks over real trace directories: fail-closed switches,
//! kill switch, cooldown, lock contention, crystallization from governed
//! runs, promotion, and bundle build-on-change.

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
use std::path::Path;
use std::sync::Arc;

use liye_kernel_core::Contract;
use liye_kernel_core::ContractDefault;
use liye_kernel_core::ContractScope;
use liye_kernel_core::FixedClock;
use liye_kernel_core::GateConfig;
use liye_kernel_core::GateRequest;
use liye_kernel_core::GovernanceKernel;
use liye_kernel_core::KernelConfig;
use liye_kernel_core::MatchSpec;
use liye_kernel_core::MatchValue;
use liye_kernel_core::ProposedAction;
use liye_kernel_core::Rule;
use liye_kernel_core::RuleEffect;
use liye_kernel_core::RuleId;
use liye_kernel_core::SystemClock;
use liye_kernel_heartbeat::CrystallizerConfig;
use liye_kernel_heartbeat::HeartbeatConfig;
use liye_kernel_heartbeat::HeartbeatOrchestrator;
use liye_kernel_heartbeat::MapEnv;
use liye_kernel_heartbeat::MemoryFactSink;
use liye_kernel_heartbeat::TickOutcome;
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

/// Builds a heartbeat config over one root directory.
fn config(root: &Path, dry_run: bool) -> HeartbeatConfig {
    HeartbeatConfig {
        state_dir: root.join("state"),
        traces_dir: root.join("traces"),
        policies_dir: root.join("policies"),
        bundles_dir: root.join("bundles"),
        crystallizer: CrystallizerConfig {
            min_support: 3,
            ..CrystallizerConfig::default()
        },
        dry_run,
    }
}

/// Seeds governed runs whose enforce stage allowed `send_email`.
fn seed_runs(root: &Path, count: usize) {
    let kernel = GovernanceKernel::new(KernelConfig {
        base_dir: root.join("traces"),
        gate: GateConfig::default(),
        clock: Arc::new(SystemClock),
    });
    let contract = Contract {
        version: "1.0.0".to_string(),
        scope: ContractScope {
            name: "notifications".to_string(),
            owner: None,
        },
        default: ContractDefault::Allow,
        rules: vec![Rule {
            id: RuleId::new("allow-email"),
            effect: RuleEffect::Allow,
            match_spec: MatchSpec {
                action_type: Some(MatchValue::One("send_email".to_string())),
                ..MatchSpec::default()
            },
            rationale: "notification email is pre-approved".to_string(),
        }],
    };
    for index in 0 .. count {
        let request = GateRequest {
            task: "Send notification email".to_string(),
            context: None,
            proposed_actions: vec![ProposedAction {
                action_type: "send_email".to_string(),
                tool: None,
                resource: Some(format!("user{index}@example.com")),
                path_prefix: None,
                extra: std::collections::BTreeMap::new(),
            }],
        };
        kernel.govern(&request, Some(&contract), None).unwrap();
    }
}

/// Tests an invalid enabled switch skips with the stable error code.
#[test]
fn test_invalid_enabled_env_skips_fail_closed() {
    let root = tempfile::tempdir().unwrap();
    let facts = MemoryFactSink::new();
    let clock = Arc::new(SystemClock);
    let env = env(&[("LIYE_HEARTBEAT_ENABLED", "maybe")]);
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock, &env).unwrap();

    let report = orchestrator.tick();

    match report.outcome {
        TickOutcome::Skipped {
            error_code, ..
        } => assert_eq!(error_code.as_deref(), Some("ENV_BOOL_INVALID")),
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(report.stages.is_empty());
    let snapshot = facts.snapshot();
    let resolved = snapshot
        .iter()
        .find(|fact| fact.fact == "heartbeat_switch_resolved")
        .unwrap();
    assert_eq!(resolved.payload["error_code"], "ENV_BOOL_INVALID");
    assert_eq!(resolved.payload["action"], "SKIP");
}

/// Tests an out-of-range cost budget env fails the tick closed.
#[test]
fn test_out_of_range_budget_env_skips_fail_closed() {
    for raw in ["0", "10001"] {
        let root = tempfile::tempdir().unwrap();
        let facts = MemoryFactSink::new();
        let clock = Arc::new(SystemClock);
        let env = env(&[("LIYE_COST_DAILY_BUDGET_UNITS", raw)]);
        let orchestrator =
            HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock, &env).unwrap();

        let report = orchestrator.tick();

        match report.outcome {
            TickOutcome::Skipped {
                error_code, ..
            } => assert_eq!(error_code.as_deref(), Some("COST_CONFIG_INVALID"), "{raw}"),
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(facts.snapshot().iter().any(|fact| fact.fact == "heartbeat_skipped"));
    }
}

/// Tests the kill switch short-circuits with a fact.
#[test]
fn test_kill_switch_skips() {
    let root = tempfile::tempdir().unwrap();
    let facts = MemoryFactSink::new();
    let clock = Arc::new(SystemClock);
    let env = env(&[("LIYE_KILL_SWITCH", "1")]);
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock, &env).unwrap();

    let report = orchestrator.tick();

    assert!(matches!(
        report.outcome,
        TickOutcome::Skipped { ref reason, .. } if reason == "kill_switch"
    ));
    assert!(facts.snapshot().iter().any(|fact| fact.fact == "heartbeat_skipped"));
}

/// Tests a full tick crystallizes drafts and builds a bundle once.
#[test]
fn test_full_tick_crystallizes_and_bundles() {
    let root = tempfile::tempdir().unwrap();
    seed_runs(root.path(), 3);
    let facts = MemoryFactSink::new();
    let env = env(&[]);
    let clock_one = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock_one, &env)
            .unwrap();

    let report = orchestrator.tick();

    assert_eq!(report.outcome, TickOutcome::Completed);
    let sandbox = root.path().join("policies").join("sandbox");
    assert_eq!(std::fs::read_dir(&sandbox).unwrap().count(), 1);
    // No production or candidate policies yet, so the (empty) content set
    // still differs from the absent watermark and builds an empty bundle.
    assert_eq!(report.bundle_version.as_deref(), Some("1.0.1"));
    assert!(facts.snapshot().iter().any(|fact| fact.fact == "heartbeat_bundle_built"));
    assert!(facts.snapshot().iter().any(|fact| fact.fact == "heartbeat_tick_completed"));

    // A later tick with unchanged content builds nothing.
    let facts_two = MemoryFactSink::new();
    let clock_two = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 12:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts_two, clock_two, &env)
            .unwrap();
    let second = orchestrator.tick();
    assert_eq!(second.outcome, TickOutcome::Completed);
    assert_eq!(second.bundle_version, None);
}

/// Tests the cooldown gate skips a tick inside the window.
#[test]
fn test_cooldown_skips_within_window() {
    let root = tempfile::tempdir().unwrap();
    let env = env(&[]);
    let facts = MemoryFactSink::new();
    let clock_one = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock_one, &env)
            .unwrap();
    assert_eq!(orchestrator.tick().outcome, TickOutcome::Completed);

    let clock_two = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 10:30:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock_two, &env)
            .unwrap();
    assert!(matches!(
        orchestrator.tick().outcome,
        TickOutcome::Skipped { ref reason, .. } if reason == "cooldown"
    ));
}

/// Tests a held lock skips the tick.
#[test]
fn test_held_lock_skips() {
    let root = tempfile::tempdir().unwrap();
    let state_dir = root.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    let clock = FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    };
    let guard = liye_kernel_heartbeat::lock::acquire(&state_dir, &clock).unwrap();

    let facts = MemoryFactSink::new();
    let env = env(&[]);
    let orchestrator = HeartbeatOrchestrator::new(
        config(root.path(), false),
        &facts,
        Arc::new(clock),
        &env,
    )
    .unwrap();

    assert!(matches!(
        orchestrator.tick().outcome,
        TickOutcome::Skipped { ref reason, .. } if reason == "lock_held"
    ));
    guard.release();
}

/// Tests dry-run ticks report the same stages without writing drafts.
#[test]
fn test_dry_run_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    seed_runs(root.path(), 3);
    let facts = MemoryFactSink::new();
    let env = env(&[]);
    let clock = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), true), &facts, clock, &env).unwrap();

    let report = orchestrator.tick();

    assert_eq!(report.outcome, TickOutcome::Completed);
    assert_eq!(report.stages.len(), 7);
    assert!(!root.path().join("policies").join("sandbox").exists());
    assert!(!root.path().join("bundles").exists());
}

/// Returns a schema-valid policy document with the given lifecycle status.
fn policy_doc(id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "schema_version": "1.0.0",
        "policy_id": id,
        "domain": "governance",
        "learned_at": "2026-07-01T00:00:00Z",
        "scope": { "type": "global", "keys": {} },
        "risk_level": "low",
        "validation_status": status,
        "confidence": 0.7,
        "preconditions": {},
        "actions": [{
            "action_type": "send_email",
            "parameters": {},
            "dry_run_compatible": true
        }],
        "constraints": {},
        "require_approval": true,
        "rollback_plan": "disable the policy",
        "success_signals": { "exec": {}, "operator": {}, "business": {} },
        "evaluation_window_days": 14,
        "expiry_at": "2026-10-01T00:00:00Z",
        "evidence": []
    })
}

/// Tests a tampered advertised bundle quarantines the implicated policy.
#[test]
fn test_tampered_bundle_quarantines_policy() {
    let root = tempfile::tempdir().unwrap();
    let production = root.path().join("policies").join("production");
    std::fs::create_dir_all(&production).unwrap();
    let policy_bytes = serde_json::to_vec(&policy_doc("pol-live", "production")).unwrap();
    std::fs::write(production.join("pol-live.json"), &policy_bytes).unwrap();
    let env = env(&[]);

    // First tick builds and advertises the bundle.
    let facts_one = MemoryFactSink::new();
    let clock_one = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts_one, clock_one, &env)
            .unwrap();
    let first = orchestrator.tick();
    assert_eq!(first.outcome, TickOutcome::Completed);
    assert_eq!(first.bundle_version.as_deref(), Some("1.0.1"));
    let bundle_path = root.path().join("bundles").join("policy-bundle-1.0.1.tar.gz");
    assert!(bundle_path.is_file());

    // Replace it with a bundle whose manifest lies about the policy digest.
    let content =
        vec![("policies/production/pol-live.json".to_string(), policy_bytes.clone())];
    let manifest = liye_kernel_policy::BundleManifest {
        bundle_version: "1.0.1".to_string(),
        schema_version: liye_kernel_policy::MANIFEST_SCHEMA_VERSION.to_string(),
        created_at: "2026-08-01T10:00:00Z".to_string(),
        git_sha: "0badc0de".to_string(),
        contracts: serde_json::Map::new(),
        bundle_sha256: liye_kernel_policy::content_sha256(&content).unwrap(),
        included_policies: vec![liye_kernel_policy::IncludedPolicy {
            name: "pol-live.json".to_string(),
            scope: "production".to_string(),
            policy_hash: liye_kernel_core::sha256_hex(&policy_bytes),
        }],
        files: vec![liye_kernel_policy::FileEntry {
            path: "policies/production/pol-live.json".to_string(),
            sha256: "0".repeat(64),
            size: policy_bytes.len() as u64,
        }],
    };
    liye_kernel_policy::write_bundle(&bundle_path, &manifest, &content).unwrap();

    // The next tick detects the tampering and quarantines the policy.
    let facts_two = MemoryFactSink::new();
    let clock_two = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 12:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts_two, clock_two, &env)
            .unwrap();
    let second = orchestrator.tick();

    assert_eq!(second.outcome, TickOutcome::Completed);
    let quarantined = root.path().join("policies").join("quarantine").join("pol-live.json");
    assert!(quarantined.is_file());
    assert!(!production.join("pol-live.json").exists());
    let moved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&quarantined).unwrap()).unwrap();
    assert_eq!(moved["validation_status"], "quarantine");
    assert!(!bundle_path.exists());
    assert!(
        facts_two.snapshot().iter().any(|fact| fact.fact == "heartbeat_policy_quarantined")
    );
    // The surviving (now empty) policy set rebuilds under the next patch.
    assert_eq!(second.bundle_version.as_deref(), Some("1.0.2"));
}

/// Tests the quarantine move honors dry-run and is idempotent.
#[test]
fn test_quarantine_policy_dry_run_and_move() {
    let root = tempfile::tempdir().unwrap();
    let policies_root = root.path().join("policies");
    let production = policies_root.join("production");
    std::fs::create_dir_all(&production).unwrap();
    std::fs::write(
        production.join("pol-live.json"),
        serde_json::to_vec(&policy_doc("pol-live", "production")).unwrap(),
    )
    .unwrap();

    let preview = liye_kernel_heartbeat::quarantine_policy(
        &policies_root,
        "production",
        "pol-live.json",
        "sha256 does not match manifest",
        true,
    )
    .unwrap()
    .unwrap();
    assert_eq!(preview.to, liye_kernel_policy::ValidationStatus::Quarantine);
    assert!(production.join("pol-live.json").exists());
    assert!(!policies_root.join("quarantine").exists());

    let applied = liye_kernel_heartbeat::quarantine_policy(
        &policies_root,
        "production",
        "pol-live.json",
        "sha256 does not match manifest",
        false,
    )
    .unwrap()
    .unwrap();
    assert_eq!(applied.from, liye_kernel_policy::ValidationStatus::Production);
    assert!(!production.join("pol-live.json").exists());
    assert!(policies_root.join("quarantine").join("pol-live.json").is_file());

    // The source file is gone, so a repeat is a no-op.
    let repeat = liye_kernel_heartbeat::quarantine_policy(
        &policies_root,
        "production",
        "pol-live.json",
        "sha256 does not match manifest",
        false,
    )
    .unwrap();
    assert!(repeat.is_none());
}

/// Tests the promotion check advances a qualified sandbox policy.
#[test]
fn test_promotion_moves_qualified_sandbox_policy() {
    let root = tempfile::tempdir().unwrap();
    let sandbox = root.path().join("policies").join("sandbox");
    std::fs::create_dir_all(&sandbox).unwrap();
    let policy = serde_json::json!({
        "schema_version": "1.0.0",
        "policy_id": "pol-ready",
        "domain": "governance",
        "learned_at": "2026-07-01T00:00:00Z",
        "scope": { "type": "global", "keys": {} },
        "risk_level": "low",
        "validation_status": "sandbox",
        "confidence": 0.7,
        "preconditions": {},
        "actions": [{
            "action_type": "send_email",
            "parameters": {},
            "dry_run_compatible": true
        }],
        "constraints": {},
        "require_approval": true,
        "rollback_plan": "disable the policy",
        "success_signals": {
            "exec": { "successes": 25 },
            "operator": {},
            "business": { "probe_failures": 0 }
        },
        "evaluation_window_days": 14,
        "expiry_at": "2026-10-01T00:00:00Z",
        "evidence": []
    });
    std::fs::write(sandbox.join("pol-ready.json"), serde_json::to_vec(&policy).unwrap())
        .unwrap();

    let facts = MemoryFactSink::new();
    let env = env(&[]);
    let clock = Arc::new(FixedClock {
        instant: datetime!(2026-08-01 10:00:00 UTC),
    });
    let orchestrator =
        HeartbeatOrchestrator::new(config(root.path(), false), &facts, clock, &env).unwrap();

    let report = orchestrator.tick();

    assert_eq!(report.outcome, TickOutcome::Completed);
    assert!(root.path().join("policies").join("candidate").join("pol-ready.json").exists());
    assert!(!sandbox.join("pol-ready.json").exists());
    // The promoted candidate changes the bundle content set.
    assert_eq!(report.bundle_version.as_deref(), Some("1.0.1"));
}
