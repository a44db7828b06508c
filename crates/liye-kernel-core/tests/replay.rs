// liye-kernel-core/tests/replay.rs
// ============================================================================
// Module: Replay Tests
// Description: Tests for trace re-verification and tamper detection.
// ============================================================================
//! ## Overview
//! Validates replay purity, hash-chain divergence reporting, and crash
//! handling over sealed traces produced by the kernel facade.

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

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use liye_kernel_core::GateConfig;
use liye_kernel_core::GateRequest;
use liye_kernel_core::GovernanceKernel;
use liye_kernel_core::KernelConfig;
use liye_kernel_core::ProposedAction;
use liye_kernel_core::ReplayStatus;
use liye_kernel_core::SystemClock;
use liye_kernel_core::TraceId;

/// Builds a kernel rooted at the given directory.
fn kernel(base: &Path) -> GovernanceKernel {
    GovernanceKernel::new(KernelConfig {
        base_dir: base.to_path_buf(),
        gate: GateConfig::default(),
        clock: Arc::new(SystemClock),
    })
}

/// Runs a clean request through the full decision path.
fn sealed_trace(kernel: &GovernanceKernel) -> TraceId {
    let request = GateRequest {
        task: "Send notification email".to_string(),
        context: None,
        proposed_actions: vec![ProposedAction {
            action_type: "send_email".to_string(),
            tool: None,
            resource: Some("user@example.com".to_string()),
            path_prefix: None,
            extra: std::collections::BTreeMap::new(),
        }],
    };
    kernel.govern(&request, None, None).unwrap().trace_id
}

/// Tests replay passes over an unaltered trace.
#[test]
fn test_replay_passes_on_unaltered_trace() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path());
    let trace_id = sealed_trace(&kernel);

    let outcome = kernel.replay(&trace_id, None).unwrap();

    assert_eq!(outcome.report.status, ReplayStatus::Pass);
    assert!(outcome.report.pass);
    assert!(outcome.report.checks.schema_valid);
    assert!(outcome.report.checks.hash_chain_valid);
    assert!(outcome.report.checks.structure_valid);
    assert!(outcome.diff.is_none());
    assert!(dir.path().join(trace_id.as_str()).join("replay.json").is_file());
}

/// Tests replay is bit-identical across runs over the same bytes.
#[test]
fn test_replay_is_pure() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path());
    let trace_id = sealed_trace(&kernel);
    let report_path = dir.path().join(trace_id.as_str()).join("replay.json");

    kernel.replay(&trace_id, None).unwrap();
    let first = fs::read(&report_path).unwrap();
    kernel.replay(&trace_id, None).unwrap();
    let second = fs::read(&report_path).unwrap();

    assert_eq!(first, second);
}

/// Tests payload tampering is pinned to the first diverging sequence.
#[test]
fn test_tampered_payload_fails_at_first_divergence() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path());
    let trace_id = sealed_trace(&kernel);

    let events_path = dir.path().join(trace_id.as_str()).join("events.ndjson");
    let raw = fs::read_to_string(&events_path).unwrap();
    let mut lines: Vec<String> = raw.lines().map(ToString::to_string).collect();
    let mut event: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    event["payload"]["decision"] = serde_json::Value::String("ALLOW_TAMPERED".to_string());
    lines[1] = serde_json::to_string(&event).unwrap();
    fs::write(&events_path, format!("{}\n", lines.join("\n"))).unwrap();

    let outcome = kernel.replay(&trace_id, None).unwrap();

    assert_eq!(outcome.report.status, ReplayStatus::Fail);
    assert!(!outcome.report.checks.hash_chain_valid);
    let diff = outcome.diff.unwrap();
    assert_eq!(diff.seq, 1);
    assert_ne!(diff.expected_hash, diff.actual_hash);
    assert!(dir.path().join(trace_id.as_str()).join("diff.json").is_file());
}

/// Tests a truncated final line fails replay.
#[test]
fn test_truncated_final_line_fails_replay() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path());
    let trace_id = sealed_trace(&kernel);

    let events_path = dir.path().join(trace_id.as_str()).join("events.ndjson");
    let mut file = fs::OpenOptions::new().append(true).open(&events_path).unwrap();
    file.write_all(b"{\"trace_id\":").unwrap();

    let outcome = kernel.replay(&trace_id, None).unwrap();

    assert_eq!(outcome.report.status, ReplayStatus::Fail);
    assert!(outcome.report.errors.iter().any(|error| error.contains("truncated")));
}

/// Tests a malformed complete line fails the schema check.
#[test]
fn test_malformed_line_fails_schema_check() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path());
    let trace_id = sealed_trace(&kernel);

    let events_path = dir.path().join(trace_id.as_str()).join("events.ndjson");
    let mut file = fs::OpenOptions::new().append(true).open(&events_path).unwrap();
    file.write_all(b"not json at all\n").unwrap();

    let outcome = kernel.replay(&trace_id, None).unwrap();

    assert_eq!(outcome.report.status, ReplayStatus::Fail);
    assert!(!outcome.report.checks.schema_valid);
}

/// Tests a tampered verdict artifact fails the structural check.
#[test]
fn test_tampered_verdict_artifact_fails_structure_check() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path());
    let trace_id = sealed_trace(&kernel);

    let verdict_path = dir.path().join(trace_id.as_str()).join("verdict.json");
    let mut verdict: serde_json::Value =
        serde_json::from_slice(&fs::read(&verdict_path).unwrap()).unwrap();
    verdict["confidence"] = serde_json::json!(0.42);
    fs::write(&verdict_path, serde_json::to_vec(&verdict).unwrap()).unwrap();

    let outcome = kernel.replay(&trace_id, None).unwrap();

    assert_eq!(outcome.report.status, ReplayStatus::Fail);
    assert!(outcome.report.checks.hash_chain_valid);
    assert!(!outcome.report.checks.structure_valid);
}
