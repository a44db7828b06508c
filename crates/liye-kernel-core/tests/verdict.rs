// liye-kernel-core/tests/verdict.rs
// ============================================================================
// Module: Verdict Tests
// Description: Tests for the merge table and confidence arithmetic.
// ============================================================================
//! ## Overview
//! Validates verdict synthesis against the fixed merge table and the
//! deterministic confidence formula.

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
    clippy::float_cmp,
    reason = "Test-only output, panic-based assertions, and exact confidence values are permitted."
)]

use liye_kernel_core::BlockedAction;
use liye_kernel_core::EnforceDecision;
use liye_kernel_core::EnforceResult;
use liye_kernel_core::GateDecision;
use liye_kernel_core::GateReport;
use liye_kernel_core::ProposedAction;
use liye_kernel_core::Risk;
use liye_kernel_core::RiskId;
use liye_kernel_core::RuleId;
use liye_kernel_core::Severity;
use liye_kernel_core::TraceId;
use liye_kernel_core::UnknownFinding;
use liye_kernel_core::runtime::VerdictInputs;
use liye_kernel_core::runtime::render_markdown;
use liye_kernel_core::runtime::synthesize;

/// Builds a gate report with the given decision and findings.
fn report(decision: GateDecision, risks: Vec<Risk>, unknowns: Vec<UnknownFinding>) -> GateReport {
    GateReport {
        version: "1.0.0".to_string(),
        trace_id: TraceId::new("t"),
        decision,
        risks,
        unknowns,
    }
}

/// Builds a risk at the given severity.
fn risk(severity: Severity) -> Risk {
    Risk {
        id: RiskId::new("test.risk"),
        severity,
        description: format!("{severity:?} finding"),
        triggered_by: "task".to_string(),
    }
}

/// Builds an enforce result with the given blocked count.
fn enforce_result(blocked: u64) -> EnforceResult {
    let blocked_actions = (0 .. blocked)
        .map(|index| BlockedAction {
            action: ProposedAction {
                action_type: "write".to_string(),
                tool: None,
                resource: Some(format!("r{index}")),
                path_prefix: None,
                extra: std::collections::BTreeMap::new(),
            },
            rule_id: RuleId::new("deny-rule"),
            rationale: "prohibited by contract".to_string(),
        })
        .collect::<Vec<_>>();
    EnforceResult {
        decision_summary: if blocked > 0 { EnforceDecision::Block } else { EnforceDecision::Allow },
        allowed: Vec::new(),
        blocked: blocked_actions,
        blocked_count: blocked,
        allowed_count: 0,
        blocked_rule_ids: if blocked > 0 { vec![RuleId::new("deny-rule")] } else { Vec::new() },
    }
}

/// Tests every row of the merge table.
#[test]
fn test_merge_table_rows() {
    let rows = [
        (GateDecision::Block, Some(0), "BLOCK (gate)"),
        (GateDecision::Block, Some(1), "BLOCK (both)"),
        (GateDecision::Unknown, Some(0), "UNKNOWN (gate)"),
        (GateDecision::Unknown, Some(1), "BLOCK (enforce)"),
        (GateDecision::Degrade, Some(0), "DEGRADE"),
        (GateDecision::Degrade, Some(1), "BLOCK (enforce)"),
        (GateDecision::Allow, Some(0), "ALLOW"),
        (GateDecision::Allow, Some(1), "BLOCK (enforce)"),
        (GateDecision::Block, None, "BLOCK (gate)"),
        (GateDecision::Allow, None, "ALLOW"),
    ];
    for (gate_decision, blocked, expected) in rows {
        let gate = report(gate_decision, Vec::new(), Vec::new());
        let enforce = blocked.map(enforce_result);
        let verdict = synthesize(VerdictInputs {
            trace_id: &TraceId::new("t"),
            gate: &gate,
            enforce: enforce.as_ref(),
            evidence_refs: Vec::new(),
        });
        assert_eq!(verdict.summary, expected, "gate {gate_decision:?} blocked {blocked:?}");
    }
}

/// Tests a clean allow carries full confidence.
#[test]
fn test_clean_allow_has_full_confidence() {
    let gate = report(GateDecision::Allow, Vec::new(), Vec::new());
    let verdict = synthesize(VerdictInputs {
        trace_id: &TraceId::new("t"),
        gate: &gate,
        enforce: Some(&enforce_result(0)),
        evidence_refs: Vec::new(),
    });
    assert_eq!(verdict.confidence, 1.0);
}

/// Tests the confidence penalties compose and clamp.
#[test]
fn test_confidence_penalties_compose() {
    let gate = report(
        GateDecision::Block,
        vec![risk(Severity::Medium), risk(Severity::High)],
        vec![UnknownFinding {
            id: RiskId::new("u"),
            description: "unclear".to_string(),
        }],
    );
    // 1.00 - 0.10 - 0.05 - 0.20 - 0.15 = 0.50
    let verdict = synthesize(VerdictInputs {
        trace_id: &TraceId::new("t"),
        gate: &gate,
        enforce: Some(&enforce_result(2)),
        evidence_refs: Vec::new(),
    });
    assert_eq!(verdict.confidence, 0.50);

    let floor = report(
        GateDecision::Block,
        vec![risk(Severity::Critical), risk(Severity::Critical), risk(Severity::Critical)],
        Vec::new(),
    );
    let verdict = synthesize(VerdictInputs {
        trace_id: &TraceId::new("t"),
        gate: &floor,
        enforce: None,
        evidence_refs: Vec::new(),
    });
    assert_eq!(verdict.confidence, 0.0);
}

/// Tests why collects risk descriptions and deny rationales without repeats.
#[test]
fn test_why_collects_descriptions_and_rationales() {
    let gate = report(GateDecision::Allow, vec![risk(Severity::Low)], Vec::new());
    let verdict = synthesize(VerdictInputs {
        trace_id: &TraceId::new("t"),
        gate: &gate,
        enforce: Some(&enforce_result(2)),
        evidence_refs: Vec::new(),
    });

    assert_eq!(verdict.why.len(), 2);
    assert!(verdict.why.contains(&"prohibited by contract".to_string()));
}

/// Tests markdown rendering reflects the verdict fields.
#[test]
fn test_markdown_rendering_is_mechanical() {
    let gate = report(GateDecision::Allow, Vec::new(), Vec::new());
    let verdict = synthesize(VerdictInputs {
        trace_id: &TraceId::new("t"),
        gate: &gate,
        enforce: None,
        evidence_refs: vec!["events.ndjson#1".to_string()],
    });
    let markdown = render_markdown(&verdict);

    assert!(markdown.contains("# Verdict t"));
    assert!(markdown.contains("**Summary:** ALLOW"));
    assert!(markdown.contains("**Confidence:** 1.00"));
    assert!(markdown.contains("- events.ndjson#1"));
}
