// liye-kernel-core/src/runtime/verdict.rs
// ============================================================================
// Module: LiYe Kernel Verdict Stage
// Description: Merge of gate and enforce outputs into the final verdict.
// Purpose: Synthesize an explainable, deterministic decision with confidence.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Verdict synthesis is a pure function of the gate report and the optional
//! enforce result. The merge table, confidence arithmetic, and playbook text
//! are fixed so replay can reconstruct the verdict byte-for-byte from trace
//! events alone. Confidence is computed in integer hundredths to keep float
//! output exact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use crate::core::EnforceDecision;
use crate::core::EnforceResult;
use crate::core::GateDecision;
use crate::core::GateReport;
use crate::core::Severity;
use crate::core::TraceId;
use crate::core::VERDICT_VERSION;
use crate::core::Verdict;

// ============================================================================
// SECTION: Synthesis Inputs
// ============================================================================

/// Inputs to verdict synthesis.
pub struct VerdictInputs<'a> {
    /// Trace the verdict concludes.
    pub trace_id: &'a TraceId,
    /// Gate stage report.
    pub gate: &'a GateReport,
    /// Enforce stage result, absent when no contract was supplied.
    pub enforce: Option<&'a EnforceResult>,
    /// Event anchors supporting the decision.
    pub evidence_refs: Vec<String>,
}

// ============================================================================
// SECTION: Synthesis
// ============================================================================

/// Merges gate and enforce outputs into the final verdict.
#[must_use]
pub fn synthesize(inputs: VerdictInputs<'_>) -> Verdict {
    let enforce_blocked = inputs
        .enforce
        .is_some_and(|result| result.decision_summary == EnforceDecision::Block);
    let summary = merge_summary(inputs.gate.decision, enforce_blocked);

    let mut why: Vec<String> = inputs.gate.risks.iter().map(|risk| risk.description.clone()).collect();
    if let Some(result) = inputs.enforce {
        for entry in &result.blocked {
            if !why.iter().any(|existing| existing == &entry.rationale) {
                why.push(entry.rationale.clone());
            }
        }
    }

    Verdict {
        version: VERDICT_VERSION.to_string(),
        trace_id: inputs.trace_id.clone(),
        summary: summary.to_string(),
        why,
        next_steps: next_steps(summary).iter().map(ToString::to_string).collect(),
        confidence: confidence(inputs.gate, inputs.enforce),
        evidence_refs: inputs.evidence_refs,
    }
}

/// Applies the fixed merge table.
const fn merge_summary(gate: GateDecision, enforce_blocked: bool) -> &'static str {
    match (gate, enforce_blocked) {
        (GateDecision::Block, false) => "BLOCK (gate)",
        (GateDecision::Block, true) => "BLOCK (both)",
        (GateDecision::Unknown, false) => "UNKNOWN (gate)",
        (GateDecision::Degrade, false) => "DEGRADE",
        (GateDecision::Allow, false) => "ALLOW",
        (GateDecision::Unknown | GateDecision::Degrade | GateDecision::Allow, true) => {
            "BLOCK (enforce)"
        }
    }
}

/// Computes deterministic confidence in integer hundredths.
fn confidence(gate: &GateReport, enforce: Option<&EnforceResult>) -> f64 {
    let penalty = |count: usize, weight: i64| -> i64 {
        i64::try_from(count).unwrap_or(i64::MAX / weight.max(1)).saturating_mul(weight)
    };
    let mut hundredths: i64 = 100;
    hundredths -= penalty(gate.unknowns.len(), 10);
    hundredths -= penalty(gate.count_at(Severity::Medium), 5);
    hundredths -= penalty(gate.count_at(Severity::High), 20);
    hundredths -= penalty(gate.count_at(Severity::Critical), 50);
    if enforce.is_some_and(|result| result.blocked_count > 0) {
        hundredths -= 15;
    }
    f64::from(u8::try_from(hundredths.clamp(0, 100)).unwrap_or(0)) / 100.0
}

/// Returns the canned playbook for a merged summary.
fn next_steps(summary: &str) -> &'static [&'static str] {
    if summary.starts_with("BLOCK") {
        &[
            "do not execute the proposed actions",
            "obtain explicit approval from the contract owner",
            "revise the plan to satisfy the governing contract",
        ]
    } else if summary.starts_with("UNKNOWN") {
        &[
            "obtain explicit approval before proceeding",
            "narrow the proposed actions to known action types",
        ]
    } else if summary.starts_with("DEGRADE") {
        &["proceed with reduced scope", "monitor the affected resources"]
    } else {
        &["proceed with the proposed actions"]
    }
}

// ============================================================================
// SECTION: Markdown Rendering
// ============================================================================

/// Renders the verdict as Markdown, mechanically from the JSON fields.
#[must_use]
pub fn render_markdown(verdict: &Verdict) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Verdict {}", verdict.trace_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Summary:** {}", verdict.summary);
    let _ = writeln!(out, "**Confidence:** {:.2}", verdict.confidence);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Why");
    let _ = writeln!(out);
    if verdict.why.is_empty() {
        let _ = writeln!(out, "- no risks or rule violations were recorded");
    }
    for reason in &verdict.why {
        let _ = writeln!(out, "- {reason}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Next steps");
    let _ = writeln!(out);
    for step in &verdict.next_steps {
        let _ = writeln!(out, "- {step}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Evidence");
    let _ = writeln!(out);
    for evidence_ref in &verdict.evidence_refs {
        let _ = writeln!(out, "- {evidence_ref}");
    }
    out
}
