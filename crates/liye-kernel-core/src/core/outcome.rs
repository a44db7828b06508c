// liye-kernel-core/src/core/outcome.rs
// ============================================================================
// Module: LiYe Kernel Decision Outcomes
// Description: Enforce results and merged verdicts.
// Purpose: Define the canonical outputs of the enforcement and verdict stages.
// Dependencies: crate::core::{contract, identifiers}, serde
// ============================================================================

//! ## Overview
//! The enforce stage produces a per-action outcome plus a summary; the
//! verdict stage merges it with the gate report into the final explainable
//! decision. Both records are persisted verbatim in trace events, and the
//! verdict additionally lands in `verdict.json` as canonical bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::contract::ProposedAction;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::TraceId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version stamped on every verdict.
pub const VERDICT_VERSION: &str = "1.0.0";

/// Synthetic rule id reported for default-deny blocks.
pub const DEFAULT_DENY_RULE_ID: &str = "__default_deny__";

// ============================================================================
// SECTION: Enforce Result
// ============================================================================

/// Summary decision of the enforce stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforceDecision {
    /// Every action is allowed.
    Allow,
    /// At least one action is blocked.
    Block,
    /// Allowed under a degraded gate decision.
    Degrade,
}

impl EnforceDecision {
    /// Returns the canonical label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Block => "BLOCK",
            Self::Degrade => "DEGRADE",
        }
    }
}

/// One blocked action with the rule that fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedAction {
    /// The blocked action, preserved verbatim.
    pub action: ProposedAction,
    /// Rule that blocked it (or the synthetic default-deny id).
    pub rule_id: RuleId,
    /// Rationale from the fired rule.
    pub rationale: String,
}

/// Enforce stage output.
///
/// # Invariants
/// - `decision_summary = BLOCK` iff `blocked_count > 0`.
/// - `allowed_count + blocked_count` equals the evaluated action count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforceResult {
    /// Summary decision.
    pub decision_summary: EnforceDecision,
    /// Actions that passed enforcement, in input order.
    pub allowed: Vec<ProposedAction>,
    /// Actions that were blocked, in input order.
    pub blocked: Vec<BlockedAction>,
    /// Count of blocked actions.
    pub blocked_count: u64,
    /// Count of allowed actions.
    pub allowed_count: u64,
    /// Deduplicated ids of rules that blocked at least one action.
    pub blocked_rule_ids: Vec<RuleId>,
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Final merged decision emitted to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Verdict schema version.
    pub version: String,
    /// Trace the verdict concludes.
    pub trace_id: TraceId,
    /// Merged summary, e.g. `ALLOW`, `BLOCK (gate)`, `BLOCK (enforce)`.
    pub summary: String,
    /// Concatenated risk descriptions and fired deny-rule rationales.
    pub why: Vec<String>,
    /// Canned playbook steps for the summary.
    pub next_steps: Vec<String>,
    /// Deterministic confidence in `[0, 1]`.
    pub confidence: f64,
    /// References into the evidence trace (event anchors).
    pub evidence_refs: Vec<String>,
}
