// liye-kernel-core/src/core/report.rs
// ============================================================================
// Module: LiYe Kernel Gate Report
// Description: Risk assessment output of the gate stage.
// Purpose: Define the canonical gate report, risk, and unknown records.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! The gate stage classifies a proposed-action set into risks and unknowns
//! and derives a single decision. The report is the first half of every
//! verdict and is persisted verbatim in the `gate_end` trace event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RiskId;
use crate::core::identifiers::TraceId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version stamped on every gate report.
pub const GATE_REPORT_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Gate decision over a proposed-action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
    /// No blocking risks; actions may proceed.
    Allow,
    /// At least one high or critical risk; actions must not proceed.
    Block,
    /// Medium risks only; actions may proceed with reduced trust.
    Degrade,
    /// Unresolved unknowns; a human or policy must decide.
    Unknown,
}

impl GateDecision {
    /// Returns the canonical label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Block => "BLOCK",
            Self::Degrade => "DEGRADE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Risk severity scale, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational finding; never affects the decision alone.
    Info,
    /// Low risk.
    Low,
    /// Medium risk; degrades the decision.
    Medium,
    /// High risk; blocks the decision.
    High,
    /// Critical risk; always blocks.
    Critical,
}

// ============================================================================
// SECTION: Report Records
// ============================================================================

/// One triggered risk rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    /// Stable risk rule identifier.
    pub id: RiskId,
    /// Severity assigned by the rule.
    pub severity: Severity,
    /// Human-readable description of the finding.
    pub description: String,
    /// Input element that triggered the rule (task or action reference).
    pub triggered_by: String,
}

/// One unresolved unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownFinding {
    /// Stable unknown identifier.
    pub id: RiskId,
    /// Human-readable description of what is unknown.
    pub description: String,
}

/// Gate stage output.
///
/// # Invariants
/// - A `critical` risk forces `decision = BLOCK`.
/// - At least one unknown without a high or critical risk yields `UNKNOWN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Report schema version.
    pub version: String,
    /// Trace the report belongs to.
    pub trace_id: TraceId,
    /// Derived decision.
    pub decision: GateDecision,
    /// Triggered risks, in rule order.
    pub risks: Vec<Risk>,
    /// Unresolved unknowns, in rule order.
    pub unknowns: Vec<UnknownFinding>,
}

impl GateReport {
    /// Returns the highest severity present in the report, if any risk fired.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.risks.iter().map(|risk| risk.severity).max()
    }

    /// Returns the count of risks at the given severity.
    #[must_use]
    pub fn count_at(&self, severity: Severity) -> usize {
        self.risks.iter().filter(|risk| risk.severity == severity).count()
    }
}
