// liye-kernel-core/src/runtime/gate.rs
// ============================================================================
// Module: LiYe Kernel Gate Stage
// Description: Risk and unknown classification over proposed-action sets.
// Purpose: Derive a deterministic gate decision from configurable risk rules.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! The gate inspects a task description and its proposed actions against a
//! baseline risk taxonomy, producing a [`GateReport`]. Decision derivation is
//! fixed: critical or high severity blocks, unknowns dominate the remaining
//! severities, medium degrades, anything else allows. The taxonomy is
//! extensible through [`GateConfig`] without touching the derivation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::GATE_REPORT_VERSION;
use crate::core::GateDecision;
use crate::core::GateReport;
use crate::core::ProposedAction;
use crate::core::Risk;
use crate::core::RiskId;
use crate::core::Severity;
use crate::core::TraceId;
use crate::core::UnknownFinding;

// ============================================================================
// SECTION: Risk Rule Ids
// ============================================================================

/// Risk id for delete actions.
pub const RISK_DESTRUCTIVE_DELETE: &str = "destructive.delete";
/// Risk id for mutations under reserved paths.
pub const RISK_PROTECTED_WRITE: &str = "scope.protected_write";
/// Risk id for confidential-data markers in the task.
pub const RISK_DATA_SENSITIVE: &str = "data.sensitive";
/// Risk id for unrecognized action types.
pub const RISK_UNKNOWN_ACTION: &str = "schema.unknown_action";
/// Risk id for an empty proposed-action set.
pub const RISK_INPUT_EMPTY: &str = "input.empty";

// ============================================================================
// SECTION: Gate Request
// ============================================================================

/// Input to the gate stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRequest {
    /// Task description provided by the agent host.
    pub task: String,
    /// Optional host context, preserved opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Actions the agent proposes to take.
    pub proposed_actions: Vec<ProposedAction>,
}

// ============================================================================
// SECTION: Gate Config
// ============================================================================

/// Tunable inputs for the baseline risk taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Path prefixes treated as protected from mutation.
    pub reserved_path_prefixes: Vec<String>,
    /// Lowercase markers indicating confidential data in the task text.
    pub sensitive_markers: Vec<String>,
    /// Action types the kernel recognizes; others raise unknowns.
    pub known_action_types: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            reserved_path_prefixes: vec!["/prod/".to_string(), "config/security/".to_string()],
            sensitive_markers: vec![
                "password".to_string(),
                "secret".to_string(),
                "api key".to_string(),
                "credential".to_string(),
                "ssn".to_string(),
                "credit card".to_string(),
                "confidential".to_string(),
            ],
            known_action_types: vec![
                "read".to_string(),
                "write".to_string(),
                "delete".to_string(),
                "create".to_string(),
                "update".to_string(),
                "execute".to_string(),
                "send_email".to_string(),
                "http_request".to_string(),
                "tool_call".to_string(),
            ],
        }
    }
}

// ============================================================================
// SECTION: Gate Engine
// ============================================================================

/// Deterministic risk classifier over gate requests.
#[derive(Debug, Clone, Default)]
pub struct GateEngine {
    /// Active taxonomy configuration.
    config: GateConfig,
}

impl GateEngine {
    /// Creates an engine with the provided configuration.
    #[must_use]
    pub const fn new(config: GateConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Assesses a request and derives the gate decision.
    #[must_use]
    pub fn assess(&self, trace_id: &TraceId, request: &GateRequest) -> GateReport {
        let mut risks = Vec::new();
        let mut unknowns = Vec::new();

        if request.proposed_actions.is_empty() {
            risks.push(Risk {
                id: RiskId::new(RISK_INPUT_EMPTY),
                severity: Severity::Info,
                description: "no proposed actions were supplied".to_string(),
                triggered_by: "proposed_actions".to_string(),
            });
        }

        for (index, action) in request.proposed_actions.iter().enumerate() {
            let anchor = format!("proposed_actions[{index}]");
            if action.action_type == "delete" {
                risks.push(Risk {
                    id: RiskId::new(RISK_DESTRUCTIVE_DELETE),
                    severity: Severity::Critical,
                    description: format!(
                        "destructive delete of {}",
                        action.resource.as_deref().unwrap_or("an unnamed resource")
                    ),
                    triggered_by: anchor.clone(),
                });
            }
            if self.is_protected_mutation(action) {
                risks.push(Risk {
                    id: RiskId::new(RISK_PROTECTED_WRITE),
                    severity: Severity::High,
                    description: format!(
                        "mutation under reserved path {}",
                        action.path_target().unwrap_or_default()
                    ),
                    triggered_by: anchor.clone(),
                });
            }
            if !self.config.known_action_types.iter().any(|known| known == &action.action_type) {
                risks.push(Risk {
                    id: RiskId::new(RISK_UNKNOWN_ACTION),
                    severity: Severity::Medium,
                    description: format!("unrecognized action type {}", action.action_type),
                    triggered_by: anchor.clone(),
                });
                unknowns.push(UnknownFinding {
                    id: RiskId::new(RISK_UNKNOWN_ACTION),
                    description: format!(
                        "action type {} is outside the known taxonomy",
                        action.action_type
                    ),
                });
            }
        }

        if let Some(marker) = self.sensitive_marker(&request.task) {
            risks.push(Risk {
                id: RiskId::new(RISK_DATA_SENSITIVE),
                severity: Severity::Medium,
                description: format!("task mentions confidential data ({marker})"),
                triggered_by: "task".to_string(),
            });
        }

        let decision = derive_decision(&risks, &unknowns);
        GateReport {
            version: GATE_REPORT_VERSION.to_string(),
            trace_id: trace_id.clone(),
            decision,
            risks,
            unknowns,
        }
    }

    /// Returns true when the action mutates a reserved path.
    fn is_protected_mutation(&self, action: &ProposedAction) -> bool {
        if action.action_type == "read" {
            return false;
        }
        let Some(target) = action.path_target() else {
            return false;
        };
        self.config.reserved_path_prefixes.iter().any(|prefix| target.starts_with(prefix.as_str()))
    }

    /// Returns the first sensitive marker found in the task text.
    fn sensitive_marker(&self, task: &str) -> Option<&str> {
        let lowered = task.to_lowercase();
        self.config
            .sensitive_markers
            .iter()
            .find(|marker| lowered.contains(marker.as_str()))
            .map(String::as_str)
    }
}

// ============================================================================
// SECTION: Decision Derivation
// ============================================================================

/// Derives the gate decision from classified risks and unknowns.
///
/// Order is fixed: critical, high, unknowns, medium, allow.
#[must_use]
pub fn derive_decision(risks: &[Risk], unknowns: &[UnknownFinding]) -> GateDecision {
    let has = |severity: Severity| risks.iter().any(|risk| risk.severity == severity);
    if has(Severity::Critical) || has(Severity::High) {
        GateDecision::Block
    } else if !unknowns.is_empty() {
        GateDecision::Unknown
    } else if has(Severity::Medium) {
        GateDecision::Degrade
    } else {
        GateDecision::Allow
    }
}
