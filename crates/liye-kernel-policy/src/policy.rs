// liye-kernel-policy/src/policy.rs
// ============================================================================
// Module: Learned Policy Records
// Description: Typed learned-policy records and lifecycle status.
// Purpose: Mirror the frozen policy schema with explicit Rust shapes.
// Dependencies: liye-kernel-core, serde
// ============================================================================

//! ## Overview
//! A learned policy is a hierarchical record promoted through the lifecycle
//! `sandbox -> candidate -> production`, with `disabled` and `quarantine` as
//! terminal guards. Policies reference their supporting traces by id only;
//! traces never point back at policies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use liye_kernel_core::PolicyId;

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

/// Lifecycle status of a learned policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Freshly crystallized draft.
    Sandbox,
    /// Promoted past the execution-success gate.
    Candidate,
    /// Promoted past operator approval.
    Production,
    /// Switched off by the drift guard.
    Disabled,
    /// Impounded after a manifest integrity failure.
    Quarantine,
}

/// Risk level assigned at crystallization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low-impact policy.
    Low,
    /// Medium-impact policy.
    Medium,
    /// High-impact policy.
    High,
}

/// Frozen failure-mode classification for the learning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureModeTag {
    /// Execution exceeded its window.
    Timeout,
    /// Operator or downstream rejection.
    Rejection,
    /// Business-probe drift.
    Drift,
    /// Manifest or hash integrity failure.
    Integrity,
    /// Cost budget exhaustion.
    Budget,
}

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Exact-match scope keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeKeys {
    /// Tenant the policy is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Marketplace the policy is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplace: Option<String>,
    /// Brand the policy is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
    /// Listing the policy is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
}

/// Policy scope declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyScope {
    /// Scope type label (for example `tenant` or `brand`).
    #[serde(rename = "type")]
    pub scope_type: String,
    /// Exact-match keys.
    pub keys: ScopeKeys,
}

// ============================================================================
// SECTION: Policy Record
// ============================================================================

/// One action the policy prescribes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAction {
    /// Action type label.
    pub action_type: String,
    /// Opaque action parameters.
    pub parameters: Map<String, Value>,
    /// True when the action can run under dry-run.
    pub dry_run_compatible: bool,
}

/// Success signal groups evaluated during promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessSignals {
    /// Execution-level signals.
    pub exec: Map<String, Value>,
    /// Operator-level signals.
    pub operator: Map<String, Value>,
    /// Business-level signals.
    pub business: Map<String, Value>,
}

/// Learned decision policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy schema version.
    pub schema_version: String,
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Business domain.
    pub domain: String,
    /// ISO-8601 UTC learning time.
    pub learned_at: String,
    /// Scope declaration.
    pub scope: PolicyScope,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Lifecycle status.
    pub validation_status: ValidationStatus,
    /// Crystallization confidence in `[0, 1]`.
    pub confidence: f64,
    /// Opaque preconditions.
    pub preconditions: Map<String, Value>,
    /// Prescribed actions.
    pub actions: Vec<PolicyAction>,
    /// Opaque constraints.
    pub constraints: Map<String, Value>,
    /// True when execution requires operator approval.
    pub require_approval: bool,
    /// Rollback description.
    pub rollback_plan: String,
    /// Promotion signals.
    pub success_signals: SuccessSignals,
    /// Evaluation window in days.
    pub evaluation_window_days: u32,
    /// ISO-8601 UTC expiry time.
    pub expiry_at: String,
    /// Trace ids supporting the policy.
    pub evidence: Vec<String>,
    /// Frozen failure-mode classification, when recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_mode_tags: Vec<FailureModeTag>,
}

impl Policy {
    /// Returns true when every provided query key equals this policy's keys.
    #[must_use]
    pub fn matches_scope(&self, query: &ScopeKeys) -> bool {
        let pair = |provided: &Option<String>, own: &Option<String>| match provided {
            Some(value) => own.as_deref() == Some(value.as_str()),
            None => true,
        };
        pair(&query.tenant_id, &self.scope.keys.tenant_id)
            && pair(&query.marketplace, &self.scope.keys.marketplace)
            && pair(&query.brand_id, &self.scope.keys.brand_id)
            && pair(&query.asin, &self.scope.keys.asin)
    }

    /// Returns true when any keyword substring-matches the policy surface.
    #[must_use]
    pub fn matches_keywords(&self, keywords: &[String]) -> bool {
        let mut haystack = vec![
            self.policy_id.as_str().to_lowercase(),
            self.domain.to_lowercase(),
        ];
        haystack.extend(self.actions.iter().map(|action| action.action_type.to_lowercase()));
        keywords.iter().any(|keyword| {
            let needle = keyword.to_lowercase();
            !needle.is_empty() && haystack.iter().any(|field| field.contains(&needle))
        })
    }
}
