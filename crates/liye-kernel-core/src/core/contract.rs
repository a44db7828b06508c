// liye-kernel-core/src/core/contract.rs
// ============================================================================
// Module: LiYe Kernel Contracts
// Description: Ordered-rule contracts and proposed-action records.
// Purpose: Define the canonical enforcement inputs with first-match precedence.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! A contract is an ordered list of allow/deny rules matched against proposed
//! actions. Rule order defines precedence: the first rule whose match object
//! is a subset of the action fires. Unmatched actions follow the contract
//! default, which is `ALLOW` unless the contract opts into `DENY`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Proposed Action
// ============================================================================

/// One action an agent proposes to take.
///
/// Unrecognized fields are preserved so opaque host metadata round-trips
/// through traces unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Action type label (for example `write`, `delete`, `send_email`).
    pub action_type: String,
    /// Tool the action would invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Resource the action touches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Filesystem-style path the action touches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Opaque extra fields preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProposedAction {
    /// Returns the path-like string for prefix matching.
    ///
    /// Prefix rules test the action's `path_prefix` first and fall back to
    /// `resource`.
    #[must_use]
    pub fn path_target(&self) -> Option<&str> {
        self.path_prefix.as_deref().or(self.resource.as_deref())
    }
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Effect applied when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleEffect {
    /// Matching actions are allowed.
    Allow,
    /// Matching actions are blocked.
    Deny,
}

/// Match value accepting a single string or a set of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    /// Matches when the field equals this value.
    One(String),
    /// Matches when the field equals any element.
    Any(Vec<String>),
}

impl MatchValue {
    /// Returns true when the candidate equals the value or any alternative.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::One(value) => value == candidate,
            Self::Any(values) => values.iter().any(|value| value == candidate),
        }
    }
}

/// Subset-match object over proposed-action fields.
///
/// Missing keys are wildcards. `path_prefix` is a prefix test; the remaining
/// keys are equality tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpec {
    /// Action type to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<MatchValue>,
    /// Tool name to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<MatchValue>,
    /// Resource to match exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<MatchValue>,
    /// Path prefix the action's path target must start with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<MatchValue>,
}

impl MatchSpec {
    /// Returns true when every present key matches the action.
    #[must_use]
    pub fn matches(&self, action: &ProposedAction) -> bool {
        if let Some(expected) = &self.action_type
            && !expected.matches(&action.action_type)
        {
            return false;
        }
        if let Some(expected) = &self.tool {
            match action.tool.as_deref() {
                Some(tool) if expected.matches(tool) => {}
                _ => return false,
            }
        }
        if let Some(expected) = &self.resource {
            match action.resource.as_deref() {
                Some(resource) if expected.matches(resource) => {}
                _ => return false,
            }
        }
        if let Some(expected) = &self.path_prefix {
            let Some(target) = action.path_target() else {
                return false;
            };
            let prefix_hit = match expected {
                MatchValue::One(prefix) => target.starts_with(prefix.as_str()),
                MatchValue::Any(prefixes) => {
                    prefixes.iter().any(|prefix| target.starts_with(prefix.as_str()))
                }
            };
            if !prefix_hit {
                return false;
            }
        }
        true
    }
}

/// One ordered contract rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier within the contract.
    pub id: RuleId,
    /// Effect when the rule fires.
    pub effect: RuleEffect,
    /// Match object; first matching rule wins.
    #[serde(rename = "match")]
    pub match_spec: MatchSpec,
    /// Rationale surfaced in verdicts when the rule blocks an action.
    pub rationale: String,
}

// ============================================================================
// SECTION: Contract
// ============================================================================

/// Default applied to actions no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractDefault {
    /// Unmatched actions are allowed.
    #[default]
    Allow,
    /// Unmatched actions are blocked under the synthetic default rule.
    Deny,
}

/// Scope metadata naming what a contract governs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractScope {
    /// Scope name.
    pub name: String,
    /// Optional owning party.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Ordered-rule enforcement contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Contract schema version.
    pub version: String,
    /// Scope metadata.
    pub scope: ContractScope,
    /// Default for unmatched actions.
    #[serde(default)]
    pub default: ContractDefault,
    /// Ordered rules; earlier rules take precedence.
    pub rules: Vec<Rule>,
}

impl Contract {
    /// Returns the first duplicated rule id, if any.
    #[must_use]
    pub fn duplicate_rule_id(&self) -> Option<&RuleId> {
        for (index, rule) in self.rules.iter().enumerate() {
            if self.rules[.. index].iter().any(|earlier| earlier.id == rule.id) {
                return Some(&rule.id);
            }
        }
        None
    }
}
