// liye-kernel-core/src/runtime/enforce.rs
// ============================================================================
// Module: LiYe Kernel Enforce Stage
// Description: First-match rule evaluation of actions against a contract.
// Purpose: Produce per-action outcomes and the enforce summary deterministically.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Enforcement walks each proposed action through the contract's rules in
//! list order; the first rule whose match object subsets the action fires.
//! Unmatched actions follow the contract default. The summary is `BLOCK`
//! exactly when at least one action was blocked. Cost is O(actions x rules).

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::BlockedAction;
use crate::core::Contract;
use crate::core::ContractDefault;
use crate::core::DEFAULT_DENY_RULE_ID;
use crate::core::EnforceDecision;
use crate::core::EnforceResult;
use crate::core::ProposedAction;
use crate::core::Rule;
use crate::core::RuleEffect;
use crate::core::RuleId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised before enforcement can run.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Two rules share an id.
    #[error("duplicate rule id {0}")]
    DuplicateRuleId(String),
}

// ============================================================================
// SECTION: Enforcement
// ============================================================================

/// Evaluates every action against the contract.
///
/// # Errors
///
/// Returns [`ContractError::DuplicateRuleId`] when the contract's rule ids
/// are not unique.
pub fn enforce(
    contract: &Contract,
    actions: &[ProposedAction],
) -> Result<EnforceResult, ContractError> {
    if let Some(duplicate) = contract.duplicate_rule_id() {
        return Err(ContractError::DuplicateRuleId(duplicate.to_string()));
    }

    let mut allowed = Vec::new();
    let mut blocked = Vec::new();
    let mut blocked_rule_ids: Vec<RuleId> = Vec::new();

    for action in actions {
        match first_match(&contract.rules, action) {
            Some(rule) => match rule.effect {
                RuleEffect::Allow => allowed.push(action.clone()),
                RuleEffect::Deny => {
                    push_unique(&mut blocked_rule_ids, &rule.id);
                    blocked.push(BlockedAction {
                        action: action.clone(),
                        rule_id: rule.id.clone(),
                        rationale: rule.rationale.clone(),
                    });
                }
            },
            None => match contract.default {
                ContractDefault::Allow => allowed.push(action.clone()),
                ContractDefault::Deny => {
                    let rule_id = RuleId::new(DEFAULT_DENY_RULE_ID);
                    push_unique(&mut blocked_rule_ids, &rule_id);
                    blocked.push(BlockedAction {
                        action: action.clone(),
                        rule_id,
                        rationale: "no rule matched and the contract defaults to deny"
                            .to_string(),
                    });
                }
            },
        }
    }

    let blocked_count = u64::try_from(blocked.len()).unwrap_or(u64::MAX);
    let allowed_count = u64::try_from(allowed.len()).unwrap_or(u64::MAX);
    let decision_summary =
        if blocked.is_empty() { EnforceDecision::Allow } else { EnforceDecision::Block };

    Ok(EnforceResult {
        decision_summary,
        allowed,
        blocked,
        blocked_count,
        allowed_count,
        blocked_rule_ids,
    })
}

/// Returns the first rule whose match object subsets the action.
fn first_match<'a>(rules: &'a [Rule], action: &ProposedAction) -> Option<&'a Rule> {
    rules.iter().find(|rule| rule.match_spec.matches(action))
}

/// Appends a rule id when not already present.
fn push_unique(ids: &mut Vec<RuleId>, id: &RuleId) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.clone());
    }
}
