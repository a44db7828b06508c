// liye-kernel-core/tests/enforce.rs
// ============================================================================
// Module: Enforce Tests
// Description: Tests for first-match rule evaluation and contract defaults.
// ============================================================================
//! ## Overview
//! Validates subset matching, precedence, and default handling of the
//! enforcement stage.

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

use liye_kernel_core::Contract;
use liye_kernel_core::ContractDefault;
use liye_kernel_core::ContractError;
use liye_kernel_core::ContractScope;
use liye_kernel_core::EnforceDecision;
use liye_kernel_core::MatchSpec;
use liye_kernel_core::MatchValue;
use liye_kernel_core::ProposedAction;
use liye_kernel_core::Rule;
use liye_kernel_core::RuleEffect;
use liye_kernel_core::RuleId;
use liye_kernel_core::enforce;

/// Builds a contract around the provided rules.
fn contract(default: ContractDefault, rules: Vec<Rule>) -> Contract {
    Contract {
        version: "1.0.0".to_string(),
        scope: ContractScope {
            name: "test".to_string(),
            owner: None,
        },
        default,
        rules,
    }
}

/// Builds a deny rule over a path prefix.
fn deny_prefix(id: &str, prefix: &str) -> Rule {
    Rule {
        id: RuleId::new(id),
        effect: RuleEffect::Deny,
        match_spec: MatchSpec {
            path_prefix: Some(MatchValue::One(prefix.to_string())),
            ..MatchSpec::default()
        },
        rationale: format!("writes under {prefix} are prohibited"),
    }
}

/// Builds an action with a path prefix.
fn path_action(action_type: &str, path: &str) -> ProposedAction {
    ProposedAction {
        action_type: action_type.to_string(),
        tool: None,
        resource: None,
        path_prefix: Some(path.to_string()),
        extra: std::collections::BTreeMap::new(),
    }
}

/// Tests a deny rule blocks a matching prod write.
#[test]
fn test_deny_rule_blocks_prod_write() {
    let contract =
        contract(ContractDefault::Allow, vec![deny_prefix("deny-write-prod", "/prod/")]);
    let actions = vec![path_action("write", "/prod/config.json")];

    let result = enforce(&contract, &actions).unwrap();

    assert_eq!(result.decision_summary, EnforceDecision::Block);
    assert_eq!(result.blocked_count, 1);
    assert_eq!(result.allowed_count, 0);
    assert_eq!(result.blocked_rule_ids, vec![RuleId::new("deny-write-prod")]);
    assert_eq!(result.blocked[0].rule_id.as_str(), "deny-write-prod");
}

/// Tests unmatched actions pass under the default allow.
#[test]
fn test_unmatched_action_allowed_by_default() {
    let contract = contract(ContractDefault::Allow, vec![deny_prefix("deny-prod", "/prod/")]);
    let actions = vec![path_action("write", "/staging/config.json")];

    let result = enforce(&contract, &actions).unwrap();

    assert_eq!(result.decision_summary, EnforceDecision::Allow);
    assert_eq!(result.allowed_count, 1);
}

/// Tests default deny blocks unmatched actions with the synthetic rule id.
#[test]
fn test_default_deny_blocks_unmatched_actions() {
    let contract = contract(ContractDefault::Deny, vec![]);
    let actions = vec![path_action("write", "/anywhere")];

    let result = enforce(&contract, &actions).unwrap();

    assert_eq!(result.decision_summary, EnforceDecision::Block);
    assert_eq!(result.blocked[0].rule_id.as_str(), "__default_deny__");
}

/// Tests the first matching rule wins regardless of later rules.
#[test]
fn test_first_match_wins() {
    let allow_first = Rule {
        id: RuleId::new("allow-staging"),
        effect: RuleEffect::Allow,
        match_spec: MatchSpec {
            path_prefix: Some(MatchValue::One("/staging/".to_string())),
            ..MatchSpec::default()
        },
        rationale: "staging writes are safe".to_string(),
    };
    let contract = contract(
        ContractDefault::Allow,
        vec![allow_first, deny_prefix("deny-everything", "/")],
    );
    let actions = vec![path_action("write", "/staging/a"), path_action("write", "/prod/b")];

    let result = enforce(&contract, &actions).unwrap();

    assert_eq!(result.allowed_count, 1);
    assert_eq!(result.blocked_count, 1);
    assert_eq!(result.blocked[0].rule_id.as_str(), "deny-everything");
}

/// Tests array match values fire on any element.
#[test]
fn test_array_match_value_fires_on_any_element() {
    let rule = Rule {
        id: RuleId::new("deny-mutations"),
        effect: RuleEffect::Deny,
        match_spec: MatchSpec {
            action_type: Some(MatchValue::Any(vec![
                "write".to_string(),
                "delete".to_string(),
            ])),
            ..MatchSpec::default()
        },
        rationale: "mutations require review".to_string(),
    };
    let contract = contract(ContractDefault::Allow, vec![rule]);
    let actions = vec![path_action("delete", "/tmp/x"), path_action("read", "/tmp/x")];

    let result = enforce(&contract, &actions).unwrap();

    assert_eq!(result.blocked_count, 1);
    assert_eq!(result.allowed_count, 1);
}

/// Tests a rule keyed on a field the action lacks does not fire.
#[test]
fn test_missing_action_field_fails_the_match() {
    let rule = Rule {
        id: RuleId::new("deny-tool"),
        effect: RuleEffect::Deny,
        match_spec: MatchSpec {
            tool: Some(MatchValue::One("shell".to_string())),
            ..MatchSpec::default()
        },
        rationale: "shell is prohibited".to_string(),
    };
    let contract = contract(ContractDefault::Allow, vec![rule]);
    let actions = vec![path_action("write", "/tmp/x")];

    let result = enforce(&contract, &actions).unwrap();
    assert_eq!(result.decision_summary, EnforceDecision::Allow);
}

/// Tests duplicate rule ids are rejected before evaluation.
#[test]
fn test_duplicate_rule_ids_are_rejected() {
    let contract = contract(
        ContractDefault::Allow,
        vec![deny_prefix("dup", "/a/"), deny_prefix("dup", "/b/")],
    );
    let result = enforce(&contract, &[]);
    assert!(matches!(result, Err(ContractError::DuplicateRuleId(_))));
}

/// Tests prefix matching falls back to the resource field.
#[test]
fn test_path_prefix_falls_back_to_resource() {
    let contract = contract(ContractDefault::Allow, vec![deny_prefix("deny-prod", "/prod/")]);
    let action = ProposedAction {
        action_type: "write".to_string(),
        tool: None,
        resource: Some("/prod/data.json".to_string()),
        path_prefix: None,
        extra: std::collections::BTreeMap::new(),
    };

    let result = enforce(&contract, &[action]).unwrap();
    assert_eq!(result.blocked_count, 1);
}
