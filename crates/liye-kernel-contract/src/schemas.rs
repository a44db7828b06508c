// liye-kernel-contract/src/schemas.rs
// ============================================================================
// Module: Contract Schemas
// Description: Frozen JSON Schema builders for kernel data shapes.
// Purpose: Provide canonical strict-mode validation schemas for all records.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! This module defines the JSON Schema payloads that mirror the kernel's core
//! structs: gate reports, contracts, trace events, verdicts, bundle
//! manifests, and learned policies. Every schema is strict: unknown
//! properties are rejected, with the single exception of proposed actions,
//! whose opaque host fields are preserved by design of the data model.
//! These schemas gate untrusted inputs at the MCP boundary and during
//! replay and bundle loading.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Shared Fragments
// ============================================================================

/// Returns a non-empty string schema with a description.
fn string_schema(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

/// Returns a string schema that may be empty.
fn text_schema(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// Returns a lowercase hex digest schema.
fn hex_schema(description: &str) -> Value {
    json!({ "type": "string", "pattern": "^[0-9a-f]+$", "description": description })
}

/// Returns a match value schema (string or array of strings).
fn match_value_schema() -> Value {
    json!({
        "oneOf": [
            { "type": "string", "minLength": 1 },
            { "type": "array", "items": { "type": "string", "minLength": 1 }, "minItems": 1 }
        ]
    })
}

/// Returns the proposed action schema.
///
/// Opaque extra fields are allowed; this is the one deliberately non-strict
/// shape in the contract set.
fn proposed_action_schema() -> Value {
    json!({
        "type": "object",
        "required": ["action_type"],
        "properties": {
            "action_type": string_schema("Action type label."),
            "tool": { "type": "string" },
            "resource": { "type": "string" },
            "path_prefix": { "type": "string" }
        },
        "additionalProperties": true
    })
}

// ============================================================================
// SECTION: Gate Report Schema
// ============================================================================

/// Returns the JSON schema for `GateReport`.
#[must_use]
pub fn gate_report_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "liye-kernel://contract/schemas/gate_report.schema.json",
        "title": "LiYe GateReport",
        "description": "Risk assessment output of the gate stage.",
        "type": "object",
        "required": ["version", "trace_id", "decision", "risks", "unknowns"],
        "properties": {
            "version": string_schema("Report schema version."),
            "trace_id": string_schema("Trace identifier."),
            "decision": {
                "type": "string",
                "enum": ["ALLOW", "BLOCK", "DEGRADE", "UNKNOWN"]
            },
            "risks": {
                "type": "array",
                "items": { "$ref": "#/$defs/Risk" }
            },
            "unknowns": {
                "type": "array",
                "items": { "$ref": "#/$defs/Unknown" }
            }
        },
        "additionalProperties": false,
        "$defs": {
            "Risk": {
                "type": "object",
                "required": ["id", "severity", "description", "triggered_by"],
                "properties": {
                    "id": string_schema("Risk rule identifier."),
                    "severity": {
                        "type": "string",
                        "enum": ["info", "low", "medium", "high", "critical"]
                    },
                    "description": string_schema("Finding description."),
                    "triggered_by": string_schema("Input element that triggered the rule.")
                },
                "additionalProperties": false
            },
            "Unknown": {
                "type": "object",
                "required": ["id", "description"],
                "properties": {
                    "id": string_schema("Unknown identifier."),
                    "description": string_schema("What is unknown.")
                },
                "additionalProperties": false
            }
        }
    })
}

// ============================================================================
// SECTION: Contract Schema
// ============================================================================

/// Returns the JSON schema for `Contract`.
#[must_use]
pub fn contract_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "liye-kernel://contract/schemas/contract.schema.json",
        "title": "LiYe Contract",
        "description": "Ordered-rule enforcement contract.",
        "type": "object",
        "required": ["version", "scope", "rules"],
        "properties": {
            "version": string_schema("Contract schema version."),
            "scope": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": string_schema("Scope name."),
                    "owner": { "type": "string" }
                },
                "additionalProperties": false
            },
            "default": { "type": "string", "enum": ["ALLOW", "DENY"] },
            "rules": {
                "type": "array",
                "items": { "$ref": "#/$defs/Rule" }
            }
        },
        "additionalProperties": false,
        "$defs": {
            "Rule": {
                "type": "object",
                "required": ["id", "effect", "match", "rationale"],
                "properties": {
                    "id": string_schema("Unique rule identifier."),
                    "effect": { "type": "string", "enum": ["ALLOW", "DENY"] },
                    "match": {
                        "type": "object",
                        "properties": {
                            "action_type": match_value_schema(),
                            "tool": match_value_schema(),
                            "resource": match_value_schema(),
                            "path_prefix": match_value_schema()
                        },
                        "additionalProperties": false
                    },
                    "rationale": string_schema("Rationale surfaced on blocks.")
                },
                "additionalProperties": false
            }
        }
    })
}

// ============================================================================
// SECTION: Trace Event Schema
// ============================================================================

/// Returns the JSON schema for `TraceEvent`.
#[must_use]
pub fn trace_event_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "liye-kernel://contract/schemas/trace_event.schema.json",
        "title": "LiYe TraceEvent",
        "description": "One hash-chained append-only trace event.",
        "type": "object",
        "required": ["trace_id", "seq", "ts", "type", "payload", "hash", "prev_hash"],
        "properties": {
            "trace_id": string_schema("Trace identifier."),
            "seq": { "type": "integer", "minimum": 0 },
            "ts": string_schema("ISO-8601 UTC timestamp."),
            "type": {
                "type": "string",
                "enum": [
                    "gate_start",
                    "gate_end",
                    "enforce_start",
                    "enforce_end",
                    "verdict_emitted",
                    "replay_start",
                    "replay_end",
                    "error"
                ]
            },
            "payload": { "type": "object" },
            "hash": hex_schema("Chain link over the canonical event bytes."),
            "prev_hash": {
                "oneOf": [
                    { "type": "string", "maxLength": 0 },
                    hex_schema("Previous event's chain link.")
                ]
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Verdict Schema
// ============================================================================

/// Returns the JSON schema for `Verdict`.
#[must_use]
pub fn verdict_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "liye-kernel://contract/schemas/verdict.schema.json",
        "title": "LiYe Verdict",
        "description": "Final merged decision emitted to consumers.",
        "type": "object",
        "required": [
            "version",
            "trace_id",
            "summary",
            "why",
            "next_steps",
            "confidence",
            "evidence_refs"
        ],
        "properties": {
            "version": string_schema("Verdict schema version."),
            "trace_id": string_schema("Trace identifier."),
            "summary": {
                "type": "string",
                "enum": [
                    "ALLOW",
                    "DEGRADE",
                    "UNKNOWN (gate)",
                    "BLOCK (gate)",
                    "BLOCK (enforce)",
                    "BLOCK (both)"
                ]
            },
            "why": { "type": "array", "items": text_schema("One reason line.") },
            "next_steps": { "type": "array", "items": text_schema("One playbook step.") },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "evidence_refs": {
                "type": "array",
                "items": string_schema("Event anchor reference.")
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Bundle Manifest Schema
// ============================================================================

/// Returns the JSON schema for the bundle manifest.
#[must_use]
pub fn bundle_manifest_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "liye-kernel://contract/schemas/bundle_manifest.schema.json",
        "title": "LiYe BundleManifest",
        "description": "Strict manifest of a reproducible policy bundle.",
        "type": "object",
        "required": [
            "bundle_version",
            "schema_version",
            "created_at",
            "git_sha",
            "contracts",
            "bundle_sha256",
            "included_policies",
            "files"
        ],
        "properties": {
            "bundle_version": string_schema("Semantic bundle version."),
            "schema_version": string_schema("Manifest schema version."),
            "created_at": string_schema("ISO-8601 UTC creation time."),
            "git_sha": text_schema("Source revision the bundle was built from."),
            "contracts": { "type": "object" },
            "bundle_sha256": hex_schema("Digest of the deterministic bundle content."),
            "included_policies": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "scope", "policy_hash"],
                    "properties": {
                        "name": string_schema("Policy file stem."),
                        "scope": string_schema("Lifecycle scope (production or candidate)."),
                        "policy_hash": hex_schema("Digest of the policy file bytes.")
                    },
                    "additionalProperties": false
                }
            },
            "files": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["path", "sha256", "size"],
                    "properties": {
                        "path": string_schema("Bundle-relative file path."),
                        "sha256": hex_schema("Digest of the file bytes."),
                        "size": { "type": "integer", "minimum": 0 }
                    },
                    "additionalProperties": false
                }
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Policy Schema
// ============================================================================

/// Returns the JSON schema for learned policies.
#[must_use]
pub fn policy_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "liye-kernel://contract/schemas/policy.schema.json",
        "title": "LiYe Policy",
        "description": "Learned decision policy promoted through the lifecycle.",
        "type": "object",
        "required": [
            "schema_version",
            "policy_id",
            "domain",
            "learned_at",
            "scope",
            "risk_level",
            "validation_status",
            "confidence",
            "preconditions",
            "actions",
            "constraints",
            "require_approval",
            "rollback_plan",
            "success_signals",
            "evaluation_window_days",
            "expiry_at",
            "evidence"
        ],
        "properties": {
            "schema_version": string_schema("Policy schema version."),
            "policy_id": string_schema("Policy identifier."),
            "domain": string_schema("Business domain the policy applies to."),
            "learned_at": string_schema("ISO-8601 UTC learning time."),
            "scope": {
                "type": "object",
                "required": ["type", "keys"],
                "properties": {
                    "type": string_schema("Scope type label."),
                    "keys": {
                        "type": "object",
                        "properties": {
                            "tenant_id": { "type": "string" },
                            "marketplace": { "type": "string" },
                            "brand_id": { "type": "string" },
                            "asin": { "type": "string" }
                        },
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            },
            "risk_level": { "type": "string", "enum": ["low", "medium", "high"] },
            "validation_status": {
                "type": "string",
                "enum": ["sandbox", "candidate", "production", "disabled", "quarantine"]
            },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "preconditions": { "type": "object" },
            "actions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["action_type", "parameters", "dry_run_compatible"],
                    "properties": {
                        "action_type": string_schema("Action type label."),
                        "parameters": { "type": "object" },
                        "dry_run_compatible": { "type": "boolean" }
                    },
                    "additionalProperties": false
                }
            },
            "constraints": { "type": "object" },
            "require_approval": { "type": "boolean" },
            "rollback_plan": text_schema("Rollback description."),
            "success_signals": {
                "type": "object",
                "required": ["exec", "operator", "business"],
                "properties": {
                    "exec": { "type": "object" },
                    "operator": { "type": "object" },
                    "business": { "type": "object" }
                },
                "additionalProperties": false
            },
            "evaluation_window_days": { "type": "integer", "minimum": 1 },
            "expiry_at": string_schema("ISO-8601 UTC expiry time."),
            "evidence": {
                "type": "array",
                "items": string_schema("Trace identifier supporting the policy.")
            },
            "failure_mode_tags": {
                "type": "array",
                "items": {
                    "type": "string",
                    "enum": ["timeout", "rejection", "drift", "integrity", "budget"]
                }
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Event Payload Schemas
// ============================================================================

/// Returns the schema for `gate_start` payloads.
#[must_use]
pub fn gate_start_payload_schema() -> Value {
    json!({
        "type": "object",
        "required": ["input_hash", "action_count"],
        "properties": {
            "input_hash": hex_schema("Digest string of the canonical gate request."),
            "action_count": { "type": "integer", "minimum": 0 }
        },
        "additionalProperties": false
    })
}

/// Returns the schema for `enforce_start` payloads.
#[must_use]
pub fn enforce_start_payload_schema() -> Value {
    json!({
        "type": "object",
        "required": ["contract_hash", "action_count"],
        "properties": {
            "contract_hash": hex_schema("Digest string of the canonical contract."),
            "action_count": { "type": "integer", "minimum": 0 }
        },
        "additionalProperties": false
    })
}

/// Returns the schema for `enforce_end` payloads.
#[must_use]
pub fn enforce_result_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "decision_summary",
            "allowed",
            "blocked",
            "blocked_count",
            "allowed_count",
            "blocked_rule_ids"
        ],
        "properties": {
            "decision_summary": { "type": "string", "enum": ["ALLOW", "BLOCK", "DEGRADE"] },
            "allowed": { "type": "array", "items": proposed_action_schema() },
            "blocked": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["action", "rule_id", "rationale"],
                    "properties": {
                        "action": proposed_action_schema(),
                        "rule_id": string_schema("Rule that blocked the action."),
                        "rationale": string_schema("Rationale from the fired rule.")
                    },
                    "additionalProperties": false
                }
            },
            "blocked_count": { "type": "integer", "minimum": 0 },
            "allowed_count": { "type": "integer", "minimum": 0 },
            "blocked_rule_ids": {
                "type": "array",
                "items": string_schema("Deny rule identifier.")
            }
        },
        "additionalProperties": false
    })
}

/// Returns the schema for `error` payloads.
#[must_use]
pub fn error_payload_schema() -> Value {
    json!({
        "type": "object",
        "required": ["error_code", "message"],
        "properties": {
            "error_code": string_schema("Stable machine-readable code."),
            "message": text_schema("Human-readable message.")
        },
        "additionalProperties": false
    })
}

/// Returns the schema for `replay_start` payloads.
#[must_use]
pub fn replay_start_payload_schema() -> Value {
    json!({
        "type": "object",
        "required": ["target_trace_id"],
        "properties": {
            "target_trace_id": string_schema("Trace being replayed.")
        },
        "additionalProperties": false
    })
}

/// Returns the schema for `replay_end` payloads.
#[must_use]
pub fn replay_end_payload_schema() -> Value {
    json!({
        "type": "object",
        "required": ["target_trace_id", "status", "event_count"],
        "properties": {
            "target_trace_id": string_schema("Trace that was replayed."),
            "status": { "type": "string", "enum": ["PASS", "FAIL"] },
            "event_count": { "type": "integer", "minimum": 0 }
        },
        "additionalProperties": false
    })
}
