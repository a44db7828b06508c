// liye-kernel-contract/src/tooling.rs
// ============================================================================
// Module: Contract Tooling
// Description: MCP tool names, definitions, and request schemas.
// Purpose: Provide the canonical tool surface for `tools/list` responses.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The governance server exposes the gate, enforce, verdict, and replay
//! tools; the knowledge server federates the policy-query tools under the
//! same endpoint. Tool input schemas reference the frozen contract schemas
//! so clients validate requests with the same shapes the server enforces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::schemas::contract_schema;

// ============================================================================
// SECTION: Tool Name
// ============================================================================

/// Canonical tool names across both federated servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Run the gate stage over a proposed-action set.
    GovernanceGate,
    /// Enforce a contract over actions inside a trace.
    GovernanceEnforce,
    /// Merge gate and enforce outputs into the final verdict.
    GovernanceVerdict,
    /// Re-verify a sealed trace.
    GovernanceReplay,
    /// List loaded policies, optionally by domain.
    KnowledgeListPolicies,
    /// Match policies by exact scope keys.
    KnowledgeMatchScope,
    /// Match policies by keyword substrings.
    KnowledgeMatchKeywords,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GovernanceGate => "governance_gate",
            Self::GovernanceEnforce => "governance_enforce",
            Self::GovernanceVerdict => "governance_verdict",
            Self::GovernanceReplay => "governance_replay",
            Self::KnowledgeListPolicies => "knowledge_list_policies",
            Self::KnowledgeMatchScope => "knowledge_match_scope",
            Self::KnowledgeMatchKeywords => "knowledge_match_keywords",
        }
    }

    /// Parses a tool name from its canonical string.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "governance_gate" => Some(Self::GovernanceGate),
            "governance_enforce" => Some(Self::GovernanceEnforce),
            "governance_verdict" => Some(Self::GovernanceVerdict),
            "governance_replay" => Some(Self::GovernanceReplay),
            "knowledge_list_policies" => Some(Self::KnowledgeListPolicies),
            "knowledge_match_scope" => Some(Self::KnowledgeMatchScope),
            "knowledge_match_keywords" => Some(Self::KnowledgeMatchKeywords),
            _ => None,
        }
    }

    /// Returns the governance tool set, in listing order.
    #[must_use]
    pub const fn governance_tools() -> [Self; 4] {
        [
            Self::GovernanceGate,
            Self::GovernanceEnforce,
            Self::GovernanceVerdict,
            Self::GovernanceReplay,
        ]
    }

    /// Returns the knowledge tool set, in listing order.
    #[must_use]
    pub const fn knowledge_tools() -> [Self; 3] {
        [Self::KnowledgeListPolicies, Self::KnowledgeMatchScope, Self::KnowledgeMatchKeywords]
    }
}

// ============================================================================
// SECTION: Tool Definition
// ============================================================================

/// Tool definition returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// MCP tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    pub input_schema: Value,
}

/// Builds the definition for one tool.
#[must_use]
pub fn tool_definition(name: ToolName) -> ToolDefinition {
    ToolDefinition {
        name,
        description: tool_description(name).to_string(),
        input_schema: tool_input_schema(name),
    }
}

/// Returns the client-facing description for a tool.
const fn tool_description(name: ToolName) -> &'static str {
    match name {
        ToolName::GovernanceGate => {
            "Classify risks and unknowns over a proposed-action set and derive a gate decision."
        }
        ToolName::GovernanceEnforce => {
            "Match proposed actions against an ordered-rule contract inside a trace."
        }
        ToolName::GovernanceVerdict => {
            "Merge gate and enforce outputs into the final verdict and seal the trace."
        }
        ToolName::GovernanceReplay => {
            "Re-verify a sealed trace's schemas, hash chain, and verdict structure."
        }
        ToolName::KnowledgeListPolicies => {
            "List loaded learned policies, optionally filtered by domain."
        }
        ToolName::KnowledgeMatchScope => {
            "Match learned policies whose scope keys equal the provided keys."
        }
        ToolName::KnowledgeMatchKeywords => {
            "Match learned policies by keyword substrings over id, domain, and actions."
        }
    }
}

/// Returns the input schema for a tool.
fn tool_input_schema(name: ToolName) -> Value {
    match name {
        ToolName::GovernanceGate => json!({
            "type": "object",
            "required": ["task", "proposed_actions"],
            "properties": {
                "task": { "type": "string", "minLength": 1 },
                "context": {},
                "trace_id": { "type": "string" },
                "proposed_actions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["action_type"],
                        "additionalProperties": true
                    }
                }
            },
            "additionalProperties": false
        }),
        ToolName::GovernanceEnforce => json!({
            "type": "object",
            "required": ["contract", "actions"],
            "properties": {
                "trace_id": { "type": "string" },
                "contract": contract_schema(),
                "actions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["action_type"],
                        "additionalProperties": true
                    }
                }
            },
            "additionalProperties": false
        }),
        ToolName::GovernanceVerdict => json!({
            "type": "object",
            "required": ["trace_id", "gate_report"],
            "properties": {
                "trace_id": { "type": "string" },
                "gate_report": { "type": "object" },
                "enforce_result": { "type": "object" }
            },
            "additionalProperties": false
        }),
        ToolName::GovernanceReplay => json!({
            "type": "object",
            "required": ["trace_id"],
            "properties": {
                "trace_id": { "type": "string" }
            },
            "additionalProperties": false
        }),
        ToolName::KnowledgeListPolicies => json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string" }
            },
            "additionalProperties": false
        }),
        ToolName::KnowledgeMatchScope => json!({
            "type": "object",
            "required": ["keys"],
            "properties": {
                "keys": {
                    "type": "object",
                    "properties": {
                        "tenant_id": { "type": "string" },
                        "marketplace": { "type": "string" },
                        "brand_id": { "type": "string" }
                    },
                    "additionalProperties": false
                }
            },
            "additionalProperties": false
        }),
        ToolName::KnowledgeMatchKeywords => json!({
            "type": "object",
            "required": ["keywords"],
            "properties": {
                "keywords": {
                    "type": "array",
                    "items": { "type": "string", "minLength": 1 },
                    "minItems": 1
                }
            },
            "additionalProperties": false
        }),
    }
}
