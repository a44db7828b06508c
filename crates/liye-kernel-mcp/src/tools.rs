// liye-kernel-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Dispatch of governance and knowledge tool calls.
// Purpose: Validate untrusted tool input and route it through the kernel.
// Dependencies: liye-kernel-contract, liye-kernel-core, liye-kernel-policy
// ============================================================================

//! ## Overview
//! The router owns the kernel facade, the compiled schema validators, and an
//! optional policy snapshot for knowledge federation. Every tool argument is
//! schema-validated before it is decoded; every kernel failure maps to a
//! structured tool error that the server renders as a JSON-RPC error object.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use liye_kernel_contract::ContractValidator;
use liye_kernel_contract::SchemaKind;
use liye_kernel_contract::ToolDefinition;
use liye_kernel_contract::ToolName;
use liye_kernel_contract::tool_definition;
use liye_kernel_core::Contract;
use liye_kernel_core::Deadline;
use liye_kernel_core::EnforceResult;
use liye_kernel_core::GateReport;
use liye_kernel_core::GateRequest;
use liye_kernel_core::GovernanceKernel;
use liye_kernel_core::KernelError;
use liye_kernel_core::ProposedAction;
use liye_kernel_core::ReplayDiff;
use liye_kernel_core::ReplayReport;
use liye_kernel_core::TraceId;
use liye_kernel_core::Verdict;
use liye_kernel_policy::Policy;
use liye_kernel_policy::PolicySet;
use liye_kernel_policy::ScopeKeys;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool dispatch errors mapped to JSON-RPC error objects.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool")]
    UnknownTool,
    /// Tool arguments rejected by schema or decode.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// Kernel operation failed.
    #[error(transparent)]
    Kernel(#[from] KernelError),
    /// Knowledge tools requested without a loaded policy set.
    #[error("no policy snapshot is loaded")]
    KnowledgeUnavailable,
    /// Payload serialization failed.
    #[error("serialization failure")]
    Serialization,
}

impl ToolError {
    /// Returns the JSON-RPC error code for this error.
    #[must_use]
    pub const fn rpc_code(&self) -> i64 {
        match self {
            Self::UnknownTool => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Kernel(_) => -32000,
            Self::KnowledgeUnavailable => -32001,
            Self::Serialization => -32060,
        }
    }

    /// Returns the normalized kind label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidParams(_) => "invalid_params",
            Self::Kernel(_) => "kernel",
            Self::KnowledgeUnavailable => "knowledge_unavailable",
            Self::Serialization => "serialization",
        }
    }

    /// Returns true when retrying the identical request may succeed.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        match self {
            Self::Kernel(KernelError::DeadlineExceeded) => true,
            Self::UnknownTool
            | Self::InvalidParams(_)
            | Self::Kernel(_)
            | Self::KnowledgeUnavailable
            | Self::Serialization => false,
        }
    }
}

// ============================================================================
// SECTION: Tool Payloads
// ============================================================================

/// Arguments of `governance_gate`.
#[derive(Debug, Deserialize)]
struct GateToolRequest {
    /// Task description.
    task: String,
    /// Opaque host context.
    #[serde(default)]
    context: Option<Value>,
    /// Trace to reuse, when continuing a run.
    #[serde(default)]
    trace_id: Option<String>,
    /// Proposed actions.
    proposed_actions: Vec<ProposedAction>,
}

/// Result of `governance_gate`.
#[derive(Debug, Serialize)]
struct GateToolResponse {
    /// The gate report.
    gate_report: GateReport,
    /// Trace the stage wrote into.
    trace_id: TraceId,
}

/// Arguments of `governance_enforce`.
#[derive(Debug, Deserialize)]
struct EnforceToolRequest {
    /// Trace to reuse, when continuing a run.
    #[serde(default)]
    trace_id: Option<String>,
    /// Enforcement contract.
    contract: Value,
    /// Actions under evaluation.
    actions: Vec<ProposedAction>,
}

/// Result of `governance_enforce`.
#[derive(Debug, Serialize)]
struct EnforceToolResponse {
    /// The enforce result.
    enforce_result: EnforceResult,
    /// Trace the stage wrote into.
    trace_id: TraceId,
}

/// Arguments of `governance_verdict`.
#[derive(Debug, Deserialize)]
struct VerdictToolRequest {
    /// Trace to conclude.
    trace_id: String,
    /// Gate report from the gate stage.
    gate_report: Value,
    /// Enforce result from the enforce stage, when one ran.
    #[serde(default)]
    enforce_result: Option<Value>,
}

/// Result of `governance_verdict`.
#[derive(Debug, Serialize)]
struct VerdictToolResponse {
    /// The final verdict.
    verdict: Verdict,
    /// Trace the verdict concluded.
    trace_id: TraceId,
}

/// Arguments of `governance_replay`.
#[derive(Debug, Deserialize)]
struct ReplayToolRequest {
    /// Trace to replay.
    trace_id: String,
}

/// Result of `governance_replay`.
#[derive(Debug, Serialize)]
struct ReplayToolResponse {
    /// The replay report.
    replay: ReplayReport,
    /// First divergence, when tampering was detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<ReplayDiff>,
    /// Trace that was replayed.
    trace_id: TraceId,
}

/// Arguments of `knowledge_list_policies`.
#[derive(Debug, Deserialize)]
struct ListPoliciesRequest {
    /// Domain filter.
    #[serde(default)]
    domain: Option<String>,
}

/// Arguments of `knowledge_match_scope`.
#[derive(Debug, Deserialize)]
struct MatchScopeRequest {
    /// Exact-match scope keys.
    keys: ScopeKeys,
}

/// Arguments of `knowledge_match_keywords`.
#[derive(Debug, Deserialize)]
struct MatchKeywordsRequest {
    /// Keyword substrings.
    keywords: Vec<String>,
}

/// Result of the knowledge query tools.
#[derive(Debug, Serialize)]
struct PoliciesResponse {
    /// Matching policies.
    policies: Vec<Policy>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Tool router over the kernel and an optional policy snapshot.
pub struct ToolRouter {
    /// Kernel facade shared with embedders.
    kernel: Arc<GovernanceKernel>,
    /// Compiled schema validators.
    validator: Arc<ContractValidator>,
    /// Loaded policy snapshot for knowledge federation.
    policies: Option<Arc<PolicySet>>,
}

impl ToolRouter {
    /// Creates a router; knowledge tools activate when a snapshot is given.
    #[must_use]
    pub const fn new(
        kernel: Arc<GovernanceKernel>,
        validator: Arc<ContractValidator>,
        policies: Option<Arc<PolicySet>>,
    ) -> Self {
        Self {
            kernel,
            validator,
            policies,
        }
    }

    /// Lists the tools this router serves.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools: Vec<ToolDefinition> =
            ToolName::governance_tools().iter().map(|name| tool_definition(*name)).collect();
        if self.policies.is_some() {
            tools.extend(ToolName::knowledge_tools().iter().map(|name| tool_definition(*name)));
        }
        tools
    }

    /// Dispatches one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown tools, invalid arguments, or kernel
    /// failures; the server maps it onto the wire.
    pub fn call(
        &self,
        name: &str,
        arguments: Value,
        deadline: Option<&Deadline>,
    ) -> Result<Value, ToolError> {
        let name = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        match name {
            ToolName::GovernanceGate => self.gate(arguments, deadline),
            ToolName::GovernanceEnforce => self.enforce(arguments, deadline),
            ToolName::GovernanceVerdict => self.verdict(arguments, deadline),
            ToolName::GovernanceReplay => self.replay(arguments),
            ToolName::KnowledgeListPolicies => self.list_policies(arguments),
            ToolName::KnowledgeMatchScope => self.match_scope(arguments),
            ToolName::KnowledgeMatchKeywords => self.match_keywords(arguments),
        }
    }

    /// Handles `governance_gate`.
    fn gate(&self, arguments: Value, deadline: Option<&Deadline>) -> Result<Value, ToolError> {
        let request: GateToolRequest = decode(arguments)?;
        let gate_request = GateRequest {
            task: request.task,
            context: request.context,
            proposed_actions: request.proposed_actions,
        };
        let run = self.kernel.gate(
            &gate_request,
            request.trace_id.map(TraceId::new),
            deadline,
        )?;
        encode(&GateToolResponse {
            gate_report: run.report,
            trace_id: run.trace_id,
        })
    }

    /// Handles `governance_enforce`.
    fn enforce(&self, arguments: Value, deadline: Option<&Deadline>) -> Result<Value, ToolError> {
        let request: EnforceToolRequest = decode(arguments)?;
        let outcome = self.validator.validate(SchemaKind::Contract, &request.contract);
        if !outcome.valid {
            return Err(ToolError::InvalidParams(outcome.errors.join("; ")));
        }
        let contract: Contract = serde_json::from_value(request.contract)
            .map_err(|err| ToolError::InvalidParams(err.to_string()))?;
        let run = self.kernel.enforce(
            request.trace_id.map(TraceId::new),
            &contract,
            &request.actions,
            deadline,
        )?;
        encode(&EnforceToolResponse {
            enforce_result: run.result,
            trace_id: run.trace_id,
        })
    }

    /// Handles `governance_verdict`.
    fn verdict(&self, arguments: Value, deadline: Option<&Deadline>) -> Result<Value, ToolError> {
        let request: VerdictToolRequest = decode(arguments)?;
        let outcome = self.validator.validate(SchemaKind::GateReport, &request.gate_report);
        if !outcome.valid {
            return Err(ToolError::InvalidParams(outcome.errors.join("; ")));
        }
        let gate_report: GateReport = serde_json::from_value(request.gate_report)
            .map_err(|err| ToolError::InvalidParams(err.to_string()))?;
        let enforce_result: Option<EnforceResult> = match request.enforce_result {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|err| ToolError::InvalidParams(err.to_string()))?,
            ),
            None => None,
        };
        let trace_id = TraceId::new(request.trace_id);
        let verdict = self.kernel.verdict(
            &trace_id,
            &gate_report,
            enforce_result.as_ref(),
            deadline,
        )?;
        encode(&VerdictToolResponse {
            verdict,
            trace_id,
        })
    }

    /// Handles `governance_replay`.
    fn replay(&self, arguments: Value) -> Result<Value, ToolError> {
        let request: ReplayToolRequest = decode(arguments)?;
        let trace_id = TraceId::new(request.trace_id);
        let outcome = self.kernel.replay(&trace_id, Some(self.validator.as_ref()))?;
        encode(&ReplayToolResponse {
            replay: outcome.report,
            diff: outcome.diff,
            trace_id,
        })
    }

    /// Handles `knowledge_list_policies`.
    fn list_policies(&self, arguments: Value) -> Result<Value, ToolError> {
        let request: ListPoliciesRequest = decode(arguments)?;
        let policies = self.policies()?;
        let matched: Vec<Policy> = match request.domain.as_deref() {
            Some(domain) => policies.by_domain(domain).into_iter().cloned().collect(),
            None => policies.all().to_vec(),
        };
        encode(&PoliciesResponse {
            policies: matched,
        })
    }

    /// Handles `knowledge_match_scope`.
    fn match_scope(&self, arguments: Value) -> Result<Value, ToolError> {
        let request: MatchScopeRequest = decode(arguments)?;
        let policies = self.policies()?;
        encode(&PoliciesResponse {
            policies: policies.match_by_scope(&request.keys).into_iter().cloned().collect(),
        })
    }

    /// Handles `knowledge_match_keywords`.
    fn match_keywords(&self, arguments: Value) -> Result<Value, ToolError> {
        let request: MatchKeywordsRequest = decode(arguments)?;
        let policies = self.policies()?;
        encode(&PoliciesResponse {
            policies: policies
                .match_by_keywords(&request.keywords)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Returns the policy snapshot or the knowledge-unavailable error.
    fn policies(&self) -> Result<&PolicySet, ToolError> {
        self.policies.as_deref().ok_or(ToolError::KnowledgeUnavailable)
    }
}

// ============================================================================
// SECTION: Codec Helpers
// ============================================================================

/// Decodes tool arguments into their typed shape.
fn decode<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Encodes a tool response as JSON.
fn encode<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|_| ToolError::Serialization)
}
