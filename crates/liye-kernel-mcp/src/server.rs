// liye-kernel-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 stdio endpoint for the governance kernel.
// Purpose: Serve tools/list and tools/call without ever throwing on the wire.
// Dependencies: liye-kernel-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The server reads Content-Length framed JSON-RPC requests from stdin and
//! writes framed responses to stdout. Every failure, including malformed
//! frames and unknown methods, becomes a structured JSON-RPC error object.
//! Tool calls run under a cooperative deadline; on expiry the kernel seals
//! the in-flight trace and the error is returned like any other.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use liye_kernel_core::Deadline;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::audit::AuditEvent;
use crate::audit::AuditEventParams;
use crate::audit::AuditSink;
use crate::audit::RequestOutcome;
use crate::tools::ToolError;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Server tunables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Cooperative deadline applied to each tool call.
    pub call_deadline: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 4 * 1024 * 1024,
            call_deadline: Some(Duration::from_secs(30)),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal transport errors; per-request failures stay on the wire.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Stdio transport failure or shutdown.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
    /// Structured error metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<JsonRpcErrorData>,
}

/// JSON-RPC error metadata payload.
#[derive(Debug, Serialize)]
struct JsonRpcErrorData {
    /// Normalized error kind label.
    kind: &'static str,
    /// Whether the request may be retried safely.
    retryable: bool,
}

/// Tool call parameters for `tools/call`.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<liye_kernel_contract::ToolDefinition>,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Stdio MCP server over a tool router.
pub struct McpServer {
    /// Server tunables.
    config: ServerConfig,
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Audit sink for request logging.
    audit: Arc<dyn AuditSink>,
}

impl McpServer {
    /// Creates a server over the router and audit sink.
    #[must_use]
    pub fn new(config: ServerConfig, router: ToolRouter, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            config,
            router,
            audit,
        }
    }

    /// Serves framed requests from stdin until the stream closes.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when stdio fails or closes.
    pub fn serve_stdio(&self) -> Result<(), McpServerError> {
        let mut reader = BufReader::new(std::io::stdin());
        let mut writer = std::io::stdout();
        loop {
            let bytes = read_framed(&mut reader, self.config.max_body_bytes)?;
            let response = self.handle_bytes(&bytes);
            let payload = serde_json::to_vec(&response).map_err(|_| {
                McpServerError::Transport("json-rpc serialization failed".to_string())
            })?;
            write_framed(&mut writer, &payload)?;
        }
    }

    /// Handles one raw request body.
    #[must_use]
    pub fn handle_bytes(&self, bytes: &[u8]) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_slice(bytes) {
            Ok(request) => request,
            Err(err) => {
                let response = error_response(
                    Value::Null,
                    -32700,
                    &format!("parse error: {err}"),
                    "parse",
                );
                self.record(bytes.len(), "unparseable", None, &response);
                return response;
            }
        };
        let method = request.method.clone();
        let tool = request
            .params
            .as_ref()
            .and_then(|params| params.get("name"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let response = self.handle_request(request);
        self.record(bytes.len(), &method, tool, &response);
        response
    }

    /// Dispatches a decoded JSON-RPC request.
    fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        if request.jsonrpc != "2.0" {
            return error_response(
                request.id,
                -32600,
                "unsupported json-rpc version",
                "invalid_request",
            );
        }
        match request.method.as_str() {
            "tools/list" => {
                let result = ToolListResult {
                    tools: self.router.list_tools(),
                };
                match serde_json::to_value(&result) {
                    Ok(value) => success_response(request.id, value),
                    Err(_) => error_response(
                        request.id,
                        ToolError::Serialization.rpc_code(),
                        "serialization failure",
                        "serialization",
                    ),
                }
            }
            "tools/call" => self.handle_tool_call(request.id, request.params),
            _ => error_response(request.id, -32601, "method not found", "unknown_method"),
        }
    }

    /// Dispatches a `tools/call` request through the router.
    fn handle_tool_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return error_response(id, -32602, "missing params", "invalid_params");
        };
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(err) => {
                return error_response(
                    id,
                    -32602,
                    &format!("invalid params: {err}"),
                    "invalid_params",
                );
            }
        };
        let deadline = self.config.call_deadline.map(Deadline::from_now);
        match self.router.call(&call.name, call.arguments, deadline.as_ref()) {
            Ok(result) => success_response(id, result),
            Err(err) => JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: err.rpc_code(),
                    message: err.to_string(),
                    data: Some(JsonRpcErrorData {
                        kind: err.kind(),
                        retryable: err.retryable(),
                    }),
                }),
            },
        }
    }

    /// Records one audit event for a handled request.
    fn record(
        &self,
        request_bytes: usize,
        method: &str,
        tool: Option<String>,
        response: &JsonRpcResponse,
    ) {
        let response_bytes = serde_json::to_vec(response).map(|bytes| bytes.len()).unwrap_or(0);
        let (outcome, error_kind) = match &response.error {
            Some(error) => {
                (RequestOutcome::Error, error.data.as_ref().map(|data| data.kind))
            }
            None => (RequestOutcome::Ok, None),
        };
        self.audit.record(&AuditEvent::new(AuditEventParams {
            method: method.to_string(),
            tool,
            outcome,
            error_kind,
            request_bytes,
            response_bytes,
        }));
    }
}

// ============================================================================
// SECTION: Response Builders
// ============================================================================

/// Builds a success envelope.
fn success_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

/// Builds an error envelope.
fn error_response(id: Value, code: i64, message: &str, kind: &'static str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
            data: Some(JsonRpcErrorData {
                kind,
                retryable: false,
            }),
        }),
    }
}

impl JsonRpcResponse {
    /// Returns true when the response carries a result.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Returns the result payload, when present.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error code, when present.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|error| error.code)
    }
}

// ============================================================================
// SECTION: Stdio Framing
// ============================================================================

/// Reads one framed stdio payload using MCP Content-Length headers.
fn read_framed(
    reader: &mut BufReader<impl Read>,
    max_body_bytes: usize,
) -> Result<Vec<u8>, McpServerError> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if bytes == 0 {
            return Err(McpServerError::Transport("stdio closed".to_string()));
        }
        if line.trim().is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
    }
    let len = content_length
        .ok_or_else(|| McpServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        return Err(McpServerError::Transport("payload too large".to_string()));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    Ok(buf)
}

/// Writes a framed stdio payload using MCP Content-Length headers.
fn write_framed(writer: &mut impl Write, payload: &[u8]) -> Result<(), McpServerError> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    writer
        .write_all(header.as_bytes())
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer
        .write_all(payload)
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer.flush().map_err(|_| McpServerError::Transport("stdio write failed".to_string()))
}
