// liye-kernel-mcp/tests/tool_router.rs
// ============================================================================
// Module: Tool Router Tests
// Description: End-to-end JSON-RPC dispatch over the governance tools.
// ============================================================================
//! ## Overview
//! Drives the stdio server's request handler through the full decision path
//! and the knowledge federation, asserting structured errors for every
//! failure mode.

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

use std::path::Path;
use std::sync::Arc;

use liye_kernel_contract::ContractValidator;
use liye_kernel_core::GateConfig;
use liye_kernel_core::GovernanceKernel;
use liye_kernel_core::KernelConfig;
use liye_kernel_core::SystemClock;
use liye_kernel_mcp::JsonRpcResponse;
use liye_kernel_mcp::McpServer;
use liye_kernel_mcp::NoopAuditSink;
use liye_kernel_mcp::ServerConfig;
use liye_kernel_mcp::ToolRouter;
use liye_kernel_policy::LoaderConfig;
use liye_kernel_policy::PolicyLoader;
use serde_json::Value;
use serde_json::json;

/// Builds a server without a policy snapshot.
fn server(base: &Path) -> McpServer {
    server_with_policies(base, None)
}

/// Builds a server, optionally with a policy snapshot.
fn server_with_policies(
    base: &Path,
    policies: Option<Arc<liye_kernel_policy::PolicySet>>,
) -> McpServer {
    let kernel = Arc::new(GovernanceKernel::new(KernelConfig {
        base_dir: base.to_path_buf(),
        gate: GateConfig::default(),
        clock: Arc::new(SystemClock),
    }));
    let validator = Arc::new(ContractValidator::new().unwrap());
    let router = ToolRouter::new(kernel, validator, policies);
    McpServer::new(ServerConfig::default(), router, Arc::new(NoopAuditSink))
}

/// Sends one JSON-RPC request through the server.
fn call(server: &McpServer, body: &Value) -> JsonRpcResponse {
    server.handle_bytes(&serde_json::to_vec(body).unwrap())
}

/// Sends a tools/call request and returns the result payload.
fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let response = call(
        server,
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }),
    );
    assert!(response.is_success(), "tool {name} failed: {response:?}");
    response.result().unwrap().clone()
}

/// Returns a schema-valid policy document for knowledge tests.
fn sample_policy(id: &str, domain: &str) -> Value {
    json!({
        "schema_version": "1.0.0",
        "policy_id": id,
        "domain": domain,
        "learned_at": "2026-07-01T00:00:00Z",
        "scope": { "type": "tenant", "keys": { "tenant_id": "t-9" } },
        "risk_level": "low",
        "validation_status": "production",
        "confidence": 0.8,
        "preconditions": {},
        "actions": [{
            "action_type": "adjust_price",
            "parameters": {},
            "dry_run_compatible": true
        }],
        "constraints": {},
        "require_approval": false,
        "rollback_plan": "revert",
        "success_signals": { "exec": {}, "operator": {}, "business": {} },
        "evaluation_window_days": 14,
        "expiry_at": "2026-10-01T00:00:00Z",
        "evidence": []
    })
}

/// Tests tools/list exposes the governance set, plus knowledge when loaded.
#[test]
fn test_tools_list_reflects_federation() {
    let dir = tempfile::tempdir().unwrap();
    let response = call(
        &server(dir.path()),
        &json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }),
    );
    assert!(response.is_success());
    let tools = response.result().unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 4);
    assert_eq!(tools[0]["name"], "governance_gate");

    let state = tempfile::tempdir().unwrap();
    let production = state.path().join("production");
    std::fs::create_dir_all(&production).unwrap();
    std::fs::write(
        production.join("p.json"),
        serde_json::to_vec(&sample_policy("pol-1", "pricing")).unwrap(),
    )
    .unwrap();
    let loader = PolicyLoader::new().unwrap();
    let set = loader
        .load(&LoaderConfig {
            bundle_path: None,
            state_dir: Some(state.path().to_path_buf()),
        })
        .unwrap();

    let response = call(
        &server_with_policies(dir.path(), Some(Arc::new(set))),
        &json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
    );
    let tools = response.result().unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 7);
}

/// Tests the full decision path over the wire, ending in a passing replay.
#[test]
fn test_decision_path_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());

    let gate = call_tool(
        &server,
        "governance_gate",
        json!({
            "task": "Roll out configuration",
            "proposed_actions": [
                { "action_type": "write", "path_prefix": "/prod/config.json" }
            ]
        }),
    );
    let trace_id = gate["trace_id"].as_str().unwrap().to_string();
    assert_eq!(gate["gate_report"]["decision"], "BLOCK");

    let enforce = call_tool(
        &server,
        "governance_enforce",
        json!({
            "trace_id": trace_id,
            "contract": {
                "version": "1.0.0",
                "scope": { "name": "release" },
                "rules": [{
                    "id": "deny-write-prod",
                    "effect": "DENY",
                    "match": { "path_prefix": "/prod/" },
                    "rationale": "production writes are frozen"
                }]
            },
            "actions": [
                { "action_type": "write", "path_prefix": "/prod/config.json" }
            ]
        }),
    );
    assert_eq!(enforce["enforce_result"]["decision_summary"], "BLOCK");
    assert_eq!(enforce["enforce_result"]["blocked_rule_ids"], json!(["deny-write-prod"]));

    let verdict = call_tool(
        &server,
        "governance_verdict",
        json!({
            "trace_id": trace_id,
            "gate_report": gate["gate_report"],
            "enforce_result": enforce["enforce_result"]
        }),
    );
    assert_eq!(verdict["verdict"]["summary"], "BLOCK (both)");

    let replay = call_tool(&server, "governance_replay", json!({ "trace_id": trace_id }));
    assert_eq!(replay["replay"]["status"], "PASS");
    assert_eq!(replay["trace_id"], json!(trace_id));
}

/// Tests an unknown tool maps to method-not-found.
#[test]
fn test_unknown_tool_is_structured_error() {
    let dir = tempfile::tempdir().unwrap();
    let response = call(
        &server(dir.path()),
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "governance_launch", "arguments": {} }
        }),
    );
    assert!(!response.is_success());
    assert_eq!(response.error_code(), Some(-32601));
}

/// Tests a contract with unknown match keys is rejected as invalid params.
#[test]
fn test_invalid_contract_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = call(
        &server(dir.path()),
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "governance_enforce",
                "arguments": {
                    "contract": {
                        "version": "1.0.0",
                        "scope": { "name": "x" },
                        "rules": [{
                            "id": "r",
                            "effect": "DENY",
                            "match": { "glob": "*" },
                            "rationale": "x"
                        }]
                    },
                    "actions": []
                }
            }
        }),
    );
    assert_eq!(response.error_code(), Some(-32602));
}

/// Tests a wrong JSON-RPC version is rejected without a panic.
#[test]
fn test_wrong_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = call(
        &server(dir.path()),
        &json!({ "jsonrpc": "1.0", "id": 1, "method": "tools/list" }),
    );
    assert_eq!(response.error_code(), Some(-32600));
}

/// Tests malformed bytes produce a parse error envelope.
#[test]
fn test_malformed_body_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let response = server(dir.path()).handle_bytes(b"not json");
    assert_eq!(response.error_code(), Some(-32700));
}

/// Tests the knowledge tools answer queries over the loaded snapshot.
#[test]
fn test_knowledge_tools_query_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let production = state.path().join("production");
    std::fs::create_dir_all(&production).unwrap();
    std::fs::write(
        production.join("p1.json"),
        serde_json::to_vec(&sample_policy("pol-price", "pricing")).unwrap(),
    )
    .unwrap();
    std::fs::write(
        production.join("p2.json"),
        serde_json::to_vec(&sample_policy("pol-title", "listings")).unwrap(),
    )
    .unwrap();
    let loader = PolicyLoader::new().unwrap();
    let set = loader
        .load(&LoaderConfig {
            bundle_path: None,
            state_dir: Some(state.path().to_path_buf()),
        })
        .unwrap();
    let server = server_with_policies(dir.path(), Some(Arc::new(set)));

    let listed = call_tool(&server, "knowledge_list_policies", json!({ "domain": "pricing" }));
    assert_eq!(listed["policies"].as_array().unwrap().len(), 1);

    let scoped = call_tool(
        &server,
        "knowledge_match_scope",
        json!({ "keys": { "tenant_id": "t-9" } }),
    );
    assert_eq!(scoped["policies"].as_array().unwrap().len(), 2);

    let keyed = call_tool(
        &server,
        "knowledge_match_keywords",
        json!({ "keywords": ["title"] }),
    );
    assert_eq!(keyed["policies"].as_array().unwrap().len(), 1);
}

/// Tests knowledge tools without a snapshot return the structured error.
#[test]
fn test_knowledge_unavailable_without_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let response = call(
        &server(dir.path()),
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "knowledge_list_policies", "arguments": {} }
        }),
    );
    assert_eq!(response.error_code(), Some(-32001));
}
