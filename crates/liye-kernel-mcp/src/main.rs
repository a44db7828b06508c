// liye-kernel-mcp/src/main.rs
// ============================================================================
// Module: MCP Server Binary
// Description: Stdio entry point for the governance and knowledge servers.
// Purpose: Wire the kernel, validator, and policy snapshot into one endpoint.
// Dependencies: liye-kernel-contract, liye-kernel-core, liye-kernel-policy
// ============================================================================

//! ## Overview
//! The binary reads its configuration from the environment, builds the
//! kernel and the optional policy snapshot, and serves framed JSON-RPC on
//! stdio until the stream closes. A bad policy bundle aborts startup rather
//! than serving with partial knowledge.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use liye_kernel_contract::ContractValidator;
use liye_kernel_core::GateConfig;
use liye_kernel_core::GovernanceKernel;
use liye_kernel_core::KernelConfig;
use liye_kernel_core::SystemClock;
use liye_kernel_mcp::FileAuditSink;
use liye_kernel_mcp::McpServer;
use liye_kernel_mcp::ServerConfig;
use liye_kernel_mcp::StderrAuditSink;
use liye_kernel_mcp::ToolRouter;
use liye_kernel_mcp::audit::AuditSink;
use liye_kernel_policy::LoaderConfig;
use liye_kernel_policy::PolicyLoader;
use liye_kernel_policy::PolicySet;
use thiserror::Error;

// ============================================================================
// SECTION: Environment Variables
// ============================================================================

/// Trace base directory.
const ENV_TRACE_DIR: &str = "LIYE_TRACE_DIR";
/// Learned-policy state directory.
const ENV_POLICY_STATE_DIR: &str = "LIYE_POLICY_STATE_DIR";
/// Audit log file; stderr when unset.
const ENV_AUDIT_LOG: &str = "LIYE_MCP_AUDIT_LOG";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup failures; serving failures surface through the server error.
#[derive(Debug, Error)]
enum MainError {
    /// Schema compilation failed.
    #[error("validator init failed: {0}")]
    Validator(String),
    /// Policy snapshot could not be loaded.
    #[error("policy load failed: {0}")]
    Policies(String),
    /// Audit log could not be opened.
    #[error("audit log open failed: {0}")]
    Audit(String),
    /// Transport failed.
    #[error("server failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Builds the endpoint and serves stdio until the stream closes.
fn main() -> Result<(), MainError> {
    let trace_dir =
        env::var(ENV_TRACE_DIR).map_or_else(|_| PathBuf::from("state/traces"), PathBuf::from);
    let kernel = Arc::new(GovernanceKernel::new(KernelConfig {
        base_dir: trace_dir,
        gate: GateConfig::default(),
        clock: Arc::new(SystemClock),
    }));
    let validator = Arc::new(
        ContractValidator::new().map_err(|err| MainError::Validator(err.to_string()))?,
    );
    let policies = load_policies()?;
    let audit = build_audit_sink()?;

    let router = ToolRouter::new(kernel, validator, policies);
    let server = McpServer::new(ServerConfig::default(), router, audit);
    match server.serve_stdio() {
        // A closed stdin is the orderly shutdown path.
        Err(err) if err.to_string().contains("stdio closed") => Ok(()),
        Err(err) => Err(MainError::Serve(err.to_string())),
        Ok(()) => Ok(()),
    }
}

/// Loads the policy snapshot from the bundle or state directory, when set.
fn load_policies() -> Result<Option<Arc<PolicySet>>, MainError> {
    let state_dir = env::var(ENV_POLICY_STATE_DIR).ok().map(PathBuf::from);
    let config = LoaderConfig::from_env(state_dir);
    if config.bundle_path.is_none() && config.state_dir.is_none() {
        return Ok(None);
    }
    let loader = PolicyLoader::new().map_err(|err| MainError::Policies(err.to_string()))?;
    let set = loader.load(&config).map_err(|err| MainError::Policies(err.to_string()))?;
    Ok(Some(Arc::new(set)))
}

/// Builds the audit sink from the environment.
fn build_audit_sink() -> Result<Arc<dyn AuditSink>, MainError> {
    match env::var(ENV_AUDIT_LOG) {
        Ok(path) => {
            let sink = FileAuditSink::new(PathBuf::from(path).as_path())
                .map_err(|err| MainError::Audit(err.to_string()))?;
            Ok(Arc::new(sink))
        }
        Err(_) => Ok(Arc::new(StderrAuditSink)),
    }
}
