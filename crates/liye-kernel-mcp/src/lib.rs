// liye-kernel-mcp/src/lib.rs
// ============================================================================
// Module: LiYe Kernel MCP Library
// Description: JSON-RPC 2.0 servers for governance and knowledge tools.
// Purpose: Expose the kernel over stdio with structured errors and auditing.
// Dependencies: crate::{audit, server, tools}
// ============================================================================

//! ## Overview
//! The MCP crate serves the governance tools (gate, enforce, verdict,
//! replay) and federates the knowledge tools (policy queries) under the same
//! stdio endpoint. Inputs are untrusted and schema-validated at the router;
//! no failure propagates over the wire as anything but a JSON-RPC error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use server::JsonRpcResponse;
pub use server::McpServer;
pub use server::McpServerError;
pub use server::ServerConfig;
pub use tools::ToolError;
pub use tools::ToolRouter;
