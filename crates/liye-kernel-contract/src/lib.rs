// liye-kernel-contract/src/lib.rs
// ============================================================================
// Module: LiYe Kernel Contract Library
// Description: Frozen schemas, strict validation, and the MCP tool surface.
// Purpose: Keep every kernel data shape validated from one canonical source.
// Dependencies: crate::{schemas, tooling, validator}
// ============================================================================

//! ## Overview
//! The contract crate is the kernel's spine: the frozen JSON Schemas for
//! gate reports, contracts, trace events, verdicts, bundle manifests, and
//! learned policies, plus the compiled validator set and the MCP tool
//! definitions derived from the same shapes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod schemas;
pub mod tooling;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use schemas::bundle_manifest_schema;
pub use schemas::contract_schema;
pub use schemas::gate_report_schema;
pub use schemas::policy_schema;
pub use schemas::trace_event_schema;
pub use schemas::verdict_schema;
pub use tooling::ToolDefinition;
pub use tooling::ToolName;
pub use tooling::tool_definition;
pub use validator::ContractValidator;
pub use validator::SchemaError;
pub use validator::SchemaKind;
pub use validator::ValidationOutcome;
