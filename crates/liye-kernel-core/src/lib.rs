// liye-kernel-core/src/lib.rs
// ============================================================================
// Module: LiYe Kernel Core Library
// Description: Public API surface for the governance kernel core.
// Purpose: Expose core types and the runtime decision path.
// Dependencies: crate::{core, runtime}
// ============================================================================

//! ## Overview
//! The kernel core provides the two-stage decision pipeline (gate, enforce,
//! verdict), the hash-chained trace writer, and the deterministic replay
//! engine. It is transport-agnostic and integrates through explicit
//! interfaces rather than embedding into agent frameworks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use runtime::ContractError;
pub use runtime::Deadline;
pub use runtime::EnforceRun;
pub use runtime::GateConfig;
pub use runtime::GateEngine;
pub use runtime::GateRequest;
pub use runtime::GateRun;
pub use runtime::GovernRun;
pub use runtime::GovernanceKernel;
pub use runtime::KernelConfig;
pub use runtime::KernelError;
pub use runtime::PayloadValidator;
pub use runtime::RegistryError;
pub use runtime::ReplayChecks;
pub use runtime::ReplayDiff;
pub use runtime::ReplayEngine;
pub use runtime::ReplayOutcome;
pub use runtime::ReplayReport;
pub use runtime::ReplayStatus;
pub use runtime::StructuralValidator;
pub use runtime::TraceError;
pub use runtime::TraceRegistry;
pub use runtime::TraceWriter;
pub use runtime::enforce;
pub use runtime::generate_trace_id;
pub use runtime::load_events;
