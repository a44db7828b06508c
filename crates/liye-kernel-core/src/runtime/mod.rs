// liye-kernel-core/src/runtime/mod.rs
// ============================================================================
// Module: LiYe Kernel Runtime
// Description: Trace writing, decision stages, replay, and the kernel facade.
// Purpose: Execute governed requests deterministically over local traces.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Runtime modules implement the decision path and its evidence log. All
//! external surfaces (MCP tools, embedding hosts) must call through
//! [`kernel::GovernanceKernel`] so every decision leaves an identical trace.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod enforce;
pub mod gate;
pub mod kernel;
pub mod payload;
pub mod registry;
pub mod replay;
pub mod trace;
pub mod verdict;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use enforce::ContractError;
pub use enforce::enforce;
pub use gate::GateConfig;
pub use gate::GateEngine;
pub use gate::GateRequest;
pub use kernel::Deadline;
pub use kernel::EnforceRun;
pub use kernel::GateRun;
pub use kernel::GovernRun;
pub use kernel::GovernanceKernel;
pub use kernel::KernelConfig;
pub use kernel::KernelError;
pub use payload::EnforceStartPayload;
pub use payload::ErrorPayload;
pub use payload::GateStartPayload;
pub use payload::ReplayEndPayload;
pub use payload::ReplayStartPayload;
pub use registry::RegistryError;
pub use registry::TraceHandle;
pub use registry::TraceRegistry;
pub use replay::PayloadValidator;
pub use replay::ReplayChecks;
pub use replay::ReplayDiff;
pub use replay::ReplayEngine;
pub use replay::ReplayOutcome;
pub use replay::ReplayReport;
pub use replay::ReplayStatus;
pub use replay::StructuralValidator;
pub use trace::DIFF_JSON;
pub use trace::EVENTS_FILE;
pub use trace::LoadedTrace;
pub use trace::REPLAY_JSON;
pub use trace::TraceError;
pub use trace::TraceWriter;
pub use trace::VERDICT_JSON;
pub use trace::VERDICT_MD;
pub use trace::generate_trace_id;
pub use trace::load_events;
pub use verdict::VerdictInputs;
pub use verdict::render_markdown;
pub use verdict::synthesize;
