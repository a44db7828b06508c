// liye-kernel-core/src/runtime/payload.rs
// ============================================================================
// Module: LiYe Kernel Event Payloads
// Description: Typed payload bodies for stage boundary events.
// Purpose: Keep every trace event payload a closed, decodable shape.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Stage-end events carry the full stage output (gate report, enforce result,
//! verdict) verbatim. Stage-start and error events carry the small digest
//! payloads defined here, so replay can decode every line without guessing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::TraceId;

// ============================================================================
// SECTION: Stage Start Payloads
// ============================================================================

/// Payload of `gate_start`: a digest of the gate input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStartPayload {
    /// Digest string of the canonical gate request.
    pub input_hash: String,
    /// Count of proposed actions.
    pub action_count: u64,
}

/// Payload of `enforce_start`: a digest of the contract and workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforceStartPayload {
    /// Digest string of the canonical contract.
    pub contract_hash: String,
    /// Count of actions under evaluation.
    pub action_count: u64,
}

// ============================================================================
// SECTION: Replay Payloads
// ============================================================================

/// Payload of `replay_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStartPayload {
    /// Trace being replayed.
    pub target_trace_id: TraceId,
}

/// Payload of `replay_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEndPayload {
    /// Trace that was replayed.
    pub target_trace_id: TraceId,
    /// Final replay status label (`PASS` or `FAIL`).
    pub status: String,
    /// Count of events examined.
    pub event_count: u64,
}

// ============================================================================
// SECTION: Error Payload
// ============================================================================

/// Payload of a sealing `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable machine-readable error code.
    pub error_code: String,
    /// Human-readable message.
    pub message: String,
}
