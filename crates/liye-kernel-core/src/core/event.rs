// liye-kernel-core/src/core/event.rs
// ============================================================================
// Module: LiYe Kernel Trace Events
// Description: Hash-chained append-only trace event records.
// Purpose: Define the canonical event shape and its chain-link computation.
// Dependencies: crate::core::{hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! A trace is a sequence of [`TraceEvent`] records appended to
//! `events.ndjson`. Each event commits to its predecessor through
//! `prev_hash`, and its own `hash` is computed over the canonical JSON bytes
//! of every field except `hash` itself. The first event in a trace uses an
//! empty `prev_hash`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashError;
use crate::core::hashing::canonical_sha256_hex;
use crate::core::identifiers::TraceId;

// ============================================================================
// SECTION: Event Kind
// ============================================================================

/// Closed set of trace event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Gate stage started; payload is the input digest.
    GateStart,
    /// Gate stage finished; payload is the full gate report.
    GateEnd,
    /// Enforce stage started; payload is the contract digest and action count.
    EnforceStart,
    /// Enforce stage finished; payload is the full enforce result.
    EnforceEnd,
    /// Verdict emitted; payload is the full verdict. Seals the trace.
    VerdictEmitted,
    /// Replay started; payload names the replayed trace.
    ReplayStart,
    /// Replay finished; payload is the replay report summary.
    ReplayEnd,
    /// Fatal error; payload carries the error code and message. Seals the trace.
    Error,
}

impl EventKind {
    /// Returns the canonical snake_case label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GateStart => "gate_start",
            Self::GateEnd => "gate_end",
            Self::EnforceStart => "enforce_start",
            Self::EnforceEnd => "enforce_end",
            Self::VerdictEmitted => "verdict_emitted",
            Self::ReplayStart => "replay_start",
            Self::ReplayEnd => "replay_end",
            Self::Error => "error",
        }
    }

    /// Returns true when appending this kind seals the trace.
    #[must_use]
    pub const fn seals(self) -> bool {
        matches!(self, Self::VerdictEmitted | Self::Error)
    }
}

// ============================================================================
// SECTION: Trace Event
// ============================================================================

/// One hash-chained trace event.
///
/// # Invariants
/// - `seq` is monotonic from 0 within one trace and equals the line index.
/// - `hash` equals the canonical hash of the event with `hash` removed.
/// - `prev_hash` equals the previous event's `hash`, or `""` at `seq = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Trace identifier stable for the whole run.
    pub trace_id: TraceId,
    /// Monotonic sequence number starting at 0.
    pub seq: u64,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub ts: String,
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Type-specific payload object.
    pub payload: Value,
    /// Hex chain link over the canonical bytes of this event.
    pub hash: String,
    /// Previous event's hash, or empty at the head of the chain.
    pub prev_hash: String,
}

/// Borrowed view of the hashed fields of an event.
///
/// Serialization order is irrelevant: hashing canonicalizes with RFC 8785.
#[derive(Serialize)]
struct ChainedFields<'a> {
    /// Trace identifier.
    trace_id: &'a TraceId,
    /// Sequence number.
    seq: u64,
    /// Timestamp.
    ts: &'a str,
    /// Event type label.
    #[serde(rename = "type")]
    kind: EventKind,
    /// Payload object.
    payload: &'a Value,
    /// Previous chain link.
    prev_hash: &'a str,
}

/// Field names covered by the chain-link hash, in canonical order.
pub const CHAINED_FIELD_NAMES: [&str; 6] =
    ["payload", "prev_hash", "seq", "trace_id", "ts", "type"];

/// Computes the chain-link hash for an event body.
///
/// # Errors
///
/// Returns [`HashError`] when the payload cannot be canonicalized.
pub fn chain_link_hash(
    trace_id: &TraceId,
    seq: u64,
    ts: &str,
    kind: EventKind,
    payload: &Value,
    prev_hash: &str,
) -> Result<String, HashError> {
    canonical_sha256_hex(&ChainedFields {
        trace_id,
        seq,
        ts,
        kind,
        payload,
        prev_hash,
    })
}

impl TraceEvent {
    /// Recomputes this event's chain link from its own fields.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the payload cannot be canonicalized.
    pub fn recompute_hash(&self) -> Result<String, HashError> {
        chain_link_hash(&self.trace_id, self.seq, &self.ts, self.kind, &self.payload, &self.prev_hash)
    }
}
