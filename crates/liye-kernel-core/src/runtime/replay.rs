// liye-kernel-core/src/runtime/replay.rs
// ============================================================================
// Module: LiYe Kernel Replay Engine
// Description: Deterministic re-verification of sealed traces.
// Purpose: Detect tampering via schema, hash-chain, and structural checks.
// Dependencies: crate::{core, runtime}, serde
// ============================================================================

//! ## Overview
//! Replay re-reads a sealed trace and re-runs three independent checks:
//! payload decoding against the event taxonomy, hash-chain recomputation,
//! and structural reconstruction of the verdict from stage events. It is a
//! pure function of the trace bytes: identical input bytes produce identical
//! `replay.json` and `diff.json` artifacts. Failures become a FAIL report,
//! never an error over the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::EnforceResult;
use crate::core::EventKind;
use crate::core::GateReport;
use crate::core::TraceEvent;
use crate::core::Verdict;
use crate::core::event::CHAINED_FIELD_NAMES;
use crate::core::hashing::canonical_bytes;
use crate::runtime::payload::EnforceStartPayload;
use crate::runtime::payload::ErrorPayload;
use crate::runtime::payload::GateStartPayload;
use crate::runtime::payload::ReplayEndPayload;
use crate::runtime::payload::ReplayStartPayload;
use crate::runtime::trace::DIFF_JSON;
use crate::runtime::trace::REPLAY_JSON;
use crate::runtime::trace::TraceError;
use crate::runtime::trace::VERDICT_JSON;
use crate::runtime::trace::load_events;
use crate::runtime::trace::write_replay_artifact;
use crate::runtime::verdict::VerdictInputs;
use crate::runtime::verdict::synthesize;

// ============================================================================
// SECTION: Payload Validation Seam
// ============================================================================

/// Validates event payloads against their declared type.
///
/// The core supplies a structural decoder; the contract crate layers strict
/// JSON-schema validation behind the same seam.
pub trait PayloadValidator: Send + Sync {
    /// Returns validation error messages for a payload, empty when valid.
    fn validate(&self, kind: EventKind, payload: &Value) -> Vec<String>;
}

/// Structural validator decoding payloads into their typed shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl PayloadValidator for StructuralValidator {
    fn validate(&self, kind: EventKind, payload: &Value) -> Vec<String> {
        let outcome = match kind {
            EventKind::GateStart => decode::<GateStartPayload>(payload),
            EventKind::GateEnd => decode::<GateReport>(payload),
            EventKind::EnforceStart => decode::<EnforceStartPayload>(payload),
            EventKind::EnforceEnd => decode::<EnforceResult>(payload),
            EventKind::VerdictEmitted => decode::<Verdict>(payload),
            EventKind::ReplayStart => decode::<ReplayStartPayload>(payload),
            EventKind::ReplayEnd => decode::<ReplayEndPayload>(payload),
            EventKind::Error => decode::<ErrorPayload>(payload),
        };
        match outcome {
            Ok(()) => Vec::new(),
            Err(message) => vec![format!("{} payload invalid: {message}", kind.as_str())],
        }
    }
}

/// Decodes a payload into a typed shape, discarding the value.
fn decode<T: for<'de> Deserialize<'de>>(payload: &Value) -> Result<(), String> {
    serde_json::from_value::<T>(payload.clone()).map(|_| ()).map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Replay Types
// ============================================================================

/// Replay status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayStatus {
    /// Every check passed.
    Pass,
    /// At least one check failed.
    Fail,
}

/// Individual check outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayChecks {
    /// Every payload decoded against its declared type.
    pub schema_valid: bool,
    /// The hash chain recomputed without divergence.
    pub hash_chain_valid: bool,
    /// The on-disk verdict matches the reconstruction from events.
    pub structure_valid: bool,
}

/// Replay report persisted as `replay.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Final status.
    pub status: ReplayStatus,
    /// Convenience boolean mirroring `status`.
    pub pass: bool,
    /// Count of parsed events.
    pub event_count: u64,
    /// Count of recorded errors.
    pub error_count: u64,
    /// Individual check outcomes.
    pub checks: ReplayChecks,
    /// Error messages in detection order.
    pub errors: Vec<String>,
}

/// First hash-chain divergence, persisted as `diff.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDiff {
    /// Sequence number of the diverging event.
    pub seq: u64,
    /// Hash recomputed from the on-disk fields.
    pub expected_hash: String,
    /// Hash recorded on disk.
    pub actual_hash: String,
    /// Field names covered by the chain-link hash.
    pub hashed_fields: Vec<String>,
}

/// Full replay outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// The persisted report.
    pub report: ReplayReport,
    /// The persisted divergence, when tampering was detected.
    pub diff: Option<ReplayDiff>,
}

// ============================================================================
// SECTION: Replay Engine
// ============================================================================

/// Re-verifies sealed traces.
pub struct ReplayEngine<'a> {
    /// Payload validation seam.
    validator: &'a dyn PayloadValidator,
}

impl<'a> ReplayEngine<'a> {
    /// Creates an engine over the provided payload validator.
    #[must_use]
    pub const fn new(validator: &'a dyn PayloadValidator) -> Self {
        Self {
            validator,
        }
    }

    /// Replays a trace directory and persists `replay.json` (and `diff.json`
    /// on divergence).
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] when the event log cannot be read or the
    /// artifacts cannot be written. Verification failures are reported in the
    /// returned [`ReplayReport`], not as errors.
    pub fn replay(&self, trace_dir: &Path) -> Result<ReplayOutcome, TraceError> {
        let loaded = load_events(trace_dir)?;
        let mut errors = Vec::new();
        let mut checks = ReplayChecks {
            schema_valid: true,
            hash_chain_valid: true,
            structure_valid: true,
        };

        if loaded.truncated {
            checks.hash_chain_valid = false;
            errors.push("event log ends with a truncated line".to_string());
        }
        for (line, message) in &loaded.malformed {
            checks.schema_valid = false;
            errors.push(format!("line {line} is malformed: {message}"));
        }

        for event in &loaded.events {
            for message in self.validator.validate(event.kind, &event.payload) {
                checks.schema_valid = false;
                errors.push(format!("seq {}: {message}", event.seq));
            }
        }

        let diff = verify_chain(&loaded.events, &mut checks, &mut errors);
        verify_structure(trace_dir, &loaded.events, &mut checks, &mut errors);

        let pass = checks.schema_valid
            && checks.hash_chain_valid
            && checks.structure_valid
            && errors.is_empty();
        let report = ReplayReport {
            status: if pass { ReplayStatus::Pass } else { ReplayStatus::Fail },
            pass,
            event_count: u64::try_from(loaded.events.len()).unwrap_or(u64::MAX),
            error_count: u64::try_from(errors.len()).unwrap_or(u64::MAX),
            checks,
            errors,
        };

        let report_bytes = canonical_bytes(&report)
            .map_err(|err| TraceError::Io(format!("replay report encoding failed: {err}")))?;
        write_replay_artifact(trace_dir, REPLAY_JSON, &report_bytes)?;
        if let Some(diff) = &diff {
            let diff_bytes = canonical_bytes(diff)
                .map_err(|err| TraceError::Io(format!("replay diff encoding failed: {err}")))?;
            write_replay_artifact(trace_dir, DIFF_JSON, &diff_bytes)?;
        }

        Ok(ReplayOutcome {
            report,
            diff,
        })
    }
}

// ============================================================================
// SECTION: Chain Verification
// ============================================================================

/// Recomputes the hash chain and records the first divergence.
fn verify_chain(
    events: &[TraceEvent],
    checks: &mut ReplayChecks,
    errors: &mut Vec<String>,
) -> Option<ReplayDiff> {
    let mut prev_hash = String::new();
    for (index, event) in events.iter().enumerate() {
        let index = u64::try_from(index).unwrap_or(u64::MAX);
        if event.seq != index {
            checks.hash_chain_valid = false;
            errors.push(format!("seq {index}: out-of-order sequence {}", event.seq));
            return None;
        }
        if event.prev_hash != prev_hash {
            checks.hash_chain_valid = false;
            errors.push(format!("seq {index}: prev_hash does not match the prior link"));
            return Some(ReplayDiff {
                seq: index,
                expected_hash: prev_hash,
                actual_hash: event.prev_hash.clone(),
                hashed_fields: CHAINED_FIELD_NAMES.iter().map(ToString::to_string).collect(),
            });
        }
        match event.recompute_hash() {
            Ok(expected) if expected == event.hash => {}
            Ok(expected) => {
                checks.hash_chain_valid = false;
                errors.push(format!("seq {index}: hash mismatch"));
                return Some(ReplayDiff {
                    seq: index,
                    expected_hash: expected,
                    actual_hash: event.hash.clone(),
                    hashed_fields: CHAINED_FIELD_NAMES.iter().map(ToString::to_string).collect(),
                });
            }
            Err(err) => {
                checks.hash_chain_valid = false;
                errors.push(format!("seq {index}: hash recomputation failed: {err}"));
                return None;
            }
        }
        prev_hash = event.hash.clone();
    }
    None
}

// ============================================================================
// SECTION: Structural Verification
// ============================================================================

/// Reconstructs the verdict from stage events and compares it to disk.
fn verify_structure(
    trace_dir: &Path,
    events: &[TraceEvent],
    checks: &mut ReplayChecks,
    errors: &mut Vec<String>,
) {
    let emitted = events.iter().rev().find(|event| event.kind == EventKind::VerdictEmitted);
    let Some(emitted) = emitted else {
        return;
    };

    let on_disk = match std::fs::read(trace_dir.join(VERDICT_JSON)) {
        Ok(bytes) => bytes,
        Err(err) => {
            checks.structure_valid = false;
            errors.push(format!("verdict.json unreadable: {err}"));
            return;
        }
    };
    let on_disk_value: Value = match serde_json::from_slice(&on_disk) {
        Ok(value) => value,
        Err(err) => {
            checks.structure_valid = false;
            errors.push(format!("verdict.json unparseable: {err}"));
            return;
        }
    };

    if !canonical_equal(&emitted.payload, &on_disk_value) {
        checks.structure_valid = false;
        errors.push("verdict.json differs from the verdict_emitted event".to_string());
        return;
    }

    let gate_end = events.iter().rev().find(|event| event.kind == EventKind::GateEnd);
    let Some(gate_end) = gate_end else {
        checks.structure_valid = false;
        errors.push("verdict present without a gate_end event".to_string());
        return;
    };
    let gate: GateReport = match serde_json::from_value(gate_end.payload.clone()) {
        Ok(report) => report,
        Err(err) => {
            checks.structure_valid = false;
            errors.push(format!("gate_end payload undecodable: {err}"));
            return;
        }
    };

    let enforce_end = events.iter().rev().find(|event| event.kind == EventKind::EnforceEnd);
    let enforce: Option<EnforceResult> = match enforce_end {
        Some(event) => match serde_json::from_value(event.payload.clone()) {
            Ok(result) => Some(result),
            Err(err) => {
                checks.structure_valid = false;
                errors.push(format!("enforce_end payload undecodable: {err}"));
                return;
            }
        },
        None => None,
    };

    let mut evidence_refs = vec![format!("events.ndjson#{}", gate_end.seq)];
    if let Some(event) = enforce_end {
        evidence_refs.push(format!("events.ndjson#{}", event.seq));
    }
    let reconstructed = synthesize(VerdictInputs {
        trace_id: &emitted.trace_id,
        gate: &gate,
        enforce: enforce.as_ref(),
        evidence_refs,
    });
    let reconstructed_value = match serde_json::to_value(&reconstructed) {
        Ok(value) => value,
        Err(err) => {
            checks.structure_valid = false;
            errors.push(format!("verdict reconstruction failed: {err}"));
            return;
        }
    };

    if !canonical_equal(&reconstructed_value, &on_disk_value) {
        checks.structure_valid = false;
        errors.push("verdict.json differs from the reconstruction".to_string());
    }
}

/// Compares two JSON values by canonical bytes.
fn canonical_equal(left: &Value, right: &Value) -> bool {
    match (canonical_bytes(left), canonical_bytes(right)) {
        (Ok(left_bytes), Ok(right_bytes)) => left_bytes == right_bytes,
        _ => false,
    }
}
