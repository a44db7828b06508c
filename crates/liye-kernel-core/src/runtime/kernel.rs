// liye-kernel-core/src/runtime/kernel.rs
// ============================================================================
// Module: LiYe Kernel Facade
// Description: Governed request pipeline over the trace registry.
// Purpose: Run gate, enforce, and verdict as one audited decision path.
// Dependencies: crate::{core, runtime}
// ============================================================================

//! ## Overview
//! The facade owns the trace registry and drives the decision path: every
//! stage appends its boundary events, the verdict stage writes the canonical
//! artifacts and seals the trace, and replay re-verifies sealed traces
//! read-only. MCP tools and embedding hosts both call into this type so the
//! evidence log is identical regardless of transport.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;

use crate::core::Contract;
use crate::core::EnforceDecision;
use crate::core::EnforceResult;
use crate::core::EventKind;
use crate::core::GateDecision;
use crate::core::GateReport;
use crate::core::ProposedAction;
use crate::core::TraceId;
use crate::core::Verdict;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_bytes;
use crate::core::hashing::canonical_sha256_hex;
use crate::core::time::SharedClock;
use crate::runtime::enforce::ContractError;
use crate::runtime::enforce::enforce;
use crate::runtime::gate::GateConfig;
use crate::runtime::gate::GateEngine;
use crate::runtime::gate::GateRequest;
use crate::runtime::payload::EnforceStartPayload;
use crate::runtime::payload::ErrorPayload;
use crate::runtime::payload::GateStartPayload;
use crate::runtime::registry::RegistryError;
use crate::runtime::registry::TraceHandle;
use crate::runtime::registry::TraceRegistry;
use crate::runtime::replay::PayloadValidator;
use crate::runtime::replay::ReplayEngine;
use crate::runtime::replay::ReplayOutcome;
use crate::runtime::replay::StructuralValidator;
use crate::runtime::trace::TraceError;
use crate::runtime::trace::VERDICT_JSON;
use crate::runtime::trace::VERDICT_MD;
use crate::runtime::trace::load_events;
use crate::runtime::verdict::VerdictInputs;
use crate::runtime::verdict::render_markdown;
use crate::runtime::verdict::synthesize;

// ============================================================================
// SECTION: Deadline
// ============================================================================

/// Cooperative deadline threaded through kernel operations.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// Instant after which the operation must abort.
    at: Instant,
}

impl Deadline {
    /// Creates a deadline the given duration from now.
    #[must_use]
    pub fn from_now(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout).unwrap_or_else(Instant::now),
        }
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Trace registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Trace writer failure.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// Contract rejected before enforcement.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// Canonicalization failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Cooperative deadline expired mid-operation.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    /// A writer mutex was poisoned by a panicking thread.
    #[error("trace writer lock poisoned")]
    WriterPoisoned,
    /// Payload serialization failure.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl KernelError {
    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Registry(_) => "TRACE_OWNERSHIP",
            Self::Trace(_) => "TRACE_IO",
            Self::Contract(_) => "CONTRACT_INVALID",
            Self::Hash(_) => "CANONICALIZATION",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::WriterPoisoned => "WRITER_POISONED",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Kernel construction inputs.
pub struct KernelConfig {
    /// Base directory for trace storage.
    pub base_dir: PathBuf,
    /// Gate taxonomy configuration.
    pub gate: GateConfig,
    /// Clock supplying event timestamps.
    pub clock: SharedClock,
}

// ============================================================================
// SECTION: Stage Outputs
// ============================================================================

/// Gate stage output with its trace binding.
#[derive(Debug, Clone)]
pub struct GateRun {
    /// Trace the stage wrote into.
    pub trace_id: TraceId,
    /// The gate report.
    pub report: GateReport,
}

/// Enforce stage output with its trace binding.
#[derive(Debug, Clone)]
pub struct EnforceRun {
    /// Trace the stage wrote into.
    pub trace_id: TraceId,
    /// The enforce result.
    pub result: EnforceResult,
}

/// Full governed-request output.
#[derive(Debug, Clone)]
pub struct GovernRun {
    /// Trace capturing the request.
    pub trace_id: TraceId,
    /// Gate stage report.
    pub gate_report: GateReport,
    /// Enforce stage result when a contract was supplied.
    pub enforce_result: Option<EnforceResult>,
    /// Final verdict.
    pub verdict: Verdict,
}

// ============================================================================
// SECTION: Kernel
// ============================================================================

/// Governance kernel facade.
pub struct GovernanceKernel {
    /// Trace ownership registry.
    registry: TraceRegistry,
    /// Gate engine.
    gate: GateEngine,
    /// Clock for event timestamps.
    clock: SharedClock,
}

impl GovernanceKernel {
    /// Creates a kernel from configuration.
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        Self {
            registry: TraceRegistry::new(config.base_dir),
            gate: GateEngine::new(config.gate),
            clock: config.clock,
        }
    }

    /// Returns the trace registry.
    #[must_use]
    pub const fn registry(&self) -> &TraceRegistry {
        &self.registry
    }

    /// Runs the gate stage, opening a trace when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] when the trace cannot be opened or written, or
    /// when the deadline expires.
    pub fn gate(
        &self,
        request: &GateRequest,
        trace_id: Option<TraceId>,
        deadline: Option<&Deadline>,
    ) -> Result<GateRun, KernelError> {
        let (trace_id, handle) = self.obtain(trace_id)?;
        self.check_deadline(&trace_id, &handle, deadline)?;
        let input_hash = canonical_sha256_hex(request)?;
        let start = GateStartPayload {
            input_hash,
            action_count: u64::try_from(request.proposed_actions.len()).unwrap_or(u64::MAX),
        };
        self.append(&handle, EventKind::GateStart, to_value(&start)?)?;
        let report = self.gate.assess(&trace_id, request);
        self.append(&handle, EventKind::GateEnd, to_value(&report)?)?;
        Ok(GateRun {
            trace_id,
            report,
        })
    }

    /// Runs the enforce stage against an open trace.
    ///
    /// When the trace's gate stage degraded and every action passed, the
    /// summary is downgraded to `DEGRADE` to carry the gate outcome forward.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] on contract, trace, or deadline failures.
    pub fn enforce(
        &self,
        trace_id: Option<TraceId>,
        contract: &Contract,
        actions: &[ProposedAction],
        deadline: Option<&Deadline>,
    ) -> Result<EnforceRun, KernelError> {
        let (trace_id, handle) = self.obtain(trace_id)?;
        self.check_deadline(&trace_id, &handle, deadline)?;
        let contract_hash = canonical_sha256_hex(contract)?;
        let start = EnforceStartPayload {
            contract_hash,
            action_count: u64::try_from(actions.len()).unwrap_or(u64::MAX),
        };
        self.append(&handle, EventKind::EnforceStart, to_value(&start)?)?;
        let mut result = match enforce(contract, actions) {
            Ok(result) => result,
            Err(err) => {
                self.seal_with_error(&handle, "CONTRACT_INVALID", &err.to_string());
                return Err(err.into());
            }
        };
        if result.decision_summary == EnforceDecision::Allow
            && self.gate_decision_on_disk(&trace_id) == Some(GateDecision::Degrade)
        {
            result.decision_summary = EnforceDecision::Degrade;
        }
        self.append(&handle, EventKind::EnforceEnd, to_value(&result)?)?;
        Ok(EnforceRun {
            trace_id,
            result,
        })
    }

    /// Runs the verdict stage, writing artifacts and sealing the trace.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] on trace or deadline failures.
    pub fn verdict(
        &self,
        trace_id: &TraceId,
        gate: &GateReport,
        enforce_result: Option<&EnforceResult>,
        deadline: Option<&Deadline>,
    ) -> Result<Verdict, KernelError> {
        let handle = self.registry.checkout(trace_id)?;
        self.check_deadline(trace_id, &handle, deadline)?;
        let evidence_refs = self.evidence_refs(trace_id);
        let verdict = synthesize(VerdictInputs {
            trace_id,
            gate,
            enforce: enforce_result,
            evidence_refs,
        });
        let verdict_value = to_value(&verdict)?;
        let verdict_bytes = canonical_bytes(&verdict_value)?;
        let markdown = render_markdown(&verdict);
        {
            let writer = handle.lock().map_err(|_| KernelError::WriterPoisoned)?;
            writer.write_file(VERDICT_JSON, &verdict_bytes)?;
            writer.write_file(VERDICT_MD, markdown.as_bytes())?;
        }
        self.append(&handle, EventKind::VerdictEmitted, verdict_value)?;
        self.registry.release(trace_id)?;
        Ok(verdict)
    }

    /// Runs the full decision path for one request.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] when any stage fails.
    pub fn govern(
        &self,
        request: &GateRequest,
        contract: Option<&Contract>,
        deadline: Option<&Deadline>,
    ) -> Result<GovernRun, KernelError> {
        let gate_run = self.gate(request, None, deadline)?;
        let enforce_result = match contract {
            Some(contract) => Some(
                self.enforce(
                    Some(gate_run.trace_id.clone()),
                    contract,
                    &request.proposed_actions,
                    deadline,
                )?
                .result,
            ),
            None => None,
        };
        let verdict = self.verdict(
            &gate_run.trace_id,
            &gate_run.report,
            enforce_result.as_ref(),
            deadline,
        )?;
        Ok(GovernRun {
            trace_id: gate_run.trace_id,
            gate_report: gate_run.report,
            enforce_result,
            verdict,
        })
    }

    /// Replays a sealed trace with the supplied payload validator.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Registry`] when a writer still owns the trace,
    /// or [`KernelError::Trace`] when the event log cannot be read.
    pub fn replay(
        &self,
        trace_id: &TraceId,
        validator: Option<&dyn PayloadValidator>,
    ) -> Result<ReplayOutcome, KernelError> {
        if self.registry.checkout(trace_id).is_ok() {
            return Err(KernelError::Registry(RegistryError::AlreadyOwned(
                trace_id.to_string(),
            )));
        }
        let structural = StructuralValidator;
        let engine = ReplayEngine::new(validator.unwrap_or(&structural));
        Ok(engine.replay(&self.registry.trace_dir(trace_id))?)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    /// Opens a fresh trace or checks out the caller's open trace.
    fn obtain(&self, trace_id: Option<TraceId>) -> Result<(TraceId, TraceHandle), KernelError> {
        match trace_id {
            Some(trace_id) => match self.registry.checkout(&trace_id) {
                Ok(handle) => Ok((trace_id, handle)),
                Err(RegistryError::NotOpen(_)) => {
                    Ok(self.registry.open(self.clock.as_ref(), Some(trace_id))?)
                }
                Err(err) => Err(err.into()),
            },
            None => Ok(self.registry.open(self.clock.as_ref(), None)?),
        }
    }

    /// Appends an event through a handle.
    fn append(
        &self,
        handle: &TraceHandle,
        kind: EventKind,
        payload: Value,
    ) -> Result<(), KernelError> {
        let mut writer = handle.lock().map_err(|_| KernelError::WriterPoisoned)?;
        writer.append(self.clock.as_ref(), kind, payload)?;
        Ok(())
    }

    /// Aborts the operation when the deadline expired, sealing the trace.
    fn check_deadline(
        &self,
        trace_id: &TraceId,
        handle: &TraceHandle,
        deadline: Option<&Deadline>,
    ) -> Result<(), KernelError> {
        if deadline.is_some_and(Deadline::expired) {
            self.seal_with_error(handle, "DEADLINE_EXCEEDED", "operation deadline exceeded");
            let _ = self.registry.release(trace_id);
            return Err(KernelError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Best-effort final error event; the trace may already be unwritable.
    fn seal_with_error(&self, handle: &TraceHandle, code: &str, message: &str) {
        let payload = ErrorPayload {
            error_code: code.to_string(),
            message: message.to_string(),
        };
        if let Ok(value) = serde_json::to_value(&payload)
            && let Ok(mut writer) = handle.lock()
        {
            let _ = writer.append(self.clock.as_ref(), EventKind::Error, value);
            writer.seal();
        }
    }

    /// Reads the last gate decision committed to the trace directory.
    fn gate_decision_on_disk(&self, trace_id: &TraceId) -> Option<GateDecision> {
        let loaded = load_events(&self.registry.trace_dir(trace_id)).ok()?;
        let event = loaded.events.iter().rev().find(|event| event.kind == EventKind::GateEnd)?;
        let report: GateReport = serde_json::from_value(event.payload.clone()).ok()?;
        Some(report.decision)
    }

    /// Builds evidence anchors from the committed stage-end events.
    fn evidence_refs(&self, trace_id: &TraceId) -> Vec<String> {
        let mut refs = Vec::new();
        let Ok(loaded) = load_events(&self.registry.trace_dir(trace_id)) else {
            return refs;
        };
        if let Some(event) =
            loaded.events.iter().rev().find(|event| event.kind == EventKind::GateEnd)
        {
            refs.push(format!("events.ndjson#{}", event.seq));
        }
        if let Some(event) =
            loaded.events.iter().rev().find(|event| event.kind == EventKind::EnforceEnd)
        {
            refs.push(format!("events.ndjson#{}", event.seq));
        }
        refs
    }
}

/// Serializes a value into JSON, mapping failures to kernel errors.
fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, KernelError> {
    serde_json::to_value(value).map_err(|err| KernelError::Serialization(err.to_string()))
}
