// liye-kernel-contract/src/validator.rs
// ============================================================================
// Module: Contract Validator
// Description: Strict-mode validation of kernel records against frozen schemas.
// Purpose: Gate untrusted input at the MCP boundary and during replay.
// Dependencies: jsonschema, liye-kernel-core
// ============================================================================

//! ## Overview
//! The validator compiles every frozen schema once and answers
//! `validate(kind, value)` with a structured outcome. It also implements the
//! core replay seam, so replay re-validates each event payload against the
//! schema for its declared type rather than a mere structural decode.
//! Validation is a trust boundary and fails closed on compile errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use liye_kernel_core::EventKind;
use liye_kernel_core::PayloadValidator;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::schemas::bundle_manifest_schema;
use crate::schemas::contract_schema;
use crate::schemas::enforce_result_schema;
use crate::schemas::enforce_start_payload_schema;
use crate::schemas::error_payload_schema;
use crate::schemas::gate_report_schema;
use crate::schemas::gate_start_payload_schema;
use crate::schemas::policy_schema;
use crate::schemas::replay_end_payload_schema;
use crate::schemas::replay_start_payload_schema;
use crate::schemas::trace_event_schema;
use crate::schemas::verdict_schema;

// ============================================================================
// SECTION: Schema Kind
// ============================================================================

/// Record kinds the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Gate stage report.
    GateReport,
    /// Enforcement contract.
    Contract,
    /// Hash-chained trace event.
    TraceEvent,
    /// Final verdict.
    Verdict,
    /// Policy bundle manifest.
    BundleManifest,
    /// Learned policy record.
    Policy,
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Validation outcome with collected error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// True when the value satisfied the schema.
    pub valid: bool,
    /// Error messages in document order, empty when valid.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    /// Returns a passing outcome.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building the validator set.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A frozen schema failed to compile.
    #[error("schema {0} failed to compile: {1}")]
    Compile(&'static str, String),
}

// ============================================================================
// SECTION: Contract Validator
// ============================================================================

/// Compiled validator set over the frozen schemas.
pub struct ContractValidator {
    /// Gate report validator.
    gate_report: Validator,
    /// Contract validator.
    contract: Validator,
    /// Trace event validator.
    trace_event: Validator,
    /// Verdict validator.
    verdict: Validator,
    /// Bundle manifest validator.
    bundle_manifest: Validator,
    /// Policy validator.
    policy: Validator,
    /// Gate start payload validator.
    gate_start: Validator,
    /// Enforce start payload validator.
    enforce_start: Validator,
    /// Enforce result payload validator.
    enforce_result: Validator,
    /// Error payload validator.
    error_payload: Validator,
    /// Replay start payload validator.
    replay_start: Validator,
    /// Replay end payload validator.
    replay_end: Validator,
}

impl ContractValidator {
    /// Compiles every frozen schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Compile`] when any schema is invalid; this is a
    /// build defect, never a runtime input condition.
    pub fn new() -> Result<Self, SchemaError> {
        Ok(Self {
            gate_report: compile("gate_report", &gate_report_schema())?,
            contract: compile("contract", &contract_schema())?,
            trace_event: compile("trace_event", &trace_event_schema())?,
            verdict: compile("verdict", &verdict_schema())?,
            bundle_manifest: compile("bundle_manifest", &bundle_manifest_schema())?,
            policy: compile("policy", &policy_schema())?,
            gate_start: compile("gate_start_payload", &gate_start_payload_schema())?,
            enforce_start: compile("enforce_start_payload", &enforce_start_payload_schema())?,
            enforce_result: compile("enforce_result", &enforce_result_schema())?,
            error_payload: compile("error_payload", &error_payload_schema())?,
            replay_start: compile("replay_start_payload", &replay_start_payload_schema())?,
            replay_end: compile("replay_end_payload", &replay_end_payload_schema())?,
        })
    }

    /// Validates a value against the schema for its kind.
    #[must_use]
    pub fn validate(&self, kind: SchemaKind, value: &Value) -> ValidationOutcome {
        let validator = match kind {
            SchemaKind::GateReport => &self.gate_report,
            SchemaKind::Contract => &self.contract,
            SchemaKind::TraceEvent => &self.trace_event,
            SchemaKind::Verdict => &self.verdict,
            SchemaKind::BundleManifest => &self.bundle_manifest,
            SchemaKind::Policy => &self.policy,
        };
        run(validator, value)
    }

    /// Validates an event payload against the schema for its event type.
    #[must_use]
    pub fn validate_payload(&self, kind: EventKind, payload: &Value) -> ValidationOutcome {
        let validator = match kind {
            EventKind::GateStart => &self.gate_start,
            EventKind::GateEnd => &self.gate_report,
            EventKind::EnforceStart => &self.enforce_start,
            EventKind::EnforceEnd => &self.enforce_result,
            EventKind::VerdictEmitted => &self.verdict,
            EventKind::ReplayStart => &self.replay_start,
            EventKind::ReplayEnd => &self.replay_end,
            EventKind::Error => &self.error_payload,
        };
        run(validator, payload)
    }
}

impl PayloadValidator for ContractValidator {
    fn validate(&self, kind: EventKind, payload: &Value) -> Vec<String> {
        self.validate_payload(kind, payload).errors
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compiles one schema under draft 2020-12.
fn compile(name: &'static str, schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| SchemaError::Compile(name, err.to_string()))
}

/// Runs a compiled validator and collects error messages.
fn run(validator: &Validator, value: &Value) -> ValidationOutcome {
    let errors: Vec<String> =
        validator.iter_errors(value).map(|error| error.to_string()).collect();
    ValidationOutcome {
        valid: errors.is_empty(),
        errors,
    }
}
