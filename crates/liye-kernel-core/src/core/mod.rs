// liye-kernel-core/src/core/mod.rs
// ============================================================================
// Module: LiYe Kernel Core Types
// Description: Canonical kernel data structures and hashing primitives.
// Purpose: Provide stable, serializable types for traces, reports, and verdicts.
// Dependencies: serde, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! Core types define the trace event chain, gate reports, contracts, enforce
//! results, and verdicts. These types are the canonical source of truth for
//! any derived API surfaces (MCP tools or embedding hosts) and for the frozen
//! JSON schemas in the contract crate.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod contract;
pub mod event;
pub mod hashing;
pub mod identifiers;
pub mod outcome;
pub mod report;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use contract::Contract;
pub use contract::ContractDefault;
pub use contract::ContractScope;
pub use contract::MatchSpec;
pub use contract::MatchValue;
pub use contract::ProposedAction;
pub use contract::Rule;
pub use contract::RuleEffect;
pub use event::CHAINED_FIELD_NAMES;
pub use event::EventKind;
pub use event::TraceEvent;
pub use event::chain_link_hash;
pub use hashing::DIGEST_HEX_LEN;
pub use hashing::HASH_ALGORITHM;
pub use hashing::canonical_sha256_hex;
pub use hashing::sha256_hex;
pub use identifiers::PolicyId;
pub use identifiers::RiskId;
pub use identifiers::RuleId;
pub use identifiers::TraceId;
pub use outcome::BlockedAction;
pub use outcome::DEFAULT_DENY_RULE_ID;
pub use outcome::EnforceDecision;
pub use outcome::EnforceResult;
pub use outcome::VERDICT_VERSION;
pub use outcome::Verdict;
pub use report::GATE_REPORT_VERSION;
pub use report::GateDecision;
pub use report::GateReport;
pub use report::Risk;
pub use report::Severity;
pub use report::UnknownFinding;
pub use time::Clock;
pub use time::FixedClock;
pub use time::SharedClock;
pub use time::SystemClock;
