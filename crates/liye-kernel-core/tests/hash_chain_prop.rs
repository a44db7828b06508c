// liye-kernel-core/tests/hash_chain_prop.rs
// ============================================================================
// Module: Hash Chain Property Tests
// Description: Property tests for canonicalization and chain invariants.
// ============================================================================
//! ## Overview
//! Exercises the chain-link invariant and canonical JSON round-trips over
//! arbitrary payloads.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use liye_kernel_core::EventKind;
use liye_kernel_core::FixedClock;
use liye_kernel_core::TraceId;
use liye_kernel_core::TraceWriter;
use liye_kernel_core::hashing::canonical_bytes;
use liye_kernel_core::load_events;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;
use time::macros::datetime;

/// Strategy for flat JSON payload objects.
fn payload_strategy() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 _.-]{0,24}".prop_map(Value::String),
    ];
    proptest::collection::btree_map("[a-z_]{1,12}", scalar, 0 .. 6)
        .prop_map(|map| json!(map))
}

proptest! {
    /// Every committed event recomputes to its own hash and chains to the
    /// previous link.
    #[test]
    fn prop_chain_links_recompute(payloads in proptest::collection::vec(payload_strategy(), 1..8)) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock { instant: datetime!(2026-08-01 00:00:00 UTC) });
        let mut writer = TraceWriter::open(dir.path(), TraceId::new("t-prop")).unwrap();
        for payload in &payloads {
            writer.append(clock.as_ref(), EventKind::GateStart, payload.clone()).unwrap();
        }
        drop(writer);

        let loaded = load_events(dir.path().join("t-prop").as_path()).unwrap();
        prop_assert_eq!(loaded.events.len(), payloads.len());
        let mut prev = String::new();
        for event in &loaded.events {
            prop_assert_eq!(&event.prev_hash, &prev);
            prop_assert_eq!(event.recompute_hash().unwrap(), event.hash.clone());
            prev = event.hash.clone();
        }
    }

    /// Canonical bytes are stable across a parse round-trip.
    #[test]
    fn prop_canonical_round_trip(payload in payload_strategy()) {
        let bytes = canonical_bytes(&payload).unwrap();
        let reparsed: Value = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(&reparsed, &payload);
        let bytes_again = canonical_bytes(&reparsed).unwrap();
        prop_assert_eq!(bytes, bytes_again);
    }
}
