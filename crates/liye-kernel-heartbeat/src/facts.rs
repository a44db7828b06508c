// liye-kernel-heartbeat/src/facts.rs
// ============================================================================
// Module: Facts Sink
// Description: Append-only JSONL audit facts for the learning control plane.
// Purpose: Guarantee every tick outcome, including SKIP, leaves a record.
// Dependencies: liye-kernel-core, serde
// ============================================================================

//! ## Overview
//! Facts are single-line JSON records appended with `O_APPEND` so concurrent
//! writers may race without corrupting each other's lines. Facts are never
//! rewritten. Sinks mirror the audit-sink pattern: file, memory (tests), and
//! no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use liye_kernel_core::time::Clock;
use liye_kernel_core::time::format_iso_millis;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Fact Record
// ============================================================================

/// One audit fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    /// Fact type label (for example `heartbeat_switch_resolved`).
    pub fact: String,
    /// ISO-8601 UTC timestamp.
    pub ts: String,
    /// Run the fact belongs to, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Fact-specific payload.
    pub payload: Value,
}

impl Fact {
    /// Creates a fact stamped with the clock's current instant.
    #[must_use]
    pub fn new(clock: &dyn Clock, fact: &str, run_id: Option<String>, payload: Value) -> Self {
        Self {
            fact: fact.to_string(),
            ts: format_iso_millis(clock.now_utc()).unwrap_or_default(),
            run_id,
            payload,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Append-only sink for audit facts.
pub trait FactSink: Send + Sync {
    /// Records one fact.
    fn record(&self, fact: &Fact);
}

/// Sink appending JSON lines to a file.
pub struct FileFactSink {
    /// Append-only file handle.
    file: Mutex<std::fs::File>,
}

impl FileFactSink {
    /// Opens the facts file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl FactSink for FileFactSink {
    fn record(&self, fact: &Fact) {
        if let Ok(payload) = serde_json::to_string(fact)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryFactSink {
    /// Recorded facts in order.
    facts: Mutex<Vec<Fact>>,
}

impl MemoryFactSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded facts.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Fact> {
        self.facts.lock().map(|facts| facts.clone()).unwrap_or_default()
    }
}

impl FactSink for MemoryFactSink {
    fn record(&self, fact: &Fact) {
        if let Ok(mut facts) = self.facts.lock() {
            facts.push(fact.clone());
        }
    }
}

/// No-op sink.
pub struct NoopFactSink;

impl FactSink for NoopFactSink {
    fn record(&self, _fact: &Fact) {}
}
