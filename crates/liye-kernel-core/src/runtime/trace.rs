// liye-kernel-core/src/runtime/trace.rs
// ============================================================================
// Module: LiYe Kernel Trace Writer
// Description: Append-only hash-chained trace directories on local disk.
// Purpose: Own one trace run from open to seal with durable, ordered appends.
// Dependencies: crate::core, rand, serde_json
// ============================================================================

//! ## Overview
//! A trace directory captures one governance request. The writer appends
//! hash-chained events to `events.ndjson` with durable writes and exposes
//! atomic artifact writes for the verdict and replay files. After sealing,
//! only the replay pair remains writable. Loading tolerates a truncated
//! final line so crashed traces stay readable; replay reports them as FAIL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::core::EventKind;
use crate::core::TraceEvent;
use crate::core::TraceId;
use crate::core::chain_link_hash;
use crate::core::hashing::HashError;
use crate::core::time::Clock;
use crate::core::time::TimeError;
use crate::core::time::format_iso_millis;
use crate::core::time::unix_millis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File holding the hash-chained event log.
pub const EVENTS_FILE: &str = "events.ndjson";
/// Canonical verdict artifact.
pub const VERDICT_JSON: &str = "verdict.json";
/// Rendered verdict artifact.
pub const VERDICT_MD: &str = "verdict.md";
/// Replay report artifact.
pub const REPLAY_JSON: &str = "replay.json";
/// Replay divergence artifact.
pub const DIFF_JSON: &str = "diff.json";

/// Artifact names writable before sealing.
const WRITABLE_NAMES: [&str; 4] = [VERDICT_JSON, VERDICT_MD, REPLAY_JSON, DIFF_JSON];
/// Artifact names still writable after sealing.
const SEALED_WRITABLE_NAMES: [&str; 2] = [REPLAY_JSON, DIFF_JSON];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by trace creation, appends, and artifact writes.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Trace directory already exists and is non-empty.
    #[error("trace {0} already exists")]
    Exists(String),
    /// Trace has been sealed by a verdict or error event.
    #[error("trace {0} is sealed")]
    Sealed(String),
    /// Artifact name is not in the permitted set.
    #[error("artifact {0} is not permitted")]
    ArtifactNotPermitted(String),
    /// Filesystem failure; fatal for the trace.
    #[error("trace io error: {0}")]
    Io(String),
    /// Canonicalization failure while hashing an event.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Timestamp formatting failure.
    #[error(transparent)]
    Time(#[from] TimeError),
}

impl From<std::io::Error> for TraceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Trace Id Generation
// ============================================================================

/// Generates a time-sortable trace identifier.
///
/// The first 12 hex characters encode unix milliseconds; the remaining 20 are
/// random, giving v7-style ordering without a UUID dependency.
#[must_use]
pub fn generate_trace_id(clock: &dyn Clock) -> TraceId {
    let now = unix_millis(clock.now_utc());
    let millis = u128::try_from(now.max(0)).unwrap_or(0) & 0xffff_ffff_ffff;
    let suffix: u128 = rand::thread_rng().r#gen();
    TraceId::new(format!("{millis:012x}{:020x}", suffix & ((1u128 << 80) - 1)))
}

// ============================================================================
// SECTION: Trace Writer
// ============================================================================

/// Exclusive writer for one trace directory.
///
/// # Invariants
/// - `events.ndjson` line count equals `seq`.
/// - `prev_hash` always carries the last committed chain link.
/// - One trace has at most one writer; the registry enforces exclusivity.
pub struct TraceWriter {
    /// Trace identifier.
    trace_id: TraceId,
    /// Trace directory path.
    dir: PathBuf,
    /// Append-only handle for the event log.
    events: File,
    /// Next sequence number.
    seq: u64,
    /// Chain link of the last committed event, empty before the first.
    prev_hash: String,
    /// Set once a sealing event has been appended.
    sealed: bool,
}

impl TraceWriter {
    /// Opens a fresh trace directory.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Exists`] when the directory exists and is
    /// non-empty, or [`TraceError::Io`] on filesystem failure.
    pub fn open(base_dir: &Path, trace_id: TraceId) -> Result<Self, TraceError> {
        let dir = base_dir.join(trace_id.as_str());
        if dir.exists() {
            let non_empty = fs::read_dir(&dir)?.next().is_some();
            if non_empty {
                return Err(TraceError::Exists(trace_id.to_string()));
            }
        }
        fs::create_dir_all(&dir)?;
        let events = OpenOptions::new().create(true).append(true).open(dir.join(EVENTS_FILE))?;
        Ok(Self {
            trace_id,
            dir,
            events,
            seq: 0,
            prev_hash: String::new(),
            sealed: false,
        })
    }

    /// Returns the trace identifier.
    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Returns the trace directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns true once the trace is sealed.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next_seq(&self) -> u64 {
        self.seq
    }

    /// Appends one hash-chained event with a durable write.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Sealed`] after a sealing event, or
    /// [`TraceError::Io`] when the append cannot be committed.
    pub fn append(
        &mut self,
        clock: &dyn Clock,
        kind: EventKind,
        payload: Value,
    ) -> Result<TraceEvent, TraceError> {
        if self.sealed {
            return Err(TraceError::Sealed(self.trace_id.to_string()));
        }
        let ts = format_iso_millis(clock.now_utc())?;
        let hash =
            chain_link_hash(&self.trace_id, self.seq, &ts, kind, &payload, &self.prev_hash)?;
        let event = TraceEvent {
            trace_id: self.trace_id.clone(),
            seq: self.seq,
            ts,
            kind,
            payload,
            hash: hash.clone(),
            prev_hash: std::mem::take(&mut self.prev_hash),
        };
        let mut line = serde_json::to_vec(&event)
            .map_err(|err| TraceError::Io(format!("event serialization failed: {err}")))?;
        line.push(b'\n');
        let commit = self
            .events
            .write_all(&line)
            .and_then(|()| self.events.flush())
            .and_then(|()| self.events.sync_data());
        if let Err(err) = commit {
            // The chain state is unrecoverable after a torn append.
            self.sealed = true;
            return Err(TraceError::Io(err.to_string()));
        }
        self.prev_hash = hash;
        self.seq = self.seq.saturating_add(1);
        if kind.seals() {
            self.sealed = true;
        }
        Ok(event)
    }

    /// Atomically writes a permitted artifact into the trace directory.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::ArtifactNotPermitted`] for names outside the
    /// allowlist (narrowed to the replay pair after sealing), or
    /// [`TraceError::Io`] on filesystem failure.
    pub fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf, TraceError> {
        let permitted: &[&str] =
            if self.sealed { &SEALED_WRITABLE_NAMES } else { &WRITABLE_NAMES };
        if !permitted.contains(&name) {
            return Err(TraceError::ArtifactNotPermitted(name.to_string()));
        }
        atomic_write(&self.dir, name, content)
    }

    /// Marks the trace sealed. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }
}

// ============================================================================
// SECTION: Atomic Artifact Writes
// ============================================================================

/// Writes `content` to `dir/name` via a temp file and rename.
fn atomic_write(dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf, TraceError> {
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.tmp"));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(content)?;
        file.sync_data()?;
    }
    fs::rename(&tmp, &target)?;
    Ok(target)
}

/// Atomically writes a replay artifact into a sealed trace directory.
///
/// Replay runs read-only over the event log and may only produce
/// `replay.json` and `diff.json`.
///
/// # Errors
///
/// Returns [`TraceError::ArtifactNotPermitted`] for other names, or
/// [`TraceError::Io`] on filesystem failure.
pub fn write_replay_artifact(
    trace_dir: &Path,
    name: &str,
    content: &[u8],
) -> Result<PathBuf, TraceError> {
    if !SEALED_WRITABLE_NAMES.contains(&name) {
        return Err(TraceError::ArtifactNotPermitted(name.to_string()));
    }
    atomic_write(trace_dir, name, content)
}

// ============================================================================
// SECTION: Trace Loading
// ============================================================================

/// Result of loading an event log from disk.
#[derive(Debug, Clone)]
pub struct LoadedTrace {
    /// Parsed events in file order.
    pub events: Vec<TraceEvent>,
    /// True when a trailing incomplete line was dropped.
    pub truncated: bool,
    /// Parse failures for complete lines, as `(line_index, message)`.
    pub malformed: Vec<(usize, String)>,
}

/// Loads `events.ndjson` from a trace directory.
///
/// A trailing line without a newline terminator is treated as a crash
/// artifact and dropped; the caller decides how to surface it.
///
/// # Errors
///
/// Returns [`TraceError::Io`] when the file cannot be read.
pub fn load_events(trace_dir: &Path) -> Result<LoadedTrace, TraceError> {
    let raw = fs::read(trace_dir.join(EVENTS_FILE))?;
    let mut events = Vec::new();
    let mut malformed = Vec::new();
    let truncated = !raw.is_empty() && raw.last() != Some(&b'\n');
    let mut lines: Vec<&[u8]> = raw.split(|byte| *byte == b'\n').collect();
    // split leaves one empty tail for terminated files and the partial line
    // for truncated ones; both are dropped here.
    lines.pop();
    for (index, line) in lines.iter().copied().enumerate() {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<TraceEvent>(line) {
            Ok(event) => events.push(event),
            Err(err) => malformed.push((index, err.to_string())),
        }
    }
    Ok(LoadedTrace {
        events,
        truncated,
        malformed,
    })
}
