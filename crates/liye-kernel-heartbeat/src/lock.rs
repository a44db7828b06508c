// liye-kernel-heartbeat/src/lock.rs
// ============================================================================
// Module: Heartbeat Lock
// Description: Best-effort file lock with expiry-based reclamation.
// Purpose: Serialize heartbeat ticks across processes.
// Dependencies: liye-kernel-core, rand, serde
// ============================================================================

//! ## Overview
//! The lock is a JSON file carrying a random lock id and the acquisition
//! time. A fresh runner reclaims locks older than the hard timeout; the
//! reclamation is surfaced to the caller so it can be recorded as a fact.
//! Release deletes the file only when the id still matches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use liye_kernel_core::time::Clock;
use liye_kernel_core::time::format_iso_millis;
use liye_kernel_core::time::unix_millis;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard timeout after which a held lock may be reclaimed.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Lock file name under the state directory.
pub const LOCK_FILE: &str = "heartbeat.lock";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another runner holds a fresh lock.
    #[error("heartbeat lock held by {holder}")]
    Held {
        /// Lock id of the current holder.
        holder: String,
    },
    /// Filesystem failure.
    #[error("lock io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Lock Records
// ============================================================================

/// Persisted lock contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    /// Random lock id for this holder.
    lock_id: String,
    /// ISO-8601 UTC acquisition time.
    acquired_at: String,
    /// Unix milliseconds of acquisition, used for expiry math.
    acquired_at_millis: i64,
}

/// Result of a successful acquisition.
pub struct LockGuard {
    /// Path of the lock file.
    path: PathBuf,
    /// This holder's lock id.
    lock_id: String,
    /// True when an expired lock was reclaimed.
    reclaimed: Option<String>,
}

impl LockGuard {
    /// Returns this holder's lock id.
    #[must_use]
    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    /// Returns the reclaimed holder's lock id, when expiry was applied.
    #[must_use]
    pub fn reclaimed_from(&self) -> Option<&str> {
        self.reclaimed.as_deref()
    }

    /// Releases the lock, deleting the file when the id still matches.
    pub fn release(self) {
        release_if_held(&self.path, &self.lock_id);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release_if_held(&self.path, &self.lock_id);
    }
}

/// Deletes the lock file when it still belongs to the holder.
fn release_if_held(path: &Path, lock_id: &str) {
    let held = fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<LockRecord>(&bytes).ok())
        .is_some_and(|record| record.lock_id == lock_id);
    if held {
        let _ = fs::remove_file(path);
    }
}

// ============================================================================
// SECTION: Acquisition
// ============================================================================

/// Attempts to acquire the heartbeat lock.
///
/// An existing lock older than [`LOCK_TIMEOUT`] (or unparseable) is
/// reclaimed; the previous holder's id is carried on the guard so the caller
/// can record the reclamation.
///
/// # Errors
///
/// Returns [`LockError::Held`] when a fresh lock exists, or
/// [`LockError::Io`] on filesystem failure.
pub fn acquire(state_dir: &Path, clock: &dyn Clock) -> Result<LockGuard, LockError> {
    let path = state_dir.join(LOCK_FILE);
    let now = clock.now_utc();
    let now_millis = i64::try_from(unix_millis(now)).unwrap_or(i64::MAX);

    let mut reclaimed = None;
    if let Ok(bytes) = fs::read(&path) {
        match serde_json::from_slice::<LockRecord>(&bytes) {
            Ok(record) => {
                let age_millis = now_millis.saturating_sub(record.acquired_at_millis);
                let timeout_millis = i64::try_from(LOCK_TIMEOUT.as_millis()).unwrap_or(i64::MAX);
                if age_millis < timeout_millis {
                    return Err(LockError::Held {
                        holder: record.lock_id,
                    });
                }
                reclaimed = Some(record.lock_id);
            }
            // A corrupt lock file is treated as expired.
            Err(_) => reclaimed = Some("<corrupt>".to_string()),
        }
    }

    let lock_id = format!("{:016x}", rand::thread_rng().r#gen::<u64>());
    let record = LockRecord {
        lock_id: lock_id.clone(),
        acquired_at: format_iso_millis(now).unwrap_or_default(),
        acquired_at_millis: now_millis,
    };
    let bytes = serde_json::to_vec(&record).map_err(|err| LockError::Io(err.to_string()))?;
    fs::write(&path, bytes)?;

    Ok(LockGuard {
        path,
        lock_id,
        reclaimed,
    })
}
