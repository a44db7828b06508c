// liye-kernel-heartbeat/src/state.rs
// ============================================================================
// Module: Heartbeat State Store
// Description: Single-writer JSON state files for heartbeat and cost meter.
// Purpose: Persist run watermarks, switch overrides, and daily cost usage.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Two small state files live under the heartbeat state directory:
//! `heartbeat_learning_state.json` and `cost_meter_state.json`. They are
//! mutated only while the heartbeat lock is held, written atomically via
//! temp-and-rename, and an unparseable file resolves to the fail-closed
//! default rather than a guess.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::switches::StateOverrides;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Heartbeat learning state file name.
pub const HEARTBEAT_STATE_FILE: &str = "heartbeat_learning_state.json";
/// Cost meter state file name.
pub const COST_STATE_FILE: &str = "cost_meter_state.json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by state persistence.
#[derive(Debug, Error)]
pub enum StateError {
    /// Filesystem failure.
    #[error("state io error: {0}")]
    Io(String),
    /// State file exists but cannot be parsed.
    #[error("state file {0} unparseable: {1}")]
    Unparseable(String, String),
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: State Records
// ============================================================================

/// Persisted heartbeat learning state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatState {
    /// ISO-8601 UTC time of the last completed tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    /// Trace-id watermark of the last discovery window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_discovered: Option<String>,
    /// Content hash of the last built bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_bundle_hash: Option<String>,
    /// Path of the last built bundle, re-verified on every tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_bundle_path: Option<String>,
    /// Version of the last built bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_version: Option<String>,
    /// Switch overrides consulted below the environment.
    #[serde(default)]
    pub switches: StateOverrides,
}

/// Persisted daily cost usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostState {
    /// UTC day the usage belongs to, as `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    /// Units consumed within the day.
    #[serde(default)]
    pub used_units: u64,
    /// Switch overrides consulted below the environment.
    #[serde(default)]
    pub switches: StateOverrides,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// File-backed state store rooted at one directory.
pub struct StateStore {
    /// State directory.
    dir: PathBuf,
}

impl StateStore {
    /// Creates a store rooted at the directory, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
        })
    }

    /// Returns the state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the heartbeat state, defaulting when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Unparseable`] when the file exists but cannot
    /// be decoded; callers fail closed.
    pub fn load_heartbeat(&self) -> Result<HeartbeatState, StateError> {
        self.load(HEARTBEAT_STATE_FILE)
    }

    /// Persists the heartbeat state atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] on write failure.
    pub fn save_heartbeat(&self, state: &HeartbeatState) -> Result<(), StateError> {
        self.save(HEARTBEAT_STATE_FILE, state)
    }

    /// Loads the cost state, defaulting when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Unparseable`] when the file exists but cannot
    /// be decoded; callers fail closed.
    pub fn load_cost(&self) -> Result<CostState, StateError> {
        self.load(COST_STATE_FILE)
    }

    /// Persists the cost state atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] on write failure.
    pub fn save_cost(&self, state: &CostState) -> Result<(), StateError> {
        self.save(COST_STATE_FILE, state)
    }

    /// Loads one state file.
    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StateError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes)
            .map_err(|err| StateError::Unparseable(name.to_string(), err.to_string()))
    }

    /// Writes one state file via temp-and-rename.
    fn save<T: Serialize>(&self, name: &str, state: &T) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(|err| StateError::Io(err.to_string()))?;
        let tmp = self.dir.join(format!(".{name}.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_data()?;
        }
        fs::rename(&tmp, self.dir.join(name))?;
        Ok(())
    }
}
