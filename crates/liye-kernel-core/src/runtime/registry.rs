// liye-kernel-core/src/runtime/registry.rs
// ============================================================================
// Module: LiYe Kernel Trace Registry
// Description: Mutex-guarded ownership map from trace id to writer.
// Purpose: Enforce the single-writer-per-trace invariant across threads.
// Dependencies: crate::runtime::trace
// ============================================================================

//! ## Overview
//! The registry hands out shared handles to open trace writers. Concurrent
//! traces run in parallel on disjoint ids; a second open of the same id is
//! rejected. Sealed traces are released so replay can read them without
//! racing a writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::TraceId;
use crate::core::time::Clock;
use crate::runtime::trace::TraceError;
use crate::runtime::trace::TraceWriter;
use crate::runtime::trace::generate_trace_id;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another worker owns the trace writer.
    #[error("trace {0} is already owned by a writer")]
    AlreadyOwned(String),
    /// No open writer exists for the trace.
    #[error("trace {0} has no open writer")]
    NotOpen(String),
    /// Registry mutex was poisoned by a panicking thread.
    #[error("trace registry lock poisoned")]
    Poisoned,
    /// Underlying trace failure.
    #[error(transparent)]
    Trace(#[from] TraceError),
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Shared handle to an open trace writer.
pub type TraceHandle = Arc<Mutex<TraceWriter>>;

/// Ownership map gating trace writers behind a mutex.
pub struct TraceRegistry {
    /// Base directory holding all trace directories.
    base_dir: PathBuf,
    /// Open writers keyed by trace id.
    open: Mutex<HashMap<String, TraceHandle>>,
}

impl TraceRegistry {
    /// Creates a registry rooted at the given base directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the base directory for trace storage.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the directory for a trace id without opening it.
    #[must_use]
    pub fn trace_dir(&self, trace_id: &TraceId) -> PathBuf {
        self.base_dir.join(trace_id.as_str())
    }

    /// Opens a new trace, generating an id when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyOwned`] when a writer is already open
    /// for the id, or a [`TraceError`] from directory creation.
    pub fn open(
        &self,
        clock: &dyn Clock,
        trace_id: Option<TraceId>,
    ) -> Result<(TraceId, TraceHandle), RegistryError> {
        let trace_id = trace_id.unwrap_or_else(|| generate_trace_id(clock));
        let mut open = self.open.lock().map_err(|_| RegistryError::Poisoned)?;
        if open.contains_key(trace_id.as_str()) {
            return Err(RegistryError::AlreadyOwned(trace_id.to_string()));
        }
        let writer = TraceWriter::open(&self.base_dir, trace_id.clone())?;
        let handle: TraceHandle = Arc::new(Mutex::new(writer));
        open.insert(trace_id.as_str().to_string(), Arc::clone(&handle));
        Ok((trace_id, handle))
    }

    /// Returns the open handle for a trace id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotOpen`] when no writer is registered.
    pub fn checkout(&self, trace_id: &TraceId) -> Result<TraceHandle, RegistryError> {
        let open = self.open.lock().map_err(|_| RegistryError::Poisoned)?;
        open.get(trace_id.as_str())
            .cloned()
            .ok_or_else(|| RegistryError::NotOpen(trace_id.to_string()))
    }

    /// Releases a sealed trace from the ownership map.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] when the registry mutex is
    /// poisoned. Releasing an unknown id is a no-op.
    pub fn release(&self, trace_id: &TraceId) -> Result<(), RegistryError> {
        let mut open = self.open.lock().map_err(|_| RegistryError::Poisoned)?;
        open.remove(trace_id.as_str());
        Ok(())
    }
}
