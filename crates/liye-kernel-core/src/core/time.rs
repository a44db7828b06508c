// liye-kernel-core/src/core/time.rs
// ============================================================================
// Module: LiYe Kernel Time Model
// Description: Clock abstraction and canonical timestamp formatting.
// Purpose: Keep wall-clock reads behind one seam so replay stays deterministic.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Trace events carry ISO-8601 UTC timestamps at millisecond precision. The
//! runtime never reads the wall clock directly; it goes through a [`Clock`]
//! implementation so tests and replay harnesses can supply fixed instants.
//! Replay itself only re-reads timestamps already committed to disk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when formatting timestamps.
#[derive(Debug, Error)]
pub enum TimeError {
    /// Timestamp could not be rendered in the canonical form.
    #[error("failed to format timestamp: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of current time for trace events and facts.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Shared clock handle used across kernel components.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to a fixed instant, for tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// Instant returned by every read.
    pub instant: OffsetDateTime,
}

impl Clock for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        self.instant
    }
}

// ============================================================================
// SECTION: Canonical Formatting
// ============================================================================

/// Formats an instant as ISO-8601 UTC truncated to millisecond precision.
///
/// # Errors
///
/// Returns [`TimeError::Format`] when the instant cannot be rendered.
pub fn format_iso_millis(instant: OffsetDateTime) -> Result<String, TimeError> {
    let millis = u32::from(instant.millisecond());
    let truncated = instant
        .replace_nanosecond(millis.saturating_mul(1_000_000))
        .map_err(|err| TimeError::Format(err.to_string()))?;
    truncated.format(&Rfc3339).map_err(|err| TimeError::Format(err.to_string()))
}

/// Returns unix epoch milliseconds for an instant.
#[must_use]
pub fn unix_millis(instant: OffsetDateTime) -> i128 {
    instant.unix_timestamp_nanos() / 1_000_000
}
