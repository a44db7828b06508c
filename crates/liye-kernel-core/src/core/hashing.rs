// liye-kernel-core/src/core/hashing.rs
// ============================================================================
// Module: LiYe Kernel Canonical Hashing
// Description: RFC 8785 canonical bytes and SHA-256 hex digests.
// Purpose: Produce the digest strings carried in chain links and manifests.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every digest in the kernel is a lowercase hex SHA-256 string over RFC 8785
//! (JCS) canonical bytes: trace-event chain links, verdict artifacts, bundle
//! manifest entries, and stage-start payloads all carry the same string form.
//! The algorithm is fixed; there is no negotiation surface, so digests stay
//! directly comparable across every record that embeds one. Hashing never
//! runs over free-form prose, only over bytes produced here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Algorithm label for the kernel's fixed digest scheme.
pub const HASH_ALGORITHM: &str = "sha256";

/// Length in characters of every digest string.
pub const DIGEST_HEX_LEN: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when producing canonical bytes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonical Bytes
// ============================================================================

/// Returns RFC 8785 canonical JSON bytes for a serializable value.
///
/// These bytes are the only input the kernel ever hashes for JSON records;
/// they are also written verbatim for artifacts that must replay
/// byte-for-byte (`verdict.json`, `replay.json`, `diff.json`).
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

// ============================================================================
// SECTION: Digest Strings
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of raw bytes.
///
/// Used directly for file contents (bundle entries, tar streams); JSON
/// records go through [`canonical_sha256_hex`] instead.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(DIGEST_HEX_LEN);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Returns the digest string of a value's canonical bytes.
///
/// Trace-event chain links and stage-start input digests are computed with
/// this helper, so `hash[i]` is always reproducible from the on-disk fields
/// alone.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_sha256_hex<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    Ok(sha256_hex(&canonical_bytes(value)?))
}
