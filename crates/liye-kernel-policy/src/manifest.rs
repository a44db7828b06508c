// liye-kernel-policy/src/manifest.rs
// ============================================================================
// Module: Bundle Manifest
// Description: Strict manifest records for reproducible policy bundles.
// Purpose: Bind every bundled file to its digest and size.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The manifest is the integrity root of a bundle: it names every file with
//! its SHA-256 and size, every included policy with its hash, and the digest
//! of the deterministic content archive. Unknown manifest fields are
//! rejected by the frozen schema before these types ever decode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest file name inside every bundle.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Manifest schema version stamped on new bundles.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Records
// ============================================================================

/// One policy listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedPolicy {
    /// Policy file stem.
    pub name: String,
    /// Lifecycle scope directory (`production` or `candidate`).
    pub scope: String,
    /// Lowercase hex digest of the policy file bytes.
    pub policy_hash: String,
}

/// One file listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Bundle-relative path.
    pub path: String,
    /// Lowercase hex digest of the file bytes.
    pub sha256: String,
    /// File size in bytes.
    pub size: u64,
}

/// Strict bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Semantic bundle version; the patch component auto-increments.
    pub bundle_version: String,
    /// Manifest schema version.
    pub schema_version: String,
    /// ISO-8601 UTC creation time.
    pub created_at: String,
    /// Source revision the bundle was built from.
    pub git_sha: String,
    /// Contract pins carried with the bundle.
    pub contracts: Map<String, Value>,
    /// Digest of the deterministic content archive (manifest excluded).
    pub bundle_sha256: String,
    /// Policies included in this bundle.
    pub included_policies: Vec<IncludedPolicy>,
    /// Every content file with digest and size.
    pub files: Vec<FileEntry>,
}

impl BundleManifest {
    /// Returns the manifest entry for a path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|entry| entry.path == path)
    }

    /// Returns the next bundle version with the patch component bumped.
    #[must_use]
    pub fn next_version(&self) -> String {
        bump_patch(&self.bundle_version)
    }
}

/// Bumps the patch component of a `major.minor.patch` version string.
#[must_use]
pub fn bump_patch(version: &str) -> String {
    let mut parts: Vec<u64> = version.split('.').filter_map(|part| part.parse().ok()).collect();
    if parts.len() != 3 {
        return "1.0.0".to_string();
    }
    parts[2] = parts[2].saturating_add(1);
    format!("{}.{}.{}", parts[0], parts[1], parts[2])
}
