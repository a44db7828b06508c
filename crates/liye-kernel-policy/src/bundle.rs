// liye-kernel-policy/src/bundle.rs
// ============================================================================
// Module: Policy Bundle Build and Verify
// Description: Reproducible gzip tarballs of learned policies.
// Purpose: Build byte-identical bundles and verify them fail-closed.
// Dependencies: flate2, liye-kernel-contract, liye-kernel-core, tar
// ============================================================================

//! ## Overview
//! A bundle is a gzip-compressed tar of `manifest.json` plus
//! `policies/{production|candidate}/<policy>.json`. Builds are deterministic:
//! entries are sorted by path, headers are normalized, and the gzip stream
//! carries a zero mtime, so identical inputs produce identical bytes.
//! Extraction validates every entry path before unpacking and verifies the
//! manifest digests afterwards; any mismatch aborts with the offending path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Component;
use std::path::Path;

use flate2::Compression;
use flate2::GzBuilder;
use flate2::read::GzDecoder;
use liye_kernel_contract::ContractValidator;
use liye_kernel_contract::SchemaKind;
use liye_kernel_core::hashing::sha256_hex;
use serde_json::Value;
use tar::Archive;
use tar::Builder;
use tar::EntryType;
use tar::Header;
use thiserror::Error;

use crate::manifest::BundleManifest;
use crate::manifest::MANIFEST_FILE;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building, extracting, or verifying bundles.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Integrity check failed for a specific path.
    #[error("bundle integrity failure at {path}: {message}")]
    Integrity {
        /// Bundle-relative path that failed.
        path: String,
        /// What mismatched.
        message: String,
    },
    /// Manifest or policy rejected by the frozen schema.
    #[error("bundle schema failure at {path}: {errors:?}")]
    Schema {
        /// Bundle-relative path that failed.
        path: String,
        /// Collected schema errors.
        errors: Vec<String>,
    },
    /// Archive or filesystem failure.
    #[error("bundle io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

/// Rejects entry paths that could escape the extraction root.
///
/// # Errors
///
/// Returns [`BundleError::Integrity`] for absolute paths, parent traversal,
/// or non-normal components.
pub fn validate_relative_path(path: &Path) -> Result<(), BundleError> {
    if path.as_os_str().is_empty() {
        return Err(BundleError::Integrity {
            path: String::new(),
            message: "empty entry path".to_string(),
        });
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(BundleError::Integrity {
                    path: path.display().to_string(),
                    message: "entry path escapes the extraction root".to_string(),
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Deterministic Archive
// ============================================================================

/// Builds a deterministic uncompressed tar over sorted `(path, bytes)` pairs.
///
/// Headers are normalized: zero mtime, zero uid/gid, fixed `0o644` mode.
///
/// # Errors
///
/// Returns [`BundleError::Io`] when archive construction fails.
pub fn deterministic_tar(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, BundleError> {
    let mut sorted: Vec<&(String, Vec<u8>)> = entries.iter().collect();
    sorted.sort_by(|left, right| left.0.cmp(&right.0));

    let mut builder = Builder::new(Vec::new());
    for (path, bytes) in sorted {
        let mut header = Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_cksum();
        builder
            .append_data(&mut header, path, bytes.as_slice())
            .map_err(|err| BundleError::Io(err.to_string()))?;
    }
    builder.into_inner().map_err(|err| BundleError::Io(err.to_string()))
}

/// Computes the content digest over the deterministic tar of the entries.
///
/// The manifest itself is excluded so the digest can be recorded inside it.
///
/// # Errors
///
/// Returns [`BundleError::Io`] when archive construction fails.
pub fn content_sha256(entries: &[(String, Vec<u8>)]) -> Result<String, BundleError> {
    let stream = deterministic_tar(entries)?;
    Ok(sha256_hex(&stream))
}

// ============================================================================
// SECTION: Bundle Build
// ============================================================================

/// Writes a reproducible bundle containing the manifest and content entries.
///
/// # Errors
///
/// Returns [`BundleError::Io`] when serialization or the write fails.
pub fn write_bundle(
    output: &Path,
    manifest: &BundleManifest,
    content: &[(String, Vec<u8>)],
) -> Result<(), BundleError> {
    let manifest_bytes =
        serde_jcs::to_vec(manifest).map_err(|err| BundleError::Io(err.to_string()))?;
    let mut entries: Vec<(String, Vec<u8>)> =
        vec![(MANIFEST_FILE.to_string(), manifest_bytes)];
    entries.extend(content.iter().cloned());
    let tar_bytes = deterministic_tar(&entries)?;

    let file = File::create(output)?;
    let mut encoder = GzBuilder::new().mtime(0).write(file, Compression::default());
    encoder.write_all(&tar_bytes)?;
    let file = encoder.finish().map_err(|err| BundleError::Io(err.to_string()))?;
    file.sync_data()?;
    Ok(())
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts a bundle into the scratch root with entry guards applied.
///
/// Only regular files and directories are accepted, and every entry path is
/// validated before it is joined to the root.
///
/// # Errors
///
/// Returns [`BundleError`] on unreadable archives, special entries, or
/// escaping paths.
pub fn extract_bundle(bundle_path: &Path, scratch_root: &Path) -> Result<(), BundleError> {
    let file = File::open(bundle_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    for entry in archive.entries()? {
        let mut entry = entry?;
        match entry.header().entry_type() {
            EntryType::Directory | EntryType::Regular => {}
            _ => {
                return Err(BundleError::Integrity {
                    path: entry.path().map_or_else(
                        |_| "<unreadable>".to_string(),
                        |path| path.display().to_string(),
                    ),
                    message: "bundles may not contain special entries".to_string(),
                });
            }
        }
        let path = entry.path().map_err(|err| BundleError::Io(err.to_string()))?.into_owned();
        validate_relative_path(&path)?;
        let dest = scratch_root.join(&path);
        if entry.header().entry_type() == EntryType::Directory {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&dest)?;
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Manifest plus the verified content read back from the scratch root.
#[derive(Debug)]
pub struct VerifiedBundle {
    /// The validated manifest.
    pub manifest: BundleManifest,
    /// Content entries as `(bundle-relative path, bytes)`, sorted by path.
    pub content: Vec<(String, Vec<u8>)>,
}

/// Validates an extracted bundle against its manifest, fail-closed.
///
/// # Errors
///
/// Returns [`BundleError::Schema`] when the manifest violates the frozen
/// schema, or [`BundleError::Integrity`] naming the first path whose digest,
/// size, or listing mismatches.
pub fn verify_extracted(
    scratch_root: &Path,
    validator: &ContractValidator,
) -> Result<VerifiedBundle, BundleError> {
    let manifest_path = scratch_root.join(MANIFEST_FILE);
    let manifest_bytes = fs::read(&manifest_path).map_err(|_| BundleError::Integrity {
        path: MANIFEST_FILE.to_string(),
        message: "manifest missing from bundle".to_string(),
    })?;
    let manifest_value: Value =
        serde_json::from_slice(&manifest_bytes).map_err(|err| BundleError::Schema {
            path: MANIFEST_FILE.to_string(),
            errors: vec![err.to_string()],
        })?;
    let outcome = validator.validate(SchemaKind::BundleManifest, &manifest_value);
    if !outcome.valid {
        return Err(BundleError::Schema {
            path: MANIFEST_FILE.to_string(),
            errors: outcome.errors,
        });
    }
    let manifest: BundleManifest =
        serde_json::from_value(manifest_value).map_err(|err| BundleError::Schema {
            path: MANIFEST_FILE.to_string(),
            errors: vec![err.to_string()],
        })?;

    let mut content = Vec::new();
    for entry in &manifest.files {
        let bytes =
            fs::read(scratch_root.join(&entry.path)).map_err(|_| BundleError::Integrity {
                path: entry.path.clone(),
                message: "listed file missing from bundle".to_string(),
            })?;
        if bytes.len() as u64 != entry.size {
            return Err(BundleError::Integrity {
                path: entry.path.clone(),
                message: format!("size {} does not match manifest {}", bytes.len(), entry.size),
            });
        }
        let digest = sha256_hex(&bytes);
        if digest != entry.sha256 {
            return Err(BundleError::Integrity {
                path: entry.path.clone(),
                message: "sha256 does not match manifest".to_string(),
            });
        }
        content.push((entry.path.clone(), bytes));
    }

    for extra in walk_files(scratch_root)? {
        if extra != MANIFEST_FILE && manifest.file(&extra).is_none() {
            return Err(BundleError::Integrity {
                path: extra,
                message: "file not listed in manifest".to_string(),
            });
        }
    }

    let digest = content_sha256(&content)?;
    if digest != manifest.bundle_sha256 {
        return Err(BundleError::Integrity {
            path: MANIFEST_FILE.to_string(),
            message: "bundle_sha256 does not match content archive".to_string(),
        });
    }

    content.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(VerifiedBundle {
        manifest,
        content,
    })
}

/// Lists files under a root as bundle-relative forward-slash paths.
fn walk_files(root: &Path) -> Result<Vec<String>, BundleError> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let mut joined = String::new();
                for component in relative.components() {
                    if !joined.is_empty() {
                        joined.push('/');
                    }
                    joined.push_str(&component.as_os_str().to_string_lossy());
                }
                out.push(joined);
            }
        }
    }
    out.sort();
    Ok(out)
}
