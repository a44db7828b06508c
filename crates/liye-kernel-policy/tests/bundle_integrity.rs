// liye-kernel-policy/tests/bundle_integrity.rs
// ============================================================================
// Module: Bundle Integrity Tests
// Description: Tests for deterministic builds and fail-closed verification.
// ============================================================================
//! ## Overview
//! Validates byte-identical rebuilds, digest verification, path guards, and
//! rejection of tampered manifests.

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

mod common;

use std::fs;
use std::path::Path;

use liye_kernel_contract::ContractValidator;
use liye_kernel_policy::BundleError;
use liye_kernel_policy::extract_bundle;
use liye_kernel_policy::validate_relative_path;
use liye_kernel_policy::verify_extracted;
use liye_kernel_policy::write_bundle;

/// Tests two builds over identical inputs are byte-identical.
#[test]
fn test_bundle_build_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let content = common::sample_content();
    let manifest = common::manifest_for(&content);

    let first = dir.path().join("a.tar.gz");
    let second = dir.path().join("b.tar.gz");
    write_bundle(&first, &manifest, &content).unwrap();
    write_bundle(&second, &manifest, &content).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

/// Tests a valid bundle extracts and verifies cleanly.
#[test]
fn test_valid_bundle_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = common::write_sample_bundle(dir.path());
    let scratch = tempfile::tempdir().unwrap();
    let validator = ContractValidator::new().unwrap();

    extract_bundle(&bundle, scratch.path()).unwrap();
    let verified = verify_extracted(scratch.path(), &validator).unwrap();

    assert_eq!(verified.manifest.files.len(), 2);
    assert_eq!(verified.content.len(), 2);
}

/// Tests an altered file digest aborts verification with the path.
#[test]
fn test_altered_file_hash_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let content = common::sample_content();
    let mut manifest = common::manifest_for(&content);
    manifest.files[0].sha256 = "0".repeat(64);
    let bundle = dir.path().join("bad.tar.gz");
    write_bundle(&bundle, &manifest, &content).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let validator = ContractValidator::new().unwrap();
    extract_bundle(&bundle, scratch.path()).unwrap();
    let result = verify_extracted(scratch.path(), &validator);

    match result {
        Err(BundleError::Integrity { path, .. }) => {
            assert_eq!(path, "policies/production/adjust-price.json");
        }
        other => panic!("expected integrity failure, got {other:?}"),
    }
}

/// Tests a manifest with unknown fields is rejected by the schema.
#[test]
fn test_manifest_with_extra_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = common::write_sample_bundle(dir.path());
    let scratch = tempfile::tempdir().unwrap();
    extract_bundle(&bundle, scratch.path()).unwrap();

    let manifest_path = scratch.path().join("manifest.json");
    let mut manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
    manifest["signature"] = serde_json::json!("forged");
    fs::write(&manifest_path, serde_json::to_vec(&manifest).unwrap()).unwrap();

    let validator = ContractValidator::new().unwrap();
    let result = verify_extracted(scratch.path(), &validator);
    assert!(matches!(result, Err(BundleError::Schema { .. })));
}

/// Tests a file outside the manifest listing is rejected.
#[test]
fn test_unlisted_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = common::write_sample_bundle(dir.path());
    let scratch = tempfile::tempdir().unwrap();
    extract_bundle(&bundle, scratch.path()).unwrap();
    fs::write(scratch.path().join("policies").join("stray.json"), b"{}").unwrap();

    let validator = ContractValidator::new().unwrap();
    let result = verify_extracted(scratch.path(), &validator);
    assert!(matches!(result, Err(BundleError::Integrity { .. })));
}

/// Tests traversal and absolute entry paths are rejected.
#[test]
fn test_escaping_entry_paths_are_rejected() {
    assert!(validate_relative_path(Path::new("../escape")).is_err());
    assert!(validate_relative_path(Path::new("/absolute/path")).is_err());
    assert!(validate_relative_path(Path::new("policies/../../etc/passwd")).is_err());
    validate_relative_path(Path::new("policies/production/a.json")).unwrap();
}

/// Tests a tampered bundle digest is rejected.
#[test]
fn test_tampered_bundle_sha256_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let content = common::sample_content();
    let mut manifest = common::manifest_for(&content);
    manifest.bundle_sha256 = "f".repeat(64);
    let bundle = dir.path().join("bad-digest.tar.gz");
    write_bundle(&bundle, &manifest, &content).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let validator = ContractValidator::new().unwrap();
    extract_bundle(&bundle, scratch.path()).unwrap();
    let result = verify_extracted(scratch.path(), &validator);

    match result {
        Err(BundleError::Integrity { path, .. }) => assert_eq!(path, "manifest.json"),
        other => panic!("expected integrity failure, got {other:?}"),
    }
}
