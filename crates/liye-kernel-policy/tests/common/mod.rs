// liye-kernel-policy/tests/common/mod.rs
// ============================================================================
// Module: Policy Test Helpers
// Description: Shared fixtures for bundle and loader tests.
// ============================================================================
//! ## Overview
//! Builds sample policies and valid bundles for the integration tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers shared across integration test binaries."
)]

use std::path::Path;
use std::path::PathBuf;

use liye_kernel_core::hashing::sha256_hex;
use liye_kernel_policy::BundleManifest;
use liye_kernel_policy::FileEntry;
use liye_kernel_policy::IncludedPolicy;
use liye_kernel_policy::MANIFEST_SCHEMA_VERSION;
use liye_kernel_policy::content_sha256;
use liye_kernel_policy::write_bundle;
use serde_json::json;

/// Returns a schema-valid policy document.
pub fn sample_policy(id: &str, domain: &str, tenant: &str) -> serde_json::Value {
    json!({
        "schema_version": "1.0.0",
        "policy_id": id,
        "domain": domain,
        "learned_at": "2026-07-01T00:00:00Z",
        "scope": { "type": "tenant", "keys": { "tenant_id": tenant, "marketplace": "us" } },
        "risk_level": "low",
        "validation_status": "production",
        "confidence": 0.82,
        "preconditions": { "min_runs": 20 },
        "actions": [{
            "action_type": "adjust_price",
            "parameters": { "delta_pct": 2 },
            "dry_run_compatible": true
        }],
        "constraints": { "max_delta_pct": 5 },
        "require_approval": false,
        "rollback_plan": "restore the previous price point",
        "success_signals": { "exec": {}, "operator": {}, "business": {} },
        "evaluation_window_days": 14,
        "expiry_at": "2026-10-01T00:00:00Z",
        "evidence": ["0198a3b2c4d5e6f70123456789abcdef"]
    })
}

/// Serialized content entries for a two-policy bundle.
pub fn sample_content() -> Vec<(String, Vec<u8>)> {
    vec![
        (
            "policies/production/adjust-price.json".to_string(),
            serde_json::to_vec(&sample_policy("pol-price-1", "pricing", "t-9")).unwrap(),
        ),
        (
            "policies/candidate/retitle.json".to_string(),
            serde_json::to_vec(&sample_policy("pol-title-1", "listings", "t-9")).unwrap(),
        ),
    ]
}

/// Builds the manifest for the given content entries.
pub fn manifest_for(content: &[(String, Vec<u8>)]) -> BundleManifest {
    let files = content
        .iter()
        .map(|(path, bytes)| FileEntry {
            path: path.clone(),
            sha256: sha256_hex(bytes),
            size: bytes.len() as u64,
        })
        .collect::<Vec<_>>();
    let included_policies = content
        .iter()
        .map(|(path, bytes)| {
            let mut parts = path.splitn(3, '/');
            let _ = parts.next();
            let scope = parts.next().unwrap().to_string();
            let name = parts.next().unwrap().to_string();
            IncludedPolicy {
                name,
                scope,
                policy_hash: sha256_hex(bytes),
            }
        })
        .collect::<Vec<_>>();
    BundleManifest {
        bundle_version: "1.0.1".to_string(),
        schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
        created_at: "2026-08-01T00:00:00Z".to_string(),
        git_sha: "0badc0de".to_string(),
        contracts: serde_json::Map::new(),
        bundle_sha256: content_sha256(content).unwrap(),
        included_policies,
        files,
    }
}

/// Writes a valid bundle into the directory and returns its path.
pub fn write_sample_bundle(dir: &Path) -> PathBuf {
    let content = sample_content();
    let manifest = manifest_for(&content);
    let output = dir.join("policies.tar.gz");
    write_bundle(&output, &manifest, &content).unwrap();
    output
}
