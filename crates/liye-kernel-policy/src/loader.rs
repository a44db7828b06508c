// liye-kernel-policy/src/loader.rs
// ============================================================================
// Module: Policy Loader
// Description: Loading and querying learned policies from bundles or state.
// Purpose: Expose read-only policy snapshots with exact-scope matching.
// Dependencies: liye-kernel-contract, serde_json, serde_yaml, tempfile
// ============================================================================

//! ## Overview
//! The loader reads policies either from a verified bundle (path or the
//! `LIYE_POLICY_BUNDLE` environment variable) or from the local learned-state
//! directories. Bundle extraction happens inside a scoped scratch directory
//! that is removed on every exit path. Any integrity or schema failure aborts
//! the load; no policies are exposed from a bad bundle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use liye_kernel_contract::ContractValidator;
use liye_kernel_contract::SchemaError;
use liye_kernel_contract::SchemaKind;
use serde_json::Value;
use thiserror::Error;

use crate::bundle::BundleError;
use crate::bundle::extract_bundle;
use crate::bundle::verify_extracted;
use crate::policy::Policy;
use crate::policy::ScopeKeys;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming the active policy bundle.
pub const BUNDLE_ENV_VAR: &str = "LIYE_POLICY_BUNDLE";
/// Lifecycle scopes the loader reads.
pub const LOADED_SCOPES: [&str; 2] = ["production", "candidate"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading policies.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Bundle extraction or verification failed.
    #[error(transparent)]
    Bundle(#[from] BundleError),
    /// Frozen schema failed to compile.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A policy file violates the frozen policy schema.
    #[error("policy {path} invalid: {errors:?}")]
    PolicyInvalid {
        /// Offending file path.
        path: String,
        /// Collected schema errors.
        errors: Vec<String>,
    },
    /// Filesystem failure outside bundle handling.
    #[error("loader io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Loader inputs.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Bundle path; when absent the state directories are read.
    pub bundle_path: Option<PathBuf>,
    /// Root of the learned-state policy directories.
    pub state_dir: Option<PathBuf>,
}

impl LoaderConfig {
    /// Builds a config from the environment, preferring the bundle variable.
    #[must_use]
    pub fn from_env(state_dir: Option<PathBuf>) -> Self {
        Self {
            bundle_path: env::var(BUNDLE_ENV_VAR).ok().map(PathBuf::from),
            state_dir,
        }
    }
}

// ============================================================================
// SECTION: Policy Set
// ============================================================================

/// Immutable snapshot of loaded policies.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    /// Loaded policies in path order.
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Returns every loaded policy.
    #[must_use]
    pub fn all(&self) -> &[Policy] {
        &self.policies
    }

    /// Returns policies in the given domain.
    #[must_use]
    pub fn by_domain(&self, domain: &str) -> Vec<&Policy> {
        self.policies.iter().filter(|policy| policy.domain == domain).collect()
    }

    /// Returns policies whose scope keys equal every provided query key.
    #[must_use]
    pub fn match_by_scope(&self, query: &ScopeKeys) -> Vec<&Policy> {
        self.policies.iter().filter(|policy| policy.matches_scope(query)).collect()
    }

    /// Returns policies matching any keyword substring.
    #[must_use]
    pub fn match_by_keywords(&self, keywords: &[String]) -> Vec<&Policy> {
        self.policies.iter().filter(|policy| policy.matches_keywords(keywords)).collect()
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Read-only policy loader.
pub struct PolicyLoader {
    /// Compiled schema validators.
    validator: ContractValidator,
}

impl PolicyLoader {
    /// Creates a loader with freshly compiled schemas.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a frozen schema fails to compile.
    pub fn new() -> Result<Self, LoaderError> {
        Ok(Self {
            validator: ContractValidator::new()?,
        })
    }

    /// Returns the loader's validator for reuse by callers.
    #[must_use]
    pub const fn validator(&self) -> &ContractValidator {
        &self.validator
    }

    /// Loads policies from the configured bundle or state directories.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] on integrity, schema, or filesystem failures.
    pub fn load(&self, config: &LoaderConfig) -> Result<PolicySet, LoaderError> {
        match &config.bundle_path {
            Some(bundle_path) => self.load_bundle(bundle_path),
            None => match &config.state_dir {
                Some(state_dir) => self.load_state_dirs(state_dir),
                None => Ok(PolicySet::default()),
            },
        }
    }

    /// Loads and verifies a bundle inside a scoped scratch directory.
    fn load_bundle(&self, bundle_path: &Path) -> Result<PolicySet, LoaderError> {
        let scratch = tempfile::tempdir().map_err(|err| LoaderError::Io(err.to_string()))?;
        extract_bundle(bundle_path, scratch.path())?;
        let verified = verify_extracted(scratch.path(), &self.validator)?;

        let mut policies = Vec::new();
        for included in &verified.manifest.included_policies {
            let path = format!("policies/{}/{}", included.scope, included.name);
            let Some((_, bytes)) =
                verified.content.iter().find(|(entry_path, _)| entry_path == &path)
            else {
                return Err(BundleError::Integrity {
                    path,
                    message: "included policy missing from files list".to_string(),
                }
                .into());
            };
            let entry = verified.manifest.file(&path).map(|entry| entry.sha256.clone());
            if entry.as_deref() != Some(included.policy_hash.as_str()) {
                return Err(BundleError::Integrity {
                    path,
                    message: "policy_hash does not match the file digest".to_string(),
                }
                .into());
            }
            policies.push(self.decode_policy(&path, bytes)?);
        }
        // Scratch directory is removed when `scratch` drops, on every path.
        Ok(PolicySet {
            policies,
        })
    }

    /// Loads policies from `state/.../policies/{production,candidate}`.
    fn load_state_dirs(&self, state_dir: &Path) -> Result<PolicySet, LoaderError> {
        let mut policies = Vec::new();
        for scope in LOADED_SCOPES {
            let dir = state_dir.join(scope);
            if !dir.is_dir() {
                continue;
            }
            let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| is_policy_file(path))
                .collect();
            paths.sort();
            for path in paths {
                let bytes = fs::read(&path)?;
                policies.push(self.decode_policy(&path.display().to_string(), &bytes)?);
            }
        }
        Ok(PolicySet {
            policies,
        })
    }

    /// Decodes and schema-validates one policy document.
    fn decode_policy(&self, path: &str, bytes: &[u8]) -> Result<Policy, LoaderError> {
        let value: Value = if path.ends_with(".yaml") || path.ends_with(".yml") {
            serde_yaml::from_slice(bytes).map_err(|err| LoaderError::PolicyInvalid {
                path: path.to_string(),
                errors: vec![err.to_string()],
            })?
        } else {
            serde_json::from_slice(bytes).map_err(|err| LoaderError::PolicyInvalid {
                path: path.to_string(),
                errors: vec![err.to_string()],
            })?
        };
        let outcome = self.validator.validate(SchemaKind::Policy, &value);
        if !outcome.valid {
            return Err(LoaderError::PolicyInvalid {
                path: path.to_string(),
                errors: outcome.errors,
            });
        }
        serde_json::from_value(value).map_err(|err| LoaderError::PolicyInvalid {
            path: path.to_string(),
            errors: vec![err.to_string()],
        })
    }
}

/// Returns true for policy document extensions.
fn is_policy_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json" | "yaml" | "yml")
    )
}
