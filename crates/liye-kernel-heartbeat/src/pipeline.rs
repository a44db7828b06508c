// liye-kernel-heartbeat/src/pipeline.rs
// ============================================================================
// Module: Learning Pipeline
// Description: Discovery, pattern detection, crystallization, and promotion.
// Purpose: Turn sealed traces into lifecycle-managed policy drafts.
// Dependencies: liye-kernel-core, liye-kernel-policy, serde_json
// ============================================================================

//! ## Overview
//! The pipeline is a linear sequence of stage functions, each returning the
//! same typed report whether running dry or live. Discovery walks the trace
//! base directory using the time-sortable trace-id watermark; detection
//! buckets allowed actions; crystallization drafts sandbox policies; the
//! promotion check advances policies through the lifecycle thresholds and
//! applies the drift guard.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use liye_kernel_core::EnforceResult;
use liye_kernel_core::EventKind;
use liye_kernel_core::PolicyId;
use liye_kernel_core::hashing::canonical_sha256_hex;
use liye_kernel_core::load_events;
use liye_kernel_policy::Policy;
use liye_kernel_policy::PolicyAction;
use liye_kernel_policy::PolicyScope;
use liye_kernel_policy::RiskLevel;
use liye_kernel_policy::ScopeKeys;
use liye_kernel_policy::SuccessSignals;
use liye_kernel_policy::ValidationStatus;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filesystem failure while reading traces or policies.
    #[error("pipeline io error: {0}")]
    Io(String),
    /// Policy file could not be decoded.
    #[error("policy {0} undecodable: {1}")]
    PolicyUndecodable(String, String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Stage Reports
// ============================================================================

/// Outcome label for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage ran to completion.
    Completed,
    /// Stage was skipped by a gate.
    Skipped,
}

/// Uniform report returned by every stage, dry or live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Stage name.
    pub stage: &'static str,
    /// Outcome label.
    pub status: StageStatus,
    /// Stage-specific counters.
    pub detail: Value,
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Summary of one sealed governance run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Trace identifier.
    pub trace_id: String,
    /// Action types allowed by enforcement (or proposed when no contract).
    pub allowed_action_types: Vec<String>,
}

/// Discovers sealed runs newer than the watermark.
///
/// Trace ids sort by creation time, so the watermark comparison is a plain
/// string comparison on directory names.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] when the base directory cannot be read.
pub fn discover_runs(
    traces_dir: &Path,
    watermark: Option<&str>,
) -> Result<Vec<RunSummary>, PipelineError> {
    let mut names: Vec<String> = Vec::new();
    if traces_dir.is_dir() {
        for entry in fs::read_dir(traces_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if watermark.is_some_and(|mark| name.as_str() <= mark) {
                continue;
            }
            if entry.path().join("verdict.json").is_file() {
                names.push(name);
            }
        }
    }
    names.sort();

    let mut runs = Vec::new();
    for name in names {
        let Ok(loaded) = load_events(&traces_dir.join(&name)) else {
            continue;
        };
        let allowed = loaded
            .events
            .iter()
            .rev()
            .find(|event| event.kind == EventKind::EnforceEnd)
            .and_then(|event| {
                serde_json::from_value::<EnforceResult>(event.payload.clone()).ok()
            })
            .map(|result| {
                result.allowed.iter().map(|action| action.action_type.clone()).collect()
            })
            .unwrap_or_default();
        runs.push(RunSummary {
            trace_id: name,
            allowed_action_types: allowed,
        });
    }
    Ok(runs)
}

// ============================================================================
// SECTION: Pattern Detection
// ============================================================================

/// One action-attribute bucket over the discovery window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternBucket {
    /// Action type shared by the bucket.
    pub action_type: String,
    /// Occurrences across the window.
    pub count: u64,
    /// Supporting trace ids.
    pub evidence: Vec<String>,
}

/// Buckets allowed actions by action type.
#[must_use]
pub fn detect_patterns(runs: &[RunSummary]) -> Vec<PatternBucket> {
    let mut buckets: Vec<PatternBucket> = Vec::new();
    for run in runs {
        for action_type in &run.allowed_action_types {
            match buckets.iter_mut().find(|bucket| &bucket.action_type == action_type) {
                Some(bucket) => {
                    bucket.count = bucket.count.saturating_add(1);
                    if !bucket.evidence.contains(&run.trace_id) {
                        bucket.evidence.push(run.trace_id.clone());
                    }
                }
                None => buckets.push(PatternBucket {
                    action_type: action_type.clone(),
                    count: 1,
                    evidence: vec![run.trace_id.clone()],
                }),
            }
        }
    }
    buckets.sort_by(|left, right| left.action_type.cmp(&right.action_type));
    buckets
}

// ============================================================================
// SECTION: Crystallization
// ============================================================================

/// Crystallizer tunables.
#[derive(Debug, Clone)]
pub struct CrystallizerConfig {
    /// Domain stamped on drafted policies.
    pub domain: String,
    /// Minimum bucket support before a draft is cut.
    pub min_support: u64,
    /// Evaluation window stamped on drafts, in days.
    pub evaluation_window_days: u32,
}

impl Default for CrystallizerConfig {
    fn default() -> Self {
        Self {
            domain: "governance".to_string(),
            min_support: 5,
            evaluation_window_days: 14,
        }
    }
}

/// Drafts sandbox policies from qualifying buckets.
///
/// Draft ids are derived from the bucket contents, so re-running over the
/// same window is idempotent.
#[must_use]
pub fn crystallize(
    config: &CrystallizerConfig,
    buckets: &[PatternBucket],
    learned_at: &str,
    expiry_at: &str,
) -> Vec<Policy> {
    let mut drafts = Vec::new();
    for bucket in buckets {
        if bucket.count < config.min_support {
            continue;
        }
        let fingerprint = canonical_sha256_hex(bucket).unwrap_or_default();
        let short = fingerprint.get(.. 8).unwrap_or("00000000");
        drafts.push(Policy {
            schema_version: "1.0.0".to_string(),
            policy_id: PolicyId::new(format!("auto-{}-{short}", bucket.action_type)),
            domain: config.domain.clone(),
            learned_at: learned_at.to_string(),
            scope: PolicyScope {
                scope_type: "global".to_string(),
                keys: ScopeKeys::default(),
            },
            risk_level: RiskLevel::Low,
            validation_status: ValidationStatus::Sandbox,
            confidence: 0.5,
            preconditions: Map::new(),
            actions: vec![PolicyAction {
                action_type: bucket.action_type.clone(),
                parameters: Map::new(),
                dry_run_compatible: true,
            }],
            constraints: Map::new(),
            require_approval: true,
            rollback_plan: "disable the policy and revert to manual review".to_string(),
            success_signals: SuccessSignals {
                exec: Map::new(),
                operator: Map::new(),
                business: Map::new(),
            },
            evaluation_window_days: config.evaluation_window_days,
            expiry_at: expiry_at.to_string(),
            evidence: bucket.evidence.clone(),
            failure_mode_tags: Vec::new(),
        });
    }
    drafts
}

// ============================================================================
// SECTION: Promotion
// ============================================================================

/// One lifecycle transition applied by the promotion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Promotion {
    /// Policy that moved.
    pub policy_id: String,
    /// Status before the check.
    pub from: ValidationStatus,
    /// Status after the check.
    pub to: ValidationStatus,
    /// Threshold that fired.
    pub reason: String,
}

/// Applies the lifecycle thresholds to one policy.
///
/// Returns the transition when a threshold fires.
#[must_use]
pub fn promotion_for(policy: &Policy) -> Option<Promotion> {
    let signals = &policy.success_signals;
    let number = |map: &Map<String, Value>, key: &str| -> f64 {
        map.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    };

    let probe_failures = number(&signals.business, "probe_failures");
    if probe_failures >= 3.0
        && !matches!(
            policy.validation_status,
            ValidationStatus::Disabled | ValidationStatus::Quarantine
        )
    {
        return Some(Promotion {
            policy_id: policy.policy_id.to_string(),
            from: policy.validation_status,
            to: ValidationStatus::Disabled,
            reason: "drift guard: 3 consecutive business-probe failures".to_string(),
        });
    }

    match policy.validation_status {
        ValidationStatus::Sandbox => {
            let successes = number(&signals.exec, "successes");
            let improve_rate = number(&signals.business, "improve_rate");
            let qualified =
                successes >= 20.0 || (successes >= 10.0 && improve_rate >= 0.6);
            (qualified && probe_failures == 0.0).then(|| Promotion {
                policy_id: policy.policy_id.to_string(),
                from: ValidationStatus::Sandbox,
                to: ValidationStatus::Candidate,
                reason: "execution-success threshold met".to_string(),
            })
        }
        ValidationStatus::Candidate => {
            let approvals = number(&signals.operator, "approvals");
            let improvement_pct = number(&signals.business, "improvement_pct");
            let coverage_required = policy
                .constraints
                .get("coverage_required")
                .and_then(Value::as_f64);
            let coverage_ok = coverage_required
                .is_none_or(|required| number(&signals.exec, "coverage_pct") >= required);
            (approvals >= 30.0 && improvement_pct >= 5.0 && coverage_ok).then(|| Promotion {
                policy_id: policy.policy_id.to_string(),
                from: ValidationStatus::Candidate,
                to: ValidationStatus::Production,
                reason: "operator-approval threshold met".to_string(),
            })
        }
        ValidationStatus::Production
        | ValidationStatus::Disabled
        | ValidationStatus::Quarantine => None,
    }
}

// ============================================================================
// SECTION: Quarantine
// ============================================================================

/// Builds the quarantine transition applied on manifest integrity failure.
///
/// Any lifecycle status except quarantine itself transitions; the detail
/// names the failing path or digest so the fact trail stays attributable.
#[must_use]
pub fn quarantine_for(policy: &Policy, detail: &str) -> Option<Promotion> {
    if policy.validation_status == ValidationStatus::Quarantine {
        return None;
    }
    Some(Promotion {
        policy_id: policy.policy_id.to_string(),
        from: policy.validation_status,
        to: ValidationStatus::Quarantine,
        reason: format!("manifest integrity failure: {detail}"),
    })
}

/// Moves one policy file into the quarantine directory.
///
/// The policy's `validation_status` is rewritten before the move. Under
/// `dry_run` the transition is computed but no file moves. Returns the
/// transition, or `None` when the file is gone or already quarantined.
///
/// # Errors
///
/// Returns [`PipelineError`] on unreadable or unwritable policy files.
pub fn quarantine_policy(
    policies_root: &Path,
    scope: &str,
    file_name: &str,
    detail: &str,
    dry_run: bool,
) -> Result<Option<Promotion>, PipelineError> {
    let source = policies_root.join(scope).join(file_name);
    let Ok(bytes) = fs::read(&source) else {
        return Ok(None);
    };
    let mut policy: Policy = serde_json::from_slice(&bytes).map_err(|err| {
        PipelineError::PolicyUndecodable(source.display().to_string(), err.to_string())
    })?;
    let Some(transition) = quarantine_for(&policy, detail) else {
        return Ok(None);
    };
    if !dry_run {
        policy.validation_status = ValidationStatus::Quarantine;
        write_policy(&policies_root.join("quarantine"), &policy)?;
        fs::remove_file(&source)?;
    }
    Ok(Some(transition))
}

// ============================================================================
// SECTION: Policy Directory IO
// ============================================================================

/// Reads every policy document under a lifecycle directory.
///
/// # Errors
///
/// Returns [`PipelineError`] on unreadable directories or undecodable files.
pub fn read_policy_dir(dir: &Path) -> Result<Vec<Policy>, PipelineError> {
    let mut policies = Vec::new();
    if !dir.is_dir() {
        return Ok(policies);
    }
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    paths.sort();
    for path in paths {
        let bytes = fs::read(&path)?;
        let policy = serde_json::from_slice(&bytes).map_err(|err| {
            PipelineError::PolicyUndecodable(path.display().to_string(), err.to_string())
        })?;
        policies.push(policy);
    }
    Ok(policies)
}

/// Writes a policy into a lifecycle directory as canonical JSON.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] on write failure.
pub fn write_policy(dir: &Path, policy: &Policy) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(policy).map_err(|err| PipelineError::Io(err.to_string()))?;
    fs::write(dir.join(format!("{}.json", policy.policy_id)), bytes)?;
    Ok(())
}

/// Builds the stage report payload for a completed stage.
#[must_use]
pub fn completed(stage: &'static str, detail: Value) -> StageReport {
    StageReport {
        stage,
        status: StageStatus::Completed,
        detail,
    }
}

/// Builds the stage report payload for a skipped stage.
#[must_use]
pub fn skipped(stage: &'static str, reason: &str) -> StageReport {
    StageReport {
        stage,
        status: StageStatus::Skipped,
        detail: json!({ "reason": reason }),
    }
}
