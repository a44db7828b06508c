// liye-kernel-heartbeat/src/orchestrator.rs
// ============================================================================
// Module: Heartbeat Orchestrator
// Description: Gated, audited execution of one learning tick.
// Purpose: Run the pipeline under switches, cooldown, budget, and the lock.
// Dependencies: liye-kernel-contract, liye-kernel-core, liye-kernel-policy
// ============================================================================

//! ## Overview
//! A tick is straight-line code with explicit early returns: switch
//! resolution, cooldown, cost preflight, lock acquisition, then the learning
//! stages, bundle build-on-change, cost recording, and state update. Every
//! outcome, including each SKIP path, appends a fact so the trail stays
//! auditable. A single `dry_run` flag threads through all stages; dry stages
//! return the same typed reports without touching disk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use liye_kernel_contract::ContractValidator;
use liye_kernel_core::generate_trace_id;
use liye_kernel_core::hashing::sha256_hex;
use liye_kernel_core::time::SharedClock;
use liye_kernel_core::time::format_iso_millis;
use liye_kernel_policy::BundleError;
use liye_kernel_policy::BundleManifest;
use liye_kernel_policy::FileEntry;
use liye_kernel_policy::IncludedPolicy;
use liye_kernel_policy::MANIFEST_SCHEMA_VERSION;
use liye_kernel_policy::ValidationStatus;
use liye_kernel_policy::bump_patch;
use liye_kernel_policy::content_sha256;
use liye_kernel_policy::extract_bundle;
use liye_kernel_policy::verify_extracted;
use liye_kernel_policy::write_bundle;
use serde::Serialize;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cost::CostMeter;
use crate::facts::Fact;
use crate::facts::FactSink;
use crate::lock;
use crate::pipeline::CrystallizerConfig;
use crate::pipeline::Promotion;
use crate::pipeline::StageReport;
use crate::pipeline::completed;
use crate::pipeline::crystallize;
use crate::pipeline::detect_patterns;
use crate::pipeline::discover_runs;
use crate::pipeline::promotion_for;
use crate::pipeline::quarantine_policy;
use crate::pipeline::read_policy_dir;
use crate::pipeline::skipped;
use crate::pipeline::write_policy;
use crate::state::StateStore;
use crate::switches::DenyAction;
use crate::switches::EnvReader;
use crate::switches::NotifyPolicy;
use crate::switches::SwitchResolver;

// ============================================================================
// SECTION: Fact Labels
// ============================================================================

/// Fact recorded for every switch resolution, success or failure.
pub const FACT_SWITCH_RESOLVED: &str = "heartbeat_switch_resolved";
/// Fact recorded for every skipped tick.
pub const FACT_SKIPPED: &str = "heartbeat_skipped";
/// Fact recorded when an expired lock is reclaimed.
pub const FACT_LOCK_RECLAIMED: &str = "heartbeat_lock_reclaimed";
/// Fact recorded per completed stage.
pub const FACT_STAGE: &str = "heartbeat_stage";
/// Fact recorded when a bundle is built.
pub const FACT_BUNDLE_BUILT: &str = "heartbeat_bundle_built";
/// Fact recorded per policy moved to quarantine on integrity failure.
pub const FACT_POLICY_QUARANTINED: &str = "heartbeat_policy_quarantined";
/// Fact recorded when a tick completes.
pub const FACT_COMPLETED: &str = "heartbeat_tick_completed";
/// Fact recorded when a tick fails mid-pipeline.
pub const FACT_FAILED: &str = "heartbeat_tick_failed";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Orchestrator construction inputs.
pub struct HeartbeatConfig {
    /// Directory for state files and the lock.
    pub state_dir: PathBuf,
    /// Trace base directory scanned by discovery.
    pub traces_dir: PathBuf,
    /// Root of the lifecycle policy directories.
    pub policies_dir: PathBuf,
    /// Output directory for built bundles.
    pub bundles_dir: PathBuf,
    /// Crystallizer tunables.
    pub crystallizer: CrystallizerConfig,
    /// Dry-run flag threaded through every stage.
    pub dry_run: bool,
}

// ============================================================================
// SECTION: Tick Report
// ============================================================================

/// Final outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Pipeline ran to completion.
    Completed,
    /// Tick was skipped by a gate.
    Skipped {
        /// Gate that skipped the tick.
        reason: String,
        /// Stable error code when the skip was a failure mode.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
    /// Pipeline aborted mid-run.
    Failed {
        /// Stable error code.
        error_code: String,
        /// Human-readable message.
        message: String,
    },
}

/// Report for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Run identifier for this tick.
    pub run_id: String,
    /// Final outcome.
    pub outcome: TickOutcome,
    /// Stage reports in execution order.
    pub stages: Vec<StageReport>,
    /// Version of the bundle built this tick, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_version: Option<String>,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Heartbeat orchestrator bound to its environment seams.
pub struct HeartbeatOrchestrator<'a> {
    /// Static configuration.
    config: HeartbeatConfig,
    /// State store guarded by the heartbeat lock.
    store: StateStore,
    /// Fact sink.
    facts: &'a dyn FactSink,
    /// Clock for timestamps and cooldown math.
    clock: SharedClock,
    /// Environment seam for switch resolution.
    env: &'a dyn EnvReader,
}

impl<'a> HeartbeatOrchestrator<'a> {
    /// Creates an orchestrator, opening the state directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the state directory cannot be created.
    pub fn new(
        config: HeartbeatConfig,
        facts: &'a dyn FactSink,
        clock: SharedClock,
        env: &'a dyn EnvReader,
    ) -> Result<Self, crate::state::StateError> {
        let store = StateStore::open(config.state_dir.clone())?;
        Ok(Self {
            config,
            store,
            facts,
            clock,
            env,
        })
    }

    /// Runs one gated tick.
    #[must_use]
    pub fn tick(&self) -> TickReport {
        let run_id = generate_trace_id(self.clock.as_ref()).to_string();

        // Gate 1: state and switch resolution, fail-closed.
        let state = match self.store.load_heartbeat() {
            Ok(state) => state,
            Err(err) => {
                return self.skip(&run_id, "state_unparseable", Some("STATE_UNPARSEABLE"), &err.to_string());
            }
        };
        let resolver = SwitchResolver::new(self.env);
        let switches = match resolver.resolve_heartbeat(&state.switches) {
            Ok(switches) => switches,
            Err(err) => {
                self.facts.record(&Fact::new(
                    self.clock.as_ref(),
                    FACT_SWITCH_RESOLVED,
                    Some(run_id.clone()),
                    json!({
                        "error_code": err.code.as_str(),
                        "variable": err.variable,
                        "message": err.message,
                        "action": "SKIP",
                    }),
                ));
                return TickReport {
                    run_id,
                    outcome: TickOutcome::Skipped {
                        reason: "switch_invalid".to_string(),
                        error_code: Some(err.code.as_str().to_string()),
                    },
                    stages: Vec::new(),
                    bundle_version: None,
                };
            }
        };
        self.facts.record(&Fact::new(
            self.clock.as_ref(),
            FACT_SWITCH_RESOLVED,
            Some(run_id.clone()),
            json!({
                "kill_switch": switches.kill_switch,
                "enabled": switches.enabled,
                "notify_policy": switches.notify_policy,
                "cooldown_minutes": switches.cooldown_minutes,
                "action": if switches.kill_switch || !switches.enabled.value { "SKIP" } else { "RUN" },
            }),
        ));
        if switches.kill_switch {
            return self.skip(&run_id, "kill_switch", None, "kill switch engaged");
        }
        if !switches.enabled.value {
            return self.skip(&run_id, "disabled", None, "heartbeat disabled");
        }

        // Gate 2: cooldown.
        if let Some(last_run_at) = state.last_run_at.as_deref()
            && within_cooldown(self.clock.as_ref(), last_run_at, switches.cooldown_minutes.value)
        {
            return self.skip(&run_id, "cooldown", None, "cooldown window active");
        }

        // Gate 3: cost preflight.
        let meter =
            match CostMeter::resolve(self.env, &self.store, self.facts, self.clock.as_ref()) {
                Ok(meter) => meter,
                Err(err) => {
                    return self.skip(&run_id, "cost_config", Some("COST_CONFIG_INVALID"), &err.to_string());
                }
            };
        let projected: Vec<(String, u64)> = [
            "discover",
            "detect_patterns",
            "crystallize",
            "promotion_check",
            "bundle_integrity",
            "bundle_build",
            "notify",
        ]
        .iter()
        .map(|step| ((*step).to_string(), 1))
        .collect();
        let mut notify_suppressed = false;
        match meter.check_budget(&projected) {
            Ok(decision) if !decision.passed => match decision.action {
                DenyAction::SkipAll => {
                    return self.skip(&run_id, "budget_exceeded", Some("COST_BUDGET_EXCEEDED"), "daily budget exhausted");
                }
                DenyAction::SkipNotifyOnly => notify_suppressed = true,
            },
            Ok(_) => {}
            Err(err) => {
                return self.skip(&run_id, "cost_config", Some("COST_CONFIG_INVALID"), &err.to_string());
            }
        }

        // Gate 4: lock.
        let guard = match lock::acquire(self.store.dir(), self.clock.as_ref()) {
            Ok(guard) => guard,
            Err(lock::LockError::Held { holder }) => {
                return self.skip(&run_id, "lock_held", None, &format!("lock held by {holder}"));
            }
            Err(err) => {
                return self.skip(&run_id, "lock_io", Some("LOCK_IO"), &err.to_string());
            }
        };
        if let Some(previous) = guard.reclaimed_from() {
            self.facts.record(&Fact::new(
                self.clock.as_ref(),
                FACT_LOCK_RECLAIMED,
                Some(run_id.clone()),
                json!({ "previous_lock_id": previous, "lock_id": guard.lock_id() }),
            ));
        }

        let report = self.run_pipeline(&run_id, state, &meter, notify_suppressed, switches.notify_policy.value);
        guard.release();
        report
    }

    /// Runs the learning stages under the held lock.
    fn run_pipeline(
        &self,
        run_id: &str,
        mut state: crate::state::HeartbeatState,
        meter: &CostMeter<'_>,
        notify_suppressed: bool,
        notify_policy: NotifyPolicy,
    ) -> TickReport {
        let mut stages = Vec::new();
        let mut completed_steps: Vec<(String, u64)> = Vec::new();
        let dry_run = self.config.dry_run;

        // Stage: discover.
        let runs = match discover_runs(&self.config.traces_dir, state.last_discovered.as_deref()) {
            Ok(runs) => runs,
            Err(err) => return self.fail(run_id, stages, "DISCOVER_IO", &err.to_string()),
        };
        stages.push(self.stage(run_id, completed("discover", json!({ "runs": runs.len() }))));
        completed_steps.push(("discover".to_string(), 1));

        // Stage: detect patterns.
        let buckets = detect_patterns(&runs);
        stages.push(self.stage(
            run_id,
            completed("detect_patterns", json!({ "buckets": buckets.len() })),
        ));
        completed_steps.push(("detect_patterns".to_string(), 1));

        // Stage: crystallize sandbox drafts.
        let now = self.clock.as_ref().now_utc();
        let learned_at = format_iso_millis(now).unwrap_or_default();
        let expiry_at = format_iso_millis(now + Duration::days(90)).unwrap_or_default();
        let drafts = crystallize(&self.config.crystallizer, &buckets, &learned_at, &expiry_at);
        if dry_run {
            stages.push(self.stage(
                run_id,
                completed("crystallize", json!({ "drafts": drafts.len(), "dry_run": true })),
            ));
        } else {
            let sandbox_dir = self.config.policies_dir.join("sandbox");
            for draft in &drafts {
                if let Err(err) = write_policy(&sandbox_dir, draft) {
                    return self.fail(run_id, stages, "CRYSTALLIZE_IO", &err.to_string());
                }
            }
            stages.push(
                self.stage(run_id, completed("crystallize", json!({ "drafts": drafts.len() }))),
            );
        }
        completed_steps.push(("crystallize".to_string(), 1));

        // Stage: promotion check across the lifecycle directories.
        let mut promotions = Vec::new();
        for scope in ["sandbox", "candidate", "production"] {
            let dir = self.config.policies_dir.join(scope);
            let policies = match read_policy_dir(&dir) {
                Ok(policies) => policies,
                Err(err) => return self.fail(run_id, stages, "PROMOTION_IO", &err.to_string()),
            };
            for mut policy in policies {
                let Some(promotion) = promotion_for(&policy) else {
                    continue;
                };
                if !dry_run {
                    policy.validation_status = promotion.to;
                    let target = self.config.policies_dir.join(status_dir(promotion.to));
                    if let Err(err) = write_policy(&target, &policy) {
                        return self.fail(run_id, stages, "PROMOTION_IO", &err.to_string());
                    }
                    let old = dir.join(format!("{}.json", policy.policy_id));
                    let _ = std::fs::remove_file(old);
                }
                promotions.push(promotion);
            }
        }
        stages.push(self.stage(
            run_id,
            completed("promotion_check", json!({ "promotions": promotions })),
        ));
        completed_steps.push(("promotion_check".to_string(), 1));

        // Stage: integrity check over the advertised bundle, quarantining on
        // failure.
        let quarantined = match self.verify_advertised_bundle(run_id, &mut state, dry_run) {
            Ok(transitions) => transitions,
            Err(failure) => {
                return self.fail(run_id, stages, failure.error_code, &failure.message);
            }
        };
        stages.push(self.stage(
            run_id,
            completed("bundle_integrity", json!({ "quarantined": quarantined })),
        ));
        completed_steps.push(("bundle_integrity".to_string(), 1));

        // Stage: bundle build-on-change.
        let bundle_version = match self.build_on_change(run_id, &mut state, dry_run) {
            Ok(version) => version,
            Err(failure) => {
                return self.fail(run_id, stages, failure.error_code, &failure.message);
            }
        };
        let bundle_detail = bundle_version.as_ref().map_or_else(
            || json!({ "changed": false }),
            |version| json!({ "changed": true, "version": version, "dry_run": dry_run }),
        );
        stages.push(self.stage(run_id, completed("bundle_build", bundle_detail)));
        completed_steps.push(("bundle_build".to_string(), 1));

        // Stage: notify, governed by policy and the cost deny action.
        let should_notify = !notify_suppressed
            && match notify_policy {
                NotifyPolicy::Off => false,
                NotifyPolicy::BundleOrError => bundle_version.is_some(),
                NotifyPolicy::Always => true,
            };
        if should_notify {
            stages.push(self.stage(
                run_id,
                completed("notify", json!({ "policy": notify_policy })),
            ));
            completed_steps.push(("notify".to_string(), 1));
        } else {
            stages.push(skipped("notify", if notify_suppressed { "budget deny action" } else { "notify policy" }));
        }

        // Post-run cost recording.
        if let Err(err) = meter.record_costs(run_id, &completed_steps, None) {
            return self.fail(run_id, stages, "COST_RECORD", &err.to_string());
        }

        // State update.
        state.last_run_at = Some(format_iso_millis(self.clock.as_ref().now_utc()).unwrap_or_default());
        if let Some(last) = runs.last() {
            state.last_discovered = Some(last.trace_id.clone());
        }
        if !dry_run
            && let Err(err) = self.store.save_heartbeat(&state)
        {
            return self.fail(run_id, stages, "STATE_SAVE", &err.to_string());
        }

        self.facts.record(&Fact::new(
            self.clock.as_ref(),
            FACT_COMPLETED,
            Some(run_id.to_string()),
            json!({ "stages": stages.len(), "bundle_version": bundle_version }),
        ));
        TickReport {
            run_id: run_id.to_string(),
            outcome: TickOutcome::Completed,
            stages,
            bundle_version,
        }
    }

    /// Re-verifies the advertised bundle, quarantining implicated policies.
    ///
    /// A tampered or schema-invalid bundle triggers the `* -> quarantine`
    /// transition for the policies it names, removes the bad artifact, and
    /// clears the build watermark so the next build starts from the surviving
    /// policy set.
    fn verify_advertised_bundle(
        &self,
        run_id: &str,
        state: &mut crate::state::HeartbeatState,
        dry_run: bool,
    ) -> Result<Vec<Promotion>, StageFailure> {
        let Some(path) = state.last_bundle_path.clone() else {
            return Ok(Vec::new());
        };
        let bundle_path = PathBuf::from(&path);
        if !bundle_path.is_file() {
            // A removed bundle just clears the advertisement.
            state.last_bundle_path = None;
            state.last_bundle_hash = None;
            return Ok(Vec::new());
        }
        let validator = ContractValidator::new()
            .map_err(|err| StageFailure::new("BUNDLE_INTEGRITY", &err.to_string()))?;
        let scratch = tempfile::tempdir()
            .map_err(|err| StageFailure::new("BUNDLE_IO", &err.to_string()))?;
        let verification = extract_bundle(&bundle_path, scratch.path())
            .and_then(|()| verify_extracted(scratch.path(), &validator).map(|_| ()));
        match verification {
            Ok(()) => Ok(Vec::new()),
            Err(err @ (BundleError::Integrity { .. } | BundleError::Schema { .. })) => {
                let transitions = self.quarantine_affected(run_id, &err, dry_run);
                if !dry_run {
                    let _ = std::fs::remove_file(&bundle_path);
                    state.last_bundle_path = None;
                    state.last_bundle_hash = None;
                }
                Ok(transitions)
            }
            Err(err) => Err(StageFailure::new("BUNDLE_IO", &err.to_string())),
        }
    }

    /// Quarantines the policies implicated by a bundle integrity failure.
    ///
    /// A failure naming `policies/<scope>/<file>` implicates that one policy;
    /// a manifest-level failure implicates every bundled policy.
    fn quarantine_affected(
        &self,
        run_id: &str,
        err: &BundleError,
        dry_run: bool,
    ) -> Vec<Promotion> {
        let failing_path = match err {
            BundleError::Integrity {
                path, ..
            }
            | BundleError::Schema {
                path, ..
            } => path.clone(),
            BundleError::Io(_) => String::new(),
        };
        let mut targets: Vec<(String, String)> = Vec::new();
        if let Some(rest) = failing_path.strip_prefix("policies/")
            && let Some((scope, name)) = rest.split_once('/')
        {
            targets.push((scope.to_string(), name.to_string()));
        }
        if targets.is_empty() {
            for scope in ["production", "candidate"] {
                let dir = self.config.policies_dir.join(scope);
                if let Ok(policies) = read_policy_dir(&dir) {
                    for policy in policies {
                        targets.push((scope.to_string(), format!("{}.json", policy.policy_id)));
                    }
                }
            }
        }

        let detail = err.to_string();
        let mut transitions = Vec::new();
        for (scope, name) in targets {
            match quarantine_policy(&self.config.policies_dir, &scope, &name, &detail, dry_run) {
                Ok(Some(transition)) => {
                    self.facts.record(&Fact::new(
                        self.clock.as_ref(),
                        FACT_POLICY_QUARANTINED,
                        Some(run_id.to_string()),
                        json!({
                            "policy_id": transition.policy_id,
                            "from": transition.from,
                            "reason": transition.reason,
                            "dry_run": dry_run,
                        }),
                    ));
                    transitions.push(transition);
                }
                Ok(None) => {}
                Err(move_err) => {
                    self.facts.record(&Fact::new(
                        self.clock.as_ref(),
                        FACT_POLICY_QUARANTINED,
                        Some(run_id.to_string()),
                        json!({ "scope": scope, "file": name, "error": move_err.to_string() }),
                    ));
                }
            }
        }
        transitions
    }

    /// Builds a bundle when the lifecycle content hash changed.
    fn build_on_change(
        &self,
        run_id: &str,
        state: &mut crate::state::HeartbeatState,
        dry_run: bool,
    ) -> Result<Option<String>, StageFailure> {
        let build = |message: &str| StageFailure::new("BUNDLE_BUILD", message);
        let mut content: Vec<(String, Vec<u8>)> = Vec::new();
        let mut included = Vec::new();
        for scope in ["production", "candidate"] {
            let dir = self.config.policies_dir.join(scope);
            let policies = read_policy_dir(&dir).map_err(|err| build(&err.to_string()))?;
            for policy in policies {
                if matches!(
                    policy.validation_status,
                    ValidationStatus::Disabled | ValidationStatus::Quarantine
                ) {
                    continue;
                }
                let bytes = serde_json::to_vec_pretty(&policy)
                    .map_err(|err| build(&err.to_string()))?;
                let name = format!("{}.json", policy.policy_id);
                included.push(IncludedPolicy {
                    name: name.clone(),
                    scope: scope.to_string(),
                    policy_hash: sha256_hex(&bytes),
                });
                content.push((format!("policies/{scope}/{name}"), bytes));
            }
        }
        content.sort_by(|left, right| left.0.cmp(&right.0));
        let hash = content_sha256(&content).map_err(|err| build(&err.to_string()))?;
        if state.last_bundle_hash.as_deref() == Some(hash.as_str()) {
            return Ok(None);
        }

        let version = bump_patch(state.bundle_version.as_deref().unwrap_or("1.0.0"));
        if dry_run {
            return Ok(Some(version));
        }

        let manifest = BundleManifest {
            bundle_version: version.clone(),
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            created_at: format_iso_millis(self.clock.as_ref().now_utc()).unwrap_or_default(),
            git_sha: self.env.var("LIYE_GIT_SHA").unwrap_or_else(|| "unknown".to_string()),
            contracts: serde_json::Map::new(),
            bundle_sha256: hash.clone(),
            included_policies: included,
            files: content
                .iter()
                .map(|(path, bytes)| FileEntry {
                    path: path.clone(),
                    sha256: sha256_hex(bytes),
                    size: bytes.len() as u64,
                })
                .collect(),
        };

        std::fs::create_dir_all(&self.config.bundles_dir)
            .map_err(|err| build(&err.to_string()))?;
        let output = self.config.bundles_dir.join(format!("policy-bundle-{version}.tar.gz"));
        write_bundle(&output, &manifest, &content).map_err(|err| build(&err.to_string()))?;

        // Validate the freshly built bundle before advertising it; a failure
        // here quarantines exactly like a tampered advertised bundle.
        let validator = ContractValidator::new().map_err(|err| build(&err.to_string()))?;
        let scratch =
            tempfile::tempdir().map_err(|err| StageFailure::new("BUNDLE_IO", &err.to_string()))?;
        let verification = extract_bundle(&output, scratch.path())
            .and_then(|()| verify_extracted(scratch.path(), &validator).map(|_| ()));
        if let Err(err) = verification {
            let _ = self.quarantine_affected(run_id, &err, dry_run);
            let _ = std::fs::remove_file(&output);
            return Err(StageFailure::new("BUNDLE_INTEGRITY", &err.to_string()));
        }

        self.facts.record(&Fact::new(
            self.clock.as_ref(),
            FACT_BUNDLE_BUILT,
            Some(run_id.to_string()),
            json!({ "version": version, "bundle_sha256": hash, "path": output.display().to_string() }),
        ));
        state.last_bundle_hash = Some(hash);
        state.last_bundle_path = Some(output.display().to_string());
        state.bundle_version = Some(version.clone());
        Ok(Some(version))
    }

    /// Records a stage fact and passes the report through.
    fn stage(&self, run_id: &str, report: StageReport) -> StageReport {
        self.facts.record(&Fact::new(
            self.clock.as_ref(),
            FACT_STAGE,
            Some(run_id.to_string()),
            json!({ "stage": report.stage, "status": report.status, "detail": report.detail }),
        ));
        report
    }

    /// Records a skip fact and builds the skipped report.
    fn skip(
        &self,
        run_id: &str,
        reason: &str,
        error_code: Option<&str>,
        message: &str,
    ) -> TickReport {
        self.facts.record(&Fact::new(
            self.clock.as_ref(),
            FACT_SKIPPED,
            Some(run_id.to_string()),
            json!({ "reason": reason, "error_code": error_code, "message": message }),
        ));
        TickReport {
            run_id: run_id.to_string(),
            outcome: TickOutcome::Skipped {
                reason: reason.to_string(),
                error_code: error_code.map(ToString::to_string),
            },
            stages: Vec::new(),
            bundle_version: None,
        }
    }

    /// Records a failure fact and builds the failed report.
    fn fail(
        &self,
        run_id: &str,
        stages: Vec<StageReport>,
        error_code: &str,
        message: &str,
    ) -> TickReport {
        self.facts.record(&Fact::new(
            self.clock.as_ref(),
            FACT_FAILED,
            Some(run_id.to_string()),
            json!({ "error_code": error_code, "message": message }),
        ));
        TickReport {
            run_id: run_id.to_string(),
            outcome: TickOutcome::Failed {
                error_code: error_code.to_string(),
                message: message.to_string(),
            },
            stages,
            bundle_version: None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Stage failure carrying its stable error code.
struct StageFailure {
    /// Stable machine-readable code.
    error_code: &'static str,
    /// Human-readable detail.
    message: String,
}

impl StageFailure {
    /// Creates a stage failure.
    fn new(error_code: &'static str, message: &str) -> Self {
        Self {
            error_code,
            message: message.to_string(),
        }
    }
}

/// Returns the lifecycle directory name for a status.
const fn status_dir(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Sandbox => "sandbox",
        ValidationStatus::Candidate => "candidate",
        ValidationStatus::Production => "production",
        ValidationStatus::Disabled => "disabled",
        ValidationStatus::Quarantine => "quarantine",
    }
}

/// Returns true when the cooldown window has not yet elapsed.
fn within_cooldown(
    clock: &dyn liye_kernel_core::time::Clock,
    last_run_at: &str,
    cooldown_minutes: u64,
) -> bool {
    let Ok(last) = OffsetDateTime::parse(last_run_at, &Rfc3339) else {
        // Unparseable watermark fails closed: treat the cooldown as active.
        return true;
    };
    let elapsed = clock.now_utc() - last;
    elapsed < Duration::minutes(i64::try_from(cooldown_minutes).unwrap_or(i64::MAX))
}
