// liye-kernel-heartbeat/src/switches.rs
// ============================================================================
// Module: Switch Resolver
// Description: Fail-closed resolution of dual-control runtime switches.
// Purpose: Centralize kill-switch > ENV > state-file > default precedence.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every heartbeat and cost setting resolves through one entry point with a
//! fixed priority: kill-switch, then environment, then the state file, then
//! the baked default. Unparseable environment values never fall through to a
//! weaker source; they fail closed with a stable error code that the
//! orchestrator records as a fact before skipping the tick.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Environment Variables
// ============================================================================

/// Heartbeat enablement switch.
pub const ENV_HEARTBEAT_ENABLED: &str = "LIYE_HEARTBEAT_ENABLED";
/// Heartbeat notification policy.
pub const ENV_HEARTBEAT_NOTIFY_POLICY: &str = "LIYE_HEARTBEAT_NOTIFY_POLICY";
/// Heartbeat cooldown in minutes.
pub const ENV_HEARTBEAT_COOLDOWN_MINUTES: &str = "LIYE_HEARTBEAT_COOLDOWN_MINUTES";
/// Global kill switch.
pub const ENV_KILL_SWITCH: &str = "LIYE_KILL_SWITCH";
/// Cost meter enablement switch.
pub const ENV_COST_METER_ENABLED: &str = "LIYE_COST_METER_ENABLED";
/// Daily cost budget in units.
pub const ENV_COST_DAILY_BUDGET_UNITS: &str = "LIYE_COST_DAILY_BUDGET_UNITS";
/// Cost deny action.
pub const ENV_COST_DENY_ACTION: &str = "LIYE_COST_DENY_ACTION";
/// Cost notification policy.
pub const ENV_COST_NOTIFY_POLICY: &str = "LIYE_COST_NOTIFY_POLICY";
/// Cost meter kill switch.
pub const ENV_COST_KILL_SWITCH: &str = "LIYE_COST_KILL_SWITCH";

/// Valid cooldown range in minutes.
pub const COOLDOWN_MINUTES_RANGE: (u64, u64) = (1, 1440);
/// Valid daily budget range in units.
pub const DAILY_BUDGET_UNITS_RANGE: (u64, u64) = (1, 10_000);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Stable error codes for switch resolution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchErrorCode {
    /// Boolean environment value outside the accepted set.
    EnvBoolInvalid,
    /// Numeric environment value unparseable or out of range.
    EnvNumberOutOfRange,
    /// Notify-policy environment value outside the accepted set.
    EnvNotifyPolicyInvalid,
    /// Deny-action environment value outside the accepted set.
    EnvDenyActionInvalid,
}

impl SwitchErrorCode {
    /// Returns the stable label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnvBoolInvalid => "ENV_BOOL_INVALID",
            Self::EnvNumberOutOfRange => "ENV_NUMBER_OUT_OF_RANGE",
            Self::EnvNotifyPolicyInvalid => "ENV_NOTIFY_POLICY_INVALID",
            Self::EnvDenyActionInvalid => "ENV_DENY_ACTION_INVALID",
        }
    }
}

/// Switch resolution failure; always fail-closed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("switch {variable} invalid: {message}")]
pub struct SwitchError {
    /// Stable error code.
    pub code: SwitchErrorCode,
    /// Offending environment variable.
    pub variable: &'static str,
    /// Human-readable detail.
    pub message: String,
}

// ============================================================================
// SECTION: Value Types
// ============================================================================

/// Notification policy for heartbeat and cost events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Never notify.
    Off,
    /// Notify when a bundle was built or an error occurred.
    #[default]
    BundleOrError,
    /// Notify on every tick.
    Always,
}

/// Action applied when the cost preflight denies a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyAction {
    /// Skip the whole tick.
    #[default]
    SkipAll,
    /// Run the pipeline but suppress notifications.
    SkipNotifyOnly,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchSource {
    /// Kill switch short-circuit.
    KillSwitch,
    /// Environment variable.
    Env,
    /// State-file override.
    State,
    /// Baked default.
    Default,
}

/// A resolved value with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved<T> {
    /// The resolved value.
    pub value: T,
    /// Where it came from.
    pub source: SwitchSource,
}

// ============================================================================
// SECTION: Resolved Switch Sets
// ============================================================================

/// Resolved heartbeat switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatSwitches {
    /// Kill switch engaged.
    pub kill_switch: bool,
    /// Heartbeat enabled.
    pub enabled: Resolved<bool>,
    /// Notification policy.
    pub notify_policy: Resolved<NotifyPolicy>,
    /// Cooldown between ticks in minutes.
    pub cooldown_minutes: Resolved<u64>,
}

/// Resolved cost switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSwitches {
    /// Kill switch engaged.
    pub kill_switch: bool,
    /// Cost metering enabled.
    pub enabled: Resolved<bool>,
    /// Daily budget in units.
    pub daily_budget_units: Resolved<u64>,
    /// Action on budget denial.
    pub deny_action: Resolved<DenyAction>,
    /// Notification policy.
    pub notify_policy: Resolved<NotifyPolicy>,
    /// Per-step cost weights.
    pub cost_weights: BTreeMap<String, u64>,
}

/// State-file switch overrides consulted below the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOverrides {
    /// Kill switch engaged from state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_switch: Option<bool>,
    /// Enabled override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Notify policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_policy: Option<NotifyPolicy>,
    /// Cooldown override in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<u64>,
    /// Daily budget override in units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_budget_units: Option<u64>,
    /// Deny action override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_action: Option<DenyAction>,
}

// ============================================================================
// SECTION: Environment Seam
// ============================================================================

/// Environment reader seam so tests can inject values.
pub trait EnvReader: Send + Sync {
    /// Returns the raw value for a variable, when set.
    fn var(&self, name: &str) -> Option<String>;
}

/// Process environment reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Map-backed environment for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    /// Backing variables.
    pub vars: BTreeMap<String, String>,
}

impl EnvReader for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Default cost weights per pipeline step.
#[must_use]
pub fn default_cost_weights() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("discover".to_string(), 1),
        ("detect_patterns".to_string(), 2),
        ("crystallize".to_string(), 3),
        ("promotion_check".to_string(), 1),
        ("bundle_integrity".to_string(), 1),
        ("bundle_build".to_string(), 5),
        ("notify".to_string(), 1),
    ])
}

/// Switch resolver bound to an environment reader.
pub struct SwitchResolver<'a> {
    /// Environment seam.
    env: &'a dyn EnvReader,
}

impl<'a> SwitchResolver<'a> {
    /// Creates a resolver over the given environment.
    #[must_use]
    pub const fn new(env: &'a dyn EnvReader) -> Self {
        Self {
            env,
        }
    }

    /// Resolves the heartbeat switch set.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError`] with a stable code when any environment value
    /// is unparseable; callers must skip the tick.
    pub fn resolve_heartbeat(
        &self,
        state: &StateOverrides,
    ) -> Result<HeartbeatSwitches, SwitchError> {
        let kill_switch = self.kill_switch(ENV_KILL_SWITCH, state.kill_switch)?;
        Ok(HeartbeatSwitches {
            kill_switch,
            enabled: self.resolve_bool(ENV_HEARTBEAT_ENABLED, state.enabled, true)?,
            notify_policy: self.resolve_notify(
                ENV_HEARTBEAT_NOTIFY_POLICY,
                state.notify_policy,
            )?,
            cooldown_minutes: self.resolve_number(
                ENV_HEARTBEAT_COOLDOWN_MINUTES,
                COOLDOWN_MINUTES_RANGE,
                state.cooldown_minutes,
                60,
            )?,
        })
    }

    /// Resolves the cost switch set.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError`] with a stable code when any environment value
    /// is unparseable; callers must fail closed.
    pub fn resolve_cost(&self, state: &StateOverrides) -> Result<CostSwitches, SwitchError> {
        let kill_switch = self.kill_switch(ENV_COST_KILL_SWITCH, None)?;
        Ok(CostSwitches {
            kill_switch,
            enabled: self.resolve_bool(ENV_COST_METER_ENABLED, state.enabled, true)?,
            daily_budget_units: self.resolve_number(
                ENV_COST_DAILY_BUDGET_UNITS,
                DAILY_BUDGET_UNITS_RANGE,
                state.daily_budget_units,
                1_000,
            )?,
            deny_action: self.resolve_deny_action(ENV_COST_DENY_ACTION, state.deny_action)?,
            notify_policy: self.resolve_notify(ENV_COST_NOTIFY_POLICY, state.notify_policy)?,
            cost_weights: default_cost_weights(),
        })
    }

    /// Resolves a kill switch (env first, then state, default off).
    fn kill_switch(
        &self,
        variable: &'static str,
        state: Option<bool>,
    ) -> Result<bool, SwitchError> {
        match self.env.var(variable) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| SwitchError {
                code: SwitchErrorCode::EnvBoolInvalid,
                variable,
                message: format!("{raw:?} is not a boolean"),
            }),
            None => Ok(state.unwrap_or(false)),
        }
    }

    /// Resolves a boolean with ENV > state > default precedence.
    fn resolve_bool(
        &self,
        variable: &'static str,
        state: Option<bool>,
        default: bool,
    ) -> Result<Resolved<bool>, SwitchError> {
        if let Some(raw) = self.env.var(variable) {
            let value = parse_bool(&raw).ok_or_else(|| SwitchError {
                code: SwitchErrorCode::EnvBoolInvalid,
                variable,
                message: format!("{raw:?} is not a boolean"),
            })?;
            return Ok(Resolved {
                value,
                source: SwitchSource::Env,
            });
        }
        if let Some(value) = state {
            return Ok(Resolved {
                value,
                source: SwitchSource::State,
            });
        }
        Ok(Resolved {
            value: default,
            source: SwitchSource::Default,
        })
    }

    /// Resolves a bounded number with ENV > state > default precedence.
    fn resolve_number(
        &self,
        variable: &'static str,
        range: (u64, u64),
        state: Option<u64>,
        default: u64,
    ) -> Result<Resolved<u64>, SwitchError> {
        if let Some(raw) = self.env.var(variable) {
            let value = raw.trim().parse::<u64>().ok().filter(|value| {
                *value >= range.0 && *value <= range.1
            });
            let value = value.ok_or_else(|| SwitchError {
                code: SwitchErrorCode::EnvNumberOutOfRange,
                variable,
                message: format!("{raw:?} is not a number in [{}, {}]", range.0, range.1),
            })?;
            return Ok(Resolved {
                value,
                source: SwitchSource::Env,
            });
        }
        if let Some(value) = state.filter(|value| *value >= range.0 && *value <= range.1) {
            return Ok(Resolved {
                value,
                source: SwitchSource::State,
            });
        }
        Ok(Resolved {
            value: default,
            source: SwitchSource::Default,
        })
    }

    /// Resolves a notify policy with ENV > state > default precedence.
    fn resolve_notify(
        &self,
        variable: &'static str,
        state: Option<NotifyPolicy>,
    ) -> Result<Resolved<NotifyPolicy>, SwitchError> {
        if let Some(raw) = self.env.var(variable) {
            let value = match raw.trim().to_lowercase().as_str() {
                "off" => NotifyPolicy::Off,
                "bundle_or_error" => NotifyPolicy::BundleOrError,
                "always" => NotifyPolicy::Always,
                _ => {
                    return Err(SwitchError {
                        code: SwitchErrorCode::EnvNotifyPolicyInvalid,
                        variable,
                        message: format!("{raw:?} is not a notify policy"),
                    });
                }
            };
            return Ok(Resolved {
                value,
                source: SwitchSource::Env,
            });
        }
        if let Some(value) = state {
            return Ok(Resolved {
                value,
                source: SwitchSource::State,
            });
        }
        Ok(Resolved {
            value: NotifyPolicy::default(),
            source: SwitchSource::Default,
        })
    }

    /// Resolves a deny action with ENV > state > default precedence.
    fn resolve_deny_action(
        &self,
        variable: &'static str,
        state: Option<DenyAction>,
    ) -> Result<Resolved<DenyAction>, SwitchError> {
        if let Some(raw) = self.env.var(variable) {
            let value = match raw.trim().to_lowercase().as_str() {
                "skip_all" => DenyAction::SkipAll,
                "skip_notify_only" => DenyAction::SkipNotifyOnly,
                _ => {
                    return Err(SwitchError {
                        code: SwitchErrorCode::EnvDenyActionInvalid,
                        variable,
                        message: format!("{raw:?} is not a deny action"),
                    });
                }
            };
            return Ok(Resolved {
                value,
                source: SwitchSource::Env,
            });
        }
        if let Some(value) = state {
            return Ok(Resolved {
                value,
                source: SwitchSource::State,
            });
        }
        Ok(Resolved {
            value: DenyAction::default(),
            source: SwitchSource::Default,
        })
    }
}

// ============================================================================
// SECTION: Boolean Parsing
// ============================================================================

/// Parses the accepted boolean spellings, case-insensitively.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
