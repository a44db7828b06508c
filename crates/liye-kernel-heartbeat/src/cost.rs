// liye-kernel-heartbeat/src/cost.rs
// ============================================================================
// Module: Cost Meter
// Description: Daily budget preflight and post-run cost recording.
// Purpose: Keep learning-pipeline spend inside an auditable daily budget.
// Dependencies: liye-kernel-core, serde
// ============================================================================

//! ## Overview
//! The cost meter resolves its own switch set, detects UTC day rollover,
//! projects tick cost from a weighted step map, and records per-step cost
//! facts after the run. Any configuration failure denies the tick; the
//! denial itself is recorded as a fact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use liye_kernel_core::time::Clock;
use serde::Serialize;
use serde_json::json;

use crate::facts::Fact;
use crate::facts::FactSink;
use crate::state::CostState;
use crate::state::StateError;
use crate::state::StateStore;
use crate::switches::CostSwitches;
use crate::switches::DenyAction;
use crate::switches::EnvReader;
use crate::switches::SwitchError;
use crate::switches::SwitchResolver;
use thiserror::Error;

// ============================================================================
// SECTION: Fact Labels
// ============================================================================

/// Fact recorded when the daily window resets.
pub const FACT_COST_DAY_RESET: &str = "cost_day_reset";
/// Fact recorded when the preflight denies a tick.
pub const FACT_COST_BUDGET_EXCEEDED: &str = "cost_budget_exceeded";
/// Fact recorded per completed step after a run.
pub const FACT_COST_EVENT_RECORDED: &str = "cost_event_recorded";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by cost metering; all deny the tick.
#[derive(Debug, Error)]
pub enum CostError {
    /// Switch resolution failed.
    #[error(transparent)]
    Switch(#[from] SwitchError),
    /// State file failure.
    #[error(transparent)]
    State(#[from] StateError),
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Preflight outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetDecision {
    /// True when the tick may run.
    pub passed: bool,
    /// Action to apply when the budget denies the tick.
    pub action: DenyAction,
    /// Projected cost of the tick in units.
    pub projected_cost: u64,
    /// Budget remaining before the tick, in units.
    pub remaining_budget: u64,
}

// ============================================================================
// SECTION: Cost Meter
// ============================================================================

/// Daily cost meter bound to the shared state store.
pub struct CostMeter<'a> {
    /// Resolved switch set.
    switches: CostSwitches,
    /// State store guarded by the heartbeat lock.
    store: &'a StateStore,
    /// Fact sink.
    facts: &'a dyn FactSink,
    /// Clock for day detection and fact timestamps.
    clock: &'a dyn Clock,
}

impl<'a> CostMeter<'a> {
    /// Resolves the cost switch set and builds a meter.
    ///
    /// # Errors
    ///
    /// Returns [`CostError`] when switches or state cannot be resolved;
    /// callers must deny the tick and record the failure.
    pub fn resolve(
        env: &dyn EnvReader,
        store: &'a StateStore,
        facts: &'a dyn FactSink,
        clock: &'a dyn Clock,
    ) -> Result<Self, CostError> {
        let state = store.load_cost()?;
        let resolver = SwitchResolver::new(env);
        let switches = resolver.resolve_cost(&state.switches)?;
        Ok(Self {
            switches,
            store,
            facts,
            clock,
        })
    }

    /// Returns the resolved switch set.
    #[must_use]
    pub const fn switches(&self) -> &CostSwitches {
        &self.switches
    }

    /// Returns true when metering is switched off entirely.
    #[must_use]
    pub const fn disabled(&self) -> bool {
        self.switches.kill_switch || !self.switches.enabled.value
    }

    /// Checks the projected step counts against the remaining daily budget.
    ///
    /// # Errors
    ///
    /// Returns [`CostError::State`] when the daily state cannot be read or
    /// advanced.
    pub fn check_budget(&self, projected: &[(String, u64)]) -> Result<BudgetDecision, CostError> {
        if self.disabled() {
            return Ok(BudgetDecision {
                passed: true,
                action: self.switches.deny_action.value,
                projected_cost: 0,
                remaining_budget: self.switches.daily_budget_units.value,
            });
        }
        let state = self.rollover()?;
        let projected_cost = self.weigh(projected);
        let remaining_budget =
            self.switches.daily_budget_units.value.saturating_sub(state.used_units);
        let passed = projected_cost <= remaining_budget;
        if !passed {
            self.facts.record(&Fact::new(
                self.clock,
                FACT_COST_BUDGET_EXCEEDED,
                None,
                json!({
                    "projected_cost": projected_cost,
                    "remaining_budget": remaining_budget,
                    "deny_action": self.switches.deny_action.value,
                }),
            ));
        }
        Ok(BudgetDecision {
            passed,
            action: self.switches.deny_action.value,
            projected_cost,
            remaining_budget,
        })
    }

    /// Records the cost of completed steps and updates daily usage.
    ///
    /// # Errors
    ///
    /// Returns [`CostError::State`] when the daily state cannot be written.
    pub fn record_costs(
        &self,
        run_id: &str,
        steps: &[(String, u64)],
        inputs_hash: Option<&str>,
    ) -> Result<u64, CostError> {
        if self.disabled() {
            return Ok(0);
        }
        let mut state = self.rollover()?;
        let mut total = 0u64;
        for (step, count) in steps {
            let cost = self.weight_of(step).saturating_mul(*count);
            total = total.saturating_add(cost);
            self.facts.record(&Fact::new(
                self.clock,
                FACT_COST_EVENT_RECORDED,
                Some(run_id.to_string()),
                json!({
                    "step": step,
                    "count": count,
                    "cost_units": cost,
                    "inputs_hash": inputs_hash,
                }),
            ));
        }
        state.used_units = state.used_units.saturating_add(total);
        self.store.save_cost(&state)?;
        Ok(total)
    }

    /// Advances the daily window, recording the reset fact once per day.
    fn rollover(&self) -> Result<CostState, CostError> {
        let mut state = self.store.load_cost()?;
        let today = self.clock.now_utc().date().to_string();
        if state.day.as_deref() != Some(today.as_str()) {
            if state.day.is_some() {
                self.facts.record(&Fact::new(
                    self.clock,
                    FACT_COST_DAY_RESET,
                    None,
                    json!({ "day": today, "previous_day": state.day }),
                ));
            }
            state.day = Some(today);
            state.used_units = 0;
            self.store.save_cost(&state)?;
        }
        Ok(state)
    }

    /// Sums weighted step counts.
    fn weigh(&self, steps: &[(String, u64)]) -> u64 {
        steps.iter().fold(0u64, |total, (step, count)| {
            total.saturating_add(self.weight_of(step).saturating_mul(*count))
        })
    }

    /// Returns the weight for a step, defaulting to one unit.
    fn weight_of(&self, step: &str) -> u64 {
        self.switches.cost_weights.get(step).copied().unwrap_or(1)
    }
}
