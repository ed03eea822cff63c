//! Upgrader - runs a plan from its persisted current state.
//!
//! Reads the plan's marker, executes the plan from there, and writes the
//! reached state back, so an interrupted upgrade resumes from the last
//! completed transition.

use super::error::MigrationError;
use super::executor::{ExecutedPlan, PlanExecutor};
use super::factory::MigrationFactory;
use super::handle::StoreHandle;
use super::marker::PlanStateStore;
use super::plan::MigrationPlan;
use super::state::State;
use tracing::{info, warn};

/// Result of an upgrade.
#[derive(Debug)]
pub struct UpgradeResult {
    /// State stored before the upgrade, if any.
    pub previous_state: Option<State>,
    /// The plan execution.
    pub executed: ExecutedPlan,
}

impl UpgradeResult {
    /// Whether the plan reached its final state.
    pub fn successful(&self) -> bool {
        self.executed.successful
    }
}

/// Runs one plan against its persisted state marker.
#[derive(Debug, Clone, Copy)]
pub struct Upgrader<'p> {
    plan: &'p MigrationPlan,
}

impl<'p> Upgrader<'p> {
    /// Create an upgrader for `plan`.
    pub fn new(plan: &'p MigrationPlan) -> Self {
        Self { plan }
    }

    /// The plan.
    pub fn plan(&self) -> &'p MigrationPlan {
        self.plan
    }

    /// The stored state of the plan, if any.
    pub fn current_state(&self, markers: &PlanStateStore) -> Result<Option<State>, MigrationError> {
        Ok(markers.get(self.plan.name())?.map(|record| record.state()))
    }

    /// The state the next upgrade starts from.
    pub fn starting_state(&self, current: Option<&State>) -> State {
        match current {
            Some(state) if !self.plan.ignore_current_state() => state.clone(),
            _ => self.plan.initial_state().clone(),
        }
    }

    /// Run the plan from its stored state and store the reached state.
    pub fn execute<F: MigrationFactory>(
        &self,
        executor: &PlanExecutor<F>,
        store: &mut dyn StoreHandle,
        markers: &PlanStateStore,
    ) -> Result<UpgradeResult, MigrationError> {
        let previous_state = self.current_state(markers)?;
        let from = self.starting_state(previous_state.as_ref());

        info!(
            plan = self.plan.name(),
            stored = ?previous_state.as_ref().map(State::as_str),
            from = %from,
            "upgrading"
        );

        let executed = executor.execute_plan(self.plan, &from, store)?;

        if previous_state.as_ref() != Some(&executed.final_state) {
            markers.set(self.plan.name(), &executed.final_state)?;
            markers.flush()?;
        }

        if executed.successful {
            info!(plan = self.plan.name(), state = %executed.final_state, "upgrade complete");
        } else {
            warn!(
                plan = self.plan.name(),
                state = %executed.final_state,
                "upgrade stopped before the final state"
            );
        }

        Ok(UpgradeResult {
            previous_state,
            executed,
        })
    }
}
