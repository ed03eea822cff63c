//! Plan executor - walks a plan from a starting state to its final state.
//!
//! Each transition's migration is built through the factory and run
//! against the store in turn. Authoring, unknown-state and internal errors
//! are returned as `Err` before anything runs (or, for internal errors,
//! as soon as they are detected). A failing migration stops the walk and
//! is reported in the returned [`ExecutedPlan`].

use super::context::{ExpressionState, MigrationContext};
use super::error::MigrationError;
use super::factory::MigrationFactory;
use super::handle::StoreHandle;
use super::kind::MigrationKind;
use super::plan::MigrationPlan;
use super::state::State;
use super::transition::Transition;
use tracing::{debug, error, info};

/// Plan executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Walk the plan without building or running any migration.
    pub dry_run: bool,
    /// Run queued post migrations after the main chain.
    pub run_post_migrations: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            run_post_migrations: true,
        }
    }
}

impl ExecutorConfig {
    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Skip post migrations.
    pub fn without_post_migrations(mut self) -> Self {
        self.run_post_migrations = false;
        self
    }
}

/// Status of one plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Execution has not started.
    NotStarted,
    /// Migrations are running.
    Running,
    /// The final state was reached.
    Completed,
    /// A migration failed.
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::NotStarted => write!(f, "not_started"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a plan execution.
#[derive(Debug)]
pub struct ExecutedPlan {
    /// Name of the executed plan.
    pub plan_name: String,
    /// State the execution started from.
    pub initial_state: State,
    /// Last state reached.
    pub final_state: State,
    /// Whether the final state of the plan was reached.
    pub successful: bool,
    /// Transitions that ran to completion, in order.
    pub completed_transitions: Vec<Transition>,
    /// The failure that stopped the execution.
    pub error: Option<MigrationError>,
}

impl ExecutedPlan {
    /// Execution status.
    pub fn status(&self) -> ExecutionStatus {
        if self.successful {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        }
    }

    /// Convert into the final state, or the error that stopped execution.
    pub fn into_result(self) -> Result<State, MigrationError> {
        if self.successful {
            return Ok(self.final_state);
        }
        Err(self.error.unwrap_or_else(|| {
            MigrationError::internal(format!(
                "plan {} was unsuccessful without an error",
                self.plan_name
            ))
        }))
    }
}

/// Plan executor.
#[derive(Debug)]
pub struct PlanExecutor<F> {
    factory: F,
    config: ExecutorConfig,
}

impl<F: MigrationFactory> PlanExecutor<F> {
    /// Create a new executor.
    pub fn new(factory: F, config: ExecutorConfig) -> Self {
        Self { factory, config }
    }

    /// The migration factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `plan` from `from_state` to its final state.
    pub fn execute_plan(
        &self,
        plan: &MigrationPlan,
        from_state: &State,
        store: &mut dyn StoreHandle,
    ) -> Result<ExecutedPlan, MigrationError> {
        let mut status = ExecutionStatus::NotStarted;
        debug!(plan = plan.name(), %status, "validating plan");

        // Validate before execution
        plan.validate()?;

        let initial_state = from_state.trimmed();
        info!(
            plan = plan.name(),
            from = %display_state(&initial_state),
            dry_run = self.config.dry_run,
            "starting migration plan"
        );

        let mut transition = plan.start_transition(&initial_state)?;

        let mut ctx = MigrationContext::new(plan, store);
        for kind in plan.post_migrations() {
            ctx.add_post_migration_kind(kind.clone());
        }

        status = ExecutionStatus::Running;
        debug!(plan = plan.name(), %status, "execution started");

        let mut current = initial_state.clone();
        let mut completed = Vec::new();

        while let Some(step) = transition {
            info!(
                plan = plan.name(),
                kind = %step.kind(),
                source = %display_state(step.source_state()),
                target = %step.target_state(),
                "executing migration"
            );

            if let Err(e) = self.run_migration(step.kind(), &mut ctx) {
                status = ExecutionStatus::Failed;
                error!(
                    plan = plan.name(),
                    target = %step.target_state(),
                    %status,
                    error = %e,
                    "migration plan failed"
                );
                return Ok(ExecutedPlan {
                    plan_name: plan.name().to_string(),
                    initial_state,
                    final_state: current,
                    successful: false,
                    completed_transitions: completed,
                    error: Some(e),
                });
            }

            completed.push(step.clone());
            current = step.target_state().clone();
            info!(plan = plan.name(), state = %current, "reached state");

            transition = plan.next_transition(&current)?;
        }

        if self.config.run_post_migrations {
            for kind in ctx.take_post_migrations() {
                info!(plan = plan.name(), kind = %kind, "executing post migration");

                if let Err(e) = self.run_migration(&kind, &mut ctx) {
                    status = ExecutionStatus::Failed;
                    error!(
                        plan = plan.name(),
                        kind = %kind,
                        %status,
                        error = %e,
                        "post migration failed"
                    );
                    return Ok(ExecutedPlan {
                        plan_name: plan.name().to_string(),
                        initial_state,
                        final_state: current,
                        successful: false,
                        completed_transitions: completed,
                        error: Some(e),
                    });
                }
            }
        }

        // Validation guarantees every walk ends on the final state.
        let final_state = plan.final_state()?;
        if &current != final_state {
            return Err(MigrationError::internal(format!(
                "plan {}: reached state \"{}\" which is not the final state \"{}\"",
                plan.name(),
                current,
                final_state
            )));
        }

        status = ExecutionStatus::Completed;
        info!(
            plan = plan.name(),
            state = %current,
            transitions = completed.len(),
            %status,
            "migration plan done"
        );

        Ok(ExecutedPlan {
            plan_name: plan.name().to_string(),
            initial_state,
            final_state: current,
            successful: true,
            completed_transitions: completed,
            error: None,
        })
    }

    /// Execute `plan` and return the final state, failing on any error.
    pub fn execute(
        &self,
        plan: &MigrationPlan,
        from_state: &State,
        store: &mut dyn StoreHandle,
    ) -> Result<State, MigrationError> {
        self.execute_plan(plan, from_state, store)?.into_result()
    }

    /// Build and run one migration.
    fn run_migration(
        &self,
        kind: &MigrationKind,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<(), MigrationError> {
        if self.config.dry_run {
            debug!(kind = %kind, "dry run, skipping migration");
            return Ok(());
        }

        let mut migration = self.factory.create(kind, ctx)?;

        migration.run(ctx).map_err(|e| {
            if e.is_incomplete_expression() {
                e
            } else {
                MigrationError::MigrationFailed {
                    kind: kind.clone(),
                    source: Box::new(e),
                }
            }
        })?;

        if let ExpressionState::Building { description } = ctx.expression() {
            let description = description.clone();
            ctx.complete_expression();
            return Err(MigrationError::IncompleteExpression {
                kind: kind.clone(),
                description,
            });
        }

        Ok(())
    }
}

fn display_state(state: &State) -> &str {
    if state.is_blank() {
        "origin"
    } else {
        state.as_str()
    }
}
