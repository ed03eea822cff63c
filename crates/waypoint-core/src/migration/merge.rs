//! Merge builder.
//!
//! Lets two branches of transitions reconverge on one target state:
//!
//! ```ignore
//! plan.from("1.0")
//!     .merge()
//!     .to::<AddTags>("tags")?
//!     .with()?
//!     .to::<AddComments>("comments")?
//!     .as_state("2.0")?;
//! ```
//!
//! Transitions after `with` go through synthetic states and close on the
//! target. The branch-one migrations are then replayed from the last state
//! named after `with`, so installations on either branch reach the target.

use super::error::MigrationError;
use super::kind::{MigrationKind, MigrationType};
use super::plan::MigrationPlan;
use super::state::State;

/// Builds a merge of two branches into one target state.
#[derive(Debug)]
pub struct MergeBuilder<'p> {
    plan: &'p mut MigrationPlan,
    /// Kinds added before `with`, in order.
    migrations: Vec<MigrationKind>,
    /// Last state named after `with`.
    with_last: Option<State>,
    with: bool,
}

impl<'p> MergeBuilder<'p> {
    pub(crate) fn new(plan: &'p mut MigrationPlan) -> Self {
        Self {
            plan,
            migrations: Vec::new(),
            with_last: None,
            with: false,
        }
    }

    /// Add a transition running migration `M`.
    pub fn to<M: MigrationType>(self, target: impl Into<State>) -> Result<Self, MigrationError> {
        self.add(target.into(), MigrationKind::of::<M>(), true)
    }

    /// Add a transition running the migration named by `kind`.
    pub fn to_kind(
        self,
        target: impl Into<State>,
        kind: MigrationKind,
    ) -> Result<Self, MigrationError> {
        self.add(target.into(), kind, false)
    }

    /// Add a transition that runs no migration.
    pub fn to_state(self, target: impl Into<State>) -> Result<Self, MigrationError> {
        self.add(target.into(), MigrationKind::noop(), true)
    }

    /// Start the second branch.
    pub fn with(mut self) -> Result<Self, MigrationError> {
        if self.with {
            return Err(MigrationError::MergeWithCalledTwice {
                plan: self.plan.name().to_string(),
            });
        }
        self.with = true;
        Ok(self)
    }

    /// Close both branches on `target` and return the plan.
    pub fn as_state(self, target: impl Into<State>) -> Result<&'p mut MigrationPlan, MigrationError> {
        if !self.with {
            return Err(MigrationError::MergeAsWithoutWith {
                plan: self.plan.name().to_string(),
            });
        }
        let with_last = self
            .with_last
            .ok_or_else(|| MigrationError::EmptyMergeBranch {
                plan: self.plan.name().to_string(),
            })?;
        let target = target.into();
        let plan = self.plan;

        plan.to_state(target.clone())?;
        plan.from(with_last);
        for kind in self.migrations {
            let next = plan.create_random_state();
            plan.to_kind(next, kind)?;
        }
        plan.to_state(target)?;
        Ok(plan)
    }

    fn add(
        mut self,
        target: State,
        kind: MigrationKind,
        typed: bool,
    ) -> Result<Self, MigrationError> {
        if typed {
            self.plan.register_kind(kind.clone());
        }

        if self.with {
            if target.is_blank() {
                return Err(MigrationError::BlankTargetState {
                    plan: self.plan.name().to_string(),
                });
            }
            let next = self.plan.create_random_state();
            self.plan.to_kind(next, kind)?;
            self.with_last = Some(target.trimmed());
            return Ok(self);
        }

        self.plan.to_kind(target, kind.clone())?;
        self.migrations.push(kind);
        Ok(self)
    }
}
