//! Per-execution migration context.

use super::error::MigrationError;
use super::expression::SqlExpression;
use super::handle::StoreHandle;
use super::kind::{MigrationKind, MigrationType};
use super::plan::MigrationPlan;

/// Whether a fluent expression is being built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpressionState {
    /// No expression is pending.
    #[default]
    Idle,
    /// An expression was started and has not run yet.
    Building {
        /// What the expression does, for error messages.
        description: String,
    },
}

/// Mutable bookkeeping shared by all migrations of one plan execution.
pub struct MigrationContext<'a> {
    plan: &'a MigrationPlan,
    store: &'a mut dyn StoreHandle,
    index: usize,
    expression: ExpressionState,
    post_migrations: Vec<MigrationKind>,
}

impl<'a> MigrationContext<'a> {
    /// Create a context for one execution of `plan` against `store`.
    pub fn new(plan: &'a MigrationPlan, store: &'a mut dyn StoreHandle) -> Self {
        Self {
            plan,
            store,
            index: 0,
            expression: ExpressionState::Idle,
            post_migrations: Vec::new(),
        }
    }

    /// The plan being executed.
    pub fn plan(&self) -> &'a MigrationPlan {
        self.plan
    }

    /// The store being migrated.
    pub fn store(&mut self) -> &mut (dyn StoreHandle + 'a) {
        &mut *self.store
    }

    /// Number of store operations executed so far.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Advance the operation counter, returning the new value.
    pub fn next_index(&mut self) -> usize {
        self.index += 1;
        self.index
    }

    /// The current expression state.
    pub fn expression(&self) -> &ExpressionState {
        &self.expression
    }

    /// Check whether an expression is pending.
    pub fn is_building_expression(&self) -> bool {
        matches!(self.expression, ExpressionState::Building { .. })
    }

    /// Mark the start of a fluent expression.
    ///
    /// Fails if the previous expression has not run.
    pub fn begin_expression(&mut self, description: impl Into<String>) -> Result<(), MigrationError> {
        if let ExpressionState::Building { description } = &self.expression {
            return Err(MigrationError::ExpressionInProgress {
                description: description.clone(),
            });
        }
        self.expression = ExpressionState::Building {
            description: description.into(),
        };
        Ok(())
    }

    /// Mark the pending expression as finalized.
    pub fn complete_expression(&mut self) {
        self.expression = ExpressionState::Idle;
    }

    /// Start a raw statement expression.
    ///
    /// The statement only runs when [`SqlExpression::execute`] is called.
    pub fn sql(&mut self, statement: impl Into<String>) -> Result<SqlExpression<'_, 'a>, MigrationError> {
        let statement = statement.into();
        self.begin_expression(format!("execute sql: {}", statement))?;
        Ok(SqlExpression::new(self, statement))
    }

    /// Queue migration `M` to run once after the main chain.
    pub fn add_post_migration<M: MigrationType>(&mut self) {
        self.post_migrations.push(MigrationKind::of::<M>());
    }

    /// Queue the migration named by `kind` to run once after the main chain.
    pub fn add_post_migration_kind(&mut self, kind: MigrationKind) {
        self.post_migrations.push(kind);
    }

    /// Post migrations queued so far.
    pub fn post_migrations(&self) -> &[MigrationKind] {
        &self.post_migrations
    }

    /// Drain the queue, keeping the first occurrence of each kind.
    pub(crate) fn take_post_migrations(&mut self) -> Vec<MigrationKind> {
        let mut unique: Vec<MigrationKind> = Vec::new();
        for kind in self.post_migrations.drain(..) {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        unique
    }
}

impl std::fmt::Debug for MigrationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("plan", &self.plan.name())
            .field("index", &self.index)
            .field("expression", &self.expression)
            .field("post_migrations", &self.post_migrations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::handle::RecordingStore;

    #[test]
    fn test_expression_guard() {
        let plan = MigrationPlan::new("Test");
        let mut store = RecordingStore::new();
        let mut ctx = MigrationContext::new(&plan, &mut store);

        assert!(!ctx.is_building_expression());
        ctx.begin_expression("alter table users").unwrap();
        assert!(ctx.is_building_expression());

        let err = ctx.begin_expression("alter table posts").unwrap_err();
        assert!(matches!(err, MigrationError::ExpressionInProgress { .. }));
        assert!(err.to_string().contains("alter table users"));

        ctx.complete_expression();
        assert_eq!(ctx.expression(), &ExpressionState::Idle);
        ctx.begin_expression("alter table posts").unwrap();
    }

    #[test]
    fn test_post_migrations_deduplicate_keeping_first() {
        let plan = MigrationPlan::new("Test");
        let mut store = RecordingStore::new();
        let mut ctx = MigrationContext::new(&plan, &mut store);

        ctx.add_post_migration_kind(MigrationKind::named("B"));
        ctx.add_post_migration_kind(MigrationKind::named("A"));
        ctx.add_post_migration_kind(MigrationKind::named("B"));

        let kinds = ctx.take_post_migrations();
        assert_eq!(kinds, [MigrationKind::named("B"), MigrationKind::named("A")]);
        assert!(ctx.post_migrations().is_empty());
    }

    #[test]
    fn test_index() {
        let plan = MigrationPlan::new("Test");
        let mut store = RecordingStore::new();
        let mut ctx = MigrationContext::new(&plan, &mut store);

        assert_eq!(ctx.index(), 0);
        assert_eq!(ctx.next_index(), 1);
        assert_eq!(ctx.index(), 1);
        assert_eq!(ctx.plan().name(), "Test");
    }
}
