//! Fluent store expressions.
//!
//! An expression flips its context into the building state when created
//! and back to idle when executed. A migration that drops an expression
//! without executing it is caught by the executor.

use super::context::MigrationContext;
use super::error::MigrationError;

/// A batch of raw statements waiting to run.
#[must_use = "an expression does nothing until execute() is called"]
pub struct SqlExpression<'c, 'a> {
    ctx: &'c mut MigrationContext<'a>,
    statements: Vec<String>,
}

impl<'c, 'a> SqlExpression<'c, 'a> {
    pub(crate) fn new(ctx: &'c mut MigrationContext<'a>, statement: String) -> Self {
        Self {
            ctx,
            statements: vec![statement],
        }
    }

    /// Append another statement to the batch.
    pub fn and(mut self, statement: impl Into<String>) -> Self {
        self.statements.push(statement.into());
        self
    }

    /// Statements queued so far.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Run every statement, returning the total affected count.
    pub fn execute(self) -> Result<u64, MigrationError> {
        self.ctx.complete_expression();

        let mut affected = 0;
        for statement in &self.statements {
            let index = self.ctx.next_index();
            tracing::debug!(index, statement = %statement, "executing statement");
            affected += self.ctx.store().execute(statement)?;
        }
        Ok(affected)
    }
}

impl std::fmt::Debug for SqlExpression<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlExpression")
            .field("statements", &self.statements)
            .finish()
    }
}
