//! Migration-specific error types.

use super::handle::StoreError;
use super::kind::MigrationKind;
use super::state::State;
use thiserror::Error;

/// Boxed error used for causes supplied by migrations and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Migration plan errors.
///
/// Variants fall into four groups: authoring errors raised while a plan is
/// built or validated, unknown-state errors raised for a runtime starting
/// point the plan does not know, internal errors that indicate an engine
/// bug, and runtime failures of individual migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// `to` was called before `from` set a source state.
    #[error("plan {plan}: no source state, call from() before to()")]
    MissingSourceState {
        /// The plan being built.
        plan: String,
    },

    /// The target state is empty or whitespace.
    #[error("plan {plan}: target state must not be blank")]
    BlankTargetState {
        /// The plan being built.
        plan: String,
    },

    /// Source and target state are identical.
    #[error("plan {plan}: source and target state cannot be identical (\"{state}\")")]
    SelfLoop {
        /// The plan being built.
        plan: String,
        /// The repeated state.
        state: State,
    },

    /// The migration kind is blank.
    #[error("plan {plan}: migration kind must not be blank")]
    MissingMigrationKind {
        /// The plan being built.
        plan: String,
    },

    /// The migration kind is not in the plan's known kinds.
    #[error("plan {plan}: {kind} is not a known migration kind")]
    UnknownMigrationKind {
        /// The plan being built.
        plan: String,
        /// The rejected kind.
        kind: MigrationKind,
    },

    /// A state already has an outgoing transition.
    #[error("plan {plan}: a transition from state \"{state}\" has already been defined")]
    DuplicateTransition {
        /// The plan being built.
        plan: String,
        /// The source state.
        state: State,
    },

    /// More than one state has no outgoing transition.
    #[error(
        "plan {plan}: multiple final states have been detected (\"{first}\", \"{second}\"), \
         a plan must contain only one final state"
    )]
    MultipleFinalStates {
        /// The plan being validated.
        plan: String,
        /// First dead-end state in insertion order.
        first: State,
        /// Second dead-end state in insertion order.
        second: State,
    },

    /// No state lacks an outgoing transition.
    #[error("plan {plan}: no final state")]
    NoFinalState {
        /// The plan being validated.
        plan: String,
    },

    /// The transition graph contains a cycle.
    #[error("plan {plan}: a loop has been detected around state \"{state}\"")]
    LoopDetected {
        /// The plan being validated.
        plan: String,
        /// A state on the loop.
        state: State,
    },

    /// A cloned chain references a state with no transition.
    #[error("plan {plan}: cannot clone, there is no transition from state \"{state}\"")]
    UnknownCloneState {
        /// The plan being built.
        plan: String,
        /// The state with no outgoing transition.
        state: State,
    },

    /// A cloned chain never reaches its end state.
    #[error("plan {plan}: cannot clone, the chain from \"{start}\" does not reach \"{end}\"")]
    CloneLoop {
        /// The plan being built.
        plan: String,
        /// Start of the cloned chain.
        start: State,
        /// Expected end of the cloned chain.
        end: State,
    },

    /// Clone start and end are the same state.
    #[error("plan {plan}: clone start and end states cannot be identical (\"{state}\")")]
    EmptyCloneRange {
        /// The plan being built.
        plan: String,
        /// The repeated state.
        state: State,
    },

    /// `with()` was called twice on one merge.
    #[error("plan {plan}: cannot invoke with() twice on a merge")]
    MergeWithCalledTwice {
        /// The plan being built.
        plan: String,
    },

    /// `as_state()` was called before `with()`.
    #[error("plan {plan}: cannot invoke as_state() without invoking with() first")]
    MergeAsWithoutWith {
        /// The plan being built.
        plan: String,
    },

    /// `as_state()` was called but the alternate branch has no transition.
    #[error("plan {plan}: the with() branch of a merge must contain at least one transition")]
    EmptyMergeBranch {
        /// The plan being built.
        plan: String,
    },

    /// A requested state is not part of the plan.
    #[error("plan {plan} does not support migrating from state \"{state}\"")]
    UnknownState {
        /// The plan.
        plan: String,
        /// The unknown state.
        state: State,
    },

    /// A path could not reach the requested state.
    #[error("plan {plan}: could not reach state \"{state}\"")]
    UnreachableState {
        /// The plan.
        plan: String,
        /// The requested end state.
        state: State,
    },

    /// A condition that validation should have ruled out.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// No constructor is registered for a kind.
    #[error("no migration registered for kind {kind}")]
    MigrationNotRegistered {
        /// The requested kind.
        kind: MigrationKind,
    },

    /// A registered constructor failed.
    #[error("failed to build migration {kind}: {source}")]
    MigrationConstruction {
        /// The requested kind.
        kind: MigrationKind,
        /// The constructor failure.
        #[source]
        source: BoxError,
    },

    /// A migration failed while running.
    #[error("migration {kind} failed: {source}")]
    MigrationFailed {
        /// The failing kind.
        kind: MigrationKind,
        /// The underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// A migration returned while an expression was still being built.
    #[error("migration {kind} has run, but leaves an expression that has not run: {description}")]
    IncompleteExpression {
        /// The migration kind.
        kind: MigrationKind,
        /// The unfinished expression.
        description: String,
    },

    /// A new expression was started before the previous one ran.
    #[error("cannot create a new expression, the previous expression has not run: {description}")]
    ExpressionInProgress {
        /// The unfinished expression.
        description: String,
    },

    /// The store handle rejected a statement.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The state marker store failed.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),

    /// Any other failure raised by migration code.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl MigrationError {
    /// Wrap an arbitrary error raised by migration code.
    pub fn other(error: impl Into<BoxError>) -> Self {
        MigrationError::Other(error.into())
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        MigrationError::Internal {
            message: message.into(),
        }
    }

    /// Check whether this is a plan authoring error.
    pub fn is_authoring(&self) -> bool {
        matches!(
            self,
            MigrationError::MissingSourceState { .. }
                | MigrationError::BlankTargetState { .. }
                | MigrationError::SelfLoop { .. }
                | MigrationError::MissingMigrationKind { .. }
                | MigrationError::UnknownMigrationKind { .. }
                | MigrationError::DuplicateTransition { .. }
                | MigrationError::MultipleFinalStates { .. }
                | MigrationError::NoFinalState { .. }
                | MigrationError::LoopDetected { .. }
                | MigrationError::UnknownCloneState { .. }
                | MigrationError::CloneLoop { .. }
                | MigrationError::EmptyCloneRange { .. }
                | MigrationError::MergeWithCalledTwice { .. }
                | MigrationError::MergeAsWithoutWith { .. }
                | MigrationError::EmptyMergeBranch { .. }
        )
    }

    /// Check whether this error signals an engine bug.
    pub fn is_internal(&self) -> bool {
        matches!(self, MigrationError::Internal { .. })
    }

    /// Check whether a migration left an expression unfinished, at any depth.
    pub fn is_incomplete_expression(&self) -> bool {
        match self {
            MigrationError::IncompleteExpression { .. }
            | MigrationError::ExpressionInProgress { .. } => true,
            MigrationError::MigrationFailed { source, .. } => source.is_incomplete_expression(),
            _ => false,
        }
    }
}
