//! Migration plan engine.
//!
//! A [`MigrationPlan`] is a named graph of states joined by transitions,
//! each of which runs one migration. Plans are authored fluently, validated
//! lazily, and executed by a [`PlanExecutor`] from any state the plan knows
//! until its single final state is reached.
//!
//! - Plan authoring with branch rejoins ([`MergeBuilder`]), clones and
//!   replacements
//! - Validation: one final state, no loops
//! - Migration construction through a [`MigrationFactory`]
//! - Incomplete-expression guard on every migration run
//! - Resumable upgrades via persisted state markers ([`Upgrader`])
//!
//! # Example
//!
//! ```ignore
//! use waypoint_core::migration::{
//!     ExecutorConfig, MigrationPlan, MigrationRegistry, PlanExecutor, State,
//! };
//!
//! let mut plan = MigrationPlan::new("Blog");
//! plan.from("")
//!     .to::<CreateUsers>("users")?
//!     .to::<CreatePosts>("posts")?;
//!
//! let registry = MigrationRegistry::new()
//!     .with::<CreateUsers>()
//!     .with::<CreatePosts>();
//! let executor = PlanExecutor::new(registry, ExecutorConfig::default());
//!
//! let executed = executor.execute_plan(&plan, &State::initial(), &mut store)?;
//! assert!(executed.successful);
//! ```

pub mod context;
pub mod error;
pub mod executor;
pub mod expression;
pub mod factory;
pub mod handle;
pub mod kind;
pub mod marker;
pub mod merge;
pub mod plan;
pub mod state;
pub mod transition;
pub mod upgrader;

// Authoring
pub use kind::{Migration, MigrationKind, MigrationType, NoopMigration, NOOP_KIND};
pub use merge::MergeBuilder;
pub use plan::MigrationPlan;
pub use state::State;
pub use transition::Transition;

// Execution
pub use context::{ExpressionState, MigrationContext};
pub use executor::{ExecutedPlan, ExecutionStatus, ExecutorConfig, PlanExecutor};
pub use expression::SqlExpression;
pub use factory::{MigrationFactory, MigrationRegistry};
pub use handle::{RecordingStore, Row, StoreError, StoreHandle};

// Persistence
pub use marker::{PlanStateRecord, PlanStateStore};
pub use upgrader::{UpgradeResult, Upgrader};

// Errors
pub use error::{BoxError, MigrationError};
