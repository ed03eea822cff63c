//! Waypoint Core - migration plans, execution, and state markers.
//!
//! This crate provides the plan engine used to upgrade a store through a
//! named sequence of states.

pub mod error;
pub mod migration;

pub use error::Error;
pub use migration::{
    ExecutedPlan, ExecutorConfig, MergeBuilder, Migration, MigrationContext, MigrationError,
    MigrationFactory, MigrationKind, MigrationPlan, MigrationRegistry, MigrationType,
    PlanExecutor, PlanStateStore, State, StoreHandle, Transition, Upgrader,
};
