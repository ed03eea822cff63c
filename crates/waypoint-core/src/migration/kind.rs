//! Migration units of work and the kind tokens that name them.

use super::context::MigrationContext;
use super::error::MigrationError;
use std::borrow::Cow;

/// Name of the built-in no-op migration kind.
pub const NOOP_KIND: &str = "waypoint::noop";

/// A single step that mutates the target store.
pub trait Migration {
    /// Perform the migration.
    fn run(&mut self, ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError>;
}

/// A migration type that can be named statically and built from a context.
///
/// Implementing this trait is what makes a type usable with the typed
/// plan builders (`MigrationPlan::to::<M>()`) and with
/// `MigrationRegistry::register::<M>()`.
pub trait MigrationType: Migration + Sized + 'static {
    /// Stable name of the migration kind.
    const NAME: &'static str;

    /// Build an instance for one execution.
    fn build(ctx: &MigrationContext<'_>) -> Result<Self, MigrationError>;
}

/// Token identifying a migration kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MigrationKind(Cow<'static, str>);

impl MigrationKind {
    /// The kind token of a migration type.
    pub fn of<M: MigrationType>() -> Self {
        Self(Cow::Borrowed(M::NAME))
    }

    /// A kind token from a name, for registries keyed by string.
    pub fn named(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The no-op kind.
    pub fn noop() -> Self {
        Self(Cow::Borrowed(NOOP_KIND))
    }

    /// The kind name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Check whether this is the no-op kind.
    pub fn is_noop(&self) -> bool {
        self.0 == NOOP_KIND
    }

    /// Check whether the name is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A migration that does nothing.
///
/// Used by transitions that only name a state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMigration;

impl Migration for NoopMigration {
    fn run(&mut self, _ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
        Ok(())
    }
}

impl MigrationType for NoopMigration {
    const NAME: &'static str = NOOP_KIND;

    fn build(_ctx: &MigrationContext<'_>) -> Result<Self, MigrationError> {
        Ok(NoopMigration)
    }
}
