//! Resolution of migration kinds into runnable migrations.

use super::context::MigrationContext;
use super::error::MigrationError;
use super::kind::{Migration, MigrationKind, MigrationType, NoopMigration};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds runnable migrations for kinds.
pub trait MigrationFactory {
    /// Build a migration of `kind` for the execution described by `ctx`.
    fn create(
        &self,
        kind: &MigrationKind,
        ctx: &MigrationContext<'_>,
    ) -> Result<Box<dyn Migration>, MigrationError>;
}

impl<T: MigrationFactory + ?Sized> MigrationFactory for Arc<T> {
    fn create(
        &self,
        kind: &MigrationKind,
        ctx: &MigrationContext<'_>,
    ) -> Result<Box<dyn Migration>, MigrationError> {
        (**self).create(kind, ctx)
    }
}

impl<T: MigrationFactory + ?Sized> MigrationFactory for &T {
    fn create(
        &self,
        kind: &MigrationKind,
        ctx: &MigrationContext<'_>,
    ) -> Result<Box<dyn Migration>, MigrationError> {
        (**self).create(kind, ctx)
    }
}

type Constructor = Arc<
    dyn Fn(&MigrationContext<'_>) -> Result<Box<dyn Migration>, MigrationError> + Send + Sync,
>;

fn constructor<F>(build: F) -> Constructor
where
    F: Fn(&MigrationContext<'_>) -> Result<Box<dyn Migration>, MigrationError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(build)
}

/// A factory backed by a map from kind to constructor.
///
/// The no-op kind always resolves, registered or not.
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    constructors: HashMap<MigrationKind, Constructor>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register migration type `M` under its own kind.
    pub fn register<M: MigrationType>(&mut self) -> &mut Self {
        self.constructors.insert(
            MigrationKind::of::<M>(),
            constructor(|ctx| M::build(ctx).map(|m| Box::new(m) as Box<dyn Migration>)),
        );
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<M: MigrationType>(mut self) -> Self {
        self.register::<M>();
        self
    }

    /// Register a constructor closure under `kind`.
    pub fn register_fn<M, F>(&mut self, kind: MigrationKind, build: F) -> &mut Self
    where
        M: Migration + 'static,
        F: Fn(&MigrationContext<'_>) -> Result<M, MigrationError> + Send + Sync + 'static,
    {
        self.constructors.insert(
            kind,
            constructor(move |ctx| build(ctx).map(|m| Box::new(m) as Box<dyn Migration>)),
        );
        self
    }

    /// Check whether `kind` resolves.
    pub fn contains(&self, kind: &MigrationKind) -> bool {
        kind.is_noop() || self.constructors.contains_key(kind)
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &MigrationKind> {
        self.constructors.keys()
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl MigrationFactory for MigrationRegistry {
    fn create(
        &self,
        kind: &MigrationKind,
        ctx: &MigrationContext<'_>,
    ) -> Result<Box<dyn Migration>, MigrationError> {
        let Some(build) = self.constructors.get(kind) else {
            if kind.is_noop() {
                return Ok(Box::new(NoopMigration));
            }
            return Err(MigrationError::MigrationNotRegistered { kind: kind.clone() });
        };

        build(ctx).map_err(|e| MigrationError::MigrationConstruction {
            kind: kind.clone(),
            source: Box::new(e),
        })
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.constructors.keys().map(MigrationKind::name).collect();
        kinds.sort_unstable();
        f.debug_struct("MigrationRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::handle::RecordingStore;
    use crate::migration::plan::MigrationPlan;

    struct Failing;

    impl Migration for Failing {
        fn run(&mut self, _ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
            Ok(())
        }
    }

    impl MigrationType for Failing {
        const NAME: &'static str = "test::Failing";

        fn build(_ctx: &MigrationContext<'_>) -> Result<Self, MigrationError> {
            Err(MigrationError::other("missing dependency"))
        }
    }

    #[test]
    fn test_noop_always_resolves() {
        let registry = MigrationRegistry::new();
        let plan = MigrationPlan::new("Test");
        let mut store = RecordingStore::new();
        let ctx = MigrationContext::new(&plan, &mut store);

        assert!(registry.contains(&MigrationKind::noop()));
        assert!(registry.create(&MigrationKind::noop(), &ctx).is_ok());
    }

    #[test]
    fn test_unregistered_kind_names_the_kind() {
        let registry = MigrationRegistry::new();
        let plan = MigrationPlan::new("Test");
        let mut store = RecordingStore::new();
        let ctx = MigrationContext::new(&plan, &mut store);

        let err = match registry.create(&MigrationKind::named("AddUsers"), &ctx) {
            Err(err) => err,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, MigrationError::MigrationNotRegistered { .. }));
        assert!(err.to_string().contains("AddUsers"));
    }

    #[test]
    fn test_constructor_failure_is_wrapped() {
        let registry = MigrationRegistry::new().with::<Failing>();
        let plan = MigrationPlan::new("Test");
        let mut store = RecordingStore::new();
        let ctx = MigrationContext::new(&plan, &mut store);

        let err = match registry.create(&MigrationKind::of::<Failing>(), &ctx) {
            Err(err) => err,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, MigrationError::MigrationConstruction { .. }));
        assert!(err.to_string().contains("missing dependency"));
    }

    #[test]
    fn test_register_fn() {
        let mut registry = MigrationRegistry::new();
        registry.register_fn(MigrationKind::named("Relabel"), |_ctx| Ok(NoopMigration));

        assert!(registry.contains(&MigrationKind::named("Relabel")));
        assert_eq!(registry.len(), 1);
        assert!(format!("{:?}", registry).contains("Relabel"));
    }
}
