//! Integration tests for plan authoring, execution, and upgrades.

use parking_lot::Mutex;
use std::sync::Arc;
use waypoint_core::migration::{ExecutionStatus, RecordingStore};
use waypoint_core::{
    ExecutorConfig, Migration, MigrationContext, MigrationError, MigrationKind, MigrationPlan,
    MigrationRegistry, MigrationType, PlanExecutor, PlanStateStore, State, Upgrader,
};

struct MigA;

impl Migration for MigA {
    fn run(&mut self, ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
        ctx.sql("CREATE TABLE a (id INT)")?.execute()?;
        Ok(())
    }
}

impl MigrationType for MigA {
    const NAME: &'static str = "test::mig_a";

    fn build(_ctx: &MigrationContext<'_>) -> Result<Self, MigrationError> {
        Ok(Self)
    }
}

struct MigB;

impl Migration for MigB {
    fn run(&mut self, ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
        ctx.sql("CREATE TABLE b (id INT)")?
            .and("CREATE INDEX b_id ON b (id)")
            .execute()?;
        Ok(())
    }
}

impl MigrationType for MigB {
    const NAME: &'static str = "test::mig_b";

    fn build(_ctx: &MigrationContext<'_>) -> Result<Self, MigrationError> {
        Ok(Self)
    }
}

struct MigC;

impl Migration for MigC {
    fn run(&mut self, ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
        ctx.sql("DROP TABLE a")?.execute()?;
        Ok(())
    }
}

impl MigrationType for MigC {
    const NAME: &'static str = "test::mig_c";

    fn build(_ctx: &MigrationContext<'_>) -> Result<Self, MigrationError> {
        Ok(Self)
    }
}

fn test_plan() -> MigrationPlan {
    let mut plan = MigrationPlan::new("TestPlan");
    plan.from("")
        .to::<MigA>("S1")
        .unwrap()
        .to::<MigB>("DONE")
        .unwrap();
    plan
}

fn executor() -> PlanExecutor<MigrationRegistry> {
    let registry = MigrationRegistry::new()
        .with::<MigA>()
        .with::<MigB>()
        .with::<MigC>();
    PlanExecutor::new(registry, ExecutorConfig::default())
}

#[test]
fn test_full_plan_execution() {
    let plan = test_plan();
    let mut store = RecordingStore::new();

    let executed = executor()
        .execute_plan(&plan, &State::initial(), &mut store)
        .unwrap();

    assert!(executed.successful);
    assert_eq!(executed.status(), ExecutionStatus::Completed);
    assert_eq!(executed.initial_state, "");
    assert_eq!(executed.final_state, "DONE");

    let completed: Vec<_> = executed
        .completed_transitions
        .iter()
        .map(|t| {
            (
                t.source_state().as_str(),
                t.target_state().as_str(),
                t.kind().name(),
            )
        })
        .collect();
    assert_eq!(
        completed,
        [("", "S1", MigA::NAME), ("S1", "DONE", MigB::NAME)]
    );

    assert_eq!(
        store.statements(),
        [
            "CREATE TABLE a (id INT)",
            "CREATE TABLE b (id INT)",
            "CREATE INDEX b_id ON b (id)",
        ]
    );
}

#[test]
fn test_legacy_execute_returns_final_state() {
    let plan = test_plan();
    let mut store = RecordingStore::new();

    let state = executor()
        .execute(&plan, &State::new("s1"), &mut store)
        .unwrap();

    assert_eq!(state, "DONE");
    assert_eq!(store.statements().len(), 2);
}

#[test]
fn test_failure_reports_last_reached_state() {
    let plan = test_plan();
    let mut store = RecordingStore::new().fail_on("CREATE TABLE b");

    let executed = executor()
        .execute_plan(&plan, &State::initial(), &mut store)
        .unwrap();

    assert!(!executed.successful);
    assert_eq!(executed.status(), ExecutionStatus::Failed);
    assert_eq!(executed.final_state, "S1");
    assert_eq!(executed.completed_transitions.len(), 1);
    assert!(matches!(
        executed.error,
        Some(MigrationError::MigrationFailed { .. })
    ));

    // Fixing the store resumes from the reached state.
    let mut store = RecordingStore::new();
    let resumed = executor()
        .execute_plan(&plan, &executed.final_state, &mut store)
        .unwrap();
    assert!(resumed.successful);
    assert_eq!(resumed.completed_transitions.len(), 1);
}

#[test]
fn test_unknown_start_state() {
    let plan = test_plan();
    let mut store = RecordingStore::new();

    let err = executor()
        .execute_plan(&plan, &State::new("nowhere"), &mut store)
        .unwrap_err();

    assert!(matches!(err, MigrationError::UnknownState { .. }));
    assert!(store.statements().is_empty());
}

#[test]
fn test_unregistered_migration() {
    let mut plan = MigrationPlan::new("TestPlan");
    plan.from("")
        .to_kind("S1", MigrationKind::named("test::missing"))
        .unwrap();
    let mut store = RecordingStore::new();

    let executed = executor()
        .execute_plan(&plan, &State::initial(), &mut store)
        .unwrap();

    assert!(!executed.successful);
    assert_eq!(executed.final_state, "");
    assert!(matches!(
        executed.error,
        Some(MigrationError::MigrationNotRegistered { .. })
    ));
}

#[test]
fn test_merged_plan_executes_from_both_branches() {
    let mut plan = MigrationPlan::new("TestPlan");
    plan.from("").to::<MigA>("1.0").unwrap();
    plan.merge()
        .to::<MigB>("with-b")
        .unwrap()
        .with()
        .unwrap()
        .to::<MigC>("with-c")
        .unwrap()
        .as_state("2.0")
        .unwrap();

    let executor = executor();

    // An installation that shipped with the first branch.
    let mut store = RecordingStore::new();
    let executed = executor
        .execute_plan(&plan, &State::new("with-b"), &mut store)
        .unwrap();
    assert!(executed.successful);
    assert_eq!(executed.final_state, "2.0");
    assert_eq!(store.statements(), ["DROP TABLE a"]);

    // An installation that shipped with the second branch.
    let mut store = RecordingStore::new();
    let executed = executor
        .execute_plan(&plan, &State::new("with-c"), &mut store)
        .unwrap();
    assert!(executed.successful);
    assert_eq!(executed.final_state, "2.0");
    assert_eq!(
        store.statements(),
        ["CREATE TABLE b (id INT)", "CREATE INDEX b_id ON b (id)"]
    );
}

#[test]
#[allow(deprecated)]
fn test_post_migrations_run_once_after_chain() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();

    let mut registry = MigrationRegistry::new().with::<MigA>().with::<MigB>();
    let cleanup_log = Arc::clone(&log);
    registry.register_fn(MigrationKind::named("test::cleanup"), move |_ctx| {
        Ok(Cleanup {
            log: Arc::clone(&cleanup_log),
        })
    });
    let executor = PlanExecutor::new(registry, ExecutorConfig::default());

    let mut plan = test_plan();
    plan.add_post_migration_kind(MigrationKind::named("test::cleanup"));
    plan.add_post_migration_kind(MigrationKind::named("test::cleanup"));

    let mut store = RecordingStore::new();
    let executed = executor
        .execute_plan(&plan, &State::initial(), &mut store)
        .unwrap();

    assert!(executed.successful);
    assert_eq!(*log.lock(), ["cleanup"]);
    assert_eq!(store.statements().last().unwrap(), "VACUUM");
}

struct Cleanup {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Migration for Cleanup {
    fn run(&mut self, ctx: &mut MigrationContext<'_>) -> Result<(), MigrationError> {
        self.log.lock().push("cleanup");
        ctx.sql("VACUUM")?.execute()?;
        Ok(())
    }
}

#[test]
fn test_upgrader_persists_progress() {
    let temp_dir = tempfile::tempdir().unwrap();
    let plan = test_plan();
    let executor = executor();

    {
        let db = sled::open(temp_dir.path()).unwrap();
        let markers = PlanStateStore::open(&db).unwrap();
        let mut store = RecordingStore::new().fail_on("CREATE TABLE b");

        let result = Upgrader::new(&plan)
            .execute(&executor, &mut store, &markers)
            .unwrap();
        assert!(!result.successful());
        assert_eq!(markers.get("TestPlan").unwrap().unwrap().state, "S1");
    }

    let db = sled::open(temp_dir.path()).unwrap();
    let markers = PlanStateStore::open(&db).unwrap();
    let mut store = RecordingStore::new();

    let result = Upgrader::new(&plan)
        .execute(&executor, &mut store, &markers)
        .unwrap();
    assert!(result.successful());
    assert_eq!(result.previous_state, Some(State::new("S1")));
    assert_eq!(store.statements().len(), 2);
    assert_eq!(markers.get("TestPlan").unwrap().unwrap().state, "DONE");
}
