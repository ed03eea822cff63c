//! Subcommand handlers.
//!
//! Each handler returns the text to print.

use crate::config::{CliConfig, Command};
use crate::definition::PlanDefinition;
use crate::error::{CliError, Result};
use comfy_table::Table;
use std::path::Path;
use waypoint_core::migration::RecordingStore;
use waypoint_core::{MigrationPlan, MigrationRegistry, PlanExecutor, PlanStateStore, State, Upgrader};

/// Run one command.
pub fn execute(config: &CliConfig, command: Command) -> Result<String> {
    match command {
        Command::Validate { plan } => validate(&plan),
        Command::Path { plan, from, to } => path(&plan, from, to),
        Command::Status { plan } => status(config, plan.as_deref()),
        Command::SetState { plan, state } => set_state(config, &plan, &state),
        Command::ClearState { plan } => clear_state(config, &plan),
        Command::Run { plan } => run(config, &plan),
    }
}

fn load_plan(path: &Path) -> Result<MigrationPlan> {
    Ok(PlanDefinition::load(path)?.into_plan()?)
}

fn open_markers(config: &CliConfig) -> Result<PlanStateStore> {
    let db = sled::open(&config.data_path).map_err(|source| CliError::Open {
        path: config.data_path.clone(),
        source,
    })?;
    Ok(PlanStateStore::open(&db)?)
}

fn display(state: &State) -> &str {
    if state.is_blank() {
        "origin"
    } else {
        state.as_str()
    }
}

fn validate(path: &Path) -> Result<String> {
    let plan = load_plan(path)?;
    plan.validate()?;
    let final_state = plan.final_state()?;
    tracing::info!(plan = plan.name(), states = plan.len(), "plan is valid");
    Ok(format!(
        "{}: valid, {} states, final state {}",
        plan.name(),
        plan.len(),
        display(final_state)
    ))
}

fn path(path: &Path, from: Option<String>, to: Option<String>) -> Result<String> {
    let plan = load_plan(path)?;
    let from = from.map(State::new);
    let to = to.map(State::new);
    let states = plan.follow_path(from.as_ref(), to.as_ref())?;
    Ok(states
        .iter()
        .map(display)
        .collect::<Vec<_>>()
        .join(" -> "))
}

fn status(config: &CliConfig, plan: Option<&str>) -> Result<String> {
    let markers = open_markers(config)?;
    let records = match plan {
        Some(name) => markers
            .get(name)?
            .map(|record| vec![record])
            .ok_or_else(|| CliError::NoMarker(name.to_string()))?,
        None => markers.list()?,
    };

    let mut table = Table::new();
    table.set_header(vec!["Plan", "State", "Updated"]);

    for record in &records {
        table.add_row(vec![
            record.plan_name.clone(),
            display(&record.state()).to_string(),
            format_timestamp(record.updated_at),
        ]);
    }

    Ok(format!("{}\n{} plan(s)", table, records.len()))
}

/// Render epoch microseconds as a UTC date and time.
fn format_timestamp(micros: u64) -> String {
    i64::try_from(micros)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_micros)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| micros.to_string())
}

fn set_state(config: &CliConfig, plan: &str, state: &str) -> Result<String> {
    let markers = open_markers(config)?;
    let state = State::new(state).trimmed();
    markers.set(plan, &state)?;
    markers.flush()?;
    tracing::info!(plan, state = %state, "state stored");
    Ok(format!("{plan}: {}", display(&state)))
}

fn clear_state(config: &CliConfig, plan: &str) -> Result<String> {
    let markers = open_markers(config)?;
    if !markers.delete(plan)? {
        return Err(CliError::NoMarker(plan.to_string()));
    }
    markers.flush()?;
    tracing::info!(plan, "state cleared");
    Ok(format!("{plan}: cleared"))
}

fn run(config: &CliConfig, path: &Path) -> Result<String> {
    let plan = load_plan(path)?;
    let markers = open_markers(config)?;
    let executor = PlanExecutor::new(MigrationRegistry::new(), config.executor.clone());
    let mut store = RecordingStore::new();

    let result = Upgrader::new(&plan).execute(&executor, &mut store, &markers)?;
    let executed = result.executed;

    let mut lines: Vec<String> = executed
        .completed_transitions
        .iter()
        .map(|transition| transition.to_string())
        .collect();
    lines.push(format!(
        "{}: {} -> {} ({})",
        executed.plan_name,
        display(&executed.initial_state),
        display(&executed.final_state),
        executed.status()
    ));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const BLOG: &str = r#"{
        "name": "Blog",
        "transitions": [
            { "from": "", "to": "users", "kind": "blog::create_users" },
            { "from": "users", "to": "posts", "kind": "blog::create_posts" },
            { "from": "posts", "to": "1.0" }
        ]
    }"#;

    fn setup() -> (tempfile::TempDir, CliConfig, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let plan = dir.path().join("blog.json");
        std::fs::write(&plan, BLOG).unwrap();
        let config = CliConfig::new(dir.path().join("data"));
        (dir, config, plan)
    }

    #[test]
    fn test_validate() {
        let (_dir, config, plan) = setup();
        let output = execute(&config, Command::Validate { plan }).unwrap();
        assert_eq!(output, "Blog: valid, 4 states, final state 1.0");
    }

    #[test]
    fn test_path() {
        let (_dir, config, plan) = setup();
        let output = execute(
            &config,
            Command::Path {
                plan,
                from: Some("users".into()),
                to: None,
            },
        )
        .unwrap();
        assert_eq!(output, "users -> posts -> 1.0");
    }

    #[test]
    fn test_run_then_resume() {
        let (_dir, config, plan) = setup();

        let output = execute(&config, Command::Run { plan: plan.clone() }).unwrap();
        assert!(output.ends_with("Blog: origin -> 1.0 (completed)"));

        let output = execute(&config, Command::Run { plan }).unwrap();
        assert_eq!(output, "Blog: 1.0 -> 1.0 (completed)");

        let status = execute(&config, Command::Status { plan: Some("Blog".into()) }).unwrap();
        assert!(status.contains("Plan"));
        assert!(status.contains("Updated"));
        assert!(status.contains("Blog"));
        assert!(status.contains("1.0"));
        assert!(status.ends_with("1 plan(s)"));
    }

    #[test]
    fn test_status_lists_all_plans() {
        let (_dir, config, _plan) = setup();
        for (plan, state) in [("Blog", "1.0"), ("Shop", "")] {
            execute(
                &config,
                Command::SetState {
                    plan: plan.into(),
                    state: state.into(),
                },
            )
            .unwrap();
        }

        let status = execute(&config, Command::Status { plan: None }).unwrap();
        assert!(status.contains("Shop"));
        assert!(status.contains("origin"));
        assert!(status.ends_with("2 plan(s)"));

        let err = execute(&config, Command::Status { plan: Some("Wiki".into()) }).unwrap_err();
        assert!(matches!(err, CliError::NoMarker(_)));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_500_000), "1970-01-01 00:00:01 UTC");
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn test_set_and_clear_state() {
        let (_dir, config, _plan) = setup();

        let output = execute(
            &config,
            Command::SetState {
                plan: "Blog".into(),
                state: " posts ".into(),
            },
        )
        .unwrap();
        assert_eq!(output, "Blog: posts");

        execute(&config, Command::ClearState { plan: "Blog".into() }).unwrap();
        let err = execute(&config, Command::ClearState { plan: "Blog".into() }).unwrap_err();
        assert!(matches!(err, CliError::NoMarker(_)));
    }
}
