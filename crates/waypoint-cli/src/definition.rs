//! JSON plan definitions.
//!
//! A definition names states and migration kinds but carries no migration
//! code, so it can be validated and walked but only executed as a dry run.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use waypoint_core::{MigrationError, MigrationKind, MigrationPlan};

/// One transition of a plan definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub from: String,
    pub to: String,
    /// Migration kind; a plain relabel when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A plan as written in a definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    #[serde(default)]
    pub ignore_current_state: bool,
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_migrations: Vec<String>,
}

impl PlanDefinition {
    /// Load a definition from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the plan.
    ///
    /// Transitions are added in file order, so authoring errors point at the
    /// first offending entry.
    pub fn into_plan(self) -> std::result::Result<MigrationPlan, MigrationError> {
        let mut plan = MigrationPlan::new(self.name)
            .with_ignore_current_state(self.ignore_current_state);
        if let Some(initial) = self.initial_state {
            plan.set_initial_state(initial);
        }

        for transition in self.transitions {
            plan.from(transition.from);
            match transition.kind {
                Some(kind) => plan.to_kind(transition.to, MigrationKind::named(kind))?,
                None => plan.to_state(transition.to)?,
            };
        }

        for kind in self.post_migrations {
            #[allow(deprecated)]
            plan.add_post_migration_kind(MigrationKind::named(kind));
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::State;

    const BLOG: &str = r#"{
        "name": "Blog",
        "transitions": [
            { "from": "", "to": "users", "kind": "blog::create_users" },
            { "from": "users", "to": "posts", "kind": "blog::create_posts" },
            { "from": "posts", "to": "1.0" }
        ],
        "post_migrations": ["blog::rebuild_cache"]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let definition: PlanDefinition = serde_json::from_str(BLOG).unwrap();
        assert_eq!(definition.transitions.len(), 3);
        assert!(definition.transitions[2].kind.is_none());

        let plan = definition.into_plan().unwrap();
        assert_eq!(plan.name(), "Blog");
        assert_eq!(plan.final_state().unwrap(), "1.0");
        assert_eq!(plan.post_migrations().len(), 1);

        let relabel = plan
            .transition_from(&State::new("posts"))
            .flatten()
            .unwrap();
        assert!(relabel.kind().is_noop());
    }

    #[test]
    fn test_initial_state_and_flags() {
        let definition: PlanDefinition = serde_json::from_str(
            r#"{
                "name": "Shop",
                "initial_state": "0.9",
                "ignore_current_state": true,
                "transitions": [{ "from": "0.9", "to": "1.0" }]
            }"#,
        )
        .unwrap();

        let plan = definition.into_plan().unwrap();
        assert_eq!(plan.initial_state(), "0.9");
        assert!(plan.ignore_current_state());
    }

    #[test]
    fn test_authoring_error_surfaces() {
        let definition: PlanDefinition = serde_json::from_str(
            r#"{
                "name": "Broken",
                "transitions": [
                    { "from": "", "to": "A" },
                    { "from": "", "to": "B" }
                ]
            }"#,
        )
        .unwrap();

        let err = definition.into_plan().unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateTransition { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlanDefinition::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.json");
        std::fs::write(&path, BLOG).unwrap();

        let definition = PlanDefinition::load(&path).unwrap();
        assert_eq!(definition.name, "Blog");
    }
}
