//! CLI configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use waypoint_core::ExecutorConfig;

/// Default marker database directory.
pub const DEFAULT_DATA_PATH: &str = "./waypoint-data";

/// Resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Marker database directory.
    pub data_path: PathBuf,
    /// Executor settings used by `run`.
    pub executor: ExecutorConfig,
}

impl CliConfig {
    /// Create a configuration with the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            // Definitions carry no migration code.
            executor: ExecutorConfig::default().with_dry_run(true),
        }
    }

    /// Skip post migrations.
    pub fn without_post_migrations(mut self) -> Self {
        self.executor = self.executor.without_post_migrations();
        self
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(version, about = "Validate, walk, and run migration plans", long_about = None)]
pub struct Args {
    /// Path to the marker database directory.
    #[arg(short, long, global = true, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Do not run post migrations.
    #[arg(long, global = true)]
    pub skip_post_migrations: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate a plan definition and print its final state.
    Validate {
        /// Plan definition file.
        plan: PathBuf,
    },

    /// Print the states between two states of a plan.
    Path {
        /// Plan definition file.
        plan: PathBuf,
        /// Start state (default: the plan's initial state).
        #[arg(long)]
        from: Option<String>,
        /// End state (default: the plan's final state).
        #[arg(long)]
        to: Option<String>,
    },

    /// List stored plan states.
    Status {
        /// Only show this plan.
        plan: Option<String>,
    },

    /// Store a plan's current state.
    SetState {
        /// Plan name.
        plan: String,
        /// State to store.
        state: String,
    },

    /// Remove a plan's stored state.
    ClearState {
        /// Plan name.
        plan: String,
    },

    /// Walk a plan from its stored state and record the reached state.
    Run {
        /// Plan definition file.
        plan: PathBuf,
    },
}

impl Args {
    /// Split into configuration and the command to run.
    pub fn into_config(self) -> (CliConfig, Command) {
        let mut config = CliConfig::new(self.data_path);
        if self.skip_post_migrations {
            config = config.without_post_migrations();
        }
        (config, self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["waypoint", "status"]);
        let (config, command) = args.into_config();

        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert!(config.executor.dry_run);
        assert!(config.executor.run_post_migrations);
        assert_eq!(command, Command::Status { plan: None });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "waypoint",
            "run",
            "plan.json",
            "--data-path",
            "/tmp/markers",
            "--skip-post-migrations",
        ]);
        let (config, command) = args.into_config();

        assert_eq!(config.data_path, PathBuf::from("/tmp/markers"));
        assert!(!config.executor.run_post_migrations);
        assert_eq!(
            command,
            Command::Run {
                plan: PathBuf::from("plan.json")
            }
        );
    }

    #[test]
    fn test_set_state() {
        let args = Args::parse_from(["waypoint", "set-state", "Blog", "1.0"]);
        assert_eq!(
            args.command,
            Command::SetState {
                plan: "Blog".into(),
                state: "1.0".into()
            }
        );
    }
}
