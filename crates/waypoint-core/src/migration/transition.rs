//! Plan transitions.

use super::kind::MigrationKind;
use super::state::State;

/// A directed edge between two plan states, carrying the migration that
/// performs the move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    source: State,
    target: State,
    kind: MigrationKind,
}

impl Transition {
    pub(crate) fn new(source: State, target: State, kind: MigrationKind) -> Self {
        debug_assert!(source != target);
        Self {
            source,
            target,
            kind,
        }
    }

    /// The state this transition leaves.
    pub fn source_state(&self) -> &State {
        &self.source
    }

    /// The state this transition reaches.
    pub fn target_state(&self) -> &State {
        &self.target
    }

    /// The migration kind run by this transition.
    pub fn kind(&self) -> &MigrationKind {
        &self.kind
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kind.is_noop() {
            let source = if self.source.is_empty() {
                "<empty>"
            } else {
                self.source.as_str()
            };
            write!(f, "{} --> {}", source, self.target)
        } else {
            write!(f, "{} -- ({}) --> {}", self.source, self.kind, self.target)
        }
    }
}
