//! Migration plan state identifiers.
//!
//! A state is an opaque label for a point in a plan's history. States are
//! never parsed; two states are equal when their text is equal ignoring
//! case, with Unicode lowercase folding.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// An opaque, case-insensitive migration state label.
#[derive(Debug, Clone, Default)]
pub struct State(String);

impl State {
    /// Create a state from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The empty state, the default starting point of every plan.
    pub fn initial() -> Self {
        Self(String::new())
    }

    /// Generate a fresh synthetic state.
    ///
    /// The value is a braced, upper-case UUID v4, a shape hand-written
    /// state names do not use.
    pub fn random() -> Self {
        let id = uuid::Uuid::new_v4().hyphenated().to_string().to_uppercase();
        Self(format!("{{{}}}", id))
    }

    /// Borrow the state text as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the state is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Check whether this is the empty state.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a copy with surrounding whitespace removed.
    pub fn trimmed(&self) -> Self {
        Self(self.0.trim().to_string())
    }

    /// Consume the state, returning its text.
    pub fn into_string(self) -> String {
        self.0
    }

    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        fold(&self.0)
    }
}

fn fold(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(char::to_lowercase)
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for State {}

impl PartialEq<str> for State {
    fn eq(&self, other: &str) -> bool {
        self.folded().eq(fold(other))
    }
}

impl PartialEq<&str> for State {
    fn eq(&self, other: &&str) -> bool {
        self.folded().eq(fold(other))
    }
}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            state.write_u32(c as u32);
        }
        state.write_u32(u32::MAX);
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for State {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for State {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for State {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<&State> for State {
    fn from(value: &State) -> Self {
        value.clone()
    }
}
