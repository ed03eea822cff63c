//! The store handle migrations run against.
//!
//! The engine never inspects the store itself; it only passes the handle
//! through the execution context to migrations and expressions.

use super::error::BoxError;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// A row returned by a structured query.
pub type Row = BTreeMap<String, String>;

/// Error raised by a store handle.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StoreError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Handle to the store being migrated.
pub trait StoreHandle {
    /// Execute a raw statement, returning the number of affected items.
    fn execute(&mut self, statement: &str) -> Result<u64, StoreError>;

    /// Run a structured query.
    fn query(&mut self, query: &str) -> Result<Vec<Row>, StoreError>;
}

/// A store that records statements instead of applying them.
///
/// Queries answer with rows registered through [`RecordingStore::with_rows`].
/// Statements containing a registered failure pattern are rejected.
#[derive(Debug, Default)]
pub struct RecordingStore {
    statements: Vec<String>,
    queries: Vec<String>,
    rows: HashMap<String, Vec<Row>>,
    failures: Vec<String>,
}

impl RecordingStore {
    /// Create an empty recording store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `rows`.
    pub fn with_rows(mut self, query: impl Into<String>, rows: Vec<Row>) -> Self {
        self.rows.insert(query.into(), rows);
        self
    }

    /// Reject any statement containing `pattern`.
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.failures.push(pattern.into());
        self
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Queries run so far, in order.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }
}

impl StoreHandle for RecordingStore {
    fn execute(&mut self, statement: &str) -> Result<u64, StoreError> {
        if let Some(pattern) = self.failures.iter().find(|p| statement.contains(p.as_str())) {
            return Err(StoreError::new(format!(
                "statement rejected ({}): {}",
                pattern, statement
            )));
        }
        self.statements.push(statement.to_string());
        Ok(1)
    }

    fn query(&mut self, query: &str) -> Result<Vec<Row>, StoreError> {
        self.queries.push(query.to_string());
        Ok(self.rows.get(query).cloned().unwrap_or_default())
    }
}
