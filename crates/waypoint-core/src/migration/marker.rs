//! Persisted current-state markers.
//!
//! Records, per plan name, the last state a plan execution reached, so a
//! later execution can resume from it.

use super::error::MigrationError;
use super::state::State;
use rkyv::{Archive, Deserialize, Serialize};

/// Current time in microseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// The stored state of one plan.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct PlanStateRecord {
    /// Plan name.
    pub plan_name: String,
    /// Last reached state, as written.
    pub state: String,
    /// When the marker was written (microseconds since epoch).
    pub updated_at: u64,
}

impl PlanStateRecord {
    /// Create a record stamped with the current time.
    pub fn new(plan_name: impl Into<String>, state: &State) -> Self {
        Self {
            plan_name: plan_name.into(),
            state: state.as_str().to_string(),
            updated_at: current_timestamp(),
        }
    }

    /// The stored state.
    pub fn state(&self) -> State {
        State::new(self.state.clone())
    }

    /// Serialize the record to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MigrationError> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| MigrationError::Storage(crate::error::Error::Serialization(e.to_string())))
    }

    /// Deserialize a record from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MigrationError> {
        // Copy to aligned buffer for rkyv
        let mut aligned: rkyv::util::AlignedVec<16> = rkyv::util::AlignedVec::new();
        aligned.extend_from_slice(bytes);

        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned).map_err(|e| {
            MigrationError::Storage(crate::error::Error::Deserialization(e.to_string()))
        })
    }
}

/// Plan state marker store.
pub struct PlanStateStore {
    tree: sled::Tree,
}

impl PlanStateStore {
    /// Tree name for plan state markers.
    pub const TREE_NAME: &'static str = "waypoint:plan_state";

    /// Prefix of every marker key; the plan name follows it.
    pub const KEY_PREFIX: &'static str = "waypoint:upgrader:state:";

    /// Open or create the marker store.
    pub fn open(db: &sled::Db) -> Result<Self, MigrationError> {
        let tree = db
            .open_tree(Self::TREE_NAME)
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(Self { tree })
    }

    /// Load the marker of a plan.
    pub fn get(&self, plan_name: &str) -> Result<Option<PlanStateRecord>, MigrationError> {
        match self
            .tree
            .get(Self::state_key(plan_name))
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?
        {
            Some(bytes) => {
                let record = PlanStateRecord::from_bytes(&bytes)?;
                if record.plan_name != plan_name {
                    return Err(MigrationError::Storage(crate::error::Error::InvalidData(
                        format!("marker for {plan_name} names plan {}", record.plan_name),
                    )));
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Write the marker of a plan.
    pub fn set(&self, plan_name: &str, state: &State) -> Result<PlanStateRecord, MigrationError> {
        let record = PlanStateRecord::new(plan_name, state);
        self.tree
            .insert(Self::state_key(plan_name), record.to_bytes()?)
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(record)
    }

    /// Remove the marker of a plan, returning whether one existed.
    pub fn delete(&self, plan_name: &str) -> Result<bool, MigrationError> {
        let previous = self
            .tree
            .remove(Self::state_key(plan_name))
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(previous.is_some())
    }

    /// List all markers, ordered by key.
    pub fn list(&self) -> Result<Vec<PlanStateRecord>, MigrationError> {
        let mut records = Vec::new();
        for result in self.tree.scan_prefix(Self::KEY_PREFIX.as_bytes()) {
            let (_, value) =
                result.map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
            records.push(PlanStateRecord::from_bytes(&value)?);
        }
        Ok(records)
    }

    /// Flush changes to disk.
    pub fn flush(&self) -> Result<(), MigrationError> {
        self.tree
            .flush()
            .map_err(|e| MigrationError::Storage(crate::error::Error::Storage(e)))?;
        Ok(())
    }

    fn state_key(plan_name: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(Self::KEY_PREFIX.len() + plan_name.len());
        key.extend_from_slice(Self::KEY_PREFIX.as_bytes());
        key.extend_from_slice(plan_name.as_bytes());
        key
    }
}
