//! Per-call session registry
//!
//! Every per-call record (call session, human flow, playback line) lives in
//! a registry keyed by call id. Lookups clone the `Arc` out so no registry lock
//! is ever held while the caller works on a single call.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Registry interface for per-call records
pub trait SessionStore<T>: Send + Sync {
    /// Get a record by call id
    fn get(&self, call_id: &str) -> Option<Arc<T>>;

    /// Insert a record, failing if the call id is already registered
    fn put(&self, call_id: &str, record: Arc<T>) -> Result<()>;

    /// Remove a record, returning it if present
    fn remove(&self, call_id: &str) -> Option<Arc<T>>;

    /// Number of registered calls
    fn count(&self) -> usize;

    /// List registered call ids
    fn ids(&self) -> Vec<String>;

    fn contains(&self, call_id: &str) -> bool {
        self.get(call_id).is_some()
    }
}

/// In-memory registry backed by a read-write locked map
pub struct SessionRegistry<T> {
    records: RwLock<HashMap<String, Arc<T>>>,
    max_sessions: usize,
}

impl<T> SessionRegistry<T> {
    /// Create a registry with no capacity limit
    pub fn new() -> Self {
        Self::with_capacity_limit(usize::MAX)
    }

    /// Create a registry that refuses inserts beyond `max_sessions`
    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> SessionStore<T> for SessionRegistry<T> {
    fn get(&self, call_id: &str) -> Option<Arc<T>> {
        self.records.read().get(call_id).cloned()
    }

    fn put(&self, call_id: &str, record: Arc<T>) -> Result<()> {
        let mut records = self.records.write();

        if records.contains_key(call_id) {
            return Err(Error::SessionExists(call_id.to_string()));
        }
        if records.len() >= self.max_sessions {
            return Err(Error::Other(format!(
                "Max sessions reached ({})",
                self.max_sessions
            )));
        }

        records.insert(call_id.to_string(), record);
        Ok(())
    }

    fn remove(&self, call_id: &str) -> Option<Arc<T>> {
        self.records.write().remove(call_id)
    }

    fn count(&self) -> usize {
        self.records.read().len()
    }

    fn ids(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }
}
