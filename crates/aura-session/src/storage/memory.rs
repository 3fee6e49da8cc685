//! In-memory key-value storage.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use aura_core::traits::{KeyValueStore, StorageError};

/// In-memory storage implementation.
///
/// Useful for tests and ephemeral runs.
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().map_or(0, |s| s.len())
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .slots
            .read()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
