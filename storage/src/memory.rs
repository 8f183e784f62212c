use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{KeyValueStore, Result, StoreConnector};

/// In-process store. Clones share the same map, so every "connection" opened
/// from it sees the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    db: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.db.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.lock().is_empty()
    }

    /// Copy of the whole content.
    pub fn snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.db.lock().clone()
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.db.lock().remove(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

impl StoreConnector for MemoryStore {
    type Store = MemoryStore;

    fn connect(&self) -> Result<Self::Store> {
        Ok(self.clone())
    }
}
