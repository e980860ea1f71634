//! Contains a concrete implementation of the [KeyValueStore] trait that stores data in memory.

use super::KeyValueStore;
use alloy_primitives::{Bytes, B256};
use anyhow::{Context, Result};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path};
use tracing::debug;

/// A simple, synchronous key-value store that stores data in memory.
#[derive(Default, Clone, Debug, Eq, PartialEq)]
pub struct MemoryKeyValueStore {
    store: HashMap<B256, Vec<u8>>,
}

impl MemoryKeyValueStore {
    /// Create a new [MemoryKeyValueStore] with an empty store.
    pub fn new() -> Self {
        Self { store: HashMap::new() }
    }

    /// Load a [MemoryKeyValueStore] from a JSON object mapping hex keys to hex values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open preimage file {}", path.display()))?;
        let entries: HashMap<B256, Bytes> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse preimage file {}", path.display()))?;

        debug!(target: "kv_store", "Loaded {} preimages from {}", entries.len(), path.display());
        Ok(entries.into_iter().map(|(k, v)| (k, v.to_vec())).collect())
    }

    /// Returns the number of entries in the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl FromIterator<(B256, Vec<u8>)> for MemoryKeyValueStore {
    fn from_iter<T: IntoIterator<Item = (B256, Vec<u8>)>>(iter: T) -> Self {
        Self { store: iter.into_iter().collect() }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: B256) -> Option<Vec<u8>> {
        self.store.get(&key).cloned()
    }

    fn set(&mut self, key: B256, value: Vec<u8>) {
        self.store.insert(key, value);
    }
}
