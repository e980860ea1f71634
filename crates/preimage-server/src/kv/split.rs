//! Contains a concrete implementation of the [KeyValueStore] trait that splits between two separate
//! [KeyValueStore]s depending on [PreimageKeyType].

use super::KeyValueStore;
use alloy_primitives::B256;
use fpvm_preimage::PreimageKeyType;

/// A split implementation of the [KeyValueStore] trait. [PreimageKeyType::Local] keys are served
/// from the local store, every other key from the global store.
#[derive(Default, Clone, Debug)]
pub struct SplitKeyValueStore<L, G>
where
    L: KeyValueStore,
    G: KeyValueStore,
{
    local_store: L,
    global_store: G,
}

impl<L, G> SplitKeyValueStore<L, G>
where
    L: KeyValueStore,
    G: KeyValueStore,
{
    /// Create a new [SplitKeyValueStore] with the given local and global [KeyValueStore]s.
    pub const fn new(local_store: L, global_store: G) -> Self {
        Self { local_store, global_store }
    }
}

impl<L, G> KeyValueStore for SplitKeyValueStore<L, G>
where
    L: KeyValueStore,
    G: KeyValueStore,
{
    fn get(&self, key: B256) -> Option<Vec<u8>> {
        match PreimageKeyType::try_from(key[0]).ok()? {
            PreimageKeyType::Local => self.local_store.get(key),
            _ => self.global_store.get(key),
        }
    }

    fn set(&mut self, key: B256, value: Vec<u8>) {
        match PreimageKeyType::try_from(key[0]) {
            Ok(PreimageKeyType::Local) => self.local_store.set(key, value),
            _ => self.global_store.set(key, value),
        }
    }
}
