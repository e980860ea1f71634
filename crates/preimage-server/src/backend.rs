//! Contains the [KvHostBackend], a [KeyValueStore]-backed [PreimageFetcher] and [HintRouter].

use crate::kv::KeyValueStore;
use async_trait::async_trait;
use fpvm_preimage::{
    errors::{PreimageOracleError, PreimageOracleResult},
    HintRouter, PreimageFetcher, PreimageKey,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A [KeyValueStore]-backed implementation of the [PreimageFetcher] and [HintRouter] traits.
///
/// The store is expected to hold every preimage the client will ask for, so hints are only
/// logged.
#[derive(Debug)]
pub struct KvHostBackend<KV>
where
    KV: KeyValueStore + ?Sized,
{
    inner: Arc<RwLock<KV>>,
}

impl<KV> KvHostBackend<KV>
where
    KV: KeyValueStore + ?Sized,
{
    /// Create a new [KvHostBackend] from the given [KeyValueStore].
    pub const fn new(kv_store: Arc<RwLock<KV>>) -> Self {
        Self { inner: kv_store }
    }
}

#[async_trait]
impl<KV> PreimageFetcher for KvHostBackend<KV>
where
    KV: KeyValueStore + Send + Sync + ?Sized,
{
    async fn get_preimage(&self, key: PreimageKey) -> PreimageOracleResult<Vec<u8>> {
        let kv_store = self.inner.read().await;
        kv_store.get(key.into()).ok_or(PreimageOracleError::KeyNotFound)
    }
}

#[async_trait]
impl<KV> HintRouter for KvHostBackend<KV>
where
    KV: KeyValueStore + Send + Sync + ?Sized,
{
    async fn route_hint(&self, hint: String) -> PreimageOracleResult<()> {
        debug!(target: "preimage_server", "Received hint: {hint}");
        Ok(())
    }
}
