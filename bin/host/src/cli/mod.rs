//! This module contains all CLI-specific code for the host binary.

use anyhow::Result;
use clap::{ArgAction, Parser};
use fpvm_preimage::DEFAULT_POLL_INTERVAL;
use fpvm_preimage_server::{MemoryKeyValueStore, SharedKeyValueStore, SplitKeyValueStore};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::RwLock;

mod tracing_util;
pub use tracing_util::init_tracing_subscriber;

/// The host binary CLI application arguments.
#[derive(Parser, Clone, Debug)]
#[command(about, version)]
pub struct HostCli {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count)]
    pub v: u8,
    /// JSON file of global preimages, keyed by their full 32-byte preimage key.
    #[clap(long)]
    pub preimages: Option<PathBuf>,
    /// JSON file of local preimages, keyed by their full 32-byte preimage key.
    #[clap(long)]
    pub local_preimages: Option<PathBuf>,
    /// Interval, in milliseconds, at which blocked reads check for shutdown.
    #[clap(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,
    /// Verify every preimage against its key before it is sent to the client.
    #[clap(long)]
    pub verify: bool,
}

impl HostCli {
    /// Returns the interval at which blocked reads check for shutdown.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Loads the configured preimage files and returns a new instance of a [SharedKeyValueStore].
    /// A file that is not configured contributes an empty store.
    pub fn construct_kv_store(&self) -> Result<SharedKeyValueStore> {
        let load = |path: &Option<PathBuf>| {
            path.as_ref()
                .map_or_else(|| Ok(MemoryKeyValueStore::new()), MemoryKeyValueStore::from_json_file)
        };

        let split_kv_store =
            SplitKeyValueStore::new(load(&self.local_preimages)?, load(&self.preimages)?);
        Ok(Arc::new(RwLock::new(split_kv_store)))
    }
}
