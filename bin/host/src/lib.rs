#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod cli;
pub use cli::{init_tracing_subscriber, HostCli};

use anyhow::Result;
use fpvm_preimage::{
    FileChannel, FpvmChannels, HintReader, OracleServer, PollingChannel, VerifyingFetcher,
};
use fpvm_preimage_server::{KvHostBackend, PreimageServer};
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Starts the [PreimageServer] in the primary thread, serving the channels on the file descriptors
/// inherited from the parent process. An interrupt signal shuts the server down.
pub async fn start_server(cfg: HostCli) -> Result<()> {
    // SAFETY: The host program is spawned with descriptors 3 through 6 opened for it, and this is
    // the only place they are taken.
    let channels = unsafe { FpvmChannels::inherited()? };
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "preimage_host", "Received interrupt, shutting down preimage server");
            shutdown.cancel();
        }
    });

    serve(&cfg, channels, cancel).await
}

/// Serves the configured preimages over `channels` until the client hangs up or `cancel` fires.
/// Cancellation is a clean shutdown.
pub async fn serve(cfg: &HostCli, channels: FpvmChannels, cancel: CancellationToken) -> Result<()> {
    let kv_store = cfg.construct_kv_store()?;
    let poll =
        |channel: FileChannel| PollingChannel::new(channel, cancel.clone(), cfg.poll_interval());
    let hint_reader = HintReader::new(poll(channels.hint));
    let oracle_server = OracleServer::new(poll(channels.preimage));
    let backend = KvHostBackend::new(kv_store);

    info!("Starting preimage server.");
    let result = if cfg.verify {
        let backend = Arc::new(VerifyingFetcher::new(backend));
        PreimageServer::new(oracle_server, hint_reader, backend).start().await
    } else {
        PreimageServer::new(oracle_server, hint_reader, Arc::new(backend)).start().await
    };

    match result {
        Err(e) if cancel.is_cancelled() => {
            info!("Preimage server shut down: {e}");
            Ok(())
        }
        result => {
            info!("Preimage server has exited.");
            result
        }
    }
}
