//! This module contains the [PreimageServer] struct and its implementation.

use anyhow::Result;
use fpvm_preimage::{HintReaderServer, PreimageOracleServer, PreimageServerBackend, RequestStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The [PreimageServer] is responsible for waiting for incoming preimage requests and
/// serving them to the client.
#[derive(Debug)]
pub struct PreimageServer<P, H, B> {
    /// The oracle server.
    oracle_server: P,
    /// The hint router.
    hint_reader: H,
    /// [PreimageServerBackend] that routes hints and retrieves preimages.
    backend: Arc<B>,
}

impl<P, H, B> PreimageServer<P, H, B>
where
    P: PreimageOracleServer + Send + Sync,
    H: HintReaderServer + Send + Sync,
    B: PreimageServerBackend + Send + Sync,
{
    /// Create a new [PreimageServer] with the given [PreimageOracleServer],
    /// [HintReaderServer], and [PreimageServerBackend].
    pub const fn new(oracle_server: P, hint_reader: H, backend: Arc<B>) -> Self {
        Self { oracle_server, hint_reader, backend }
    }

    /// Serves hints and preimage requests until the client has closed both channels.
    ///
    /// Errors raised while routing a hint or fetching a preimage are logged and the next request is
    /// served. A transport error stops the server and is returned.
    pub async fn start(self) -> Result<()> {
        tokio::try_join!(
            Self::start_oracle_server(&self.oracle_server, &self.backend),
            Self::start_hint_router(&self.hint_reader, &self.backend),
        )?;

        info!(target: "preimage_server", "Client disconnected, preimage server stopped");
        Ok(())
    }

    /// Starts the oracle server, which waits for incoming preimage requests and serves them to the
    /// client.
    async fn start_oracle_server(oracle_server: &P, backend: &B) -> Result<()> {
        loop {
            match oracle_server.next_preimage_request(backend).await {
                Ok(RequestStatus::Served) => {}
                Ok(RequestStatus::EndOfStream) => {
                    info!(target: "preimage_server", "Preimage channel closed by the client");
                    return Ok(());
                }
                Err(e) if e.is_channel_error() => {
                    error!(target: "preimage_server", "Preimage channel failed: {e}");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(target: "preimage_server", "Failed to serve preimage request: {e}");
                }
            }
        }
    }

    /// Starts the hint router, which waits for incoming hints and routes them to the appropriate
    /// handler.
    async fn start_hint_router(hint_reader: &H, backend: &B) -> Result<()> {
        loop {
            match hint_reader.next_hint(backend).await {
                Ok(RequestStatus::Served) => {}
                Ok(RequestStatus::EndOfStream) => {
                    info!(target: "preimage_server", "Hint channel closed by the client");
                    return Ok(());
                }
                Err(e) if e.is_channel_error() => {
                    error!(target: "preimage_server", "Hint channel failed: {e}");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(target: "preimage_server", "Failed to route hint: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{KvHostBackend, MemoryKeyValueStore};
    use alloy_primitives::B256;
    use fpvm_preimage::{
        errors::{ChannelError, PreimageOracleError},
        BidirectionalChannel, Channel, FileChannel, HintReader, HintWriter, HintWriterClient,
        OracleReader, OracleServer, PollingChannel, PreimageKey, PreimageOracleClient,
        VerifyingOracleReader,
    };
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tokio_util::sync::CancellationToken;

    fn backend(entries: &[(PreimageKey, &[u8])]) -> Arc<KvHostBackend<MemoryKeyValueStore>> {
        let store = entries.iter().map(|(k, v)| (B256::from(*k), v.to_vec())).collect();
        Arc::new(KvHostBackend::new(Arc::new(RwLock::new(store))))
    }

    fn spawn_server<C>(
        hint: C,
        preimage: C,
        backend: Arc<KvHostBackend<MemoryKeyValueStore>>,
    ) -> tokio::task::JoinHandle<Result<()>>
    where
        C: Channel + Send + Sync + 'static,
    {
        tokio::task::spawn(
            PreimageServer::new(OracleServer::new(preimage), HintReader::new(hint), backend)
                .start(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_serve_until_client_disconnects() {
        let key = PreimageKey::keccak256_of(b"abc");
        let local = PreimageKey::new_local(1);
        let hint = BidirectionalChannel::new().unwrap();
        let preimage = BidirectionalChannel::new().unwrap();
        let server = spawn_server(
            hint.host,
            preimage.host,
            backend(&[(key, b"abc".as_slice()), (local, b"".as_slice())]),
        );

        let hint_writer = HintWriter::new(hint.client);
        let oracle = VerifyingOracleReader::new(OracleReader::new(preimage.client));

        hint_writer.write("prefetch abc").await.unwrap();
        assert_eq!(oracle.get(key).await.unwrap(), b"abc");
        assert_eq!(oracle.get(local).await.unwrap(), b"");

        hint_writer.channel().close().await.unwrap();
        oracle.inner().channel().close().await.unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_continues_after_lookup_error() {
        let known = PreimageKey::new_local(2);
        let hint = BidirectionalChannel::new().unwrap();
        let preimage = BidirectionalChannel::new().unwrap();
        let server = spawn_server(hint.host, preimage.host, backend(&[(known, b"xy".as_slice())]));

        // Neither the unknown kind nor the missing key is answered.
        let mut unknown = [0u8; 32];
        unknown[0] = 0xFE;
        preimage.client.write(&unknown).await.unwrap();
        preimage.client.write(&<[u8; 32]>::from(PreimageKey::new_local(1))).await.unwrap();

        let oracle = OracleReader::new(preimage.client);
        assert_eq!(oracle.get(known).await.unwrap(), b"xy");

        hint.client.close().await.unwrap();
        oracle.channel().close().await.unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_aborts_on_truncated_request() {
        let hint = BidirectionalChannel::new().unwrap();
        let preimage = BidirectionalChannel::new().unwrap();
        let server = spawn_server(hint.host, preimage.host, backend(&[]));

        preimage.client.write(&[0x02; 16]).await.unwrap();
        preimage.client.close().await.unwrap();

        let err = server.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreimageOracleError>(),
            Some(PreimageOracleError::IOError(ChannelError::UnexpectedEOF))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_polling_server_stops() {
        let hint = BidirectionalChannel::new().unwrap();
        let preimage = BidirectionalChannel::new().unwrap();
        let cancel = CancellationToken::new();
        let polling = |channel: FileChannel| {
            PollingChannel::new(channel, cancel.clone(), Duration::from_millis(20))
        };
        let server = spawn_server(polling(hint.host), polling(preimage.host), backend(&[]));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let err = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not observe cancellation")
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreimageOracleError>(),
            Some(PreimageOracleError::IOError(ChannelError::Cancelled { transferred: 0 }))
        ));

        // Keep the client ends open until the server has stopped.
        drop((hint.client, preimage.client));
    }
}
