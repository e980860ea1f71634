use crate::{
    errors::{ChannelError, PreimageOracleError, PreimageOracleResult},
    traits::{Channel, HintRouter, PreimageFetcher},
    verify_preimage, PreimageKey, PreimageOracleClient, PreimageOracleServer, PreimageVerifier,
    RequestStatus, StandardVerifier,
};
use alloc::{boxed::Box, string::String, vec::Vec};
use async_trait::async_trait;
use tracing::{trace, warn};

/// An [OracleReader] is a high-level interface to the preimage oracle channel.
#[derive(Debug, Clone, Copy)]
pub struct OracleReader<C> {
    channel: C,
}

impl<C> OracleReader<C>
where
    C: Channel,
{
    /// Create a new [OracleReader] from a [Channel].
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Returns a reference to the underlying [Channel].
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Write the preimage key to the host, and block until the host has prepared the preimage and
    /// responded with its length.
    async fn write_key(&self, key: PreimageKey) -> PreimageOracleResult<usize> {
        let key_bytes: [u8; 32] = key.into();
        self.channel.write(&key_bytes).await?;

        let mut length_buffer = [0u8; 8];
        self.channel.read_exact(&mut length_buffer).await?;
        usize::try_from(u64::from_be_bytes(length_buffer)).map_err(|_| {
            PreimageOracleError::Other(alloc::format!("Preimage for key {key} is too large"))
        })
    }
}

#[async_trait]
impl<C> PreimageOracleClient for OracleReader<C>
where
    C: Channel + Send + Sync,
{
    /// Get the data corresponding to the currently set key from the host. Return the data in a new
    /// heap allocated `Vec<u8>`
    async fn get(&self, key: PreimageKey) -> PreimageOracleResult<Vec<u8>> {
        trace!(target: "oracle_client", "Requesting data from preimage oracle. Key {key}");

        let length = self.write_key(key).await?;

        if length == 0 {
            return Ok(Default::default());
        }

        let mut data_buffer = alloc::vec![0; length];

        trace!(target: "oracle_client", "Reading data from preimage oracle. Key {key}");

        self.channel.read_exact(&mut data_buffer).await.map_err(ChannelError::mid_frame)?;

        trace!(target: "oracle_client", "Successfully read data from preimage oracle. Key: {key}");

        Ok(data_buffer)
    }

    /// Get the data corresponding to the currently set key from the host. Write the data into the
    /// provided buffer
    async fn get_exact(&self, key: PreimageKey, buf: &mut [u8]) -> PreimageOracleResult<()> {
        trace!(target: "oracle_client", "Requesting data from preimage oracle. Key {key}");

        let length = self.write_key(key).await?;

        // The body is left on the wire, so the channel can not be used past this error.
        if buf.len() != length {
            return Err(PreimageOracleError::BufferLengthMismatch(length, buf.len()));
        }

        if length == 0 {
            return Ok(());
        }

        trace!(target: "oracle_client", "Reading data from preimage oracle. Key {key}");

        self.channel.read_exact(buf).await.map_err(ChannelError::mid_frame)?;

        trace!(target: "oracle_client", "Successfully read data from preimage oracle. Key: {key}");

        Ok(())
    }
}

/// A [VerifyingOracleReader] checks every preimage returned by the wrapped
/// [PreimageOracleClient] against the key it was requested under.
#[derive(Debug, Clone, Copy)]
pub struct VerifyingOracleReader<O, V = StandardVerifier> {
    inner: O,
    verifier: V,
}

impl<O> VerifyingOracleReader<O> {
    /// Wrap `inner` with the [StandardVerifier].
    pub const fn new(inner: O) -> Self {
        Self { inner, verifier: StandardVerifier }
    }
}

impl<O, V> VerifyingOracleReader<O, V> {
    /// Wrap `inner` with a custom [PreimageVerifier].
    pub const fn with_verifier(inner: O, verifier: V) -> Self {
        Self { inner, verifier }
    }

    /// Returns a reference to the wrapped client.
    pub const fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O, V> PreimageOracleClient for VerifyingOracleReader<O, V>
where
    O: PreimageOracleClient + Send + Sync,
    V: PreimageVerifier + Send + Sync,
{
    async fn get(&self, key: PreimageKey) -> PreimageOracleResult<Vec<u8>> {
        let preimage = self.inner.get(key).await?;
        self.verifier.verify(&key.into(), &preimage)?;
        Ok(preimage)
    }

    async fn get_exact(&self, key: PreimageKey, buf: &mut [u8]) -> PreimageOracleResult<()> {
        self.inner.get_exact(key, buf).await?;
        self.verifier.verify(&key.into(), buf)
    }
}

/// A [VerifyingFetcher] lets the host check what it hands out: every preimage returned by the
/// wrapped [PreimageFetcher] is verified with [verify_preimage] before it reaches the wire. Hints
/// are forwarded to the wrapped [HintRouter], if it is one.
#[derive(Debug, Clone)]
pub struct VerifyingFetcher<F> {
    inner: F,
}

impl<F> VerifyingFetcher<F> {
    /// Wrap `inner`.
    pub const fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<F> PreimageFetcher for VerifyingFetcher<F>
where
    F: PreimageFetcher + Send + Sync,
{
    async fn get_preimage(&self, key: PreimageKey) -> PreimageOracleResult<Vec<u8>> {
        let preimage = self.inner.get_preimage(key).await?;
        if let Err(e) = verify_preimage(&key.into(), &preimage) {
            warn!(target: "oracle_server", "Refusing unverified preimage for key {key}: {e}");
            return Err(e);
        }
        Ok(preimage)
    }
}

#[async_trait]
impl<F> HintRouter for VerifyingFetcher<F>
where
    F: HintRouter + Send + Sync,
{
    async fn route_hint(&self, hint: String) -> PreimageOracleResult<()> {
        self.inner.route_hint(hint).await
    }
}

/// An [OracleServer] is a router for the host to serve data back to the client [OracleReader].
#[derive(Debug, Clone, Copy)]
pub struct OracleServer<C> {
    channel: C,
}

impl<C> OracleServer<C>
where
    C: Channel,
{
    /// Create a new [OracleServer] from a [Channel].
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Returns a reference to the underlying [Channel].
    pub const fn channel(&self) -> &C {
        &self.channel
    }
}

#[async_trait]
impl<C> PreimageOracleServer for OracleServer<C>
where
    C: Channel + Send + Sync,
{
    async fn next_preimage_request<F>(&self, fetcher: &F) -> PreimageOracleResult<RequestStatus>
    where
        F: PreimageFetcher + Send + Sync,
    {
        // Read the preimage request from the client. A hang-up here ends the session cleanly.
        let mut buf = [0u8; 32];
        match self.channel.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(ChannelError::EndOfStream) => {
                trace!(target: "oracle_server", "Preimage channel closed by the client");
                return Ok(RequestStatus::EndOfStream);
            }
            Err(e) => return Err(e.into()),
        }
        let preimage_key = PreimageKey::try_from(buf)?;

        trace!(target: "oracle_server", "Fetching preimage for key {preimage_key}");

        // Fetch the preimage value from the preimage getter. On failure no response is written.
        let value = fetcher.get_preimage(preimage_key).await?;

        // Write the length as a big-endian u64 followed by the data.
        self.channel.write(&(value.len() as u64).to_be_bytes()).await?;
        if !value.is_empty() {
            self.channel.write(&value).await?;
        }

        trace!(target: "oracle_server", "Successfully wrote preimage data for key {preimage_key}");

        Ok(RequestStatus::Served)
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;
    use crate::{BidirectionalChannel, FileChannel, PreimageKeyType};
    use alloc::sync::Arc;
    use alloy_primitives::{keccak256, B256};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct TestFetcher {
        preimages: Arc<Mutex<HashMap<PreimageKey, Vec<u8>>>>,
    }

    impl TestFetcher {
        fn with(entries: &[(PreimageKey, &[u8])]) -> Self {
            let preimages = entries.iter().map(|(k, v)| (*k, v.to_vec())).collect();
            Self { preimages: Arc::new(Mutex::new(preimages)) }
        }
    }

    #[async_trait]
    impl PreimageFetcher for TestFetcher {
        async fn get_preimage(&self, key: PreimageKey) -> PreimageOracleResult<Vec<u8>> {
            let read_lock = self.preimages.lock().await;
            read_lock.get(&key).cloned().ok_or(PreimageOracleError::KeyNotFound)
        }
    }

    /// Serve preimages on `host` until the client hangs up.
    fn spawn_server(host: FileChannel, fetcher: TestFetcher) -> tokio::task::JoinHandle<usize> {
        tokio::task::spawn(async move {
            let oracle_server = OracleServer::new(host);
            let mut served = 0;
            loop {
                match oracle_server.next_preimage_request(&fetcher).await {
                    Ok(RequestStatus::Served) => served += 1,
                    Ok(RequestStatus::EndOfStream) => break,
                    Err(e) => panic!("Unexpected error: {e:?}"),
                }
            }
            served
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oracle_reader_get_exact() {
        const MOCK_DATA_A: &[u8] = b"1234567890";
        const MOCK_DATA_B: &[u8] = b"FACADE";
        let key_a: PreimageKey =
            PreimageKey::new(*keccak256(MOCK_DATA_A), PreimageKeyType::Keccak256);
        let key_b: PreimageKey =
            PreimageKey::new(*keccak256(MOCK_DATA_B), PreimageKeyType::Keccak256);

        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let server =
            spawn_server(host, TestFetcher::with(&[(key_a, MOCK_DATA_A), (key_b, MOCK_DATA_B)]));

        let oracle_reader = OracleReader::new(client);
        let mut contents_a = [0u8; 10];
        let mut contents_b = [0u8; 6];
        oracle_reader.get_exact(key_a, &mut contents_a).await.unwrap();
        oracle_reader.get_exact(key_b, &mut contents_b).await.unwrap();
        oracle_reader.channel().close().await.unwrap();

        assert_eq!(contents_a, MOCK_DATA_A);
        assert_eq!(contents_b, MOCK_DATA_B);
        assert_eq!(server.await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oracle_client_and_host() {
        const MOCK_DATA_A: &[u8] = b"1234567890";
        const MOCK_DATA_B: &[u8] = b"FACADE";
        let key_a = PreimageKey::keccak256_of(MOCK_DATA_A);
        let key_b = PreimageKey::keccak256_of(MOCK_DATA_B);
        let key_empty = PreimageKey::new_local(0);

        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let fetcher = TestFetcher::with(&[
            (key_a, MOCK_DATA_A),
            (key_b, MOCK_DATA_B),
            (key_empty, b"".as_slice()),
        ]);
        let server = spawn_server(host, fetcher);

        let oracle_reader = OracleReader::new(client);
        assert_eq!(oracle_reader.get(key_a).await.unwrap(), MOCK_DATA_A);
        assert_eq!(oracle_reader.get(key_empty).await.unwrap(), b"");
        assert_eq!(oracle_reader.get(key_b).await.unwrap(), MOCK_DATA_B);
        oracle_reader.channel().close().await.unwrap();

        assert_eq!(server.await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oracle_responses_in_request_order() {
        let payloads: Vec<Vec<u8>> = (0u8..16).map(|i| alloc::vec![i; i as usize + 1]).collect();
        let keys: Vec<_> = (0..16).map(PreimageKey::new_local).collect();
        let entries: Vec<_> =
            keys.iter().copied().zip(payloads.iter().map(Vec::as_slice)).collect();

        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let server = spawn_server(host, TestFetcher::with(&entries));

        let oracle_reader = OracleReader::new(client);
        for (key, payload) in keys.iter().zip(&payloads) {
            assert_eq!(&oracle_reader.get(*key).await.unwrap(), payload);
        }
        oracle_reader.channel().close().await.unwrap();
        assert_eq!(server.await.unwrap(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_local_key_on_the_wire() {
        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let key = PreimageKey::new_local(0xFFFF_FFFF);

        let server = tokio::task::spawn(async move {
            let mut raw_key = [0u8; 32];
            host.read_exact(&mut raw_key).await.unwrap();
            host.write(&5u64.to_be_bytes()).await.unwrap();
            host.write(b"hello").await.unwrap();
            raw_key
        });

        let oracle_reader = VerifyingOracleReader::new(OracleReader::new(client));
        assert_eq!(oracle_reader.get(key).await.unwrap(), b"hello");

        let mut expected = [0u8; 32];
        expected[0] = 0x01;
        expected[28..].copy_from_slice(&[0xFF; 4]);
        assert_eq!(server.await.unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_verifying_reader_detects_tampering() {
        let key = PreimageKey::keccak256_of(b"abc");

        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let honest = spawn_server(host, TestFetcher::with(&[(key, b"abc".as_slice())]));
        let oracle_reader = VerifyingOracleReader::new(OracleReader::new(client));
        assert_eq!(oracle_reader.get(key).await.unwrap(), b"abc");
        oracle_reader.inner().channel().close().await.unwrap();
        honest.await.unwrap();

        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let _lying = spawn_server(host, TestFetcher::with(&[(key, b"abd".as_slice())]));
        let oracle_reader = VerifyingOracleReader::new(OracleReader::new(client));
        assert!(matches!(
            oracle_reader.get(key).await,
            Err(PreimageOracleError::IncorrectData(k)) if k == B256::from(key)
        ));
        let mut buf = [0u8; 3];
        assert!(matches!(
            oracle_reader.get_exact(key, &mut buf).await,
            Err(PreimageOracleError::IncorrectData(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_verifying_reader_unknown_kind() {
        struct Unchecked(Vec<u8>);

        #[async_trait]
        impl PreimageOracleClient for Unchecked {
            async fn get(&self, _: PreimageKey) -> PreimageOracleResult<Vec<u8>> {
                Ok(self.0.clone())
            }

            async fn get_exact(&self, _: PreimageKey, buf: &mut [u8]) -> PreimageOracleResult<()> {
                buf.copy_from_slice(&self.0);
                Ok(())
            }
        }

        struct RawKeyVerifier;

        impl PreimageVerifier for RawKeyVerifier {
            fn verify(&self, key: &[u8; 32], preimage: &[u8]) -> PreimageOracleResult<()> {
                let mut raw = *key;
                raw[0] = 0xFE;
                StandardVerifier.verify(&raw, preimage)
            }
        }

        let oracle_reader =
            VerifyingOracleReader::with_verifier(Unchecked(b"abc".to_vec()), RawKeyVerifier);
        assert!(matches!(
            oracle_reader.get(PreimageKey::keccak256_of(b"abc")).await,
            Err(PreimageOracleError::UnsupportedKeyKind(0xFE))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_get_exact_buffer_mismatch() {
        let key = PreimageKey::new_local(1);
        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let _server = spawn_server(host, TestFetcher::with(&[(key, b"four".as_slice())]));

        let oracle_reader = OracleReader::new(client);
        let mut buf = [0u8; 3];
        assert!(matches!(
            oracle_reader.get_exact(key, &mut buf).await,
            Err(PreimageOracleError::BufferLengthMismatch(4, 3))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_rejects_unknown_kind_without_response() {
        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let mut raw_key = [0u8; 32];
        raw_key[0] = 0xFE;
        client.write(&raw_key).await.unwrap();

        let oracle_server = OracleServer::new(host);
        assert!(matches!(
            oracle_server.next_preimage_request(&TestFetcher::default()).await,
            Err(PreimageOracleError::UnsupportedKeyKind(0xFE))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_lookup_error_writes_nothing() {
        let BidirectionalChannel { client, host } = BidirectionalChannel::new().unwrap();
        let known = PreimageKey::new_local(2);
        let fetcher = TestFetcher::with(&[(known, b"xy".as_slice())]);
        let oracle_server = OracleServer::new(host);

        client.write(&<[u8; 32]>::from(PreimageKey::new_local(1))).await.unwrap();
        assert!(matches!(
            oracle_server.next_preimage_request(&fetcher).await,
            Err(PreimageOracleError::KeyNotFound)
        ));

        // The next response on the wire belongs to the next request.
        client.write(&<[u8; 32]>::from(known)).await.unwrap();
        assert_eq!(
            oracle_server.next_preimage_request(&fetcher).await.unwrap(),
            RequestStatus::Served
        );
        let mut response = [0u8; 10];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(response, [0, 0, 0, 0, 0, 0, 0, 2, b'x', b'y']);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_verifying_fetcher() {
        let key = PreimageKey::keccak256_of(b"abc");
        let honest = VerifyingFetcher::new(TestFetcher::with(&[(key, b"abc".as_slice())]));
        let lying = VerifyingFetcher::new(TestFetcher::with(&[(key, b"abd".as_slice())]));

        assert_eq!(honest.get_preimage(key).await.unwrap(), b"abc");
        assert!(matches!(
            lying.get_preimage(key).await,
            Err(PreimageOracleError::IncorrectData(_))
        ));
        assert!(matches!(
            honest.get_preimage(PreimageKey::keccak256_of(b"nope")).await,
            Err(PreimageOracleError::KeyNotFound)
        ));
    }
}
