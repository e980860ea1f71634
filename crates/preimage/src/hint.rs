use crate::{
    errors::{ChannelError, PreimageOracleError, PreimageOracleResult},
    traits::{HintRouter, HintWriterClient},
    Channel, HintReaderServer, RequestStatus,
};
use alloc::{boxed::Box, format, string::String, vec::Vec};
use async_trait::async_trait;
use tracing::{error, trace};

/// The largest step by which [HintReader] grows its buffer while reading a hint payload.
const HINT_READ_CHUNK: usize = 64 * 1024;

/// A [HintWriter] is a high-level interface to the hint channel. It provides a way to write hints
/// to the host.
#[derive(Debug, Clone, Copy)]
pub struct HintWriter<C> {
    channel: C,
}

impl<C> HintWriter<C> {
    /// Create a new [HintWriter] from a [Channel].
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Returns a reference to the underlying [Channel].
    pub const fn channel(&self) -> &C {
        &self.channel
    }
}

#[async_trait]
impl<C> HintWriterClient for HintWriter<C>
where
    C: Channel + Send + Sync,
{
    /// Write a hint to the host, and block until the host has acknowledged it.
    async fn write(&self, hint: &str) -> PreimageOracleResult<()> {
        let len = u32::try_from(hint.len()).map_err(|_| {
            PreimageOracleError::Other(format!("Hint too large for a frame: {} bytes", hint.len()))
        })?;

        // Form the hint into a single frame: a 4-byte big-endian length prefix followed by the
        // hint string.
        let mut frame = Vec::with_capacity(hint.len() + 4);
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(hint.as_bytes());

        trace!(target: "hint_writer", "Writing hint \"{hint}\"");
        self.channel.write(&frame).await?;
        trace!(target: "hint_writer", "Successfully wrote hint");

        // Read the hint acknowledgement from the host. Its value carries no meaning.
        let mut hint_ack = [0u8; 1];
        self.channel.read_exact(&mut hint_ack).await?;

        trace!(target: "hint_writer", "Received hint acknowledgement");

        Ok(())
    }
}

/// A [HintReader] is a router for hints sent by the [HintWriter] from the client program. It
/// provides a way for the host to prepare preimages for reading.
#[derive(Debug, Clone, Copy)]
pub struct HintReader<C> {
    channel: C,
}

impl<C> HintReader<C>
where
    C: Channel,
{
    /// Create a new [HintReader] from a [Channel].
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Returns a reference to the underlying [Channel].
    pub const fn channel(&self) -> &C {
        &self.channel
    }
}

#[async_trait]
impl<C> HintReaderServer for HintReader<C>
where
    C: Channel + Send + Sync,
{
    async fn next_hint<R>(&self, hint_router: &R) -> PreimageOracleResult<RequestStatus>
    where
        R: HintRouter + Send + Sync,
    {
        // Read the length of the raw hint payload. A hang-up here ends the session cleanly.
        let mut len_buf = [0u8; 4];
        match self.channel.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(ChannelError::EndOfStream) => {
                trace!(target: "hint_reader", "Hint channel closed by the client");
                return Ok(RequestStatus::EndOfStream);
            }
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf) as usize;

        // Read the raw hint payload. The buffer only grows as bytes arrive, so a bogus length
        // prefix can not reserve more than one chunk ahead of the data.
        let mut raw_payload = Vec::with_capacity(len.min(HINT_READ_CHUNK));
        while raw_payload.len() < len {
            let filled = raw_payload.len();
            raw_payload.resize(len.min(filled + HINT_READ_CHUNK), 0);
            self.channel
                .read_exact(&mut raw_payload[filled..])
                .await
                .map_err(ChannelError::mid_frame)?;
        }

        let routed = match String::from_utf8(raw_payload) {
            Ok(payload) => {
                trace!(target: "hint_reader", "Successfully read hint: \"{payload}\"");
                hint_router.route_hint(payload).await
            }
            Err(e) => {
                Err(PreimageOracleError::Other(format!("Failed to decode hint payload: {e}")))
            }
        };

        // Write back an acknowledgement to the client to unblock their process, whether or not
        // the hint was routed.
        self.channel.write(&[0x00]).await?;

        if let Err(e) = routed {
            error!(target: "hint_reader", "Failed to route hint: {e}");
            return Err(e);
        }

        trace!(target: "hint_reader", "Successfully routed and acknowledged hint");

        Ok(RequestStatus::Served)
    }
}
