//! A [Channel] whose reads and writes can be interrupted by an external [CancellationToken].

use crate::{
    errors::{ChannelError, ChannelResult},
    Channel, FileChannel,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// The default interval at which a [PollingChannel] checks for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A [PollingChannel] wraps a [FileChannel] and bounds every blocking read and write by
/// `poll_interval`. Between attempts it checks its [CancellationToken]; once the token fires, the
/// pending operation returns [ChannelError::Cancelled] with the number of bytes moved so far.
///
/// Cancellation leaves the stream part way through a frame, so the channel should be discarded
/// afterwards.
#[derive(Debug, Clone)]
pub struct PollingChannel {
    channel: FileChannel,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl PollingChannel {
    /// Create a new [PollingChannel].
    pub const fn new(
        channel: FileChannel,
        cancel: CancellationToken,
        poll_interval: Duration,
    ) -> Self {
        Self { channel, cancel, poll_interval }
    }

    /// Returns the wrapped [FileChannel].
    pub const fn inner(&self) -> &FileChannel {
        &self.channel
    }

    /// Returns the interval at which the channel checks for cancellation.
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the [CancellationToken] observed by the channel.
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Reads into `buf` until at least `min` bytes have been filled.
    async fn poll_read(&self, buf: &mut [u8], min: usize) -> ChannelResult<usize> {
        let mut filled = 0;
        while filled < min {
            let deadline = Instant::now() + self.poll_interval;
            match self.channel.reader_handle().read(&mut buf[filled..], Some(deadline)).await {
                Ok(n) => filled += n,
                Err(ChannelError::DeadlineExceeded) => {
                    if self.cancel.is_cancelled() {
                        trace!(target: "polling_channel", "Read cancelled after {filled} bytes");
                        return Err(ChannelError::Cancelled { transferred: filled });
                    }
                }
                Err(ChannelError::EndOfStream) if filled > 0 => {
                    return Err(ChannelError::UnexpectedEOF)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[async_trait]
impl Channel for PollingChannel {
    async fn read(&self, buf: &mut [u8]) -> ChannelResult<usize> {
        let min = buf.len().min(1);
        self.poll_read(buf, min).await
    }

    async fn read_exact(&self, buf: &mut [u8]) -> ChannelResult<usize> {
        let len = buf.len();
        self.poll_read(buf, len).await
    }

    async fn write(&self, buf: &[u8]) -> ChannelResult<usize> {
        let mut written = 0;
        while written < buf.len() {
            let deadline = Instant::now() + self.poll_interval;
            match self.channel.writer_handle().write(&buf[written..], Some(deadline)).await {
                Ok(n) => written += n,
                Err(ChannelError::DeadlineExceeded) => {
                    if self.cancel.is_cancelled() {
                        trace!(target: "polling_channel", "Write cancelled after {written} bytes");
                        return Err(ChannelError::Cancelled { transferred: written });
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    async fn close(&self) -> ChannelResult<()> {
        self.channel.close().await
    }
}
