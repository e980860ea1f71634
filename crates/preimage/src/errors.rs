//! Errors for the `fpvm-preimage` crate.

use alloc::{boxed::Box, string::String};
use alloy_primitives::B256;
use core::fmt;
use thiserror::Error;

/// A [PreimageOracleError] is an enum that differentiates channel-related errors from other errors
/// in the oracle and hint clients and servers.
///
/// On the client side every variant is fatal: a client program executing deterministically can not
/// make progress past a broken oracle. On the host side, only [PreimageOracleError::IOError] leaves
/// the wire in an indeterminate state.
#[derive(Error, Debug)]
pub enum PreimageOracleError {
    /// The channel has been broken.
    #[error(transparent)]
    IOError(#[from] ChannelError),
    /// The type byte of the preimage key does not name a supported key kind.
    #[error("Unsupported preimage key kind: {0:#04x}.")]
    UnsupportedKeyKind(u8),
    /// The preimage does not hash to the key it was requested under.
    #[error("Incorrect preimage data for key {0}.")]
    IncorrectData(B256),
    /// Key not found.
    #[error("Key not found.")]
    KeyNotFound,
    /// Buffer length mismatch.
    #[error("Buffer length mismatch. Expected {0}, got {1}.")]
    BufferLengthMismatch(usize, usize),
    /// Other errors.
    #[error("Error in preimage server: {0}")]
    Other(String),
}

impl PreimageOracleError {
    /// Returns `true` if the error was raised by the underlying [Channel].
    ///
    /// [Channel]: crate::Channel
    pub const fn is_channel_error(&self) -> bool {
        matches!(self, Self::IOError(_))
    }
}

/// A [Result] type for the [PreimageOracleError] enum.
pub type PreimageOracleResult<T> = Result<T, PreimageOracleError>;

/// A [ChannelError] is an enum that describes the error cases of a [Channel] trait implementation.
///
/// [Channel]: crate::Channel
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The channel is closed.
    #[error("Channel is closed.")]
    Closed,
    /// The counterparty closed the stream before any byte of the requested read arrived.
    #[error("End of stream.")]
    EndOfStream,
    /// Unexpected EOF.
    #[error("Unexpected EOF in channel read operation.")]
    UnexpectedEOF,
    /// The deadline of a single read or write attempt lapsed.
    #[error("Channel operation deadline exceeded.")]
    DeadlineExceeded,
    /// The operation was cancelled after `transferred` bytes had been moved.
    #[error("Channel operation cancelled after transferring {transferred} bytes.")]
    Cancelled {
        /// The number of bytes read or written before the cancellation was observed.
        transferred: usize,
    },
    /// An error reported by the operating system.
    #[cfg(feature = "std")]
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// One or both ends of the channel failed to close.
    #[error(transparent)]
    Close(#[from] CloseError),
}

impl ChannelError {
    /// Reclassifies an [ChannelError::EndOfStream] that was observed after the first byte of a
    /// frame as an [ChannelError::UnexpectedEOF].
    pub fn mid_frame(self) -> Self {
        match self {
            Self::EndOfStream => Self::UnexpectedEOF,
            err => err,
        }
    }
}

/// A [Result] type for the [ChannelError] enum.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// The composite error of closing both ends of a channel. At least one of the fields is set.
#[derive(Debug, Default)]
pub struct CloseError {
    /// The error raised while closing the read end, if any.
    pub read: Option<Box<ChannelError>>,
    /// The error raised while closing the write end, if any.
    pub write: Option<Box<ChannelError>>,
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to close channel")?;
        if let Some(read) = &self.read {
            write!(f, "; read end: {read}")?;
        }
        if let Some(write) = &self.write {
            write!(f, "; write end: {write}")?;
        }
        Ok(())
    }
}

impl core::error::Error for CloseError {}
