//! Plain data types shared by the clients, servers, and transports.

/// The file descriptors inherited by a client program running inside a fault proof VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDescriptor {
    /// Read-only. Used to read the hint acknowledgement from the host.
    HintRead = 3,
    /// Write-only. Used to write hints to the host.
    HintWrite = 4,
    /// Read-only. Used to read pre-image responses from the host.
    PreimageRead = 5,
    /// Write-only. Used to write pre-image requests to the host.
    PreimageWrite = 6,
}

impl From<FileDescriptor> for i32 {
    fn from(fd: FileDescriptor) -> Self {
        fd as Self
    }
}

impl From<FileDescriptor> for usize {
    fn from(fd: FileDescriptor) -> Self {
        fd as Self
    }
}

/// The outcome of a single successful server iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// A request was read and answered.
    Served,
    /// The counterparty closed its end of the channel cleanly, before the first byte of a new
    /// request. No response was written.
    EndOfStream,
}

impl RequestStatus {
    /// Returns `true` if the counterparty hung up.
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}
