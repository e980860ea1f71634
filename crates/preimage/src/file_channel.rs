//! A bidirectional [Channel] over two unidirectional OS streams.
//!
//! Each end is attached to the [tokio] reactor when it is a FIFO or a socket. Any other file, or a
//! descriptor that can not be switched to non-blocking mode, is driven through [tokio::fs::File]
//! on the blocking thread pool instead.

use crate::{
    errors::{ChannelError, ChannelResult, CloseError},
    Channel, FileDescriptor,
};
use async_trait::async_trait;
use std::{
    fs::File,
    future::Future,
    io,
    os::{
        fd::{FromRawFd, OwnedFd, RawFd},
        unix::{fs::FileTypeExt, net::UnixStream as StdUnixStream},
    },
    sync::Arc,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{unix::pipe, UnixStream},
    sync::Mutex,
    time::Instant,
};
use tracing::{debug, trace, warn};

/// How an end of a [FileChannel] is driven.
#[derive(Debug)]
enum Attached<P> {
    /// Registered with the reactor as a FIFO.
    Pipe(P),
    /// Registered with the reactor as a socket.
    Socket(UnixStream),
    /// Driven through the blocking thread pool.
    Blocking(tokio::fs::File),
}

impl<P> Attached<P> {
    /// Attaches `file` to the reactor when it is a FIFO (through `as_pipe`) or a socket, and falls
    /// back to blocking IO otherwise.
    fn new(file: File, end: &str, as_pipe: impl FnOnce(File) -> io::Result<P>) -> io::Result<Self> {
        let file_type = file.metadata()?.file_type();
        if !file_type.is_fifo() && !file_type.is_socket() {
            debug!(target: "file_channel", "Using blocking IO for the {end} end");
            return Ok(Self::Blocking(tokio::fs::File::from_std(file)));
        }

        let fallback = file.try_clone()?;
        let attached = if file_type.is_fifo() {
            as_pipe(file).map(Self::Pipe)
        } else {
            let stream = StdUnixStream::from(OwnedFd::from(file));
            stream
                .set_nonblocking(true)
                .and_then(|_| UnixStream::from_std(stream))
                .map(Self::Socket)
        };

        attached.or_else(|e| {
            warn!(target: "file_channel", "Failed to attach {end} end to the reactor: {e}");
            Ok(Self::Blocking(tokio::fs::File::from_std(fallback)))
        })
    }
}

/// The read end of a [FileChannel].
type ReadEnd = Attached<pipe::Receiver>;

impl ReadEnd {
    fn attach(file: File) -> io::Result<Self> {
        Self::new(file, "read", pipe::Receiver::from_file)
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Pipe(receiver) => receiver.read(buf).await,
            Self::Socket(stream) => stream.read(buf).await,
            Self::Blocking(file) => file.read(buf).await,
        }
    }
}

/// The write end of a [FileChannel].
type WriteEnd = Attached<pipe::Sender>;

impl WriteEnd {
    fn attach(file: File) -> io::Result<Self> {
        Self::new(file, "write", pipe::Sender::from_file)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Pipe(sender) => sender.write(buf).await,
            Self::Socket(stream) => stream.write(buf).await,
            Self::Blocking(file) => file.write(buf).await,
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Self::Pipe(sender) => sender.shutdown().await,
            Self::Socket(stream) => stream.shutdown().await,
            Self::Blocking(file) => file.shutdown().await,
        }
    }
}

/// Runs `op`, failing with [ChannelError::DeadlineExceeded] if it has not completed by `deadline`.
async fn with_deadline<T>(
    deadline: Option<Instant>,
    op: impl Future<Output = ChannelResult<T>>,
) -> ChannelResult<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, op)
            .await
            .map_err(|_| ChannelError::DeadlineExceeded)?,
        None => op.await,
    }
}

/// A shareable handle to the read end of a [FileChannel].
#[derive(Debug, Clone)]
pub struct ReadHandle {
    end: Arc<Mutex<Option<ReadEnd>>>,
}

impl ReadHandle {
    /// Performs a single read into `buf`.
    ///
    /// If `deadline` lapses first, [ChannelError::DeadlineExceeded] is returned and no bytes are
    /// consumed from the stream.
    pub async fn read(&self, buf: &mut [u8], deadline: Option<Instant>) -> ChannelResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        with_deadline(deadline, async {
            let mut end = self.end.lock().await;
            let end = end.as_mut().ok_or(ChannelError::Closed)?;
            match end.read(buf).await? {
                0 => Err(ChannelError::EndOfStream),
                n => Ok(n),
            }
        })
        .await
    }

    /// Releases the read end.
    pub async fn close(&self) -> ChannelResult<()> {
        self.end.lock().await.take().map(drop).ok_or(ChannelError::Closed)
    }
}

/// A shareable handle to the write end of a [FileChannel].
#[derive(Debug, Clone)]
pub struct WriteHandle {
    end: Arc<Mutex<Option<WriteEnd>>>,
}

impl WriteHandle {
    /// Performs a single write of a prefix of `buf`.
    ///
    /// If `deadline` lapses first, [ChannelError::DeadlineExceeded] is returned and no bytes have
    /// been written.
    pub async fn write(&self, buf: &[u8], deadline: Option<Instant>) -> ChannelResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        with_deadline(deadline, async {
            let mut end = self.end.lock().await;
            let end = end.as_mut().ok_or(ChannelError::Closed)?;
            match end.write(buf).await? {
                0 => Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                n => Ok(n),
            }
        })
        .await
    }

    /// Flushes and releases the write end.
    pub async fn close(&self) -> ChannelResult<()> {
        let mut end = self.end.lock().await.take().ok_or(ChannelError::Closed)?;
        end.shutdown().await?;
        Ok(())
    }
}

/// [FileChannel] is a handle for one end of a bidirectional channel, composed of a read end and a
/// write end. Clones share both ends.
#[derive(Debug, Clone)]
pub struct FileChannel {
    reader: ReadHandle,
    writer: WriteHandle,
}

impl FileChannel {
    /// Create a new [FileChannel] from a readable and a writable file.
    ///
    /// Must be called from within a [tokio] runtime.
    pub fn new(read: File, write: File) -> ChannelResult<Self> {
        let reader = ReadHandle { end: Arc::new(Mutex::new(Some(ReadEnd::attach(read)?))) };
        let writer = WriteHandle { end: Arc::new(Mutex::new(Some(WriteEnd::attach(write)?))) };
        Ok(Self { reader, writer })
    }

    /// Create a new [FileChannel] that takes ownership of two raw file descriptors.
    ///
    /// # Safety
    /// Both descriptors must be open, and must not be owned or closed by anything else for the
    /// lifetime of the returned channel.
    pub unsafe fn from_raw_fds(read: RawFd, write: RawFd) -> ChannelResult<Self> {
        Self::new(File::from_raw_fd(read), File::from_raw_fd(write))
    }

    /// Create a new [FileChannel] from two of the well-known [FileDescriptor]s inherited by this
    /// process.
    ///
    /// # Safety
    /// See [FileChannel::from_raw_fds].
    pub unsafe fn from_descriptors(
        read: FileDescriptor,
        write: FileDescriptor,
    ) -> ChannelResult<Self> {
        Self::from_raw_fds(read.into(), write.into())
    }

    /// Returns a handle to the read end of the channel.
    pub const fn reader_handle(&self) -> &ReadHandle {
        &self.reader
    }

    /// Returns a handle to the write end of the channel.
    pub const fn writer_handle(&self) -> &WriteHandle {
        &self.writer
    }
}

#[async_trait]
impl Channel for FileChannel {
    async fn read(&self, buf: &mut [u8]) -> ChannelResult<usize> {
        self.reader.read(buf, None).await
    }

    async fn read_exact(&self, buf: &mut [u8]) -> ChannelResult<usize> {
        let mut read = 0;
        while read < buf.len() {
            match self.reader.read(&mut buf[read..], None).await {
                Ok(n) => read += n,
                Err(ChannelError::EndOfStream) if read > 0 => {
                    return Err(ChannelError::UnexpectedEOF)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(read)
    }

    async fn write(&self, buf: &[u8]) -> ChannelResult<usize> {
        let mut written = 0;
        while written < buf.len() {
            written += self.writer.write(&buf[written..], None).await?;
        }
        Ok(written)
    }

    async fn close(&self) -> ChannelResult<()> {
        let read = self.reader.close().await.err().map(Box::new);
        let write = self.writer.close().await.err().map(Box::new);

        if read.is_none() && write.is_none() {
            trace!(target: "file_channel", "Closed both ends of the channel");
            return Ok(());
        }
        Err(CloseError { read, write }.into())
    }
}

/// A pair of connected [FileChannel]s backed by two anonymous OS pipes. Bytes written to one side
/// are read from the other.
#[derive(Debug)]
pub struct BidirectionalChannel {
    /// The client handle of the channel.
    pub client: FileChannel,
    /// The host handle of the channel.
    pub host: FileChannel,
}

impl BidirectionalChannel {
    /// Creates a [BidirectionalChannel] instance.
    ///
    /// Must be called from within a [tokio] runtime.
    pub fn new() -> ChannelResult<Self> {
        let (ar, bw) = os_pipe::pipe()?;
        let (br, aw) = os_pipe::pipe()?;

        let file = |end: OwnedFd| File::from(end);
        Ok(Self {
            client: FileChannel::new(file(ar.into()), file(aw.into()))?,
            host: FileChannel::new(file(br.into()), file(bw.into()))?,
        })
    }
}

/// The hint and preimage channels at the well-known [FileDescriptor] positions of this process.
#[derive(Debug, Clone)]
pub struct FpvmChannels {
    /// The hint channel, reading from [FileDescriptor::HintRead] and writing to
    /// [FileDescriptor::HintWrite].
    pub hint: FileChannel,
    /// The preimage channel, reading from [FileDescriptor::PreimageRead] and writing to
    /// [FileDescriptor::PreimageWrite].
    pub preimage: FileChannel,
}

impl FpvmChannels {
    /// Takes ownership of the four inherited file descriptors.
    ///
    /// # Safety
    /// Descriptors 3 through 6 must be open, and must not be owned or closed by anything else in
    /// this process. Must be called at most once.
    pub unsafe fn inherited() -> ChannelResult<Self> {
        let hint =
            FileChannel::from_descriptors(FileDescriptor::HintRead, FileDescriptor::HintWrite)?;
        let preimage = FileChannel::from_descriptors(
            FileDescriptor::PreimageRead,
            FileDescriptor::PreimageWrite,
        )?;
        Ok(Self { hint, preimage })
    }
}
