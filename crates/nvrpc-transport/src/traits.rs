use std::future::Future;
use std::io;

use bytes::Bytes;
use futures_core::Stream;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::{Result, TransportError};

/// Default capacity of a single inbound read: 64 KiB.
///
/// Neovim redraw bursts routinely exceed the 4 KiB pipe default, so reads are
/// sized to take a whole burst in as few chunks as possible.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Inbound half of a channel.
///
/// Yields byte chunks in arrival order with arbitrary boundaries. The stream
/// ends (`None`) when the transport closes.
pub trait ChunkStream: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static {}

impl<S> ChunkStream for S where S: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static {}

/// Outbound half of a channel.
///
/// One `write` call puts the whole buffer on the wire before resolving. The
/// session maps one call to one contiguous write, so implementations must not
/// resolve after a partial write.
pub trait ChannelWriter: Send + 'static {
    /// Write the entire buffer.
    fn write(&mut self, bytes: Bytes) -> impl Future<Output = Result<()>> + Send;
}

/// [`ChannelWriter`] over any [`AsyncWrite`] (pipe, socket, duplex).
///
/// Every write is `write_all` followed by `flush`.
#[derive(Debug)]
pub struct IoWriter<W> {
    inner: W,
}

impl<W> IoWriter<W> {
    /// Wrap an async writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the adapter and return the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> ChannelWriter for IoWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write(&mut self, bytes: Bytes) -> Result<()> {
        self.inner
            .write_all(&bytes)
            .await
            .map_err(TransportError::from_write)?;
        self.inner.flush().await.map_err(TransportError::from_write)
    }
}

/// Turn an [`AsyncRead`] into a [`ChunkStream`] with the default read size.
pub fn chunk_stream<R: AsyncRead>(read: R) -> ReaderStream<R> {
    chunk_stream_with_capacity(read, READ_CHUNK_SIZE)
}

/// Turn an [`AsyncRead`] into a [`ChunkStream`] reading at most `capacity`
/// bytes per chunk.
pub fn chunk_stream_with_capacity<R: AsyncRead>(read: R, capacity: usize) -> ReaderStream<R> {
    ReaderStream::with_capacity(read, capacity)
}

/// Build both channel halves from a reader and a writer, e.g. the stdout and
/// stdin pipes of an already spawned `nvim --embed`.
pub fn from_io<R, W>(read: R, write: W) -> (ReaderStream<R>, IoWriter<W>)
where
    R: AsyncRead,
    W: AsyncWrite,
{
    (chunk_stream(read), IoWriter::new(write))
}
