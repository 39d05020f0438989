//! Byte-stream channel abstraction for msgpack-RPC.
//!
//! A channel is two halves:
//! - an inbound [`ChunkStream`] of byte chunks, ending when the transport closes
//! - an outbound [`ChannelWriter`] that puts one buffer on the wire per call
//!
//! Nothing here knows whether the bytes travel over a pipe, a Unix domain
//! socket or an in-memory duplex. The session layer builds on these two
//! traits only.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{
    chunk_stream, chunk_stream_with_capacity, from_io, ChannelWriter, ChunkStream, IoWriter,
    READ_CHUNK_SIZE,
};

#[cfg(unix)]
pub use uds::{connect, UnixChannel, UnixReader, UnixWriter};
