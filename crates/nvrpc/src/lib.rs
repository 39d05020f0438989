//! MessagePack-RPC client engine for Neovim and other msgpack-rpc peers.
//!
//! # Crate Structure
//!
//! - [`codec`]: `Value`, canonical encoder, resumable streaming decoder
//! - [`transport`]: the channel abstraction (chunk stream + writer), Unix sockets
//! - [`session`]: message framing, request correlation, notification batches
//!
//! The most used types are re-exported at the root.

/// Re-export codec types.
pub mod codec {
    pub use nvrpc_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use nvrpc_transport::*;
}

/// Re-export session types.
pub mod session {
    pub use nvrpc_session::*;
}

pub use nvrpc_codec::{Decoder, Encoder, Value};
pub use nvrpc_session::{
    Message, Notification, Notifications, Session, SessionConfig, SessionError,
};
