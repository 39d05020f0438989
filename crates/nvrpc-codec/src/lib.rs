//! MessagePack for nvrpc.
//!
//! - [`Value`]: the dynamic value tree.
//! - [`Encoder`] / [`encode`]: canonical (smallest-width) serialization.
//! - [`Decoder`]: resumable parser fed with arbitrarily split byte chunks.
//!
//! With the `json` feature (default), values convert to and from
//! `serde_json::Value`. With `async`, [`ValueCodec`] plugs the decoder into
//! `tokio_util::codec`.
//!
//! ```
//! use nvrpc_codec::{encode, Decoder, Value};
//!
//! let wire = encode(&Value::Array(vec![Value::from(2), Value::from("redraw")]));
//!
//! let mut decoder = Decoder::new();
//! assert!(decoder.feed(&wire[..3]).unwrap().is_empty());
//! let values = decoder.feed(&wire[3..]).unwrap();
//! assert_eq!(values[0].as_array().map(<[Value]>::len), Some(2));
//! ```

#[cfg(feature = "async")]
pub mod codec;
pub mod decode;
pub mod encode;
pub mod error;
#[cfg(feature = "json")]
pub mod json;
pub mod tag;
pub mod value;

#[cfg(feature = "async")]
pub use codec::ValueCodec;
pub use decode::Decoder;
pub use encode::{encode, encode_into, Encoder};
#[cfg(feature = "async")]
pub use error::CodecError;
#[cfg(feature = "json")]
pub use error::JsonError;
pub use error::{ParseError, Result};
pub use value::Value;
