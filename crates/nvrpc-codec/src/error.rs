/// Errors raised while parsing a MessagePack byte stream.
///
/// Every variant is fatal for the stream it came from: the byte position of
/// the next value is unknown afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The byte is not a MessagePack type marker (`0xc1` is reserved).
    #[error("invalid type marker 0x{0:02x}")]
    InvalidTag(u8),

    /// A `uint64` value above `i64::MAX`.
    #[error("integer {0} does not fit in a signed 64-bit value")]
    IntegerOverflow(u64),

    /// The input ended in the middle of a value where a complete buffer was expected.
    #[error("input ended mid-value ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// The decoder already failed and refuses further input.
    #[error("decoder is poisoned by an earlier parse error")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors converting a [`Value`](crate::Value) to JSON.
#[cfg(feature = "json")]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JsonError {
    /// JSON object keys must be strings.
    #[error("map key must be a string to convert to JSON, got {0}")]
    NonStringKey(&'static str),

    /// The variant has no JSON representation.
    #[error("{0} values have no JSON representation")]
    Unsupported(&'static str),

    /// JSON numbers cannot be NaN or infinite.
    #[error("float {0} has no JSON representation")]
    NonFiniteFloat(f64),
}

/// Errors surfaced by [`ValueCodec`](crate::ValueCodec).
#[cfg(feature = "async")]
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Malformed MessagePack input.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The underlying stream failed.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}
