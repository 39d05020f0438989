use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec;

use crate::decode::Decoder;
use crate::encode::encode_into;
use crate::error::{CodecError, ParseError};
use crate::value::Value;

/// [`tokio_util::codec`] adapter: one item per top-level MessagePack value.
///
/// Use with `FramedRead`, `FramedWrite` or `Framed` when a value stream is
/// wanted without the RPC session on top.
#[derive(Debug, Default)]
pub struct ValueCodec {
    decoder: Decoder,
    ready: VecDeque<Value>,
}

impl ValueCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl codec::Decoder for ValueCodec {
    type Item = Value;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, CodecError> {
        if let Some(value) = self.ready.pop_front() {
            return Ok(Some(value));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // The inner decoder keeps its own partial state, so everything
        // handed over is consumed.
        let chunk = src.split();
        self.ready.extend(self.decoder.feed(&chunk)?);
        Ok(self.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Value>, CodecError> {
        if let Some(value) = self.decode(src)? {
            return Ok(Some(value));
        }
        if self.decoder.is_idle() {
            Ok(None)
        } else {
            Err(ParseError::Truncated {
                buffered: self.decoder.buffered_len(),
            }
            .into())
        }
    }
}

impl codec::Encoder<Value> for ValueCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_into(&item, dst);
        Ok(())
    }
}

impl codec::Encoder<&Value> for ValueCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Value, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_into(item, dst);
        Ok(())
    }
}
