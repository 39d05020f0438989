use bytes::{BufMut, Bytes, BytesMut};

use crate::tag;
use crate::value::Value;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Serializes [`Value`]s to MessagePack with a reusable scratch buffer.
///
/// One instance is meant for one writer at a time; the session keeps its
/// encoder behind the same lock as the channel writer.
#[derive(Debug)]
pub struct Encoder {
    buf: BytesMut,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode a single value.
    pub fn encode(&mut self, value: &Value) -> Bytes {
        self.append(value);
        self.finish()
    }

    /// Append a value to the pending output without taking it yet.
    ///
    /// Used to concatenate several messages into one write.
    pub fn append(&mut self, value: &Value) {
        encode_into(value, &mut self.buf);
    }

    /// Take everything appended since the last `finish`/`encode`.
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Bytes appended but not yet taken.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

/// Encode a value into a fresh buffer.
pub fn encode(value: &Value) -> Bytes {
    let mut dst = BytesMut::new();
    encode_into(value, &mut dst);
    dst.freeze()
}

/// Append the MessagePack encoding of `value` to `dst`.
///
/// Each variant uses the narrowest canonical marker: fixint/uint/int by
/// magnitude, fix/8/16/32 headers by length, fixext when the payload length
/// is exactly 1, 2, 4, 8 or 16. Floats are always written as float64.
///
/// # Panics
///
/// If a string, binary, extension payload, array or map holds more than
/// `u32::MAX` bytes or elements; MessagePack cannot represent the length.
pub fn encode_into(value: &Value, dst: &mut BytesMut) {
    match value {
        Value::Nil => dst.put_u8(tag::NIL),
        Value::Boolean(b) => dst.put_u8(if *b { tag::TRUE } else { tag::FALSE }),
        Value::Integer(n) => put_int(*n, dst),
        Value::Float(x) => {
            dst.put_u8(tag::FLOAT64);
            dst.put_f64(*x);
        }
        Value::String(s) => {
            put_str_header(s.len(), dst);
            dst.put_slice(s.as_bytes());
        }
        Value::Binary(data) => {
            put_bin_header(data.len(), dst);
            dst.put_slice(data);
        }
        Value::Array(items) => {
            put_container_header(items.len(), tag::FIXARRAY, tag::ARRAY16, tag::ARRAY32, dst);
            for item in items {
                encode_into(item, dst);
            }
        }
        Value::Map(entries) => {
            put_container_header(entries.len(), tag::FIXMAP, tag::MAP16, tag::MAP32, dst);
            for (key, value) in entries {
                encode_into(key, dst);
                encode_into(value, dst);
            }
        }
        Value::Extension { tag: ext_tag, data } => {
            put_ext_header(*ext_tag, data.len(), dst);
            dst.put_slice(data);
        }
    }
}

fn put_int(n: i64, dst: &mut BytesMut) {
    if n >= 0 {
        put_uint(n as u64, dst);
    } else if n >= -32 {
        dst.put_i8(n as i8);
    } else if n >= i64::from(i8::MIN) {
        dst.put_u8(tag::INT8);
        dst.put_i8(n as i8);
    } else if n >= i64::from(i16::MIN) {
        dst.put_u8(tag::INT16);
        dst.put_i16(n as i16);
    } else if n >= i64::from(i32::MIN) {
        dst.put_u8(tag::INT32);
        dst.put_i32(n as i32);
    } else {
        dst.put_u8(tag::INT64);
        dst.put_i64(n);
    }
}

fn put_uint(n: u64, dst: &mut BytesMut) {
    if n <= u64::from(tag::POSITIVE_FIXINT_MAX) {
        dst.put_u8(n as u8);
    } else if n <= u64::from(u8::MAX) {
        dst.put_u8(tag::UINT8);
        dst.put_u8(n as u8);
    } else if n <= u64::from(u16::MAX) {
        dst.put_u8(tag::UINT16);
        dst.put_u16(n as u16);
    } else if n <= u64::from(u32::MAX) {
        dst.put_u8(tag::UINT32);
        dst.put_u32(n as u32);
    } else {
        dst.put_u8(tag::UINT64);
        dst.put_u64(n);
    }
}

fn wire_len(len: usize) -> u32 {
    assert!(
        len <= u32::MAX as usize,
        "length {len} exceeds the MessagePack limit of {}",
        u32::MAX
    );
    len as u32
}

fn put_str_header(len: usize, dst: &mut BytesMut) {
    let len = wire_len(len);
    if len as usize <= tag::FIXSTR_MAX {
        dst.put_u8(tag::FIXSTR | len as u8);
    } else if len <= u32::from(u8::MAX) {
        dst.put_u8(tag::STR8);
        dst.put_u8(len as u8);
    } else if len <= u32::from(u16::MAX) {
        dst.put_u8(tag::STR16);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(tag::STR32);
        dst.put_u32(len);
    }
}

fn put_bin_header(len: usize, dst: &mut BytesMut) {
    let len = wire_len(len);
    if len <= u32::from(u8::MAX) {
        dst.put_u8(tag::BIN8);
        dst.put_u8(len as u8);
    } else if len <= u32::from(u16::MAX) {
        dst.put_u8(tag::BIN16);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(tag::BIN32);
        dst.put_u32(len);
    }
}

fn put_container_header(len: usize, fix: u8, marker16: u8, marker32: u8, dst: &mut BytesMut) {
    let len = wire_len(len);
    if len as usize <= tag::FIX_CONTAINER_MAX {
        dst.put_u8(fix | len as u8);
    } else if len <= u32::from(u16::MAX) {
        dst.put_u8(marker16);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(marker32);
        dst.put_u32(len);
    }
}

fn put_ext_header(ext_tag: i8, len: usize, dst: &mut BytesMut) {
    let len = wire_len(len);
    match len {
        1 => dst.put_u8(tag::FIXEXT1),
        2 => dst.put_u8(tag::FIXEXT2),
        4 => dst.put_u8(tag::FIXEXT4),
        8 => dst.put_u8(tag::FIXEXT8),
        16 => dst.put_u8(tag::FIXEXT16),
        _ if len <= u32::from(u8::MAX) => {
            dst.put_u8(tag::EXT8);
            dst.put_u8(len as u8);
        }
        _ if len <= u32::from(u16::MAX) => {
            dst.put_u8(tag::EXT16);
            dst.put_u16(len as u16);
        }
        _ => {
            dst.put_u8(tag::EXT32);
            dst.put_u32(len);
        }
    }
    dst.put_i8(ext_tag);
}
