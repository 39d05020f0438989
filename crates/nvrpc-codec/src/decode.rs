use bytes::{Buf, Bytes, BytesMut};

use crate::error::{ParseError, Result};
use crate::tag;
use crate::value::Value;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Upper bound on capacity reserved from a container header. Headers are
/// untrusted; anything larger grows as elements actually arrive.
const MAX_PREALLOC: usize = 1024;

/// Resumable MessagePack parser.
///
/// Feed it byte chunks with arbitrary boundaries; it returns every top-level
/// value that became complete, in arrival order. State carried between calls:
///
/// - the unconsumed tail of the input (at most one scalar, string, binary or
///   extension body, or container header that has not fully arrived)
/// - a stack of containers whose elements are still arriving
///
/// Completed elements are moved into their parent right away and never
/// parsed twice, so the total cost over a stream is linear in its length
/// regardless of how it is chunked.
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    stack: Vec<Partial>,
    poisoned: bool,
}

/// A container whose header was parsed but whose elements have not all
/// arrived yet.
#[derive(Debug)]
enum Partial {
    Array {
        items: Vec<Value>,
        remaining: usize,
    },
    Map {
        entries: Vec<(Value, Value)>,
        key: Option<Value>,
        remaining: usize,
    },
}

enum Accepted {
    Complete(Value),
    Open(Partial),
}

impl Partial {
    fn array(len: usize) -> Self {
        Partial::Array {
            items: Vec::with_capacity(len.min(MAX_PREALLOC)),
            remaining: len,
        }
    }

    fn map(len: usize) -> Self {
        Partial::Map {
            entries: Vec::with_capacity(len.min(MAX_PREALLOC)),
            key: None,
            remaining: len,
        }
    }

    /// Add one element. `remaining` counts elements (arrays) or pairs (maps)
    /// still expected and is never zero for an open container.
    fn accept(self, value: Value) -> Accepted {
        match self {
            Partial::Array {
                mut items,
                remaining,
            } => {
                items.push(value);
                if remaining == 1 {
                    Accepted::Complete(Value::Array(items))
                } else {
                    Accepted::Open(Partial::Array {
                        items,
                        remaining: remaining - 1,
                    })
                }
            }
            Partial::Map {
                entries,
                key: None,
                remaining,
            } => Accepted::Open(Partial::Map {
                entries,
                key: Some(value),
                remaining,
            }),
            Partial::Map {
                mut entries,
                key: Some(key),
                remaining,
            } => {
                entries.push((key, value));
                if remaining == 1 {
                    Accepted::Complete(Value::Map(entries))
                } else {
                    Accepted::Open(Partial::Map {
                        entries,
                        key: None,
                        remaining: remaining - 1,
                    })
                }
            }
        }
    }
}

/// One step of parsing at the front of the buffer.
enum Item {
    Value(Value),
    Open(Partial),
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            stack: Vec::new(),
            poisoned: false,
        }
    }

    /// Decode a buffer that is expected to hold only complete values.
    ///
    /// Returns [`ParseError::Truncated`] if the input ends mid-value.
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Value>> {
        let mut decoder = Self::new();
        let values = decoder.feed(bytes)?;
        if !decoder.is_idle() {
            return Err(ParseError::Truncated {
                buffered: decoder.buffered_len(),
            });
        }
        Ok(values)
    }

    /// Append a chunk and return every top-level value it completed.
    ///
    /// An incomplete trailing value is kept for the next call. Any error
    /// poisons the decoder: the stream position is lost, so later calls fail
    /// with [`ParseError::Poisoned`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Value>> {
        if self.poisoned {
            return Err(ParseError::Poisoned);
        }
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        loop {
            let item = match next_item(&mut self.buf) {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(err) => {
                    self.poison();
                    return Err(err);
                }
            };

            match item {
                Item::Open(partial) => self.stack.push(partial),
                Item::Value(value) => {
                    if let Some(top_level) = self.settle(value) {
                        out.push(top_level);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Move a completed value into its parent, closing every container it
    /// completes. Returns the value once it reaches top level.
    fn settle(&mut self, mut value: Value) -> Option<Value> {
        while let Some(parent) = self.stack.pop() {
            match parent.accept(value) {
                Accepted::Complete(done) => value = done,
                Accepted::Open(parent) => {
                    self.stack.push(parent);
                    return None;
                }
            }
        }
        Some(value)
    }

    fn poison(&mut self) {
        self.poisoned = true;
        self.buf.clear();
        self.stack.clear();
    }

    /// Bytes received but not yet consumed by a complete item.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// True when no partial value is pending.
    pub fn is_idle(&self) -> bool {
        self.buf.is_empty() && self.stack.is_empty()
    }

    /// Nesting depth of the value currently being assembled.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

/// Parse one scalar or container header from the front of `buf`.
///
/// Returns `Ok(None)` without consuming anything when the item has not fully
/// arrived. Strings, binaries and extensions are taken whole, header and body
/// together.
fn next_item(buf: &mut BytesMut) -> Result<Option<Item>> {
    let Some(&marker) = buf.first() else {
        return Ok(None);
    };

    let item = match marker {
        0x00..=tag::POSITIVE_FIXINT_MAX => {
            buf.advance(1);
            Item::Value(Value::Integer(i64::from(marker)))
        }
        0x80..=0x8f => {
            buf.advance(1);
            open_map(usize::from(marker & 0x0f))
        }
        0x90..=0x9f => {
            buf.advance(1);
            open_array(usize::from(marker & 0x0f))
        }
        0xa0..=0xbf => return Ok(take_str(buf, 1, usize::from(marker & 0x1f))),
        tag::NEGATIVE_FIXINT..=0xff => {
            buf.advance(1);
            Item::Value(Value::Integer(i64::from(marker as i8)))
        }

        tag::NIL => {
            buf.advance(1);
            Item::Value(Value::Nil)
        }
        tag::NEVER_USED => return Err(ParseError::InvalidTag(marker)),
        tag::FALSE | tag::TRUE => {
            buf.advance(1);
            Item::Value(Value::Boolean(marker == tag::TRUE))
        }

        tag::BIN8 | tag::BIN16 | tag::BIN32 => {
            let width = length_width(marker, tag::BIN8);
            let Some(len) = read_len(buf, width) else {
                return Ok(None);
            };
            return Ok(take_body(buf, 1 + width, len).map(|data| Item::Value(Value::Binary(data))));
        }

        tag::EXT8 | tag::EXT16 | tag::EXT32 => {
            let width = length_width(marker, tag::EXT8);
            let Some(len) = read_len(buf, width) else {
                return Ok(None);
            };
            return Ok(take_ext(buf, 1 + width, len));
        }
        tag::FIXEXT1 => return Ok(take_ext(buf, 1, 1)),
        tag::FIXEXT2 => return Ok(take_ext(buf, 1, 2)),
        tag::FIXEXT4 => return Ok(take_ext(buf, 1, 4)),
        tag::FIXEXT8 => return Ok(take_ext(buf, 1, 8)),
        tag::FIXEXT16 => return Ok(take_ext(buf, 1, 16)),

        tag::FLOAT32 => match take_fixed(buf, 4, |b| f64::from(b.get_f32())) {
            Some(x) => Item::Value(Value::Float(x)),
            None => return Ok(None),
        },
        tag::FLOAT64 => match take_fixed(buf, 8, |b| b.get_f64()) {
            Some(x) => Item::Value(Value::Float(x)),
            None => return Ok(None),
        },

        tag::UINT8 => match take_fixed(buf, 1, |b| i64::from(b.get_u8())) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },
        tag::UINT16 => match take_fixed(buf, 2, |b| i64::from(b.get_u16())) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },
        tag::UINT32 => match take_fixed(buf, 4, |b| i64::from(b.get_u32())) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },
        tag::UINT64 => match take_fixed(buf, 8, |b| b.get_u64()) {
            Some(n) => {
                let n = i64::try_from(n).map_err(|_| ParseError::IntegerOverflow(n))?;
                Item::Value(Value::Integer(n))
            }
            None => return Ok(None),
        },

        tag::INT8 => match take_fixed(buf, 1, |b| i64::from(b.get_i8())) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },
        tag::INT16 => match take_fixed(buf, 2, |b| i64::from(b.get_i16())) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },
        tag::INT32 => match take_fixed(buf, 4, |b| i64::from(b.get_i32())) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },
        tag::INT64 => match take_fixed(buf, 8, |b| b.get_i64()) {
            Some(n) => Item::Value(Value::Integer(n)),
            None => return Ok(None),
        },

        tag::STR8 | tag::STR16 | tag::STR32 => {
            let width = length_width(marker, tag::STR8);
            let Some(len) = read_len(buf, width) else {
                return Ok(None);
            };
            return Ok(take_str(buf, 1 + width, len));
        }

        tag::ARRAY16 | tag::ARRAY32 => {
            let width = length_width(marker, tag::ARRAY16) * 2;
            let Some(len) = read_len(buf, width) else {
                return Ok(None);
            };
            buf.advance(1 + width);
            open_array(len)
        }
        tag::MAP16 | tag::MAP32 => {
            let width = length_width(marker, tag::MAP16) * 2;
            let Some(len) = read_len(buf, width) else {
                return Ok(None);
            };
            buf.advance(1 + width);
            open_map(len)
        }
    };

    Ok(Some(item))
}

/// Width in bytes of the length field for a marker in an 8/16/32 family.
///
/// The families are laid out as consecutive markers (`base`, `base + 1`,
/// `base + 2`) for widths 1, 2 and 4. The array/map families start at 16-bit,
/// so callers double the result.
fn length_width(marker: u8, base: u8) -> usize {
    1 << (marker - base)
}

/// Big-endian length field of `width` bytes right after the marker.
fn read_len(buf: &BytesMut, width: usize) -> Option<usize> {
    let field = buf.get(1..1 + width)?;
    Some(
        field
            .iter()
            .fold(0usize, |len, &byte| (len << 8) | usize::from(byte)),
    )
}

/// Consume the marker plus a fixed-size payload read by `read`.
fn take_fixed<T>(buf: &mut BytesMut, width: usize, read: impl FnOnce(&mut BytesMut) -> T) -> Option<T> {
    if buf.len() < 1 + width {
        return None;
    }
    buf.advance(1);
    Some(read(buf))
}

/// Consume a `header`-byte header followed by a `len`-byte body.
fn take_body(buf: &mut BytesMut, header: usize, len: usize) -> Option<Bytes> {
    if buf.len() < header.checked_add(len)? {
        return None;
    }
    buf.advance(header);
    Some(buf.split_to(len).freeze())
}

fn take_str(buf: &mut BytesMut, header: usize, len: usize) -> Option<Item> {
    let body = take_body(buf, header, len)?;
    let text = match String::from_utf8(body.to_vec()) {
        Ok(text) => text,
        Err(err) => {
            tracing::trace!(len, "string is not valid UTF-8; replacing invalid sequences");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };
    Some(Item::Value(Value::String(text)))
}

/// Extension: `header` bytes of marker and length, then the type byte, then
/// the payload.
fn take_ext(buf: &mut BytesMut, header: usize, len: usize) -> Option<Item> {
    let ext_tag = *buf.get(header)? as i8;
    let data = take_body(buf, header + 1, len)?;
    Some(Item::Value(Value::Extension { tag: ext_tag, data }))
}

fn open_array(len: usize) -> Item {
    if len == 0 {
        Item::Value(Value::Array(Vec::new()))
    } else {
        Item::Open(Partial::array(len))
    }
}

fn open_map(len: usize) -> Item {
    if len == 0 {
        Item::Value(Value::Map(Vec::new()))
    } else {
        Item::Open(Partial::map(len))
    }
}
