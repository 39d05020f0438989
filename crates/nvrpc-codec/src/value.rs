use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;

/// A decoded MessagePack value.
///
/// Pure data: a `Value` owns its children and is never mutated by the codec
/// once built. Maps keep their pairs in wire order, keys may be any variant,
/// and duplicate keys are preserved.
///
/// Equality is structural. Floats compare by bit pattern, so every value
/// (NaN included) equals its own round trip and `Value` can be `Eq + Hash`.
/// The [`Ord`] impl is a total order: variant rank first
/// (nil < boolean < integer < float < string < binary < array < map <
/// extension), then payload.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Binary(Bytes),
    /// Application-defined extension type. Neovim uses tags 0, 1 and 2 for
    /// buffer, window and tabpage handles.
    Extension {
        tag: i8,
        data: Bytes,
    },
    Nil,
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Binary(_) => "binary",
            Value::Extension { .. } => "extension",
            Value::Nil => "nil",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Binary(_) => 5,
            Value::Array(_) => 6,
            Value::Map(_) => 7,
            Value::Extension { .. } => 8,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Extension tag and payload.
    pub fn as_ext(&self) -> Option<(i8, &[u8])> {
        match self {
            Value::Extension { tag, data } => Some((*tag, data)),
            _ => None,
        }
    }

    /// First value stored under a string key, for map values.
    ///
    /// Maps may carry duplicate keys; this returns the earliest in wire order.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Extension { tag: ta, data: da }, Value::Extension { tag: tb, data: db }) => {
                ta.cmp(tb).then_with(|| da.cmp(db))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Nil => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Binary(data) => data.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
            Value::Extension { tag, data } => {
                tag.hash(state);
                data.hash(state);
            }
        }
    }
}

/// Compact single-line rendering, e.g. `[2, "redraw", [["flush"]]]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Binary(data) => write!(f, "<binary {} bytes>", data.len()),
            Value::Extension { tag, data } => write!(f, "<ext {tag}: {} bytes>", data.len()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Integer(i64::from(n))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Vec<(Value, Value)>> for Value {
    fn from(entries: Vec<(Value, Value)>) -> Self {
        Value::Map(entries)
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::Binary(data)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::collections::BTreeSet;

    use super::*;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::Array(vec![Value::from(1), Value::from("x"), Value::Nil]);
        let b = Value::Array(vec![Value::from(1), Value::from("x"), Value::Nil]);
        let c = Value::Array(vec![Value::from(1), Value::from("y"), Value::Nil]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nan_equals_itself() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(hash_of(&nan), hash_of(&nan.clone()));
    }

    #[test]
    fn signed_zeros_are_distinct() {
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn integer_and_float_never_equal() {
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn map_keeps_duplicates_and_order() {
        let forward = Value::Map(vec![
            (Value::from("k"), Value::from(1)),
            (Value::from("k"), Value::from(2)),
        ]);
        let reversed = Value::Map(vec![
            (Value::from("k"), Value::from(2)),
            (Value::from("k"), Value::from(1)),
        ]);
        assert_ne!(forward, reversed);
        assert_eq!(forward.get("k"), Some(&Value::Integer(1)));
    }

    #[test]
    fn ordering_ranks_variants_first() {
        let set: BTreeSet<Value> = [
            Value::from("s"),
            Value::from(3),
            Value::Nil,
            Value::Float(0.5),
            Value::Boolean(false),
            Value::Extension {
                tag: 1,
                data: Bytes::from_static(&[1]),
            },
        ]
        .into_iter()
        .collect();

        let kinds: Vec<&str> = set.iter().map(Value::kind).collect();
        assert_eq!(
            kinds,
            ["nil", "boolean", "integer", "float", "string", "extension"]
        );
    }

    #[test]
    fn ordering_within_variant() {
        assert!(Value::from(-5) < Value::from(3));
        assert!(Value::from("a") < Value::from("b"));
        assert!(Value::Float(f64::NEG_INFINITY) < Value::Float(-1.0));
        assert!(Value::Array(vec![Value::from(1)]) < Value::Array(vec![Value::from(1), Value::Nil]));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(7u8).as_i64(), Some(7));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(1.5f32).as_f64(), Some(1.5));
        assert_eq!(Value::from(Bytes::from_static(b"ab")).as_binary(), Some(&b"ab"[..]));
        assert!(Value::from(None::<i64>).is_nil());
        assert_eq!(Value::from(Some("x")), Value::from("x"));

        let ext = Value::Extension {
            tag: -1,
            data: Bytes::from_static(&[0, 1]),
        };
        assert_eq!(ext.as_ext(), Some((-1, &[0u8, 1][..])));
        assert_eq!(ext.as_str(), None);
    }

    #[test]
    fn display_is_compact() {
        let value = Value::Array(vec![
            Value::from(2),
            Value::from("redraw"),
            Value::Map(vec![(Value::from(1), Value::Nil)]),
            Value::Binary(Bytes::from_static(b"xyz")),
        ]);
        assert_eq!(
            value.to_string(),
            r#"[2, "redraw", {1: nil}, <binary 3 bytes>]"#
        );
    }
}
