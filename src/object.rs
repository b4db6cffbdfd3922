//! PDF object types.
//!
//! The parser produces these values and `ObjectsContext::write_object` emits
//! them, so every variant has a symmetric textual form.

use indexmap::IndexMap;

/// Identity of an indirect object. Id 0 is the free-list head.
pub type ObjectId = u64;

/// Dictionary representation; keys keep their first-seen order.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// Name (written with a leading /)
    Name(String),
    /// Literal string, decoded bytes of `(...)`
    LiteralString(Vec<u8>),
    /// Hex string, decoded bytes of `<...>`
    HexString(Vec<u8>),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Indirect object reference
    Reference(ObjectRef),
    /// Bare keyword such as `obj`, `endobj` or `R`
    Symbol(String),
    /// Stream dictionary with the offset of the first content byte
    StreamInput(StreamInput),
}

/// Stream header found by the parser.
///
/// The content itself is not read; `content_start` is the byte offset right
/// after the `stream` keyword and its end-of-line marker.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInput {
    /// Stream dictionary
    pub dict: Dictionary,
    /// Absolute position of the first content byte
    pub content_start: u64,
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number
    pub id: ObjectId,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: ObjectId, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::LiteralString(_) => "LiteralString",
            Object::HexString(_) => "HexString",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Reference(_) => "Reference",
            Object::Symbol(_) => "Symbol",
            Object::StreamInput(_) => "StreamInput",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Object::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and StreamInput objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::StreamInput(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Decoded bytes of either string kind.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::LiteralString(s) | Object::HexString(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to stream header.
    pub fn as_stream(&self) -> Option<&StreamInput> {
        match self {
            Object::StreamInput(s) => Some(s),
            _ => None,
        }
    }

    /// Check if the object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check if the object is the given keyword.
    pub fn is_symbol(&self, keyword: &str) -> bool {
        matches!(self, Object::Symbol(s) if s == keyword)
    }
}
