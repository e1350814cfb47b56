//! Variant type tags and the host-side dynamic value

use crate::identity::InstanceId;
use crate::math::{Color, Rect2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine variant type tag, numbered exactly as the engine numbers them
///
/// In method signatures `Nil` doubles as "any Variant", which is how the
/// engine's own API description spells untyped parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum VariantType {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Vector2 = 5,
    Vector2i = 6,
    Rect2 = 7,
    Rect2i = 8,
    Vector3 = 9,
    Vector3i = 10,
    Transform2D = 11,
    Vector4 = 12,
    Vector4i = 13,
    Plane = 14,
    Quaternion = 15,
    Aabb = 16,
    Basis = 17,
    Transform3D = 18,
    Projection = 19,
    Color = 20,
    StringName = 21,
    NodePath = 22,
    Rid = 23,
    Object = 24,
    Callable = 25,
    Signal = 26,
    Dictionary = 27,
    Array = 28,
    PackedByteArray = 29,
    PackedInt32Array = 30,
    PackedInt64Array = 31,
    PackedFloat32Array = 32,
    PackedFloat64Array = 33,
    PackedStringArray = 34,
    PackedVector2Array = 35,
    PackedVector3Array = 36,
    PackedColorArray = 37,
    PackedVector4Array = 38,
}

impl VariantType {
    /// Number of variant types (`VARIANT_MAX`)
    pub const COUNT: usize = 39;

    /// All tags in numeric order
    pub const ALL: [VariantType; Self::COUNT] = [
        VariantType::Nil,
        VariantType::Bool,
        VariantType::Int,
        VariantType::Float,
        VariantType::String,
        VariantType::Vector2,
        VariantType::Vector2i,
        VariantType::Rect2,
        VariantType::Rect2i,
        VariantType::Vector3,
        VariantType::Vector3i,
        VariantType::Transform2D,
        VariantType::Vector4,
        VariantType::Vector4i,
        VariantType::Plane,
        VariantType::Quaternion,
        VariantType::Aabb,
        VariantType::Basis,
        VariantType::Transform3D,
        VariantType::Projection,
        VariantType::Color,
        VariantType::StringName,
        VariantType::NodePath,
        VariantType::Rid,
        VariantType::Object,
        VariantType::Callable,
        VariantType::Signal,
        VariantType::Dictionary,
        VariantType::Array,
        VariantType::PackedByteArray,
        VariantType::PackedInt32Array,
        VariantType::PackedInt64Array,
        VariantType::PackedFloat32Array,
        VariantType::PackedFloat64Array,
        VariantType::PackedStringArray,
        VariantType::PackedVector2Array,
        VariantType::PackedVector3Array,
        VariantType::PackedColorArray,
        VariantType::PackedVector4Array,
    ];

    /// Convert from the raw tag the engine reports
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Raw tag as passed across the ABI
    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// A dynamic host value that can be carried by an engine variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringName(String),
    Vector2(Vector2),
    Rect2(Rect2),
    Color(Color),
    /// Reference to an engine object by instance ID
    Object(InstanceId),
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Variant tag this value encodes to
    pub fn variant_type(&self) -> VariantType {
        match self {
            Value::Nil => VariantType::Nil,
            Value::Bool(_) => VariantType::Bool,
            Value::Int(_) => VariantType::Int,
            Value::Float(_) => VariantType::Float,
            Value::String(_) => VariantType::String,
            Value::StringName(_) => VariantType::StringName,
            Value::Vector2(_) => VariantType::Vector2,
            Value::Rect2(_) => VariantType::Rect2,
            Value::Color(_) => VariantType::Color,
            Value::Object(_) => VariantType::Object,
            Value::Array(_) => VariantType::Array,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float (ints widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get the text of a String or StringName value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::StringName(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<Vector2> {
        match self {
            Value::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<InstanceId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::StringName(s) => write!(f, "&\"{}\"", s),
            Value::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Rect2(r) => write!(
                f,
                "[P: ({}, {}), S: ({}, {})]",
                r.position.x, r.position.y, r.size.x, r.size.y
            ),
            Value::Color(c) => write!(f, "({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Value::Object(id) => write!(f, "<Object#{}>", id.raw()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vector2> for Value {
    fn from(v: Vector2) -> Self {
        Value::Vector2(v)
    }
}

impl From<Rect2> for Value {
    fn from(r: Rect2) -> Self {
        Value::Rect2(r)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}

impl From<InstanceId> for Value {
    fn from(id: InstanceId) -> Self {
        Value::Object(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_type_numbering() {
        assert_eq!(VariantType::String.raw(), 4);
        assert_eq!(VariantType::Color.raw(), 20);
        assert_eq!(VariantType::StringName.raw(), 21);
        assert_eq!(VariantType::Object.raw(), 24);
        assert_eq!(VariantType::Array.raw(), 28);
        for (i, t) in VariantType::ALL.iter().enumerate() {
            assert_eq!(t.raw() as usize, i);
            assert_eq!(VariantType::from_raw(i as u32), Some(*t));
        }
        assert_eq!(VariantType::from_raw(VariantType::COUNT as u32), None);
    }

    #[test]
    fn test_value_accessors() {
        assert!(Value::Nil.is_nil());
        assert_eq!(Value::from(3).as_int(), Some(3));
        assert_eq!(Value::from(3).as_float(), Some(3.0));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::StringName("n".into()).as_str(), Some("n"));
        assert_eq!(Value::from(true).variant_type(), VariantType::Bool);
        assert_eq!(
            Value::from(vec![1i64, 2]).as_array().map(|a| a.len()),
            Some(2)
        );
    }

    #[test]
    fn test_value_display() {
        let v = Value::Array(vec![Value::Int(1), Value::from("a"), Value::Nil]);
        assert_eq!(v.to_string(), "[1, \"a\", null]");
        assert_eq!(Value::StringName("x".into()).to_string(), "&\"x\"");
    }
}
