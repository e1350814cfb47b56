//! Type conversion between engine values and host types
//!
//! Signal callbacks receive a `&[Value]`; typed helpers decode it into host
//! tuples with [`SignalArgs`].

use crate::engine::Engine;
use crate::error::Result;
use crate::object::Object;
use gdlink_core::{ObjectHandle, Ownership, Value, Vector2};

/// A host type that can be read out of a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        // Engine signals often pass whole numbers for float parameters
        match value {
            Value::Int(i) => Some(*i as f64),
            other => other.as_float(),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Vector2 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_vector2()
    }
}

/// Signal argument list decoded from the engine's variants
pub trait SignalArgs: Sized {
    const ARITY: usize;

    fn from_values(args: &[Value]) -> Option<Self>;
}

impl SignalArgs for () {
    const ARITY: usize = 0;

    fn from_values(args: &[Value]) -> Option<Self> {
        args.is_empty().then_some(())
    }
}

macro_rules! signal_args {
    ($arity:expr; $($name:ident: $index:tt),+) => {
        impl<$($name: FromValue),+> SignalArgs for ($($name,)+) {
            const ARITY: usize = $arity;

            fn from_values(args: &[Value]) -> Option<Self> {
                if args.len() != Self::ARITY {
                    return None;
                }
                Some(($($name::from_value(&args[$index])?,)+))
            }
        }
    };
}

signal_args!(1; A: 0);
signal_args!(2; A: 0, B: 1);
signal_args!(3; A: 0, B: 1, C: 2);

impl Engine {
    /// Resolve an object reference carried by a value
    ///
    /// `Nil` and references to objects that no longer exist yield `None`.
    pub fn object_from_value(&self, value: &Value) -> Result<Option<Object>> {
        let Some(id) = value.as_object() else {
            return Ok(None);
        };
        match ObjectHandle::from_id(self.api(), id, Ownership::Borrowed) {
            Ok(handle) => Ok(Some(self.object(handle))),
            Err(gdlink_core::Error::NullObject) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdlink_core::InstanceId;

    #[test]
    fn test_decode_tuple() {
        let args = [Value::Int(3), Value::from("idle"), Value::from("run")];
        let decoded = <(i64, String, String)>::from_values(&args).unwrap();
        assert_eq!(decoded, (3, "idle".to_string(), "run".to_string()));
    }

    #[test]
    fn test_arity_and_type_must_match() {
        assert!(<(String,)>::from_values(&[]).is_none());
        assert!(<(String,)>::from_values(&[Value::Int(1)]).is_none());
        assert!(<()>::from_values(&[Value::Nil]).is_none());
        assert!(<()>::from_values(&[]).is_some());
    }

    #[test]
    fn test_float_accepts_int() {
        assert_eq!(f64::from_value(&Value::Int(2)), Some(2.0));
        assert_eq!(f64::from_value(&Value::Float(0.5)), Some(0.5));
        assert_eq!(f64::from_value(&Value::Bool(true)), None);
    }

    #[test]
    fn test_string_name_reads_as_string() {
        let name = Value::StringName("blend_amount".into());
        assert_eq!(String::from_value(&name).as_deref(), Some("blend_amount"));
        assert_eq!(
            Value::from_value(&Value::Object(InstanceId(4))),
            Some(Value::Object(InstanceId(4)))
        );
    }
}
