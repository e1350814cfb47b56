//! Conversion between host [`Value`]s and native variants
//!
//! Every intermediate native object is registered with the arena doing the
//! conversion, so a failed conversion leaks nothing.

use crate::error::{Error, Result};
use crate::identity::InstanceId;
use crate::lifetime::{Lifetime, Temp};
use crate::math::{Color, Rect2, Vector2};
use crate::native::{GArray, GString, GStringName, GVariant, ObjectPtr};
use crate::variant::{Value, VariantType};
use std::ffi::c_void;
use std::ptr;

fn erase<T>(value: &mut T) -> *mut c_void {
    value as *mut T as *mut c_void
}

impl Lifetime {
    /// Encode a host value as a native variant owned by this arena
    pub fn variant(&self, value: &Value) -> Result<Temp<'_, GVariant>> {
        let api = self.api();
        let variant = unsafe {
            match value {
                Value::Nil => api.new_nil(),
                Value::Bool(b) => api.variant_from(VariantType::Bool, erase(&mut { *b }))?,
                Value::Int(i) => api.variant_from(VariantType::Int, erase(&mut { *i }))?,
                Value::Float(f) => api.variant_from(VariantType::Float, erase(&mut { *f }))?,
                Value::Vector2(v) => api.variant_from(VariantType::Vector2, erase(&mut { *v }))?,
                Value::Rect2(r) => api.variant_from(VariantType::Rect2, erase(&mut { *r }))?,
                Value::Color(c) => api.variant_from(VariantType::Color, erase(&mut { *c }))?,
                Value::String(s) => {
                    let mut native = self.string(s).native();
                    api.variant_from(VariantType::String, erase(&mut native))?
                }
                Value::StringName(s) => {
                    let mut native = self.string_name(s).native();
                    api.variant_from(VariantType::StringName, erase(&mut native))?
                }
                Value::Object(id) => {
                    let mut object = api.object_from_id(id.raw());
                    if object.is_null() {
                        return Err(Error::NullObject);
                    }
                    api.variant_from(VariantType::Object, erase(&mut object))?
                }
                Value::Array(items) => {
                    let mut native = self.array(items)?.native();
                    api.variant_from(VariantType::Array, erase(&mut native))?
                }
            }
        };
        Ok(self.adopt(variant))
    }

    /// Encode a list of host values as a native array owned by this arena
    pub fn array(&self, items: &[Value]) -> Result<Temp<'_, GArray>> {
        let api = self.api();
        let array = self.adopt(api.new_array());
        let mut native = array.native();
        api.array_resize(&mut native, items.len());
        for (index, item) in items.iter().enumerate() {
            let element = self.variant(item)?;
            unsafe {
                let slot = api.array_element(&mut native, index);
                api.destroy_variant(&mut *slot);
                ptr::write(slot, api.copy_variant(element.get()));
            }
        }
        Ok(array)
    }

    /// Decode a native variant owned by a live arena into a host value
    pub fn read_value(&self, variant: &Temp<'_, GVariant>) -> Result<Value> {
        unsafe { self.read_raw_value(variant.get()) }
    }

    /// Decode a variant this arena does not own, such as an engine argument
    ///
    /// # Safety
    /// `variant` and everything it references must be live for the call.
    pub unsafe fn read_raw_value(&self, variant: &GVariant) -> Result<Value> {
        let api = self.api();
        let ty = api.variant_type(variant);
        let value = match ty {
            VariantType::Nil => Value::Nil,
            VariantType::Bool => {
                let mut out = false;
                api.variant_to(ty, variant, erase(&mut out))?;
                Value::Bool(out)
            }
            VariantType::Int => {
                let mut out: i64 = 0;
                api.variant_to(ty, variant, erase(&mut out))?;
                Value::Int(out)
            }
            VariantType::Float => {
                let mut out: f64 = 0.0;
                api.variant_to(ty, variant, erase(&mut out))?;
                Value::Float(out)
            }
            VariantType::Vector2 => {
                let mut out = Vector2::ZERO;
                api.variant_to(ty, variant, erase(&mut out))?;
                Value::Vector2(out)
            }
            VariantType::Rect2 => {
                let mut out = Rect2::default();
                api.variant_to(ty, variant, erase(&mut out))?;
                Value::Rect2(out)
            }
            VariantType::Color => {
                let mut out = Color::default();
                api.variant_to(ty, variant, erase(&mut out))?;
                Value::Color(out)
            }
            VariantType::String => {
                let mut out = GString::zeroed();
                api.variant_to(ty, variant, erase(&mut out))?;
                let out = self.adopt(out);
                Value::String(self.read_string(&out)?)
            }
            VariantType::StringName => {
                let mut out = GStringName::zeroed();
                api.variant_to(ty, variant, erase(&mut out))?;
                let out = self.adopt(out);
                Value::StringName(self.read_string_name(&out)?)
            }
            VariantType::Object => {
                let mut out = ObjectPtr::NULL;
                api.variant_to(ty, variant, erase(&mut out))?;
                if out.is_null() {
                    Value::Nil
                } else {
                    Value::Object(InstanceId(api.instance_id(out)))
                }
            }
            VariantType::Array => {
                let mut out = GArray::zeroed();
                api.variant_to(ty, variant, erase(&mut out))?;
                let out = self.adopt(out);
                Value::Array(self.read_array(&out)?)
            }
            other => return Err(Error::Unsupported(other)),
        };
        Ok(value)
    }

    /// Decode every element of a native array
    pub fn read_array(&self, array: &Temp<'_, GArray>) -> Result<Vec<Value>> {
        unsafe { self.read_raw_array(array.get()) }
    }

    /// # Safety
    /// `array` must be live for the duration of the call.
    pub unsafe fn read_raw_array(&self, array: &GArray) -> Result<Vec<Value>> {
        let api = self.api();
        let mut native = *array;
        let len = api.array_len(&native);
        let mut items = Vec::with_capacity(len);
        for index in 0..len {
            let element = &*api.array_element(&mut native, index);
            items.push(self.read_raw_value(element)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    fn roundtrip(engine: &MockEngine, value: Value) -> Value {
        let api = engine.api();
        let lifetime = Lifetime::new(&api);
        let variant = lifetime.variant(&value).unwrap();
        lifetime.read_value(&variant).unwrap()
    }

    #[test]
    fn test_scalar_values_survive() {
        let engine = MockEngine::install();
        for value in [
            Value::Nil,
            Value::Bool(true),
            Value::Int(-42),
            Value::Float(0.25),
            Value::Vector2(Vector2::new(3.0, 4.0)),
            Value::Color(Color::WHITE),
        ] {
            assert_eq!(roundtrip(&engine, value.clone()), value);
        }
    }

    #[test]
    fn test_nested_array_and_strings() {
        let engine = MockEngine::install();
        let value = Value::Array(vec![
            Value::from("text"),
            Value::StringName("name".into()),
            Value::Array(vec![Value::Int(1), Value::Nil]),
        ]);
        assert_eq!(roundtrip(&engine, value.clone()), value);
        assert_eq!(engine.live_strings(), 0);
        assert_eq!(engine.live_string_names(), 0);
        assert_eq!(engine.live_arrays(), 0);
    }

    #[test]
    fn test_object_by_instance_id() {
        let engine = MockEngine::install();
        let api = engine.api();
        let object = engine.construct("Object");
        let id = InstanceId(api.instance_id(object));
        assert_eq!(roundtrip(&engine, Value::Object(id)), Value::Object(id));
        assert!(matches!(
            Lifetime::new(&api).variant(&Value::Object(InstanceId(999_999))),
            Err(Error::NullObject)
        ));
    }
}
