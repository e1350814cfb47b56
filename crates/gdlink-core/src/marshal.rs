//! Native representations of host values
//!
//! [`FrameValue`] marks types whose bits can be placed directly into a call
//! frame slot. [`FromArg`] and [`IntoRet`] are the decode/encode halves used
//! when the engine calls into host code (virtual trampolines), where the
//! arguments arrive as an array of pointers to native values.

use crate::error::{Error, Result};
use crate::handle::{ObjectHandle, Ownership};
use crate::lifetime::Lifetime;
use crate::math::{Color, Rect2, Vector2, Vector2i};
use crate::native::{GArray, GCallable, GString, GStringName, GVariant, ObjectPtr};
use crate::variant::{Value, VariantType};
use std::ffi::c_void;
use std::fmt;
use std::ops::Deref;
use std::ptr;

/// A plain value that fits in a call frame slot as-is
///
/// # Safety
/// The type's bits must be exactly the engine's pointer-call representation
/// of `TYPE`, its alignment at most 8, and any bit pattern the engine writes
/// for `TYPE` must be a valid value.
pub unsafe trait FrameValue: Copy + 'static {
    const TYPE: VariantType;
}

macro_rules! frame_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(unsafe impl FrameValue for $ty {
            const TYPE: VariantType = VariantType::$variant;
        })*
    };
}

frame_value! {
    bool => Bool,
    i64 => Int,
    f64 => Float,
    Vector2 => Vector2,
    Vector2i => Vector2i,
    Rect2 => Rect2,
    Color => Color,
    GString => String,
    GStringName => StringName,
    GArray => Array,
    GCallable => Callable,
    ObjectPtr => Object,
    GVariant => Nil,
}

/// Host-side text that travels as a `StringName`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StringName(pub String);

impl Deref for StringName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StringName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Decode one argument the engine passed by pointer
pub trait FromArg: Sized {
    const TYPE: VariantType;

    /// # Safety
    /// `arg` must point at a live native value of type `TYPE`.
    unsafe fn from_arg(arg: *const c_void, lifetime: &Lifetime) -> Result<Self>;
}

/// Encode a host result into the engine's return slot
pub trait IntoRet {
    const TYPE: Option<VariantType>;

    /// # Safety
    /// `ret` must point at writable storage for `TYPE` (ignored for `()`).
    unsafe fn into_ret(self, ret: *mut c_void, lifetime: &Lifetime) -> Result<()>;
}

macro_rules! pod_arg {
    ($($ty:ty),*) => {
        $(
            impl FromArg for $ty {
                const TYPE: VariantType = <$ty as FrameValue>::TYPE;

                unsafe fn from_arg(arg: *const c_void, _lifetime: &Lifetime) -> Result<Self> {
                    if arg.is_null() {
                        return Err(Error::NullObject);
                    }
                    Ok(ptr::read_unaligned(arg as *const $ty))
                }
            }

            impl IntoRet for $ty {
                const TYPE: Option<VariantType> = Some(<$ty as FrameValue>::TYPE);

                unsafe fn into_ret(self, ret: *mut c_void, _lifetime: &Lifetime) -> Result<()> {
                    if !ret.is_null() {
                        ptr::write_unaligned(ret as *mut $ty, self);
                    }
                    Ok(())
                }
            }
        )*
    };
}

pod_arg!(bool, i64, f64, Vector2, Vector2i, Rect2, Color);

impl FromArg for String {
    const TYPE: VariantType = VariantType::String;

    unsafe fn from_arg(arg: *const c_void, lifetime: &Lifetime) -> Result<Self> {
        if arg.is_null() {
            return Err(Error::NullObject);
        }
        lifetime.read_raw_string(&*(arg as *const GString))
    }
}

impl IntoRet for String {
    const TYPE: Option<VariantType> = Some(VariantType::String);

    unsafe fn into_ret(self, ret: *mut c_void, lifetime: &Lifetime) -> Result<()> {
        if !ret.is_null() {
            ptr::write(ret as *mut GString, lifetime.string(&self).transfer());
        }
        Ok(())
    }
}

impl FromArg for StringName {
    const TYPE: VariantType = VariantType::StringName;

    unsafe fn from_arg(arg: *const c_void, lifetime: &Lifetime) -> Result<Self> {
        if arg.is_null() {
            return Err(Error::NullObject);
        }
        lifetime
            .read_raw_string_name(&*(arg as *const GStringName))
            .map(StringName)
    }
}

impl IntoRet for StringName {
    const TYPE: Option<VariantType> = Some(VariantType::StringName);

    unsafe fn into_ret(self, ret: *mut c_void, lifetime: &Lifetime) -> Result<()> {
        if !ret.is_null() {
            ptr::write(
                ret as *mut GStringName,
                lifetime.string_name(&self.0).transfer(),
            );
        }
        Ok(())
    }
}

impl FromArg for Value {
    const TYPE: VariantType = VariantType::Nil;

    unsafe fn from_arg(arg: *const c_void, lifetime: &Lifetime) -> Result<Self> {
        if arg.is_null() {
            return Ok(Value::Nil);
        }
        lifetime.read_raw_value(&*(arg as *const GVariant))
    }
}

impl IntoRet for Value {
    const TYPE: Option<VariantType> = Some(VariantType::Nil);

    unsafe fn into_ret(self, ret: *mut c_void, lifetime: &Lifetime) -> Result<()> {
        if !ret.is_null() {
            ptr::write(ret as *mut GVariant, lifetime.variant(&self)?.transfer());
        }
        Ok(())
    }
}

impl FromArg for Option<ObjectHandle> {
    const TYPE: VariantType = VariantType::Object;

    unsafe fn from_arg(arg: *const c_void, lifetime: &Lifetime) -> Result<Self> {
        if arg.is_null() {
            return Ok(None);
        }
        let object = ptr::read_unaligned(arg as *const ObjectPtr);
        if object.is_null() {
            return Ok(None);
        }
        ObjectHandle::from_ptr(lifetime.api(), object, Ownership::Borrowed).map(Some)
    }
}

impl IntoRet for Option<ObjectHandle> {
    const TYPE: Option<VariantType> = Some(VariantType::Object);

    unsafe fn into_ret(self, ret: *mut c_void, _lifetime: &Lifetime) -> Result<()> {
        if !ret.is_null() {
            let object = self.map(|h| h.ptr()).unwrap_or(ObjectPtr::NULL);
            ptr::write_unaligned(ret as *mut ObjectPtr, object);
        }
        Ok(())
    }
}

impl IntoRet for () {
    const TYPE: Option<VariantType> = None;

    unsafe fn into_ret(self, _ret: *mut c_void, _lifetime: &Lifetime) -> Result<()> {
        Ok(())
    }
}

/// A whole argument list decoded from the engine's pointer array
pub trait VirtualArgs: Sized {
    const TYPES: &'static [VariantType];

    /// # Safety
    /// `args` must hold `TYPES.len()` pointers to live native values.
    unsafe fn decode(args: *const *const c_void, lifetime: &Lifetime) -> Result<Self>;
}

impl VirtualArgs for () {
    const TYPES: &'static [VariantType] = &[];

    unsafe fn decode(_args: *const *const c_void, _lifetime: &Lifetime) -> Result<Self> {
        Ok(())
    }
}

macro_rules! virtual_args {
    ($($name:ident: $index:tt),+) => {
        impl<$($name: FromArg),+> VirtualArgs for ($($name,)+) {
            const TYPES: &'static [VariantType] = &[$($name::TYPE),+];

            unsafe fn decode(args: *const *const c_void, lifetime: &Lifetime) -> Result<Self> {
                if args.is_null() {
                    return Err(Error::NullObject);
                }
                Ok(($($name::from_arg(*args.add($index), lifetime)?,)+))
            }
        }
    };
}

virtual_args!(A: 0);
virtual_args!(A: 0, B: 1);
virtual_args!(A: 0, B: 1, C: 2);
virtual_args!(A: 0, B: 1, C: 2, D: 3);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[test]
    fn test_frame_types_follow_engine_tags() {
        assert_eq!(<i64 as FrameValue>::TYPE, VariantType::Int);
        assert_eq!(<ObjectPtr as FrameValue>::TYPE, VariantType::Object);
        assert_eq!(<GVariant as FrameValue>::TYPE, VariantType::Nil);
        assert_eq!(
            <(Vector2, StringName) as VirtualArgs>::TYPES,
            &[VariantType::Vector2, VariantType::StringName]
        );
    }

    #[test]
    fn test_decode_pointer_array() {
        let engine = MockEngine::install();
        let api = engine.api();
        let lifetime = Lifetime::new(&api);
        let point = Vector2::new(1.5, -2.0);
        let flag = true;
        let text = lifetime.string("caption");
        let args: [*const c_void; 3] = [
            &point as *const Vector2 as *const c_void,
            &flag as *const bool as *const c_void,
            text.get().as_ptr(),
        ];
        let (p, f, s) =
            unsafe { <(Vector2, bool, String)>::decode(args.as_ptr(), &lifetime) }.unwrap();
        assert_eq!(p, point);
        assert!(f);
        assert_eq!(s, "caption");
    }

    #[test]
    fn test_string_ret_is_owned_by_caller() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut slot = GString::zeroed();
        {
            let lifetime = Lifetime::new(&api);
            unsafe {
                "Blend".to_string()
                    .into_ret(slot.as_mut_ptr(), &lifetime)
                    .unwrap()
            };
        }
        assert_eq!(unsafe { api.read_string(&slot) }.unwrap(), "Blend");
        unsafe { api.destroy_string(&mut slot) };
        assert_eq!(engine.live_strings(), 0);
    }
}
