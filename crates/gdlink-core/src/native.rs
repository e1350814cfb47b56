//! Opaque native representations of engine builtin types
//!
//! These are raw, `Copy` bit patterns exactly as large as the engine's own
//! types. They carry no ownership: whoever created one (usually a
//! [`Lifetime`](crate::Lifetime)) is responsible for destroying it.

use std::ffi::c_void;
use std::ptr;

/// Pointer to an engine object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectPtr(pub *mut c_void);

impl ObjectPtr {
    pub const NULL: ObjectPtr = ObjectPtr(ptr::null_mut());

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

impl Default for ObjectPtr {
    fn default() -> Self {
        Self::NULL
    }
}

macro_rules! opaque_native {
    ($(#[$meta:meta])* $name:ident, $words:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[repr(C)]
        pub struct $name {
            opaque: [u64; $words],
        }

        impl $name {
            /// Zeroed storage, the state the engine expects for outputs
            pub const fn zeroed() -> Self {
                Self { opaque: [0; $words] }
            }

            pub fn is_zeroed(&self) -> bool {
                self.opaque.iter().all(|w| *w == 0)
            }

            pub fn as_mut_ptr(&mut self) -> *mut c_void {
                self as *mut Self as *mut c_void
            }

            pub fn as_ptr(&self) -> *const c_void {
                self as *const Self as *const c_void
            }
        }
    };
}

opaque_native!(
    /// Engine `String` (one copy-on-write pointer)
    GString,
    1
);

opaque_native!(
    /// Engine `StringName` (one interned pointer)
    GStringName,
    1
);

opaque_native!(
    /// Engine `Array` (one reference-counted pointer)
    GArray,
    1
);

opaque_native!(
    /// Engine `Callable` (object id + method or custom pointer)
    GCallable,
    2
);

opaque_native!(
    /// Engine `Variant` (type tag + 16 bytes of payload)
    GVariant,
    3
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_native_sizes() {
        assert_eq!(size_of::<GString>(), 8);
        assert_eq!(size_of::<GStringName>(), 8);
        assert_eq!(size_of::<GArray>(), 8);
        assert_eq!(size_of::<GCallable>(), 16);
        assert_eq!(size_of::<GVariant>(), 24);
    }

    #[test]
    fn test_zeroed() {
        let v = GVariant::zeroed();
        assert!(v.is_zeroed());
        assert!(ObjectPtr::default().is_null());
    }
}
