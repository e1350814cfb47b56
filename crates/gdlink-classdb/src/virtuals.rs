//! Typed virtual keys and per-class override tables
//!
//! Each wrapped class declares its overridable virtuals as `Virtual<Args,
//! Ret>` constants. An extension class fills a [`VirtualTable`] with plain
//! functions keyed by those constants, so argument and return types are
//! checked at compile time. The engine only ever sees the table through its
//! name lookup.

use gdlink_core::{IntoRet, Lifetime, Result, VariantType, VirtualArgs};
use indexmap::IndexMap;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;

/// An overridable engine virtual with a fixed signature
pub struct Virtual<Args, Ret> {
    pub class: &'static str,
    pub name: &'static str,
    _signature: PhantomData<fn(Args) -> Ret>,
}

impl<Args, Ret> Virtual<Args, Ret> {
    pub const fn new(class: &'static str, name: &'static str) -> Self {
        Self {
            class,
            name,
            _signature: PhantomData,
        }
    }
}

impl<Args: VirtualArgs, Ret: IntoRet> Virtual<Args, Ret> {
    pub fn arg_types(&self) -> &'static [VariantType] {
        Args::TYPES
    }

    pub fn ret_type(&self) -> Option<VariantType> {
        Ret::TYPE
    }
}

impl<Args, Ret> Clone for Virtual<Args, Ret> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Args, Ret> Copy for Virtual<Args, Ret> {}

impl<Args, Ret> fmt::Debug for Virtual<Args, Ret> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Virtual({}.{})", self.class, self.name)
    }
}

type Thunk<T> =
    Box<dyn Fn(&mut T, *const *const c_void, *mut c_void, &Lifetime) -> Result<()> + Send + Sync>;

/// One registered override
pub struct VirtualEntry<T> {
    pub class: &'static str,
    pub name: &'static str,
    thunk: Thunk<T>,
}

impl<T> VirtualEntry<T> {
    /// Decode `args`, run the override and encode its result into `ret`
    ///
    /// # Safety
    /// `args` and `ret` must match the virtual's declared signature.
    pub unsafe fn invoke(
        &self,
        instance: &mut T,
        args: *const *const c_void,
        ret: *mut c_void,
        lifetime: &Lifetime,
    ) -> Result<()> {
        (self.thunk)(instance, args, ret, lifetime)
    }
}

/// Overrides provided by one extension class, keyed by virtual name
pub struct VirtualTable<T> {
    entries: IndexMap<&'static str, VirtualEntry<T>>,
}

impl<T> Default for VirtualTable<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T: 'static> VirtualTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `key` with `f`; a second override of the same virtual
    /// replaces the first
    pub fn set<Args, Ret>(
        &mut self,
        key: Virtual<Args, Ret>,
        f: fn(&mut T, Args) -> Ret,
    ) -> &mut Self
    where
        Args: VirtualArgs + 'static,
        Ret: IntoRet + 'static,
    {
        let thunk: Thunk<T> = Box::new(
            move |instance: &mut T,
                  args: *const *const c_void,
                  ret: *mut c_void,
                  lifetime: &Lifetime| {
                let decoded = unsafe { Args::decode(args, lifetime)? };
                let result = f(instance, decoded);
                unsafe { result.into_ret(ret, lifetime) }
            },
        );
        self.entries.insert(
            key.name,
            VirtualEntry {
                class: key.class,
                name: key.name,
                thunk,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&VirtualEntry<T>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &VirtualEntry<T>> {
        self.entries.values()
    }

    /// Consume the table, yielding overrides in registration order
    pub fn into_entries(self) -> impl Iterator<Item = VirtualEntry<T>> {
        self.entries.into_values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdlink_core::mock::MockEngine;
    use gdlink_core::{GString, Vector2};

    const HAS_POINT: Virtual<(Vector2,), bool> = Virtual::new("Control", "_has_point");
    const GET_CAPTION: Virtual<(), String> = Virtual::new("AnimationNode", "_get_caption");

    struct Widget {
        radius: f32,
        calls: usize,
    }

    #[test]
    fn test_key_carries_signature() {
        assert_eq!(HAS_POINT.arg_types(), &[VariantType::Vector2]);
        assert_eq!(HAS_POINT.ret_type(), Some(VariantType::Bool));
        assert_eq!(GET_CAPTION.ret_type(), Some(VariantType::String));
        assert_eq!(format!("{HAS_POINT:?}"), "Virtual(Control._has_point)");
    }

    #[test]
    fn test_entry_decodes_and_encodes() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut table = VirtualTable::<Widget>::new();
        table.set(HAS_POINT, |widget, (point,)| {
            widget.calls += 1;
            point.length() <= widget.radius
        });
        let mut widget = Widget {
            radius: 2.0,
            calls: 0,
        };

        let lifetime = Lifetime::new(&api);
        let point = Vector2::new(1.0, 1.0);
        let args = [&point as *const Vector2 as *const c_void];
        let mut inside = false;
        let entry = table.get("_has_point").unwrap();
        unsafe {
            entry
                .invoke(
                    &mut widget,
                    args.as_ptr(),
                    &mut inside as *mut bool as *mut c_void,
                    &lifetime,
                )
                .unwrap()
        };
        lifetime.end();
        assert!(inside);
        assert_eq!(widget.calls, 1);
        assert_eq!(entry.class, "Control");
    }

    #[test]
    fn test_string_result_outlives_the_call() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut table = VirtualTable::<Widget>::new();
        table.set(GET_CAPTION, |widget, ()| format!("r={}", widget.radius));
        let mut widget = Widget {
            radius: 3.0,
            calls: 0,
        };
        let mut caption = GString::zeroed();
        let lifetime = Lifetime::new(&api);
        unsafe {
            table
                .get("_get_caption")
                .unwrap()
                .invoke(&mut widget, std::ptr::null(), caption.as_mut_ptr(), &lifetime)
                .unwrap()
        };
        lifetime.end();
        assert_eq!(unsafe { api.read_string(&caption) }.unwrap(), "r=3");
        unsafe { api.destroy_string(&mut caption) };
        assert_eq!(engine.live_strings(), 0);
        assert!(table.get("_has_point").is_none());
    }
}
