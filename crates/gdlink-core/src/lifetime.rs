//! Scoped arena for native temporaries
//!
//! A [`Lifetime`] owns every native string, string name, array, variant and
//! callable created while marshalling one call (or one callback). Helpers hand
//! back [`Temp`] values that borrow the arena, so the borrow checker rejects
//! any use after the arena has ended:
//!
//! ```compile_fail
//! # fn demo(api: &gdlink_core::Api) {
//! let lifetime = gdlink_core::Lifetime::new(api);
//! let text = lifetime.string("hello");
//! lifetime.end();
//! let _ = text.native(); // the arena was consumed by `end`
//! # }
//! ```
//!
//! Readers take the [`Temp`] itself rather than its native bits, so a copy
//! taken with [`Temp::native`] cannot be read back once its arena is gone
//! without going through an `unsafe` raw reader.
//!
//! Arenas are tracked per thread and must not move across threads:
//!
//! ```compile_fail
//! fn assert_send<T: Send>() {}
//! assert_send::<gdlink_core::Lifetime>();
//! ```
//!
//! Everything still registered is released in reverse registration order when
//! the arena ends, either through [`Lifetime::end`] or on drop.

use crate::api::Api;
use crate::error::Result;
use crate::native::{GArray, GCallable, GString, GStringName, GVariant};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ARENA: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static OPEN_ARENAS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// A native allocation the arena knows how to release
#[derive(Debug, Clone, Copy)]
pub enum Allocation {
    String(GString),
    StringName(GStringName),
    Array(GArray),
    Variant(GVariant),
    Callable(GCallable),
}

impl Allocation {
    unsafe fn release(mut self, api: &Api) {
        match &mut self {
            Allocation::String(s) => api.destroy_string(s),
            Allocation::StringName(n) => api.destroy_string_name(n),
            Allocation::Array(a) => api.destroy_array(a),
            Allocation::Variant(v) => api.destroy_variant(v),
            Allocation::Callable(c) => api.destroy_callable(c),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Native types an arena can own
pub trait Managed: Copy + sealed::Sealed {
    fn into_allocation(self) -> Allocation;
}

macro_rules! managed {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Managed for $ty {
                fn into_allocation(self) -> Allocation {
                    Allocation::$variant(self)
                }
            }
        )*
    };
}

managed!(
    GString => String,
    GStringName => StringName,
    GArray => Array,
    GVariant => Variant,
    GCallable => Callable
);

/// A temporary owned by a [`Lifetime`]
///
/// Valid until the arena ends; [`Temp::transfer`] hands it to the engine
/// instead.
pub struct Temp<'a, T: Managed> {
    value: T,
    slot: usize,
    lifetime: &'a Lifetime,
}

impl<'a, T: Managed> Temp<'a, T> {
    /// Native bits, for placing into a call frame
    pub fn native(&self) -> T {
        self.value
    }

    /// Borrow the native value in place
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Take the value out of the arena's release list
    ///
    /// The caller (usually the engine, via a return slot) now owns it.
    pub fn transfer(self) -> T {
        self.lifetime.forget(self.slot);
        self.value
    }
}

impl<T: Managed + fmt::Debug> fmt::Debug for Temp<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Temp")
            .field("value", &self.value)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Scoped owner of native temporaries
pub struct Lifetime {
    api: Api,
    id: u64,
    entries: RefCell<Vec<Option<Allocation>>>,
    _not_send: PhantomData<*const ()>,
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("id", &self.id)
            .field("live", &self.live())
            .finish()
    }
}

impl Lifetime {
    /// Open a scope bound to `api`
    pub fn new(api: &Api) -> Self {
        let id = NEXT_ARENA.fetch_add(1, Ordering::Relaxed);
        OPEN_ARENAS.with(|stack| stack.borrow_mut().push(id));
        Self {
            api: api.clone(),
            id,
            entries: RefCell::new(Vec::new()),
            _not_send: PhantomData,
        }
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    /// Number of arenas currently open on this thread
    pub fn depth() -> usize {
        OPEN_ARENAS.with(|stack| stack.borrow().len())
    }

    /// Temporaries still waiting for release
    pub fn live(&self) -> usize {
        self.entries.borrow().iter().filter(|e| e.is_some()).count()
    }

    /// Register a native value this arena should release
    pub fn adopt<T: Managed>(&self, value: T) -> Temp<'_, T> {
        let mut entries = self.entries.borrow_mut();
        let slot = entries.len();
        entries.push(Some(value.into_allocation()));
        Temp {
            value,
            slot,
            lifetime: self,
        }
    }

    fn forget(&self, slot: usize) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(slot) {
            *entry = None;
        }
    }

    pub fn string(&self, text: &str) -> Temp<'_, GString> {
        self.adopt(self.api.new_string(text))
    }

    pub fn string_name(&self, text: &str) -> Temp<'_, GStringName> {
        self.adopt(self.api.new_string_name(text))
    }

    pub fn nil(&self) -> Temp<'_, GVariant> {
        self.adopt(self.api.new_nil())
    }

    pub fn read_string(&self, string: &Temp<'_, GString>) -> Result<String> {
        unsafe { self.api.read_string(string.get()) }
    }

    pub fn read_string_name(&self, name: &Temp<'_, GStringName>) -> Result<String> {
        unsafe { self.api.read_string_name(name.get()) }
    }

    /// Read a string this arena does not own, such as an engine argument
    ///
    /// # Safety
    /// `string` must be live for the duration of the call.
    pub unsafe fn read_raw_string(&self, string: &GString) -> Result<String> {
        self.api.read_string(string)
    }

    /// # Safety
    /// `name` must be live for the duration of the call.
    pub unsafe fn read_raw_string_name(&self, name: &GStringName) -> Result<String> {
        self.api.read_string_name(name)
    }

    /// Close the scope, releasing everything still registered
    pub fn end(self) {}

    fn release_all(&mut self) {
        let entries = std::mem::take(self.entries.get_mut());
        let mut count = 0;
        for entry in entries.into_iter().rev().flatten() {
            unsafe { entry.release(&self.api) };
            count += 1;
        }
        tracing::trace!(arena = self.id, released = count, "Lifetime ended");
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.release_all();
        let id = self.id;
        OPEN_ARENAS.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.last().copied(),
                Some(id),
                "arena {id} ended while a nested arena is still open"
            );
            if let Some(pos) = stack.iter().rposition(|open| *open == id) {
                stack.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[test]
    fn test_end_releases_everything() {
        let engine = MockEngine::install();
        let api = engine.api();
        let lifetime = Lifetime::new(&api);
        let a = lifetime.string("a");
        let _b = lifetime.string_name("b");
        let _c = lifetime.nil();
        assert_eq!(lifetime.read_string(&a).unwrap(), "a");
        assert_eq!(engine.live_strings(), 1);
        assert_eq!(engine.live_string_names(), 1);
        assert_eq!(lifetime.live(), 3);
        lifetime.end();
        assert_eq!(engine.live_strings(), 0);
        assert_eq!(engine.live_string_names(), 0);
    }

    #[test]
    fn test_release_order_is_reversed() {
        let engine = MockEngine::install();
        let api = engine.api();
        let lifetime = Lifetime::new(&api);
        lifetime.string("first");
        lifetime.string("second");
        lifetime.string("third");
        engine.clear_release_log();
        lifetime.end();
        assert_eq!(engine.release_log(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_transferred_temp_is_kept() {
        let engine = MockEngine::install();
        let api = engine.api();
        let lifetime = Lifetime::new(&api);
        let kept = lifetime.string("kept").transfer();
        lifetime.string("dropped");
        lifetime.end();
        assert_eq!(engine.live_strings(), 1);
        assert_eq!(unsafe { api.read_string(&kept) }.unwrap(), "kept");
        let mut kept = kept;
        unsafe { api.destroy_string(&mut kept) };
        assert_eq!(engine.live_strings(), 0);
    }

    fn early_return(api: &Api, fail: bool) -> Result<usize> {
        let lifetime = Lifetime::new(api);
        lifetime.string("temp");
        if fail {
            return Err(crate::Error::NullObject);
        }
        Ok(lifetime.live())
    }

    #[test]
    fn test_error_path_still_releases() {
        let engine = MockEngine::install();
        let api = engine.api();
        assert!(early_return(&api, true).is_err());
        assert_eq!(engine.live_strings(), 0);
        assert_eq!(early_return(&api, false).unwrap(), 1);
        assert_eq!(engine.live_strings(), 0);
    }

    #[test]
    fn test_nesting_depth() {
        let engine = MockEngine::install();
        let api = engine.api();
        let base = Lifetime::depth();
        let outer = Lifetime::new(&api);
        {
            let inner = Lifetime::new(&api);
            assert_eq!(Lifetime::depth(), base + 2);
            inner.end();
        }
        assert_eq!(Lifetime::depth(), base + 1);
        outer.end();
        assert_eq!(Lifetime::depth(), base);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_only_transferred_strings_survive(
                items in prop::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..16)
            ) {
                let engine = MockEngine::install();
                let api = engine.api();
                let lifetime = Lifetime::new(&api);
                let mut kept = Vec::new();
                for (text, keep) in &items {
                    let temp = lifetime.string(text);
                    if *keep {
                        kept.push(temp.transfer());
                    }
                }
                engine.clear_release_log();
                lifetime.end();

                let expected: Vec<String> = items
                    .iter()
                    .rev()
                    .filter(|(_, keep)| !keep)
                    .map(|(text, _)| text.clone())
                    .collect();
                prop_assert_eq!(engine.release_log(), expected);
                prop_assert_eq!(engine.live_strings(), kept.len());
                for mut string in kept {
                    unsafe { api.destroy_string(&mut string) };
                }
                prop_assert_eq!(engine.live_strings(), 0);
            }
        }
    }
}
