//! Method specs and the method-bind table

use crate::api::Api;
use crate::callframe::CallFrame;
use crate::error::{Error, Result};
use crate::lifetime::Lifetime;
use crate::native::{GVariant, ObjectPtr};
use crate::variant::{Value, VariantType};
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// Static description of one wrapped engine method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    pub class: &'static str,
    pub name: &'static str,
    pub hash: i64,
    pub args: &'static [VariantType],
    pub ret: Option<VariantType>,
    pub vararg: bool,
}

impl MethodSpec {
    pub const fn new(
        class: &'static str,
        name: &'static str,
        hash: i64,
        args: &'static [VariantType],
        ret: Option<VariantType>,
    ) -> Self {
        Self {
            class,
            name,
            hash,
            args,
            ret,
            vararg: false,
        }
    }

    /// Mark as taking extra variant arguments after `args`
    pub const fn vararg(mut self) -> Self {
        self.vararg = true;
        self
    }
}

impl fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// Non-null method-bind pointer from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodBind(NonNull<c_void>);

// Binds are immutable engine-side descriptors, valid for the whole session.
unsafe impl Send for MethodBind {}
unsafe impl Sync for MethodBind {}

impl MethodBind {
    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

/// (class, method) to method bind, built once at startup
#[derive(Debug, Default)]
pub struct MethodTable {
    binds: HashMap<(&'static str, &'static str), MethodBind>,
}

impl MethodTable {
    /// Resolve every spec through `classdb_get_method_bind`
    ///
    /// A null bind (unknown method or hash mismatch) fails the whole table.
    pub fn populate<'s>(
        api: &Api,
        specs: impl IntoIterator<Item = &'s MethodSpec>,
    ) -> Result<Self> {
        let lifetime = Lifetime::new(api);
        let mut binds = HashMap::new();
        for spec in specs {
            let class = lifetime.string_name(spec.class);
            let method = lifetime.string_name(spec.name);
            let bind = api
                .method_bind(class.get(), method.get(), spec.hash)
                .and_then(|ptr| NonNull::new(ptr as *mut c_void))
                .ok_or_else(|| Error::NullMethodBind {
                    class: spec.class.to_string(),
                    method: spec.name.to_string(),
                    hash: spec.hash,
                })?;
            binds.insert((spec.class, spec.name), MethodBind(bind));
        }
        lifetime.end();
        tracing::debug!(methods = binds.len(), "Method table populated");
        Ok(Self { binds })
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    pub fn get(&self, spec: &MethodSpec) -> Result<MethodBind> {
        self.binds
            .get(&(spec.class, spec.name))
            .copied()
            .ok_or_else(|| Error::MethodNotFound {
                class: spec.class.to_string(),
                method: spec.name.to_string(),
            })
    }

    /// Pointer call using a prepared frame
    ///
    /// # Safety
    /// `object` must be a live instance of `spec.class` (or a subclass).
    pub unsafe fn ptrcall(
        &self,
        api: &Api,
        spec: &MethodSpec,
        object: ObjectPtr,
        frame: &mut CallFrame,
    ) -> Result<()> {
        if cfg!(debug_assertions) {
            let (args, ret) = frame.signature();
            debug_assert_eq!(args, spec.args, "argument slots do not match {spec}");
            debug_assert_eq!(ret, spec.ret, "return slot does not match {spec}");
        }
        let bind = self.get(spec)?;
        if object.is_null() {
            return Err(Error::NullObject);
        }
        let (args, ret) = frame.raw_parts();
        api.method_bind_ptrcall(bind.as_ptr(), object, args, ret);
        Ok(())
    }

    /// Variant call, for vararg methods
    ///
    /// # Safety
    /// `object` must be a live instance of `spec.class` (or a subclass).
    pub unsafe fn call(
        &self,
        api: &Api,
        spec: &MethodSpec,
        object: ObjectPtr,
        args: &[Value],
    ) -> Result<Value> {
        let bind = self.get(spec)?;
        if object.is_null() {
            return Err(Error::NullObject);
        }
        let lifetime = Lifetime::new(api);
        let variants = args
            .iter()
            .map(|arg| lifetime.variant(arg).map(|v| v.native()))
            .collect::<Result<Vec<GVariant>>>()?;
        let pointers: Vec<*const c_void> = variants.iter().map(|v| v.as_ptr()).collect();
        let mut native_ret = GVariant::zeroed();
        api.method_bind_call(spec.name, bind.as_ptr(), object, &pointers, &mut native_ret)?;
        let ret = lifetime.adopt(native_ret);
        let value = lifetime.read_value(&ret)?;
        lifetime.end();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    const GET_CLASS: MethodSpec = MethodSpec::new(
        "Object",
        "get_class",
        201670096,
        &[],
        Some(VariantType::String),
    );

    #[test]
    fn test_populate_and_lookup() {
        let engine = MockEngine::install();
        let api = engine.api();
        let table = MethodTable::populate(&api, [&GET_CLASS]).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(&GET_CLASS).is_ok());
        assert_eq!(engine.live_string_names(), 0);
    }

    #[test]
    fn test_null_bind_aborts() {
        let engine = MockEngine::install();
        let api = engine.api();
        let wrong = MethodSpec::new("Object", "get_class", 1, &[], Some(VariantType::String));
        let err = MethodTable::populate(&api, [&GET_CLASS, &wrong]).unwrap_err();
        assert!(matches!(err, Error::NullMethodBind { hash: 1, .. }));
    }

    #[test]
    fn test_ptrcall_reads_return() {
        let engine = MockEngine::install();
        let api = engine.api();
        let table = MethodTable::populate(&api, [&GET_CLASS]).unwrap();
        let object = engine.construct("Object");

        let lifetime = Lifetime::new(&api);
        let mut frame = CallFrame::new();
        let slot = frame.ret::<crate::native::GString>();
        unsafe { table.ptrcall(&api, &GET_CLASS, object, &mut frame) }.unwrap();
        let class = lifetime.adopt(frame.get(slot));
        assert_eq!(lifetime.read_string(&class).unwrap(), "Object");
        frame.free();
        lifetime.end();
        assert_eq!(engine.live_strings(), 0);
    }

    #[test]
    fn test_unknown_method() {
        let engine = MockEngine::install();
        let table = MethodTable::default();
        let err = unsafe {
            table.call(&engine.api(), &GET_CLASS, ObjectPtr::NULL, &[])
        }
        .unwrap_err();
        assert!(matches!(err, Error::MethodNotFound { .. }));
    }
}
