//! In-process engine double
//!
//! Implements the extension interface well enough to drive every layer of
//! the binding without the engine binary: strings, string names, arrays,
//! variants, callables, objects with signal connections, native method binds
//! and extension class registration. All state is thread-local, so each test
//! thread gets its own engine.
//!
//! ```
//! use gdlink_core::mock::MockEngine;
//! use gdlink_core::Lifetime;
//!
//! let engine = MockEngine::install();
//! let api = engine.api();
//! let lifetime = Lifetime::new(&api);
//! lifetime.string("temporary");
//! lifetime.end();
//! assert_eq!(engine.live_strings(), 0);
//! ```

mod ffi;
mod scene;
mod state;

use crate::api::Api;
use crate::interface::{CallErrorKind, CallErrorRaw, GetProcAddress, LibraryPtr};
use crate::marshal::FrameValue;
use crate::native::{GCallable, GString, GStringName, ObjectPtr};
use crate::variant::Value;
use state::{
    alloc_name, alloc_object, alloc_string, callable_ref, callable_unref, decode,
    destroy_words, encode, first_word, free_name, object, text, with_state, Connection,
    MockCallable, MockImpl, MockMethod, NativeClass,
};
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;
use std::rc::Rc;

/// Address handed out as this engine's library token
static LIBRARY_TOKEN: u8 = 0;

/// One pointer call arriving at a mock native method
pub struct NativeCall {
    pub object: ObjectPtr,
    args: *const *const c_void,
    ret: *mut c_void,
}

impl NativeCall {
    fn arg_ptr(&self, index: usize) -> *const c_void {
        unsafe { *self.args.add(index) }
    }

    /// Read argument `index` in its native representation
    pub fn arg<T: FrameValue>(&self, index: usize) -> T {
        unsafe { ptr::read_unaligned(self.arg_ptr(index) as *const T) }
    }

    pub fn arg_string(&self, index: usize) -> String {
        unsafe { text(first_word::<String>(self.arg_ptr(index))).to_string() }
    }

    pub fn arg_string_name(&self, index: usize) -> String {
        self.arg_string(index)
    }

    pub fn arg_value(&self, index: usize) -> Value {
        unsafe { decode(&*(self.arg_ptr(index) as *const [u64; 3])) }
    }

    /// Write a native return value
    pub fn ret<T: FrameValue>(&mut self, value: T) {
        if !self.ret.is_null() {
            unsafe { ptr::write_unaligned(self.ret as *mut T, value) };
        }
    }

    /// Return a fresh string owned by the caller
    pub fn ret_string(&mut self, value: &str) {
        let mut string = GString::zeroed();
        unsafe { *(string.as_mut_ptr() as *mut *mut String) = alloc_string(value.to_string()) };
        self.ret(string);
    }

    pub fn ret_string_name(&mut self, value: &str) {
        let mut name = GStringName::zeroed();
        unsafe { *(name.as_mut_ptr() as *mut *mut String) = alloc_name(value.to_string()) };
        self.ret(name);
    }

    pub fn ret_value(&mut self, value: &Value) {
        if !self.ret.is_null() {
            unsafe { *(self.ret as *mut [u64; 3]) = encode(value) };
        }
    }

    pub fn instance_id(&self) -> u64 {
        unsafe { object(self.object) }.map(|o| o.id).unwrap_or(0)
    }

    pub fn prop(&self, key: &str) -> Value {
        MockEngine::prop_of(self.object, key)
    }

    pub fn set_prop(&self, key: &str, value: Value) {
        MockEngine::set_prop_of(self.object, key, value);
    }

    /// Emit a signal on the called object
    pub fn emit(&self, signal: &str, args: &[Value]) -> usize {
        MockEngine::emit_on(self.object, signal, args)
    }
}

/// Handle to this thread's mock engine
#[derive(Debug, Clone)]
pub struct MockEngine {
    _not_send: PhantomData<*const ()>,
}

impl MockEngine {
    /// Reset this thread's engine and define `Object` with its natives
    pub fn install() -> Self {
        state::reset();
        let engine = Self {
            _not_send: PhantomData,
        };
        scene::define_object(&engine);
        engine
    }

    /// Like [`MockEngine::install`], plus the scene classes the binding wraps
    pub fn install_scene() -> Self {
        let engine = Self::install();
        scene::define_scene(&engine);
        engine
    }

    pub fn get_proc_address() -> GetProcAddress {
        ffi::get_proc_address
    }

    /// Token the mock passes to the entry symbol as the library pointer
    pub fn library() -> LibraryPtr {
        &LIBRARY_TOKEN as *const u8 as LibraryPtr
    }

    /// Load an [`Api`] against this engine
    pub fn api(&self) -> Api {
        unsafe { Api::load(Self::get_proc_address(), Self::library()) }
            .expect("mock interface is complete")
    }

    /// Make `get_proc_address` report `name` as missing
    pub fn hide_symbol(&self, name: &str) {
        with_state(|s| s.hidden.insert(name.to_string()));
    }

    pub fn define_class(&self, name: &str, parent: Option<&str>) {
        with_state(|s| {
            s.classes.insert(
                name.to_string(),
                NativeClass {
                    parent: parent.map(str::to_string),
                    methods: Default::default(),
                },
            )
        });
    }

    fn insert_method(&self, class: &str, name: &str, hash: i64, imp: MockImpl) {
        with_state(|s| {
            let class = s.classes.entry(class.to_string()).or_default();
            class
                .methods
                .insert(name.to_string(), Box::new(MockMethod { hash, imp }));
        });
    }

    /// Define a pointer-call native method
    pub fn define_method<F>(&self, class: &str, name: &str, hash: i64, f: F)
    where
        F: Fn(&mut NativeCall) + 'static,
    {
        self.insert_method(class, name, hash, MockImpl::Ptr(Rc::new(f)));
    }

    /// Define a variant-call (vararg) native method
    pub fn define_vararg_method<F>(&self, class: &str, name: &str, hash: i64, f: F)
    where
        F: Fn(ObjectPtr, &[Value]) -> Result<Value, CallErrorKind> + 'static,
    {
        self.insert_method(class, name, hash, MockImpl::Var(Rc::new(f)));
    }

    /// Construct an object the way `classdb_construct_object` would
    pub fn construct(&self, class: &str) -> ObjectPtr {
        let is_native = with_state(|s| s.classes.contains_key(class));
        if is_native {
            ObjectPtr(alloc_object(class) as *mut c_void)
        } else {
            let api = self.api();
            let mut name = api.new_string_name(class);
            let object = api.construct_object(&name);
            unsafe { api.destroy_string_name(&mut name) };
            object
        }
    }

    pub fn class_of(&self, object_ptr: ObjectPtr) -> Option<String> {
        unsafe { object(object_ptr) }.map(|o| o.class.clone())
    }

    fn prop_of(object_ptr: ObjectPtr, key: &str) -> Value {
        unsafe { object(object_ptr) }
            .and_then(|o| o.props.get(key).cloned())
            .unwrap_or_default()
    }

    fn set_prop_of(object_ptr: ObjectPtr, key: &str, value: Value) {
        if let Some(target) = unsafe { object(object_ptr) } {
            target.props.insert(key.to_string(), value);
        }
    }

    /// Engine-side property store of a mock object
    pub fn prop(&self, object_ptr: ObjectPtr, key: &str) -> Value {
        Self::prop_of(object_ptr, key)
    }

    pub fn set_prop(&self, object_ptr: ObjectPtr, key: &str, value: Value) {
        Self::set_prop_of(object_ptr, key, value);
    }

    fn connect_on(object_ptr: ObjectPtr, signal: &str, callable: *mut MockCallable) -> bool {
        let Some(target) = (unsafe { object(object_ptr) }) else {
            return false;
        };
        if target
            .connections
            .iter()
            .any(|c| c.signal == signal && c.callable == callable)
        {
            return false;
        }
        unsafe { callable_ref(callable) };
        target.connections.push(Connection {
            signal: signal.to_string(),
            callable,
        });
        true
    }

    fn disconnect_on(object_ptr: ObjectPtr, signal: &str, callable: *mut MockCallable) -> bool {
        let Some(target) = (unsafe { object(object_ptr) }) else {
            return false;
        };
        let Some(index) = target
            .connections
            .iter()
            .position(|c| c.signal == signal && c.callable == callable)
        else {
            return false;
        };
        let removed = target.connections.remove(index);
        unsafe { callable_unref(removed.callable) };
        true
    }

    fn is_connected_on(object_ptr: ObjectPtr, signal: &str, callable: *mut MockCallable) -> bool {
        unsafe { object(object_ptr) }
            .map(|o| {
                o.connections
                    .iter()
                    .any(|c| c.signal == signal && c.callable == callable)
            })
            .unwrap_or(false)
    }

    /// Number of connections on `object` for `signal`
    pub fn connection_count(&self, object_ptr: ObjectPtr, signal: &str) -> usize {
        unsafe { object(object_ptr) }
            .map(|o| o.connections.iter().filter(|c| c.signal == signal).count())
            .unwrap_or(0)
    }

    unsafe fn call_custom(
        callable: *mut MockCallable,
        args: &[Value],
    ) -> Result<Value, CallErrorKind> {
        let info = (*callable).info;
        let Some(call) = info.call_func else {
            return Err(CallErrorKind::InvalidMethod);
        };
        let mut encoded: Vec<[u64; 3]> = args.iter().map(|v| encode(v)).collect();
        let pointers: Vec<*const c_void> = encoded
            .iter()
            .map(|w| w as *const [u64; 3] as *const c_void)
            .collect();
        let mut ret = [0u64; 3];
        let mut error = CallErrorRaw::default();
        call(
            info.callable_userdata,
            pointers.as_ptr(),
            pointers.len() as i64,
            ret.as_mut_ptr() as *mut c_void,
            &mut error,
        );
        let result = match CallErrorKind::from_raw(error.error) {
            CallErrorKind::Ok => Ok(decode(&ret)),
            kind => Err(kind),
        };
        destroy_words(&mut ret);
        for w in encoded.iter_mut() {
            destroy_words(w);
        }
        result
    }

    fn emit_on(object_ptr: ObjectPtr, signal: &str, args: &[Value]) -> usize {
        let targets: Vec<*mut MockCallable> = match unsafe { object(object_ptr) } {
            Some(target) => target
                .connections
                .iter()
                .filter(|c| c.signal == signal)
                .map(|c| c.callable)
                .collect(),
            None => return 0,
        };
        for callable in &targets {
            unsafe { callable_ref(*callable) };
        }
        for callable in &targets {
            let _ = unsafe { Self::call_custom(*callable, args) };
        }
        for callable in &targets {
            unsafe { callable_unref(*callable) };
        }
        targets.len()
    }

    /// Emit `signal` on `object` as the engine would; returns callables run
    pub fn emit_signal(&self, object_ptr: ObjectPtr, signal: &str, args: &[Value]) -> usize {
        Self::emit_on(object_ptr, signal, args)
    }

    /// Call a custom callable directly with `args`
    pub fn invoke_callable(
        &self,
        callable: &GCallable,
        args: &[Value],
    ) -> Result<Value, CallErrorKind> {
        let target = unsafe { first_word::<MockCallable>(callable.as_ptr()) };
        if target.is_null() {
            return Err(CallErrorKind::InstanceIsNull);
        }
        unsafe { Self::call_custom(target, args) }
    }

    /// Library token a custom callable was created with
    pub fn callable_token(&self, callable: &GCallable) -> Option<LibraryPtr> {
        let target = unsafe { first_word::<MockCallable>(callable.as_ptr()) };
        (!target.is_null()).then(|| unsafe { (*target).info.token })
    }

    /// Hash the engine would use for a custom callable
    pub fn callable_hash(&self, callable: &GCallable) -> Option<u32> {
        let target = unsafe { first_word::<MockCallable>(callable.as_ptr()) };
        if target.is_null() {
            return None;
        }
        let info = unsafe { (*target).info };
        info.hash_func.map(|hash| unsafe { hash(info.callable_userdata) })
    }

    /// Invoke an extension virtual on `object` as the engine would
    ///
    /// Only the object's own class is asked for `name`; that class resolves
    /// inherited overrides itself. Returns false when it does not provide
    /// `name`.
    ///
    /// # Safety
    /// `args` must point at native values matching the virtual's signature
    /// and `ret` at storage for its return type.
    pub unsafe fn call_virtual(
        &self,
        object_ptr: ObjectPtr,
        name: &str,
        args: &[*const c_void],
        ret: *mut c_void,
    ) -> bool {
        let Some(target) = object(object_ptr) else {
            return false;
        };
        let (class, instance) = (target.class.clone(), target.instance);
        let Some(info) = with_state(|s| s.extensions.get(&class).map(|record| record.info)) else {
            return false;
        };
        let (Some(lookup), Some(call)) =
            (info.get_virtual_call_data_func, info.call_virtual_with_data_func)
        else {
            return false;
        };
        let name_word = alloc_name(name.to_string());
        let name_ptr = &name_word as *const *mut String as *const c_void;
        let data = lookup(info.class_userdata, name_ptr);
        if !data.is_null() {
            call(instance, name_ptr, data, args.as_ptr(), ret);
        }
        free_name(name_word);
        !data.is_null()
    }

    pub fn live_objects(&self) -> usize {
        with_state(|s| s.objects.len())
    }

    pub fn live_strings(&self) -> usize {
        with_state(|s| s.strings_live)
    }

    pub fn live_string_names(&self) -> usize {
        with_state(|s| s.names_live)
    }

    pub fn live_arrays(&self) -> usize {
        with_state(|s| s.arrays_live)
    }

    pub fn live_callables(&self) -> usize {
        with_state(|s| s.callables_live)
    }

    /// Texts of strings and string names in destruction order
    pub fn release_log(&self) -> Vec<String> {
        with_state(|s| s.release_log.clone())
    }

    pub fn clear_release_log(&self) {
        with_state(|s| s.release_log.clear());
    }

    /// Messages passed to `print_error`
    pub fn errors(&self) -> Vec<String> {
        with_state(|s| s.errors.clone())
    }

    pub fn warnings(&self) -> Vec<String> {
        with_state(|s| s.warnings.clone())
    }

    /// Extension classes currently registered
    pub fn extension_classes(&self) -> Vec<String> {
        with_state(|s| {
            s.registered
                .iter()
                .filter(|c| s.extensions.contains_key(*c))
                .cloned()
                .collect()
        })
    }

    /// Library token a class was registered under
    pub fn class_library(&self, class: &str) -> Option<LibraryPtr> {
        with_state(|s| s.extensions.get(class).map(|record| record.library))
    }

    /// Extension classes in unregistration order
    pub fn unregistered_classes(&self) -> Vec<String> {
        with_state(|s| s.unregistered.clone())
    }
}
