//! Safe-ish wrapper over the raw interface table
//!
//! [`Api`] owns the resolved [`InterfaceTable`] plus the pointers that have to
//! be looked up through it (per-type variant constructors, destructors, a few
//! builtin methods). It is cheap to clone and is what every other layer holds.

use crate::error::{Error, Result};
use crate::interface::{
    CallErrorKind, CallErrorRaw, CallableCustomInfo, ClassCreationInfo, GetProcAddress,
    GodotVersion, InterfaceTable, LibraryPtr, PtrBuiltInMethod, PtrConstructor, PtrDestructor,
    TypeFromVariantConstructor, VariantFromTypeConstructor,
};
use crate::native::{GArray, GCallable, GString, GStringName, GVariant, ObjectPtr};
use crate::variant::VariantType;
use std::ffi::{c_char, c_void, CStr, CString};
use std::fmt;
use std::sync::Arc;

/// Builtin method hash of `Array.size`
pub const ARRAY_SIZE_HASH: i64 = 3173160232;
/// Builtin method hash of `Array.resize`
pub const ARRAY_RESIZE_HASH: i64 = 848867239;
/// Constructor index of `String(StringName)`
const STRING_FROM_STRING_NAME: i32 = 2;

/// Engine version in host form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub string: String,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

struct ApiInner {
    table: InterfaceTable,
    library: LibraryPtr,
    version: EngineVersion,
    string_destroy: PtrDestructor,
    string_name_destroy: PtrDestructor,
    array_destroy: PtrDestructor,
    callable_destroy: PtrDestructor,
    string_from_string_name: PtrConstructor,
    array_new: PtrConstructor,
    array_size: PtrBuiltInMethod,
    array_resize: PtrBuiltInMethod,
    from_type: [Option<VariantFromTypeConstructor>; VariantType::COUNT],
    to_type: [Option<TypeFromVariantConstructor>; VariantType::COUNT],
}

// The table and the library token are written once at load time and never change.
unsafe impl Send for ApiInner {}
unsafe impl Sync for ApiInner {}

/// Resolved engine API, shared by everything that talks to the engine
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("version", &self.inner.version)
            .field("library", &self.inner.library)
            .finish()
    }
}

fn derived<T>(ptr: Option<T>, what: &str) -> Result<T> {
    ptr.ok_or_else(|| Error::MissingSymbol(what.to_string()))
}

impl Api {
    /// Load the interface table and resolve derived pointers
    ///
    /// `library` is the token the engine passed to the entry symbol; it is
    /// handed back on class registration and callable creation.
    ///
    /// # Safety
    /// `get_proc_address` must be the engine's resolver for the running
    /// process (or the mock engine's).
    pub unsafe fn load(get_proc_address: GetProcAddress, library: LibraryPtr) -> Result<Self> {
        let table = InterfaceTable::load(get_proc_address)?;

        let mut raw_version = GodotVersion::default();
        (table.get_godot_version)(&mut raw_version);
        let version = EngineVersion {
            major: raw_version.major,
            minor: raw_version.minor,
            patch: raw_version.patch,
            string: if raw_version.string.is_null() {
                String::new()
            } else {
                CStr::from_ptr(raw_version.string)
                    .to_string_lossy()
                    .into_owned()
            },
        };

        let mut from_type = [None; VariantType::COUNT];
        let mut to_type = [None; VariantType::COUNT];
        for ty in VariantType::ALL.iter().skip(1) {
            from_type[ty.raw() as usize] = (table.get_variant_from_type_constructor)(ty.raw());
            to_type[ty.raw() as usize] = (table.get_variant_to_type_constructor)(ty.raw());
        }

        let string_destroy = derived(
            (table.variant_get_ptr_destructor)(VariantType::String.raw()),
            "String destructor",
        )?;
        let string_name_destroy = derived(
            (table.variant_get_ptr_destructor)(VariantType::StringName.raw()),
            "StringName destructor",
        )?;

        let builtin = |method: &str, hash: i64| -> Option<PtrBuiltInMethod> {
            let mut name = GStringName::zeroed();
            (table.string_name_new_with_utf8_chars_and_len)(
                name.as_mut_ptr(),
                method.as_ptr() as *const c_char,
                method.len() as i64,
            );
            let found = (table.variant_get_ptr_builtin_method)(
                VariantType::Array.raw(),
                name.as_ptr(),
                hash,
            );
            string_name_destroy(name.as_mut_ptr());
            found
        };
        let array_size = derived(builtin("size", ARRAY_SIZE_HASH), "Array.size")?;
        let array_resize = derived(builtin("resize", ARRAY_RESIZE_HASH), "Array.resize")?;

        let inner = ApiInner {
            library,
            version,
            string_destroy,
            string_name_destroy,
            array_destroy: derived(
                (table.variant_get_ptr_destructor)(VariantType::Array.raw()),
                "Array destructor",
            )?,
            callable_destroy: derived(
                (table.variant_get_ptr_destructor)(VariantType::Callable.raw()),
                "Callable destructor",
            )?,
            string_from_string_name: derived(
                (table.variant_get_ptr_constructor)(
                    VariantType::String.raw(),
                    STRING_FROM_STRING_NAME,
                ),
                "String(StringName) constructor",
            )?,
            array_new: derived(
                (table.variant_get_ptr_constructor)(VariantType::Array.raw(), 0),
                "Array() constructor",
            )?,
            array_size,
            array_resize,
            from_type,
            to_type,
            table,
        };

        tracing::debug!(
            version = %inner.version,
            symbols = InterfaceTable::SYMBOLS.len(),
            "Engine interface loaded"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn version(&self) -> &EngineVersion {
        &self.inner.version
    }

    /// Token identifying this extension library to the engine
    pub fn library(&self) -> LibraryPtr {
        self.inner.library
    }

    /// Raw table, for the few callers that need an entry not wrapped here
    pub fn table(&self) -> &InterfaceTable {
        &self.inner.table
    }

    /// Report an error through the engine's logger
    pub fn print_error(&self, message: &str, function: &str, file: &str, line: u32) {
        self.print(self.inner.table.print_error, message, function, file, line);
    }

    pub fn print_warning(&self, message: &str, function: &str, file: &str, line: u32) {
        self.print(self.inner.table.print_warning, message, function, file, line);
    }

    fn print(
        &self,
        f: unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, i32, u8),
        message: &str,
        function: &str,
        file: &str,
        line: u32,
    ) {
        let lossy = |s: &str| CString::new(s.replace('\0', " ")).unwrap_or_default();
        let (message, function, file) = (lossy(message), lossy(function), lossy(file));
        unsafe { f(message.as_ptr(), function.as_ptr(), file.as_ptr(), line as i32, 0) }
    }

    // Strings

    /// New native string; the caller owns it
    pub fn new_string(&self, text: &str) -> GString {
        let mut out = GString::zeroed();
        unsafe {
            (self.inner.table.string_new_with_utf8_chars_and_len)(
                out.as_mut_ptr(),
                text.as_ptr() as *const c_char,
                text.len() as i64,
            );
        }
        out
    }

    /// Copy a native string out as UTF-8
    ///
    /// # Safety
    /// `string` must be a live native string: not destroyed, and not a copy
    /// of a handle whose owning arena has ended.
    pub unsafe fn read_string(&self, string: &GString) -> Result<String> {
        let len =
            (self.inner.table.string_to_utf8_chars)(string.as_ptr(), std::ptr::null_mut(), 0);
        let mut buf = vec![0u8; len.max(0) as usize];
        if !buf.is_empty() {
            (self.inner.table.string_to_utf8_chars)(
                string.as_ptr(),
                buf.as_mut_ptr() as *mut c_char,
                len,
            );
        }
        Ok(String::from_utf8(buf)?)
    }

    /// # Safety
    /// `string` must be a live native string not destroyed before.
    pub unsafe fn destroy_string(&self, string: &mut GString) {
        (self.inner.string_destroy)(string.as_mut_ptr());
    }

    pub fn new_string_name(&self, text: &str) -> GStringName {
        let mut out = GStringName::zeroed();
        unsafe {
            (self.inner.table.string_name_new_with_utf8_chars_and_len)(
                out.as_mut_ptr(),
                text.as_ptr() as *const c_char,
                text.len() as i64,
            );
        }
        out
    }

    /// Copy a native string name out, going through `String(StringName)`
    ///
    /// # Safety
    /// `name` must be a live native string name.
    pub unsafe fn read_string_name(&self, name: &GStringName) -> Result<String> {
        let mut string = GString::zeroed();
        let args = [name.as_ptr()];
        (self.inner.string_from_string_name)(string.as_mut_ptr(), args.as_ptr());
        let text = self.read_string(&string);
        self.destroy_string(&mut string);
        text
    }

    /// # Safety
    /// `name` must be a live native string name not destroyed before.
    pub unsafe fn destroy_string_name(&self, name: &mut GStringName) {
        (self.inner.string_name_destroy)(name.as_mut_ptr());
    }

    // Arrays

    pub fn new_array(&self) -> GArray {
        let mut out = GArray::zeroed();
        unsafe { (self.inner.array_new)(out.as_mut_ptr(), std::ptr::null()) };
        out
    }

    /// # Safety
    /// `array` must be a live native array.
    pub unsafe fn array_len(&self, array: &GArray) -> usize {
        let mut len: i64 = 0;
        (self.inner.array_size)(
            array.as_ptr() as *mut c_void,
            std::ptr::null(),
            &mut len as *mut i64 as *mut c_void,
            0,
        );
        len.max(0) as usize
    }

    pub fn array_resize(&self, array: &mut GArray, len: usize) {
        let len = len as i64;
        let args = [&len as *const i64 as *const c_void];
        unsafe {
            (self.inner.array_resize)(array.as_mut_ptr(), args.as_ptr(), std::ptr::null_mut(), 1);
        }
    }

    /// Pointer to the element variant at `index`
    ///
    /// # Safety
    /// `index` must be below [`Api::array_len`]; the pointer is valid until
    /// the array is resized or destroyed.
    pub unsafe fn array_element(&self, array: &mut GArray, index: usize) -> *mut GVariant {
        (self.inner.table.array_operator_index)(array.as_mut_ptr(), index as i64) as *mut GVariant
    }

    /// # Safety
    /// `array` must be a live native array not destroyed before.
    pub unsafe fn destroy_array(&self, array: &mut GArray) {
        (self.inner.array_destroy)(array.as_mut_ptr());
    }

    /// # Safety
    /// `callable` must be a live native callable not destroyed before.
    pub unsafe fn destroy_callable(&self, callable: &mut GCallable) {
        (self.inner.callable_destroy)(callable.as_mut_ptr());
    }

    pub fn new_callable(&self, info: &CallableCustomInfo) -> GCallable {
        let mut out = GCallable::zeroed();
        unsafe { (self.inner.table.callable_custom_create)(out.as_mut_ptr(), info) };
        out
    }

    // Variants

    pub fn new_nil(&self) -> GVariant {
        let mut out = GVariant::zeroed();
        unsafe { (self.inner.table.variant_new_nil)(out.as_mut_ptr()) };
        out
    }

    pub fn copy_variant(&self, source: &GVariant) -> GVariant {
        let mut out = GVariant::zeroed();
        unsafe { (self.inner.table.variant_new_copy)(out.as_mut_ptr(), source.as_ptr()) };
        out
    }

    /// Tag of a native variant; unknown tags read as `Nil`
    pub fn variant_type(&self, variant: &GVariant) -> VariantType {
        let raw = unsafe { (self.inner.table.variant_get_type)(variant.as_ptr()) };
        VariantType::from_raw(raw).unwrap_or(VariantType::Nil)
    }

    /// # Safety
    /// `variant` must be a live native variant not destroyed before.
    pub unsafe fn destroy_variant(&self, variant: &mut GVariant) {
        (self.inner.table.variant_destroy)(variant.as_mut_ptr());
    }

    /// Wrap a native value of type `ty` into a new variant
    ///
    /// # Safety
    /// `source` must point at a live value of the native type for `ty`.
    pub unsafe fn variant_from(&self, ty: VariantType, source: *mut c_void) -> Result<GVariant> {
        if ty == VariantType::Nil {
            return Ok(self.new_nil());
        }
        let ctor = self.inner.from_type[ty.raw() as usize].ok_or(Error::Unsupported(ty))?;
        let mut out = GVariant::zeroed();
        ctor(out.as_mut_ptr(), source);
        Ok(out)
    }

    /// Extract the native value out of a variant of type `ty`
    ///
    /// # Safety
    /// `dest` must point at zeroed storage large enough for the native type.
    pub unsafe fn variant_to(
        &self,
        ty: VariantType,
        variant: &GVariant,
        dest: *mut c_void,
    ) -> Result<()> {
        let got = self.variant_type(variant);
        if got != ty {
            return Err(Error::TypeMismatch { expected: ty, got });
        }
        let ctor = self.inner.to_type[ty.raw() as usize].ok_or(Error::Unsupported(ty))?;
        ctor(dest, variant.as_ptr() as *mut c_void);
        Ok(())
    }

    // Objects and class db

    pub fn construct_object(&self, class: &GStringName) -> ObjectPtr {
        ObjectPtr(unsafe { (self.inner.table.classdb_construct_object)(class.as_ptr()) })
    }

    /// Look up one method bind; `None` when the engine returns null
    pub fn method_bind(
        &self,
        class: &GStringName,
        method: &GStringName,
        hash: i64,
    ) -> Option<*const c_void> {
        let bind = unsafe {
            (self.inner.table.classdb_get_method_bind)(class.as_ptr(), method.as_ptr(), hash)
        };
        (!bind.is_null()).then_some(bind)
    }

    /// Pointer call through a method bind; no status comes back
    ///
    /// # Safety
    /// `args` must hold one pointer per declared parameter, each pointing at
    /// the native representation of that parameter, and `ret` must point at
    /// storage for the declared return type (or be null when there is none).
    pub unsafe fn method_bind_ptrcall(
        &self,
        bind: *const c_void,
        object: ObjectPtr,
        args: *const *const c_void,
        ret: *mut c_void,
    ) {
        (self.inner.table.object_method_bind_ptrcall)(bind, object.as_ptr(), args, ret);
    }

    /// Variant call through a method bind, used for vararg methods
    ///
    /// # Safety
    /// Every pointer in `args` must point at a live variant and `ret` at a
    /// nil-initialized variant.
    pub unsafe fn method_bind_call(
        &self,
        method: &str,
        bind: *const c_void,
        object: ObjectPtr,
        args: &[*const c_void],
        ret: &mut GVariant,
    ) -> Result<()> {
        let mut error = CallErrorRaw::default();
        (self.inner.table.object_method_bind_call)(
            bind,
            object.as_ptr(),
            args.as_ptr(),
            args.len() as i64,
            ret.as_mut_ptr(),
            &mut error,
        );
        match CallErrorKind::from_raw(error.error) {
            CallErrorKind::Ok => Ok(()),
            kind => Err(Error::Call {
                method: method.to_string(),
                kind,
                argument: error.argument,
                expected: error.expected,
            }),
        }
    }

    /// # Safety
    /// `object` must be live and owned by the caller.
    pub unsafe fn object_destroy(&self, object: ObjectPtr) {
        (self.inner.table.object_destroy)(object.as_ptr());
    }

    pub fn instance_id(&self, object: ObjectPtr) -> u64 {
        if object.is_null() {
            return 0;
        }
        unsafe { (self.inner.table.object_get_instance_id)(object.as_ptr()) }
    }

    /// Resolve an instance ID; null if the object no longer exists
    pub fn object_from_id(&self, id: u64) -> ObjectPtr {
        ObjectPtr(unsafe { (self.inner.table.object_get_instance_from_id)(id) })
    }

    /// # Safety
    /// `instance` must stay valid until the engine calls the class's free
    /// callback for `object`.
    pub unsafe fn object_set_instance(
        &self,
        object: ObjectPtr,
        class: &GStringName,
        instance: *mut c_void,
    ) {
        (self.inner.table.object_set_instance)(object.as_ptr(), class.as_ptr(), instance);
    }

    /// Register an extension class under this library's token
    ///
    /// # Safety
    /// `info` and its userdata must outlive the registration.
    pub unsafe fn register_extension_class(
        &self,
        class: &GStringName,
        parent: &GStringName,
        info: &ClassCreationInfo,
    ) {
        (self.inner.table.classdb_register_extension_class2)(
            self.inner.library,
            class.as_ptr(),
            parent.as_ptr(),
            info,
        );
    }

    /// # Safety
    /// The class must have been registered by this library.
    pub unsafe fn unregister_extension_class(&self, class: &GStringName) {
        (self.inner.table.classdb_unregister_extension_class)(self.inner.library, class.as_ptr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[test]
    fn test_load_reports_version() {
        let engine = MockEngine::install();
        let api = engine.api();
        assert_eq!(api.version().major, 4);
        assert_eq!(api.version().to_string(), "4.3.0");
    }

    #[test]
    fn test_missing_symbol_is_named() {
        let engine = MockEngine::install();
        engine.hide_symbol("object_method_bind_ptrcall");
        let err = unsafe { Api::load(MockEngine::get_proc_address(), MockEngine::library()) }
            .unwrap_err();
        match err {
            Error::MissingSymbol(name) => assert_eq!(name, "object_method_bind_ptrcall"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_string_roundtrip_and_release() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut s = api.new_string("héllo");
        assert_eq!(unsafe { api.read_string(&s) }.unwrap(), "héllo");
        assert_eq!(engine.live_strings(), 1);
        unsafe { api.destroy_string(&mut s) };
        assert_eq!(engine.live_strings(), 0);
    }

    #[test]
    fn test_string_name_reads_back() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut name = api.new_string_name("text_changed");
        assert_eq!(unsafe { api.read_string_name(&name) }.unwrap(), "text_changed");
        unsafe { api.destroy_string_name(&mut name) };
        assert_eq!(engine.live_string_names(), 0);
        assert_eq!(engine.live_strings(), 0);
    }

    #[test]
    fn test_array_resize() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut array = api.new_array();
        assert_eq!(unsafe { api.array_len(&array) }, 0);
        api.array_resize(&mut array, 3);
        assert_eq!(unsafe { api.array_len(&array) }, 3);
        let first = unsafe { &*api.array_element(&mut array, 0) };
        assert_eq!(api.variant_type(first), VariantType::Nil);
        unsafe { api.destroy_array(&mut array) };
        assert_eq!(engine.live_arrays(), 0);
    }

    #[test]
    fn test_variant_to_rejects_wrong_type() {
        let engine = MockEngine::install();
        let api = engine.api();
        let mut value: i64 = 7;
        let variant =
            unsafe { api.variant_from(VariantType::Int, &mut value as *mut i64 as *mut c_void) }
                .unwrap();
        let mut out = false;
        let err = unsafe {
            api.variant_to(VariantType::Bool, &variant, &mut out as *mut bool as *mut c_void)
        }
        .unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: VariantType::Bool,
                got: VariantType::Int
            }
        ));
    }

    #[test]
    fn test_library_token_is_kept() {
        let engine = MockEngine::install();
        let api = engine.api();
        assert_eq!(api.library(), MockEngine::library());
        assert!(!api.library().is_null());
    }

    #[test]
    fn test_print_error_reaches_engine() {
        let engine = MockEngine::install();
        let api = engine.api();
        api.print_error("boom", "f", "file.rs", 3);
        assert_eq!(engine.errors(), vec!["boom".to_string()]);
    }
}
