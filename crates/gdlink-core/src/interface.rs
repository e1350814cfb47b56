//! Raw extension interface: C-compatible types and the function-pointer table
//!
//! The engine hands the extension a single `get_proc_address` callback at load
//! time. Every entry of [`InterfaceTable`] is resolved through it by its engine
//! symbol name, once, before anything else runs.

use crate::error::{Error, Result};
use std::ffi::{c_char, c_void, CStr};
use std::mem;

/// Untyped function pointer returned by `get_proc_address`
pub type InterfaceFn = unsafe extern "C" fn();

/// Resolves an interface symbol by NUL-terminated name
pub type GetProcAddress = unsafe extern "C" fn(name: *const c_char) -> Option<InterfaceFn>;

/// Opaque method-bind pointer handed out by the engine
pub type MethodBindPtr = *const c_void;

/// Opaque token identifying this extension library to the engine
pub type LibraryPtr = *mut c_void;

/// Host-side instance data attached to an engine object
pub type ClassInstancePtr = *mut c_void;

pub type PtrConstructor = unsafe extern "C" fn(base: *mut c_void, args: *const *const c_void);
pub type PtrDestructor = unsafe extern "C" fn(base: *mut c_void);
pub type PtrBuiltInMethod = unsafe extern "C" fn(
    base: *mut c_void,
    args: *const *const c_void,
    ret: *mut c_void,
    argument_count: i32,
);
pub type VariantFromTypeConstructor = unsafe extern "C" fn(dst: *mut c_void, src: *mut c_void);
pub type TypeFromVariantConstructor = unsafe extern "C" fn(dst: *mut c_void, src: *mut c_void);

/// Typed-pointer aliases used by the class and callable records
pub type StringNamePtr = *const c_void;
pub type StringPtr = *mut c_void;
pub type VariantPtr = *const c_void;

pub type ClassSet =
    unsafe extern "C" fn(instance: ClassInstancePtr, name: StringNamePtr, value: VariantPtr) -> u8;
pub type ClassGet =
    unsafe extern "C" fn(instance: ClassInstancePtr, name: StringNamePtr, r_ret: *mut c_void) -> u8;
pub type ClassGetPropertyList =
    unsafe extern "C" fn(instance: ClassInstancePtr, r_count: *mut u32) -> *const PropertyInfo;
pub type ClassFreePropertyList =
    unsafe extern "C" fn(instance: ClassInstancePtr, list: *const PropertyInfo);
pub type ClassPropertyCanRevert =
    unsafe extern "C" fn(instance: ClassInstancePtr, name: StringNamePtr) -> u8;
pub type ClassPropertyGetRevert =
    unsafe extern "C" fn(instance: ClassInstancePtr, name: StringNamePtr, r_ret: *mut c_void) -> u8;
pub type ClassValidateProperty =
    unsafe extern "C" fn(instance: ClassInstancePtr, property: *mut PropertyInfo) -> u8;
pub type ClassNotification2 =
    unsafe extern "C" fn(instance: ClassInstancePtr, what: i32, reversed: u8);
pub type ClassToString =
    unsafe extern "C" fn(instance: ClassInstancePtr, r_is_valid: *mut u8, out: StringPtr);
pub type ClassReference = unsafe extern "C" fn(instance: ClassInstancePtr);
pub type ClassUnreference = unsafe extern "C" fn(instance: ClassInstancePtr);
pub type ClassCallVirtual =
    unsafe extern "C" fn(instance: ClassInstancePtr, args: *const *const c_void, ret: *mut c_void);
pub type ClassCreateInstance = unsafe extern "C" fn(class_userdata: *mut c_void) -> *mut c_void;
pub type ClassFreeInstance =
    unsafe extern "C" fn(class_userdata: *mut c_void, instance: ClassInstancePtr);
pub type ClassRecreateInstance =
    unsafe extern "C" fn(class_userdata: *mut c_void, object: *mut c_void) -> ClassInstancePtr;
pub type ClassGetVirtual = unsafe extern "C" fn(
    class_userdata: *mut c_void,
    name: StringNamePtr,
) -> Option<ClassCallVirtual>;
pub type ClassGetVirtualCallData =
    unsafe extern "C" fn(class_userdata: *mut c_void, name: StringNamePtr) -> *mut c_void;
pub type ClassCallVirtualWithData = unsafe extern "C" fn(
    instance: ClassInstancePtr,
    name: StringNamePtr,
    virtual_userdata: *mut c_void,
    args: *const *const c_void,
    ret: *mut c_void,
);
pub type ClassGetRid = unsafe extern "C" fn(instance: ClassInstancePtr) -> u64;

pub type CallableCustomCall = unsafe extern "C" fn(
    userdata: *mut c_void,
    args: *const *const c_void,
    argument_count: i64,
    ret: *mut c_void,
    error: *mut CallErrorRaw,
);
pub type CallableCustomIsValid = unsafe extern "C" fn(userdata: *mut c_void) -> u8;
pub type CallableCustomFree = unsafe extern "C" fn(userdata: *mut c_void);
pub type CallableCustomHash = unsafe extern "C" fn(userdata: *mut c_void) -> u32;
pub type CallableCustomEqual = unsafe extern "C" fn(a: *mut c_void, b: *mut c_void) -> u8;
pub type CallableCustomLessThan = unsafe extern "C" fn(a: *mut c_void, b: *mut c_void) -> u8;
pub type CallableCustomToString =
    unsafe extern "C" fn(userdata: *mut c_void, r_is_valid: *mut u8, out: StringPtr);

pub type InitializeCallback = unsafe extern "C" fn(userdata: *mut c_void, level: u32);
pub type DeinitializeCallback = unsafe extern "C" fn(userdata: *mut c_void, level: u32);

/// Signature of the symbol the engine looks up in the shared library
pub type InitializationFunction = unsafe extern "C" fn(
    get_proc_address: Option<GetProcAddress>,
    library: LibraryPtr,
    r_initialization: *mut Initialization,
) -> u8;

/// Engine version as reported by `get_godot_version`
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct GodotVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub string: *const c_char,
}

impl Default for GodotVersion {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            string: std::ptr::null(),
        }
    }
}

/// Outcome record filled by variant-based calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct CallErrorRaw {
    pub error: i32,
    pub argument: i32,
    pub expected: i32,
}

/// Decoded `CallErrorRaw::error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorKind {
    Ok,
    InvalidMethod,
    InvalidArgument,
    TooManyArguments,
    TooFewArguments,
    InstanceIsNull,
    MethodNotConst,
    Unknown(i32),
}

impl CallErrorKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => CallErrorKind::Ok,
            1 => CallErrorKind::InvalidMethod,
            2 => CallErrorKind::InvalidArgument,
            3 => CallErrorKind::TooManyArguments,
            4 => CallErrorKind::TooFewArguments,
            5 => CallErrorKind::InstanceIsNull,
            6 => CallErrorKind::MethodNotConst,
            other => CallErrorKind::Unknown(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            CallErrorKind::Ok => 0,
            CallErrorKind::InvalidMethod => 1,
            CallErrorKind::InvalidArgument => 2,
            CallErrorKind::TooManyArguments => 3,
            CallErrorKind::TooFewArguments => 4,
            CallErrorKind::InstanceIsNull => 5,
            CallErrorKind::MethodNotConst => 6,
            CallErrorKind::Unknown(other) => other,
        }
    }
}

/// One property as the engine describes it to class callbacks
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct PropertyInfo {
    pub variant_type: u32,
    pub name: StringNamePtr,
    pub class_name: StringNamePtr,
    pub hint: u32,
    pub hint_string: StringPtr,
    pub usage: u32,
}

/// Callbacks the engine uses to create and drive an extension class
///
/// Laid out as the engine's `GDExtensionClassCreationInfo2`; every slot the
/// extension does not implement stays `None`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ClassCreationInfo {
    pub is_virtual: u8,
    pub is_abstract: u8,
    pub is_exposed: u8,
    pub set_func: Option<ClassSet>,
    pub get_func: Option<ClassGet>,
    pub get_property_list_func: Option<ClassGetPropertyList>,
    pub free_property_list_func: Option<ClassFreePropertyList>,
    pub property_can_revert_func: Option<ClassPropertyCanRevert>,
    pub property_get_revert_func: Option<ClassPropertyGetRevert>,
    pub validate_property_func: Option<ClassValidateProperty>,
    pub notification_func: Option<ClassNotification2>,
    pub to_string_func: Option<ClassToString>,
    pub reference_func: Option<ClassReference>,
    pub unreference_func: Option<ClassUnreference>,
    pub create_instance_func: Option<ClassCreateInstance>,
    pub free_instance_func: Option<ClassFreeInstance>,
    pub recreate_instance_func: Option<ClassRecreateInstance>,
    pub get_virtual_func: Option<ClassGetVirtual>,
    pub get_virtual_call_data_func: Option<ClassGetVirtualCallData>,
    pub call_virtual_with_data_func: Option<ClassCallVirtualWithData>,
    pub get_rid_func: Option<ClassGetRid>,
    pub class_userdata: *mut c_void,
}

impl Default for ClassCreationInfo {
    fn default() -> Self {
        Self {
            is_virtual: 0,
            is_abstract: 0,
            is_exposed: 1,
            set_func: None,
            get_func: None,
            get_property_list_func: None,
            free_property_list_func: None,
            property_can_revert_func: None,
            property_get_revert_func: None,
            validate_property_func: None,
            notification_func: None,
            to_string_func: None,
            reference_func: None,
            unreference_func: None,
            create_instance_func: None,
            free_instance_func: None,
            recreate_instance_func: None,
            get_virtual_func: None,
            get_virtual_call_data_func: None,
            call_virtual_with_data_func: None,
            get_rid_func: None,
            class_userdata: std::ptr::null_mut(),
        }
    }
}

/// Description of a host-implemented callable, laid out as the engine's
/// `GDExtensionCallableCustomInfo`
///
/// `token` must be the library pointer the engine passed to the entry symbol.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CallableCustomInfo {
    pub callable_userdata: *mut c_void,
    pub token: LibraryPtr,
    pub object_id: u64,
    pub call_func: Option<CallableCustomCall>,
    pub is_valid_func: Option<CallableCustomIsValid>,
    pub free_func: Option<CallableCustomFree>,
    pub hash_func: Option<CallableCustomHash>,
    pub equal_func: Option<CallableCustomEqual>,
    pub less_than_func: Option<CallableCustomLessThan>,
    pub to_string_func: Option<CallableCustomToString>,
}

/// Engine startup phases, in the order the engine walks them
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(u32)]
pub enum InitializationLevel {
    Core = 0,
    Servers = 1,
    Scene = 2,
    Editor = 3,
}

impl InitializationLevel {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(InitializationLevel::Core),
            1 => Some(InitializationLevel::Servers),
            2 => Some(InitializationLevel::Scene),
            3 => Some(InitializationLevel::Editor),
            _ => None,
        }
    }
}

/// Filled in by the extension's entry symbol
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Initialization {
    pub minimum_initialization_level: u32,
    pub userdata: *mut c_void,
    pub initialize: Option<InitializeCallback>,
    pub deinitialize: Option<DeinitializeCallback>,
}

impl Default for Initialization {
    fn default() -> Self {
        Self {
            minimum_initialization_level: InitializationLevel::Core as u32,
            userdata: std::ptr::null_mut(),
            initialize: None,
            deinitialize: None,
        }
    }
}

/// Resolve one symbol and reinterpret it as its real signature
///
/// # Safety
/// `F` must be the function-pointer type the engine documents for `name`.
unsafe fn load_symbol<F: Copy>(get_proc_address: GetProcAddress, name: &CStr) -> Result<F> {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<InterfaceFn>());
    match get_proc_address(name.as_ptr()) {
        Some(f) => Ok(mem::transmute_copy::<InterfaceFn, F>(&f)),
        None => Err(Error::MissingSymbol(name.to_string_lossy().into_owned())),
    }
}

macro_rules! interface_table {
    ($($field:ident: $ty:ty,)*) => {
        /// Function pointers supplied by the engine, resolved by symbol name
        #[derive(Clone, Copy)]
        pub struct InterfaceTable {
            $(pub $field: $ty,)*
        }

        impl InterfaceTable {
            /// Symbol names in resolution order
            pub const SYMBOLS: &'static [&'static str] = &[$(stringify!($field),)*];

            /// Resolve every entry through `get_proc_address`
            ///
            /// # Safety
            /// `get_proc_address` must be the engine's resolver (or a faithful
            /// double); each returned pointer must have the documented signature.
            pub unsafe fn load(get_proc_address: GetProcAddress) -> Result<Self> {
                Ok(Self {
                    $($field: load_symbol::<$ty>(
                        get_proc_address,
                        CStr::from_bytes_with_nul_unchecked(
                            concat!(stringify!($field), "\0").as_bytes(),
                        ),
                    )?,)*
                })
            }
        }
    };
}

interface_table! {
    get_godot_version: unsafe extern "C" fn(r_version: *mut GodotVersion),
    print_error: unsafe extern "C" fn(
        description: *const c_char,
        function: *const c_char,
        file: *const c_char,
        line: i32,
        notify_editor: u8,
    ),
    print_warning: unsafe extern "C" fn(
        description: *const c_char,
        function: *const c_char,
        file: *const c_char,
        line: i32,
        notify_editor: u8,
    ),
    string_new_with_utf8_chars_and_len:
        unsafe extern "C" fn(r_dest: *mut c_void, contents: *const c_char, size: i64),
    string_to_utf8_chars: unsafe extern "C" fn(
        this: *const c_void,
        r_text: *mut c_char,
        max_write_length: i64,
    ) -> i64,
    string_name_new_with_utf8_chars_and_len:
        unsafe extern "C" fn(r_dest: *mut c_void, contents: *const c_char, size: i64),
    variant_new_copy: unsafe extern "C" fn(r_dest: *mut c_void, src: *const c_void),
    variant_new_nil: unsafe extern "C" fn(r_dest: *mut c_void),
    variant_destroy: unsafe extern "C" fn(this: *mut c_void),
    variant_get_type: unsafe extern "C" fn(this: *const c_void) -> u32,
    variant_get_ptr_constructor:
        unsafe extern "C" fn(variant_type: u32, constructor: i32) -> Option<PtrConstructor>,
    variant_get_ptr_destructor: unsafe extern "C" fn(variant_type: u32) -> Option<PtrDestructor>,
    variant_get_ptr_builtin_method: unsafe extern "C" fn(
        variant_type: u32,
        method: *const c_void,
        hash: i64,
    ) -> Option<PtrBuiltInMethod>,
    get_variant_from_type_constructor:
        unsafe extern "C" fn(variant_type: u32) -> Option<VariantFromTypeConstructor>,
    get_variant_to_type_constructor:
        unsafe extern "C" fn(variant_type: u32) -> Option<TypeFromVariantConstructor>,
    array_operator_index: unsafe extern "C" fn(this: *mut c_void, index: i64) -> *mut c_void,
    classdb_construct_object: unsafe extern "C" fn(class_name: *const c_void) -> *mut c_void,
    classdb_get_method_bind: unsafe extern "C" fn(
        class_name: *const c_void,
        method_name: *const c_void,
        hash: i64,
    ) -> MethodBindPtr,
    classdb_register_extension_class2: unsafe extern "C" fn(
        library: LibraryPtr,
        class_name: *const c_void,
        parent_class_name: *const c_void,
        info: *const ClassCreationInfo,
    ),
    classdb_unregister_extension_class:
        unsafe extern "C" fn(library: LibraryPtr, class_name: *const c_void),
    object_method_bind_ptrcall: unsafe extern "C" fn(
        method_bind: MethodBindPtr,
        object: *mut c_void,
        args: *const *const c_void,
        ret: *mut c_void,
    ),
    object_method_bind_call: unsafe extern "C" fn(
        method_bind: MethodBindPtr,
        object: *mut c_void,
        args: *const *const c_void,
        argument_count: i64,
        ret: *mut c_void,
        error: *mut CallErrorRaw,
    ),
    object_destroy: unsafe extern "C" fn(object: *mut c_void),
    object_get_instance_id: unsafe extern "C" fn(object: *const c_void) -> u64,
    object_get_instance_from_id: unsafe extern "C" fn(instance_id: u64) -> *mut c_void,
    object_set_instance: unsafe extern "C" fn(
        object: *mut c_void,
        class_name: *const c_void,
        instance: ClassInstancePtr,
    ),
    callable_custom_create:
        unsafe extern "C" fn(r_callable: *mut c_void, info: *const CallableCustomInfo),
}

impl std::fmt::Debug for InterfaceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceTable")
            .field("symbols", &Self::SYMBOLS.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_kind_roundtrip() {
        for raw in 0..7 {
            assert_eq!(CallErrorKind::from_raw(raw).raw(), raw);
        }
        assert_eq!(CallErrorKind::from_raw(42), CallErrorKind::Unknown(42));
    }

    #[test]
    fn test_initialization_levels_ordered() {
        assert!(InitializationLevel::Core < InitializationLevel::Scene);
        assert_eq!(InitializationLevel::from_raw(2), Some(InitializationLevel::Scene));
        assert_eq!(InitializationLevel::from_raw(9), None);
    }

    #[test]
    fn test_symbol_names_are_engine_names() {
        assert!(InterfaceTable::SYMBOLS.contains(&"object_method_bind_ptrcall"));
        assert!(InterfaceTable::SYMBOLS.contains(&"string_new_with_utf8_chars_and_len"));
        assert!(InterfaceTable::SYMBOLS.contains(&"callable_custom_create"));
        assert!(InterfaceTable::SYMBOLS.contains(&"classdb_register_extension_class2"));
        assert!(!InterfaceTable::SYMBOLS.contains(&"classdb_register_extension_class"));
    }

    #[test]
    fn test_class_creation_info_matches_engine_layout() {
        assert_eq!(mem::size_of::<ClassCreationInfo>(), 160);
        assert_eq!(mem::offset_of!(ClassCreationInfo, set_func), 8);
        assert_eq!(mem::offset_of!(ClassCreationInfo, notification_func), 64);
        assert_eq!(mem::offset_of!(ClassCreationInfo, create_instance_func), 96);
        assert_eq!(mem::offset_of!(ClassCreationInfo, free_instance_func), 104);
        assert_eq!(mem::offset_of!(ClassCreationInfo, get_virtual_func), 120);
        assert_eq!(mem::offset_of!(ClassCreationInfo, get_virtual_call_data_func), 128);
        assert_eq!(mem::offset_of!(ClassCreationInfo, call_virtual_with_data_func), 136);
        assert_eq!(mem::offset_of!(ClassCreationInfo, class_userdata), 152);
        assert_eq!(mem::size_of::<PropertyInfo>(), 48);
    }

    #[test]
    fn test_callable_info_matches_engine_layout() {
        assert_eq!(mem::size_of::<CallableCustomInfo>(), 80);
        assert_eq!(mem::offset_of!(CallableCustomInfo, token), 8);
        assert_eq!(mem::offset_of!(CallableCustomInfo, call_func), 24);
        assert_eq!(mem::offset_of!(CallableCustomInfo, free_func), 40);
        assert_eq!(mem::offset_of!(CallableCustomInfo, hash_func), 48);
        assert_eq!(mem::offset_of!(CallableCustomInfo, to_string_func), 72);
    }
}
