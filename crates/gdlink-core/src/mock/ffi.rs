//! The mock's interface entry points

use super::state::{
    alloc_array, alloc_callable, alloc_name, alloc_object, alloc_string, callable_ref,
    copy_array, copy_words, destroy_words, first_word, free_array, free_name, free_string,
    object, pod_words, read_pod, text, with_state, words, words_mut, ExtensionRecord, MockArray,
    MockCallable, MockImpl, MockMethod, MockObject, Words,
};
use super::{MockEngine, NativeCall};
use crate::interface::{
    CallErrorKind, CallErrorRaw, CallableCustomInfo, ClassCreationInfo, GodotVersion,
    InterfaceFn, MethodBindPtr, PtrBuiltInMethod, PtrConstructor, PtrDestructor,
    TypeFromVariantConstructor, VariantFromTypeConstructor,
};
use crate::math::{Color, Rect2, Vector2, Vector2i};
use crate::native::ObjectPtr;
use crate::variant::VariantType;
use std::ffi::{c_char, c_void, CStr};
use std::ptr;

const VERSION_STRING: &CStr = c"Godot Engine v4.3.stable.mock";

unsafe fn utf8(contents: *const c_char, size: i64) -> String {
    if contents.is_null() || size <= 0 {
        return String::new();
    }
    let bytes = std::slice::from_raw_parts(contents as *const u8, size as usize);
    String::from_utf8_lossy(bytes).into_owned()
}

unsafe fn c_text(s: *const c_char) -> String {
    if s.is_null() {
        String::new()
    } else {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    }
}

unsafe fn name_text(name: *const c_void) -> String {
    text(first_word::<String>(name)).to_string()
}

unsafe extern "C" fn get_godot_version(r_version: *mut GodotVersion) {
    *r_version = GodotVersion {
        major: 4,
        minor: 3,
        patch: 0,
        string: VERSION_STRING.as_ptr(),
    };
}

unsafe extern "C" fn print_error(
    description: *const c_char,
    _function: *const c_char,
    _file: *const c_char,
    _line: i32,
    _notify_editor: u8,
) {
    let message = c_text(description);
    with_state(|s| s.errors.push(message));
}

unsafe extern "C" fn print_warning(
    description: *const c_char,
    _function: *const c_char,
    _file: *const c_char,
    _line: i32,
    _notify_editor: u8,
) {
    let message = c_text(description);
    with_state(|s| s.warnings.push(message));
}

unsafe extern "C" fn string_new_with_utf8_chars_and_len(
    r_dest: *mut c_void,
    contents: *const c_char,
    size: i64,
) {
    *(r_dest as *mut *mut String) = alloc_string(utf8(contents, size));
}

unsafe extern "C" fn string_to_utf8_chars(
    this: *const c_void,
    r_text: *mut c_char,
    max_write_length: i64,
) -> i64 {
    let source = text(first_word::<String>(this));
    if !r_text.is_null() {
        let count = source.len().min(max_write_length.max(0) as usize);
        ptr::copy_nonoverlapping(source.as_ptr(), r_text as *mut u8, count);
    }
    source.len() as i64
}

unsafe extern "C" fn string_name_new_with_utf8_chars_and_len(
    r_dest: *mut c_void,
    contents: *const c_char,
    size: i64,
) {
    *(r_dest as *mut *mut String) = alloc_name(utf8(contents, size));
}

unsafe extern "C" fn variant_new_copy(r_dest: *mut c_void, src: *const c_void) {
    *words_mut(r_dest) = copy_words(words(src));
}

unsafe extern "C" fn variant_new_nil(r_dest: *mut c_void) {
    *words_mut(r_dest) = [0; 3];
}

unsafe extern "C" fn variant_destroy(this: *mut c_void) {
    destroy_words(words_mut(this));
}

unsafe extern "C" fn variant_get_type(this: *const c_void) -> u32 {
    words(this)[0] as u32
}

// Builtin constructors, destructors and methods

unsafe extern "C" fn string_from_string_name(base: *mut c_void, args: *const *const c_void) {
    let source = name_text(*args);
    *(base as *mut *mut String) = alloc_string(source);
}

unsafe extern "C" fn array_new(base: *mut c_void, _args: *const *const c_void) {
    *(base as *mut *mut MockArray) = alloc_array(Vec::new());
}

unsafe extern "C" fn string_destroy(base: *mut c_void) {
    free_string(first_word::<String>(base));
    *(base as *mut *mut String) = ptr::null_mut();
}

unsafe extern "C" fn string_name_destroy(base: *mut c_void) {
    free_name(first_word::<String>(base));
    *(base as *mut *mut String) = ptr::null_mut();
}

unsafe extern "C" fn array_destroy(base: *mut c_void) {
    free_array(first_word::<MockArray>(base));
    *(base as *mut *mut MockArray) = ptr::null_mut();
}

unsafe extern "C" fn callable_destroy(base: *mut c_void) {
    super::state::callable_unref(first_word::<MockCallable>(base));
    *(base as *mut [u64; 2]) = [0; 2];
}

unsafe extern "C" fn array_size(
    base: *mut c_void,
    _args: *const *const c_void,
    ret: *mut c_void,
    _argument_count: i32,
) {
    let array = first_word::<MockArray>(base);
    let len = if array.is_null() { 0 } else { (*array).items.len() };
    *(ret as *mut i64) = len as i64;
}

unsafe extern "C" fn array_resize(
    base: *mut c_void,
    args: *const *const c_void,
    ret: *mut c_void,
    _argument_count: i32,
) {
    let array = first_word::<MockArray>(base);
    let len = (*(*args as *const i64)).max(0) as usize;
    if array.is_null() {
        return;
    }
    while (*array).items.len() > len {
        if let Some(mut item) = (*array).items.pop() {
            destroy_words(&mut item);
        }
    }
    (*array).items.resize(len, [0; 3]);
    if !ret.is_null() {
        *(ret as *mut i64) = 0;
    }
}

unsafe extern "C" fn array_operator_index(this: *mut c_void, index: i64) -> *mut c_void {
    let array = first_word::<MockArray>(this);
    if array.is_null() || index < 0 {
        return ptr::null_mut();
    }
    match (&mut (*array).items).get_mut(index as usize) {
        Some(item) => item as *mut Words as *mut c_void,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn variant_get_ptr_constructor(
    variant_type: u32,
    constructor: i32,
) -> Option<PtrConstructor> {
    match (VariantType::from_raw(variant_type)?, constructor) {
        (VariantType::String, 2) => Some(string_from_string_name as PtrConstructor),
        (VariantType::Array, 0) => Some(array_new as PtrConstructor),
        _ => None,
    }
}

unsafe extern "C" fn variant_get_ptr_destructor(variant_type: u32) -> Option<PtrDestructor> {
    match VariantType::from_raw(variant_type)? {
        VariantType::String => Some(string_destroy as PtrDestructor),
        VariantType::StringName => Some(string_name_destroy as PtrDestructor),
        VariantType::Array => Some(array_destroy as PtrDestructor),
        VariantType::Callable => Some(callable_destroy as PtrDestructor),
        _ => None,
    }
}

unsafe extern "C" fn variant_get_ptr_builtin_method(
    variant_type: u32,
    method: *const c_void,
    hash: i64,
) -> Option<PtrBuiltInMethod> {
    if VariantType::from_raw(variant_type)? != VariantType::Array {
        return None;
    }
    match (name_text(method).as_str(), hash) {
        ("size", crate::api::ARRAY_SIZE_HASH) => Some(array_size as PtrBuiltInMethod),
        ("resize", crate::api::ARRAY_RESIZE_HASH) => Some(array_resize as PtrBuiltInMethod),
        _ => None,
    }
}

// Variant conversions

unsafe extern "C" fn from_pod<T: Copy, const TAG: u32>(dst: *mut c_void, src: *mut c_void) {
    *words_mut(dst) = pod_words::<T>(TAG as u64, src as *const T);
}

unsafe extern "C" fn to_pod<T: Copy>(dst: *mut c_void, src: *mut c_void) {
    ptr::write_unaligned(dst as *mut T, read_pod::<T>(words(src)));
}

unsafe extern "C" fn from_string(dst: *mut c_void, src: *mut c_void) {
    let copy = alloc_string(text(first_word::<String>(src)).to_string());
    *words_mut(dst) = [VariantType::String as u64, copy as u64, 0];
}

unsafe extern "C" fn to_string(dst: *mut c_void, src: *mut c_void) {
    *(dst as *mut *mut String) = alloc_string(text(words(src)[1] as *const String).to_string());
}

unsafe extern "C" fn from_string_name(dst: *mut c_void, src: *mut c_void) {
    let copy = alloc_name(text(first_word::<String>(src)).to_string());
    *words_mut(dst) = [VariantType::StringName as u64, copy as u64, 0];
}

unsafe extern "C" fn to_string_name(dst: *mut c_void, src: *mut c_void) {
    *(dst as *mut *mut String) = alloc_name(text(words(src)[1] as *const String).to_string());
}

unsafe extern "C" fn from_object(dst: *mut c_void, src: *mut c_void) {
    let object = *(src as *const *mut c_void);
    *words_mut(dst) = [VariantType::Object as u64, object as u64, 0];
}

unsafe extern "C" fn to_object(dst: *mut c_void, src: *mut c_void) {
    *(dst as *mut *mut c_void) = words(src)[1] as *mut c_void;
}

unsafe extern "C" fn from_callable(dst: *mut c_void, src: *mut c_void) {
    let callable = first_word::<MockCallable>(src);
    callable_ref(callable);
    *words_mut(dst) = [VariantType::Callable as u64, callable as u64, 0];
}

unsafe extern "C" fn to_callable(dst: *mut c_void, src: *mut c_void) {
    let callable = words(src)[1] as *mut MockCallable;
    callable_ref(callable);
    *(dst as *mut [u64; 2]) = [callable as u64, 0];
}

unsafe extern "C" fn from_array(dst: *mut c_void, src: *mut c_void) {
    let copy = copy_array(first_word::<MockArray>(src));
    *words_mut(dst) = [VariantType::Array as u64, copy as u64, 0];
}

unsafe extern "C" fn to_array(dst: *mut c_void, src: *mut c_void) {
    *(dst as *mut *mut MockArray) = copy_array(words(src)[1] as *const MockArray);
}

unsafe extern "C" fn get_variant_from_type_constructor(
    variant_type: u32,
) -> Option<VariantFromTypeConstructor> {
    let ctor: VariantFromTypeConstructor = match VariantType::from_raw(variant_type)? {
        VariantType::Bool => from_pod::<bool, 1>,
        VariantType::Int => from_pod::<i64, 2>,
        VariantType::Float => from_pod::<f64, 3>,
        VariantType::String => from_string,
        VariantType::Vector2 => from_pod::<Vector2, 5>,
        VariantType::Vector2i => from_pod::<Vector2i, 6>,
        VariantType::Rect2 => from_pod::<Rect2, 7>,
        VariantType::Color => from_pod::<Color, 20>,
        VariantType::StringName => from_string_name,
        VariantType::Object => from_object,
        VariantType::Callable => from_callable,
        VariantType::Array => from_array,
        _ => return None,
    };
    Some(ctor)
}

unsafe extern "C" fn get_variant_to_type_constructor(
    variant_type: u32,
) -> Option<TypeFromVariantConstructor> {
    let ctor: TypeFromVariantConstructor = match VariantType::from_raw(variant_type)? {
        VariantType::Bool => to_pod::<bool>,
        VariantType::Int => to_pod::<i64>,
        VariantType::Float => to_pod::<f64>,
        VariantType::String => to_string,
        VariantType::Vector2 => to_pod::<Vector2>,
        VariantType::Vector2i => to_pod::<Vector2i>,
        VariantType::Rect2 => to_pod::<Rect2>,
        VariantType::Color => to_pod::<Color>,
        VariantType::StringName => to_string_name,
        VariantType::Object => to_object,
        VariantType::Callable => to_callable,
        VariantType::Array => to_array,
        _ => return None,
    };
    Some(ctor)
}

// Class db and objects

enum Construct {
    Extension(ClassCreationInfo),
    Native,
    Unknown,
}

unsafe extern "C" fn classdb_construct_object(class_name: *const c_void) -> *mut c_void {
    let class = name_text(class_name);
    let plan = with_state(|s| {
        if let Some(record) = s.extensions.get(&class) {
            Construct::Extension(record.info)
        } else if s.classes.contains_key(&class) {
            Construct::Native
        } else {
            Construct::Unknown
        }
    });
    match plan {
        Construct::Extension(info) => match info.create_instance_func {
            Some(create) => create(info.class_userdata),
            None => ptr::null_mut(),
        },
        Construct::Native => alloc_object(&class) as *mut c_void,
        Construct::Unknown => ptr::null_mut(),
    }
}

unsafe extern "C" fn classdb_get_method_bind(
    class_name: *const c_void,
    method_name: *const c_void,
    hash: i64,
) -> MethodBindPtr {
    let (class, method) = (name_text(class_name), name_text(method_name));
    with_state(|s| match s.find_method(&class, &method) {
        Some(found) if found.hash == hash => found as *const MockMethod as MethodBindPtr,
        _ => ptr::null(),
    })
}

unsafe extern "C" fn classdb_register_extension_class2(
    library: *mut c_void,
    class_name: *const c_void,
    parent_class_name: *const c_void,
    info: *const ClassCreationInfo,
) {
    let (class, parent) = (name_text(class_name), name_text(parent_class_name));
    let info = *info;
    with_state(|s| {
        if library != MockEngine::library() {
            s.errors.push(format!("class {class} registered with a foreign library token"));
            return;
        }
        if !s.classes.contains_key(&parent) && !s.extensions.contains_key(&parent) {
            s.errors.push(format!("parent class {parent} of {class} is not registered"));
            return;
        }
        s.registered.push(class.clone());
        s.extensions.insert(
            class,
            ExtensionRecord {
                library,
                parent,
                info,
            },
        );
    });
}

unsafe extern "C" fn classdb_unregister_extension_class(
    _library: *mut c_void,
    class_name: *const c_void,
) {
    let class = name_text(class_name);
    with_state(|s| {
        s.extensions.remove(&class);
        s.unregistered.push(class);
    });
}

unsafe extern "C" fn object_method_bind_ptrcall(
    method_bind: MethodBindPtr,
    object: *mut c_void,
    args: *const *const c_void,
    ret: *mut c_void,
) {
    if method_bind.is_null() {
        return;
    }
    let imp = (*(method_bind as *const MockMethod)).imp.clone();
    if let MockImpl::Ptr(f) = imp {
        let mut call = NativeCall {
            object: ObjectPtr(object),
            args,
            ret,
        };
        f(&mut call);
    }
}

unsafe extern "C" fn object_method_bind_call(
    method_bind: MethodBindPtr,
    object: *mut c_void,
    args: *const *const c_void,
    argument_count: i64,
    ret: *mut c_void,
    error: *mut CallErrorRaw,
) {
    let fail = |kind: CallErrorKind| {
        if !error.is_null() {
            *error = CallErrorRaw {
                error: kind.raw(),
                argument: 0,
                expected: 0,
            };
        }
    };
    if method_bind.is_null() {
        return fail(CallErrorKind::InvalidMethod);
    }
    let imp = (*(method_bind as *const MockMethod)).imp.clone();
    let MockImpl::Var(f) = imp else {
        return fail(CallErrorKind::InvalidMethod);
    };
    let values: Vec<_> = (0..argument_count.max(0) as usize)
        .map(|i| super::state::decode(words(*args.add(i))))
        .collect();
    match f(ObjectPtr(object), &values) {
        Ok(value) => {
            *words_mut(ret) = super::state::encode(&value);
            fail(CallErrorKind::Ok);
        }
        Err(kind) => fail(kind),
    }
}

unsafe extern "C" fn object_destroy(object_ptr: *mut c_void) {
    let Some(target) = object(ObjectPtr(object_ptr)) else {
        return;
    };
    let (id, class, instance) = (target.id, target.class.clone(), target.instance);
    let info = with_state(|s| {
        s.objects.remove(&id);
        s.extensions.get(&class).map(|record| record.info)
    });
    if let Some(info) = info.filter(|_| !instance.is_null()) {
        if let Some(free) = info.free_instance_func {
            free(info.class_userdata, instance);
        }
    }
    let boxed = Box::from_raw(object_ptr as *mut MockObject);
    for connection in boxed.connections {
        super::state::callable_unref(connection.callable);
    }
}

unsafe extern "C" fn object_get_instance_id(object_ptr: *const c_void) -> u64 {
    object(ObjectPtr(object_ptr as *mut c_void))
        .map(|o| o.id)
        .unwrap_or(0)
}

unsafe extern "C" fn object_get_instance_from_id(instance_id: u64) -> *mut c_void {
    super::state::object_by_id(instance_id) as *mut c_void
}

unsafe extern "C" fn object_set_instance(
    object_ptr: *mut c_void,
    class_name: *const c_void,
    instance: *mut c_void,
) {
    if let Some(target) = object(ObjectPtr(object_ptr)) {
        target.class = name_text(class_name);
        target.instance = instance;
    }
}

unsafe extern "C" fn callable_custom_create(
    r_callable: *mut c_void,
    info: *const CallableCustomInfo,
) {
    let info = *info;
    if info.token != MockEngine::library() {
        with_state(|s| s.errors.push("callable created with a foreign library token".to_string()));
    }
    let callable = alloc_callable(info);
    *(r_callable as *mut [u64; 2]) = [callable as u64, 0];
}

macro_rules! symbols {
    ($name:expr, $($symbol:ident),* $(,)?) => {
        match $name {
            $(stringify!($symbol) => Some(std::mem::transmute::<*const (), InterfaceFn>(
                $symbol as *const (),
            )),)*
            _ => None,
        }
    };
}

/// The mock's `get_proc_address`
pub(crate) unsafe extern "C" fn get_proc_address(name: *const c_char) -> Option<InterfaceFn> {
    let name = c_text(name);
    if with_state(|s| s.hidden.contains(&name)) {
        return None;
    }
    symbols!(
        name.as_str(),
        get_godot_version,
        print_error,
        print_warning,
        string_new_with_utf8_chars_and_len,
        string_to_utf8_chars,
        string_name_new_with_utf8_chars_and_len,
        variant_new_copy,
        variant_new_nil,
        variant_destroy,
        variant_get_type,
        variant_get_ptr_constructor,
        variant_get_ptr_destructor,
        variant_get_ptr_builtin_method,
        get_variant_from_type_constructor,
        get_variant_to_type_constructor,
        array_operator_index,
        classdb_construct_object,
        classdb_get_method_bind,
        classdb_register_extension_class2,
        classdb_unregister_extension_class,
        object_method_bind_ptrcall,
        object_method_bind_call,
        object_destroy,
        object_get_instance_id,
        object_get_instance_from_id,
        object_set_instance,
        callable_custom_create,
    )
}
