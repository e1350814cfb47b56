//! Thread-local engine state and the native representations behind it
//!
//! Strings and string names are boxed `String`s, arrays are boxed vectors of
//! variant words, callables are refcounted boxes, and a variant is
//! `[tag, payload, payload]`. Nothing here holds the state borrow while host
//! code runs.

use crate::identity::InstanceId;
use crate::interface::{CallErrorKind, CallableCustomInfo, ClassCreationInfo};
use crate::math::{Color, Rect2, Vector2};
use crate::native::ObjectPtr;
use crate::variant::{Value, VariantType};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::rc::Rc;

use super::NativeCall;

pub(crate) type Words = [u64; 3];

pub(crate) type PtrImpl = Rc<dyn Fn(&mut NativeCall)>;
pub(crate) type VarImpl = Rc<dyn Fn(ObjectPtr, &[Value]) -> Result<Value, CallErrorKind>>;

#[derive(Clone)]
pub(crate) enum MockImpl {
    Ptr(PtrImpl),
    Var(VarImpl),
}

pub(crate) struct MockMethod {
    pub hash: i64,
    pub imp: MockImpl,
}

#[derive(Default)]
pub(crate) struct NativeClass {
    pub parent: Option<String>,
    pub methods: HashMap<String, Box<MockMethod>>,
}

pub(crate) struct ExtensionRecord {
    pub library: *mut c_void,
    pub parent: String,
    pub info: ClassCreationInfo,
}

pub(crate) struct Connection {
    pub signal: String,
    pub callable: *mut MockCallable,
}

pub(crate) struct MockObject {
    pub id: u64,
    pub class: String,
    pub instance: *mut c_void,
    pub connections: Vec<Connection>,
    pub props: HashMap<String, Value>,
}

pub(crate) struct MockCallable {
    pub refs: Cell<usize>,
    pub info: CallableCustomInfo,
}

pub(crate) struct MockArray {
    pub items: Vec<Words>,
}

#[derive(Default)]
pub(crate) struct State {
    pub hidden: HashSet<String>,
    pub strings_live: usize,
    pub names_live: usize,
    pub arrays_live: usize,
    pub callables_live: usize,
    pub live_texts: HashSet<usize>,
    pub release_log: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub classes: HashMap<String, NativeClass>,
    pub extensions: HashMap<String, ExtensionRecord>,
    pub registered: Vec<String>,
    pub unregistered: Vec<String>,
    pub objects: HashMap<u64, *mut MockObject>,
    pub next_id: u64,
}

impl State {
    /// Walk native and extension parents looking for a method
    pub fn find_method(&self, class: &str, method: &str) -> Option<&MockMethod> {
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            if let Some(native) = self.classes.get(&name) {
                if let Some(found) = native.methods.get(method) {
                    return Some(found);
                }
                current = native.parent.clone();
            } else {
                current = self.extensions.get(&name).map(|e| e.parent.clone());
            }
        }
        None
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

pub(crate) fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub(crate) fn reset() {
    STATE.with(|state| *state.borrow_mut() = State::default());
}

// Strings

pub(crate) fn alloc_string(text: String) -> *mut String {
    let ptr = Box::into_raw(Box::new(text));
    with_state(|s| {
        s.strings_live += 1;
        s.live_texts.insert(ptr as usize);
    });
    ptr
}

/// Take back a string box; `None` when it is not live
unsafe fn release_text(ptr: *mut String) -> Option<String> {
    if ptr.is_null() || !with_state(|s| s.live_texts.remove(&(ptr as usize))) {
        return None;
    }
    Some(*Box::from_raw(ptr))
}

pub(crate) unsafe fn free_string(ptr: *mut String) {
    if ptr.is_null() {
        return;
    }
    match release_text(ptr) {
        Some(text) => with_state(|s| {
            s.strings_live -= 1;
            s.release_log.push(text);
        }),
        None => with_state(|s| s.errors.push("double release of a String".to_string())),
    }
}

pub(crate) fn alloc_name(text: String) -> *mut String {
    let ptr = Box::into_raw(Box::new(text));
    with_state(|s| {
        s.names_live += 1;
        s.live_texts.insert(ptr as usize);
    });
    ptr
}

pub(crate) unsafe fn free_name(ptr: *mut String) {
    if ptr.is_null() {
        return;
    }
    match release_text(ptr) {
        Some(text) => with_state(|s| {
            s.names_live -= 1;
            s.release_log.push(text);
        }),
        None => with_state(|s| s.errors.push("double release of a StringName".to_string())),
    }
}

/// Text behind a string or string-name word; null reads as empty
///
/// A handle that was already released also reads as empty, and the read is
/// logged as an engine error instead of touching freed memory.
pub(crate) unsafe fn text<'a>(ptr: *const String) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    if !with_state(|s| s.live_texts.contains(&(ptr as usize))) {
        with_state(|s| s.errors.push("read of a released String".to_string()));
        return "";
    }
    &*ptr
}

/// First word of a native value, as the pointer it holds
pub(crate) unsafe fn first_word<T>(native: *const c_void) -> *mut T {
    if native.is_null() {
        return ptr::null_mut();
    }
    *(native as *const *mut T)
}

pub(crate) unsafe fn words<'a>(variant: *const c_void) -> &'a Words {
    &*(variant as *const Words)
}

pub(crate) unsafe fn words_mut<'a>(variant: *mut c_void) -> &'a mut Words {
    &mut *(variant as *mut Words)
}

// Arrays

pub(crate) fn alloc_array(items: Vec<Words>) -> *mut MockArray {
    with_state(|s| s.arrays_live += 1);
    Box::into_raw(Box::new(MockArray { items }))
}

pub(crate) unsafe fn free_array(ptr: *mut MockArray) {
    if ptr.is_null() {
        return;
    }
    let array = Box::from_raw(ptr);
    for mut item in array.items {
        destroy_words(&mut item);
    }
    with_state(|s| s.arrays_live -= 1);
}

pub(crate) unsafe fn copy_array(ptr: *const MockArray) -> *mut MockArray {
    let items = if ptr.is_null() {
        Vec::new()
    } else {
        (*ptr).items.iter().map(|w| copy_words(w)).collect()
    };
    alloc_array(items)
}

// Callables

pub(crate) fn alloc_callable(info: CallableCustomInfo) -> *mut MockCallable {
    with_state(|s| s.callables_live += 1);
    Box::into_raw(Box::new(MockCallable {
        refs: Cell::new(1),
        info,
    }))
}

pub(crate) unsafe fn callable_ref(ptr: *mut MockCallable) {
    if !ptr.is_null() {
        (*ptr).refs.set((*ptr).refs.get() + 1);
    }
}

pub(crate) unsafe fn callable_unref(ptr: *mut MockCallable) {
    if ptr.is_null() {
        return;
    }
    let refs = (*ptr).refs.get().saturating_sub(1);
    (*ptr).refs.set(refs);
    if refs == 0 {
        let callable = Box::from_raw(ptr);
        with_state(|s| s.callables_live -= 1);
        if let Some(free) = callable.info.free_func {
            free(callable.info.callable_userdata);
        }
    }
}

// Variants

const NIL: u64 = VariantType::Nil as u64;
const BOOL: u64 = VariantType::Bool as u64;
const INT: u64 = VariantType::Int as u64;
const FLOAT: u64 = VariantType::Float as u64;
const STRING: u64 = VariantType::String as u64;
const VECTOR2: u64 = VariantType::Vector2 as u64;
const RECT2: u64 = VariantType::Rect2 as u64;
const COLOR: u64 = VariantType::Color as u64;
const STRING_NAME: u64 = VariantType::StringName as u64;
const OBJECT: u64 = VariantType::Object as u64;
const CALLABLE: u64 = VariantType::Callable as u64;
const ARRAY: u64 = VariantType::Array as u64;

pub(crate) unsafe fn destroy_words(w: &mut Words) {
    match w[0] {
        STRING => free_string(w[1] as *mut String),
        STRING_NAME => free_name(w[1] as *mut String),
        ARRAY => free_array(w[1] as *mut MockArray),
        CALLABLE => callable_unref(w[1] as *mut MockCallable),
        _ => {}
    }
    *w = [NIL, 0, 0];
}

pub(crate) unsafe fn copy_words(w: &Words) -> Words {
    match w[0] {
        STRING => [STRING, alloc_string(text(w[1] as *const String).to_string()) as u64, 0],
        STRING_NAME => [
            STRING_NAME,
            alloc_name(text(w[1] as *const String).to_string()) as u64,
            0,
        ],
        ARRAY => [ARRAY, copy_array(w[1] as *const MockArray) as u64, 0],
        CALLABLE => {
            callable_ref(w[1] as *mut MockCallable);
            *w
        }
        _ => *w,
    }
}

pub(crate) unsafe fn pod_words<T: Copy>(tag: u64, value: *const T) -> Words {
    debug_assert!(size_of::<T>() <= 16);
    let mut w = [tag, 0, 0];
    ptr::copy_nonoverlapping(
        value as *const u8,
        w.as_mut_ptr().add(1) as *mut u8,
        size_of::<T>(),
    );
    w
}

pub(crate) unsafe fn read_pod<T: Copy>(w: &Words) -> T {
    ptr::read_unaligned(w.as_ptr().add(1) as *const T)
}

pub(crate) fn object_by_id(id: u64) -> *mut MockObject {
    with_state(|s| s.objects.get(&id).copied().unwrap_or(ptr::null_mut()))
}

/// Host value to owned variant words
pub(crate) unsafe fn encode(value: &Value) -> Words {
    match value {
        Value::Nil => [NIL, 0, 0],
        Value::Bool(b) => [BOOL, *b as u64, 0],
        Value::Int(i) => [INT, *i as u64, 0],
        Value::Float(f) => [FLOAT, f.to_bits(), 0],
        Value::String(s) => [STRING, alloc_string(s.clone()) as u64, 0],
        Value::StringName(s) => [STRING_NAME, alloc_name(s.clone()) as u64, 0],
        Value::Vector2(v) => pod_words(VECTOR2, v),
        Value::Rect2(r) => pod_words(RECT2, r),
        Value::Color(c) => pod_words(COLOR, c),
        Value::Object(id) => [OBJECT, object_by_id(id.raw()) as u64, 0],
        Value::Array(items) => [
            ARRAY,
            alloc_array(items.iter().map(|v| encode(v)).collect()) as u64,
            0,
        ],
    }
}

/// Variant words to host value, leaving the words untouched
pub(crate) unsafe fn decode(w: &Words) -> Value {
    match w[0] {
        BOOL => Value::Bool(w[1] != 0),
        INT => Value::Int(w[1] as i64),
        FLOAT => Value::Float(f64::from_bits(w[1])),
        STRING => Value::String(text(w[1] as *const String).to_string()),
        STRING_NAME => Value::StringName(text(w[1] as *const String).to_string()),
        VECTOR2 => Value::Vector2(read_pod::<Vector2>(w)),
        RECT2 => Value::Rect2(read_pod::<Rect2>(w)),
        COLOR => Value::Color(read_pod::<Color>(w)),
        OBJECT => {
            let object = w[1] as *mut MockObject;
            match id_of(object) {
                Some(id) => Value::Object(InstanceId(id)),
                None => Value::Nil,
            }
        }
        ARRAY => {
            let array = w[1] as *const MockArray;
            if array.is_null() {
                Value::Array(Vec::new())
            } else {
                Value::Array((*array).items.iter().map(|w| decode(w)).collect())
            }
        }
        _ => Value::Nil,
    }
}

// Objects

pub(crate) fn alloc_object(class: &str) -> *mut MockObject {
    with_state(|s| {
        s.next_id += 1;
        let object = Box::into_raw(Box::new(MockObject {
            id: s.next_id,
            class: class.to_string(),
            instance: ptr::null_mut(),
            connections: Vec::new(),
            props: HashMap::new(),
        }));
        s.objects.insert(s.next_id, object);
        object
    })
}

/// Borrow a live object; null or freed objects give `None`
pub(crate) unsafe fn object<'a>(ptr: ObjectPtr) -> Option<&'a mut MockObject> {
    let object = ptr.as_ptr() as *mut MockObject;
    id_of(object).map(|_| &mut *object)
}

/// Instance ID of a live object, found without dereferencing the pointer
pub(crate) fn id_of(object: *mut MockObject) -> Option<u64> {
    if object.is_null() {
        return None;
    }
    with_state(|s| {
        s.objects
            .iter()
            .find(|(_, live)| **live == object)
            .map(|(id, _)| *id)
    })
}
