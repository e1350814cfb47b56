//! Host closures exposed to the engine as custom callables

use crate::api::Api;
use crate::boundary::{guard, report};
use crate::interface::{CallErrorKind, CallErrorRaw, CallableCustomInfo};
use crate::lifetime::{Lifetime, Temp};
use crate::native::{GCallable, GString, GVariant};
use crate::variant::Value;
use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;

type HostFn = dyn FnMut(&[Value]) -> Value;

struct CallableData {
    api: Api,
    name: String,
    func: RefCell<Box<HostFn>>,
}

unsafe extern "C" fn call_thunk(
    userdata: *mut c_void,
    args: *const *const c_void,
    argument_count: i64,
    ret: *mut c_void,
    error: *mut CallErrorRaw,
) {
    let data = &*(userdata as *const CallableData);
    let lifetime = Lifetime::new(&data.api);

    let mut values = Vec::with_capacity(argument_count.max(0) as usize);
    for index in 0..argument_count.max(0) as usize {
        let variant = &*(*args.add(index) as *const GVariant);
        match lifetime.read_raw_value(variant) {
            Ok(value) => values.push(value),
            Err(err) => {
                report(&data.api, &data.name, &err.to_string());
                if !error.is_null() {
                    *error = CallErrorRaw {
                        error: CallErrorKind::InvalidArgument.raw(),
                        argument: index as i32,
                        expected: 0,
                    };
                }
                return;
            }
        }
    }

    let Some(result) = guard(&data.api, &data.name, || {
        let mut func = data.func.borrow_mut();
        (*func)(&values)
    }) else {
        return;
    };

    if !ret.is_null() {
        match lifetime.variant(&result) {
            Ok(variant) => ptr::write(ret as *mut GVariant, variant.transfer()),
            Err(err) => report(&data.api, &data.name, &err.to_string()),
        }
    }
    if !error.is_null() {
        *error = CallErrorRaw::default();
    }
    lifetime.end();
}

unsafe extern "C" fn is_valid_thunk(_userdata: *mut c_void) -> u8 {
    1
}

unsafe extern "C" fn free_thunk(userdata: *mut c_void) {
    let data = Box::from_raw(userdata as *mut CallableData);
    tracing::trace!(callable = %data.name, "Custom callable freed");
}

// Each closure is its own identity: equality and ordering follow the userdata address.

unsafe extern "C" fn hash_thunk(userdata: *mut c_void) -> u32 {
    let addr = userdata as usize as u64;
    (addr ^ (addr >> 32)) as u32
}

unsafe extern "C" fn equal_thunk(a: *mut c_void, b: *mut c_void) -> u8 {
    (a == b) as u8
}

unsafe extern "C" fn less_than_thunk(a: *mut c_void, b: *mut c_void) -> u8 {
    ((a as usize) < (b as usize)) as u8
}

unsafe extern "C" fn to_string_thunk(userdata: *mut c_void, r_is_valid: *mut u8, out: *mut c_void) {
    let data = &*(userdata as *const CallableData);
    ptr::write(out as *mut GString, data.api.new_string(&data.name));
    if !r_is_valid.is_null() {
        *r_is_valid = 1;
    }
}

impl Lifetime {
    /// Wrap `func` as an engine callable owned by this arena
    ///
    /// The engine keeps its own reference when the callable is stored (e.g. by
    /// `Object.connect`); the closure is dropped when the last one goes away.
    pub fn callable<F>(&self, name: &str, func: F) -> Temp<'_, GCallable>
    where
        F: FnMut(&[Value]) -> Value + 'static,
    {
        let data = Box::new(CallableData {
            api: self.api().clone(),
            name: name.to_string(),
            func: RefCell::new(Box::new(func)),
        });
        let info = CallableCustomInfo {
            callable_userdata: Box::into_raw(data) as *mut c_void,
            token: self.api().library(),
            object_id: 0,
            call_func: Some(call_thunk),
            is_valid_func: Some(is_valid_thunk),
            free_func: Some(free_thunk),
            hash_func: Some(hash_thunk),
            equal_func: Some(equal_thunk),
            less_than_func: Some(less_than_thunk),
            to_string_func: Some(to_string_thunk),
        };
        self.adopt(self.api().new_callable(&info))
    }
}
