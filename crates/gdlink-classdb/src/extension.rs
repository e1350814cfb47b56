//! Registration of host-defined subclasses with the engine
//!
//! `ClassRegistrar::register::<T>()` hands the engine four thunks per class:
//! instance create/free and virtual lookup/call. The virtual call thunk is
//! the trampoline: it opens an arena, decodes the native arguments, runs the
//! override and encodes the result, then closes the arena. Panics and decode
//! failures are reported through the engine and never cross the boundary.

use crate::error::{Error, Result};
use crate::registry::ClassDb;
use crate::virtuals::{VirtualEntry, VirtualTable};
use gdlink_core::boundary::{guard, report};
use gdlink_core::interface::ClassCreationInfo;
use gdlink_core::{Api, GStringName, Lifetime, ObjectHandle, Ownership};
use indexmap::IndexMap;
use std::any::Any;
use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;

/// A host type the engine can instantiate as a subclass of `PARENT`
///
/// `PARENT` may itself be an extension class registered earlier. The engine
/// object is then built from the nearest engine-native ancestor, and the
/// subclass owns its parent's host state: overrides it does not replace run
/// against the state returned by [`ExtensionClass::base_state`].
pub trait ExtensionClass: Sized + 'static {
    const CLASS: &'static str;
    const PARENT: &'static str;

    /// Build the host state for a freshly constructed engine object
    fn init(base: ObjectHandle) -> Self;

    /// Register the virtuals this class overrides
    fn register_virtuals(_table: &mut VirtualTable<Self>) {}

    /// Host state of the extension parent, for inherited overrides
    fn base_state(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// An override reachable from subclasses, independent of their host type
trait Inheritable {
    fn name(&self) -> &'static str;

    /// # Safety
    /// `args` and `ret` must match the virtual's declared signature.
    unsafe fn invoke_on(
        &self,
        state: &mut dyn Any,
        args: *const *const c_void,
        ret: *mut c_void,
        lifetime: &Lifetime,
    ) -> Result<()>;
}

/// How one virtual resolves for a class
enum Dispatch<T> {
    Own(VirtualEntry<T>),
    /// Points into the dispatch map of the extension parent, which is
    /// unregistered after this class
    Inherited(*const dyn Inheritable),
}

impl<T: ExtensionClass> Dispatch<T> {
    fn name(&self) -> &'static str {
        match self {
            Dispatch::Own(entry) => entry.name,
            Dispatch::Inherited(parent) => unsafe { (**parent).name() },
        }
    }

    unsafe fn invoke(
        &self,
        state: &mut T,
        args: *const *const c_void,
        ret: *mut c_void,
        lifetime: &Lifetime,
    ) -> Result<()> {
        match self {
            Dispatch::Own(entry) => Ok(entry.invoke(state, args, ret, lifetime)?),
            Dispatch::Inherited(parent) => {
                let parent = &**parent;
                let base = state.base_state().ok_or_else(|| Error::MissingBaseState {
                    class: T::PARENT.to_string(),
                    name: parent.name().to_string(),
                })?;
                parent.invoke_on(base, args, ret, lifetime)
            }
        }
    }
}

impl<T: ExtensionClass> Inheritable for Dispatch<T> {
    fn name(&self) -> &'static str {
        Dispatch::name(self)
    }

    unsafe fn invoke_on(
        &self,
        state: &mut dyn Any,
        args: *const *const c_void,
        ret: *mut c_void,
        lifetime: &Lifetime,
    ) -> Result<()> {
        let state = state
            .downcast_mut::<T>()
            .ok_or_else(|| Error::MissingBaseState {
                class: T::CLASS.to_string(),
                name: self.name().to_string(),
            })?;
        self.invoke(state, args, ret, lifetime)
    }
}

struct ClassUserdata<T> {
    api: Api,
    class: String,
    native_base: String,
    dispatch: IndexMap<&'static str, Dispatch<T>>,
}

struct Instance<T> {
    api: Api,
    class: &'static str,
    value: RefCell<T>,
}

type Overrides = Vec<(&'static str, *const dyn Inheritable)>;

struct Registered {
    name: String,
    native_base: String,
    userdata: *mut c_void,
    release: unsafe fn(*mut c_void),
    overrides: unsafe fn(*mut c_void) -> Overrides,
}

/// Registers extension classes and unregisters them in reverse order
pub struct ClassRegistrar {
    api: Api,
    registered: Vec<Registered>,
}

impl ClassRegistrar {
    /// Registrar for the library `api` was loaded for
    pub fn new(api: &Api) -> Self {
        Self {
            api: api.clone(),
            registered: Vec::new(),
        }
    }

    /// Register `T` with the engine and record it in `classes`
    ///
    /// `T::PARENT` must already be known to `classes`, and every overridden
    /// virtual must be declared by `T::PARENT` or one of its ancestors.
    pub fn register<T: ExtensionClass, C: 'static>(
        &mut self,
        classes: &mut ClassDb<C>,
    ) -> Result<()> {
        if classes.contains(T::CLASS) {
            return Err(Error::DuplicateClass(T::CLASS.to_string()));
        }
        if !classes.contains(T::PARENT) {
            return Err(Error::UnregisteredClass(T::PARENT.to_string()));
        }

        let mut virtuals = VirtualTable::new();
        T::register_virtuals(&mut virtuals);
        if let Some(entry) = virtuals
            .entries()
            .find(|entry| !classes.is_subclass(T::PARENT, entry.class))
        {
            return Err(Error::UnknownVirtual {
                class: T::CLASS.to_string(),
                name: entry.name.to_string(),
            });
        }
        let overrides = virtuals.len();

        let mut dispatch: IndexMap<&'static str, Dispatch<T>> = virtuals
            .into_entries()
            .map(|entry| (entry.name, Dispatch::Own(entry)))
            .collect();
        let parent = self.registered.iter().find(|r| r.name == T::PARENT);
        let native_base = match parent {
            Some(parent) => {
                for (name, inherited) in unsafe { (parent.overrides)(parent.userdata) } {
                    dispatch
                        .entry(name)
                        .or_insert(Dispatch::Inherited(inherited));
                }
                parent.native_base.clone()
            }
            None => T::PARENT.to_string(),
        };
        let inherited = dispatch.len() - overrides;

        let userdata = Box::into_raw(Box::new(ClassUserdata::<T> {
            api: self.api.clone(),
            class: T::CLASS.to_string(),
            native_base: native_base.clone(),
            dispatch,
        })) as *mut c_void;
        let info = ClassCreationInfo {
            create_instance_func: Some(create_instance::<T>),
            free_instance_func: Some(free_instance::<T>),
            get_virtual_call_data_func: Some(get_virtual_call_data::<T>),
            call_virtual_with_data_func: Some(call_virtual_with_data::<T>),
            class_userdata: userdata,
            ..ClassCreationInfo::default()
        };

        let lifetime = Lifetime::new(&self.api);
        let class = lifetime.string_name(T::CLASS);
        let parent = lifetime.string_name(T::PARENT);
        unsafe {
            self.api
                .register_extension_class(class.get(), parent.get(), &info)
        };
        lifetime.end();

        classes.declare(T::CLASS, Some(T::PARENT))?;
        self.registered.push(Registered {
            name: T::CLASS.to_string(),
            native_base,
            userdata,
            release: release_userdata::<T>,
            overrides: inheritable::<T>,
        });
        tracing::info!(
            class = T::CLASS,
            parent = T::PARENT,
            virtuals = overrides,
            inherited,
            "Registered extension class"
        );
        Ok(())
    }

    /// Registered class names, in registration order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(|r| r.name.as_str())
    }

    /// Engine-native class an extension class's objects are built from
    pub fn native_base(&self, class: &str) -> Option<&str> {
        self.registered
            .iter()
            .find(|r| r.name == class)
            .map(|r| r.native_base.as_str())
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Unregister every class, most recent first, and free its userdata
    pub fn unregister_all(&mut self) {
        let lifetime = Lifetime::new(&self.api);
        while let Some(class) = self.registered.pop() {
            let name = lifetime.string_name(&class.name);
            unsafe {
                self.api.unregister_extension_class(name.get());
                (class.release)(class.userdata);
            }
            tracing::debug!(class = %class.name, "Unregistered extension class");
        }
        lifetime.end();
    }
}

unsafe fn release_userdata<T>(userdata: *mut c_void) {
    drop(Box::from_raw(userdata as *mut ClassUserdata<T>));
}

unsafe fn inheritable<T: ExtensionClass>(userdata: *mut c_void) -> Overrides {
    let data = &*(userdata as *const ClassUserdata<T>);
    data.dispatch
        .iter()
        .map(|(name, dispatch)| {
            (*name, dispatch as *const Dispatch<T> as *const dyn Inheritable)
        })
        .collect()
}

fn construct<T: ExtensionClass>(data: &ClassUserdata<T>) -> Result<*mut c_void> {
    let lifetime = Lifetime::new(&data.api);
    let native = lifetime.string_name(&data.native_base);
    let object = data.api.construct_object(native.get());
    let base = ObjectHandle::from_ptr(&data.api, object, Ownership::Borrowed)?;

    let instance = Box::into_raw(Box::new(Instance {
        api: data.api.clone(),
        class: T::CLASS,
        value: RefCell::new(T::init(base)),
    }));
    let class = lifetime.string_name(&data.class);
    unsafe {
        data.api
            .object_set_instance(object, class.get(), instance as *mut c_void)
    };
    lifetime.end();
    tracing::trace!(class = T::CLASS, id = %base.instance_id(), "Created extension instance");
    Ok(object.as_ptr())
}

unsafe extern "C" fn create_instance<T: ExtensionClass>(
    class_userdata: *mut c_void,
) -> *mut c_void {
    let data = &*(class_userdata as *const ClassUserdata<T>);
    let context = format!("{}::create", data.class);
    match guard(&data.api, &context, || construct(data)) {
        Some(Ok(object)) => object,
        Some(Err(err)) => {
            report(&data.api, &context, &err.to_string());
            ptr::null_mut()
        }
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn free_instance<T: ExtensionClass>(
    class_userdata: *mut c_void,
    instance: *mut c_void,
) {
    if instance.is_null() {
        return;
    }
    let data = &*(class_userdata as *const ClassUserdata<T>);
    let context = format!("{}::free", data.class);
    guard(&data.api, &context, || {
        drop(unsafe { Box::from_raw(instance as *mut Instance<T>) });
    });
}

unsafe extern "C" fn get_virtual_call_data<T: ExtensionClass>(
    class_userdata: *mut c_void,
    name: *const c_void,
) -> *mut c_void {
    let data = &*(class_userdata as *const ClassUserdata<T>);
    if name.is_null() {
        return ptr::null_mut();
    }
    let name = match data.api.read_string_name(&*(name as *const GStringName)) {
        Ok(name) => name,
        Err(err) => {
            report(&data.api, &data.class, &err.to_string());
            return ptr::null_mut();
        }
    };
    match data.dispatch.get(name.as_str()) {
        Some(dispatch) => dispatch as *const Dispatch<T> as *mut c_void,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn call_virtual_with_data<T: ExtensionClass>(
    instance: *mut c_void,
    _name: *const c_void,
    virtual_userdata: *mut c_void,
    args: *const *const c_void,
    ret: *mut c_void,
) {
    if instance.is_null() || virtual_userdata.is_null() {
        return;
    }
    let instance = &*(instance as *const Instance<T>);
    let dispatch = &*(virtual_userdata as *const Dispatch<T>);
    let context = format!("{}.{}", instance.class, dispatch.name());

    let Ok(mut value) = instance.value.try_borrow_mut() else {
        report(&instance.api, &context, "re-entrant virtual call on the same instance");
        return;
    };
    let lifetime = Lifetime::new(&instance.api);
    let outcome = guard(&instance.api, &context, || unsafe {
        dispatch.invoke(&mut value, args, ret, &lifetime)
    });
    if let Some(Err(err)) = outcome {
        report(&instance.api, &context, &err.to_string());
    }
    lifetime.end();
}
