//! `Object`: the root of every engine class
//!
//! Besides class introspection this is where the signal boundary lives:
//! host closures are wrapped as engine callables and handed to
//! `Object.connect`.

use crate::bridge::SignalArgs;
use crate::engine::Engine;
use crate::error::{Error, Result};
use gdlink_classdb::EngineClass;
use gdlink_core::boundary::report;
use gdlink_core::{
    CallFrame, GCallable, GString, GStringName, Lifetime, MethodSpec, ObjectHandle, Temp, Value,
    VariantType,
};
use std::fmt;

const GET_CLASS: MethodSpec = MethodSpec::new(
    "Object",
    "get_class",
    201670096,
    &[],
    Some(VariantType::String),
);
const GET_INSTANCE_ID: MethodSpec = MethodSpec::new(
    "Object",
    "get_instance_id",
    3905245786,
    &[],
    Some(VariantType::Int),
);
const CONNECT: MethodSpec = MethodSpec::new(
    "Object",
    "connect",
    1518946055,
    &[VariantType::StringName, VariantType::Callable, VariantType::Int],
    Some(VariantType::Int),
);
const DISCONNECT: MethodSpec = MethodSpec::new(
    "Object",
    "disconnect",
    1874754934,
    &[VariantType::StringName, VariantType::Callable],
    None,
);
const IS_CONNECTED: MethodSpec = MethodSpec::new(
    "Object",
    "is_connected",
    768136979,
    &[VariantType::StringName, VariantType::Callable],
    Some(VariantType::Bool),
);
const EMIT_SIGNAL: MethodSpec = MethodSpec::new(
    "Object",
    "emit_signal",
    4047867050,
    &[VariantType::StringName],
    Some(VariantType::Int),
)
.vararg();

pub(crate) const METHODS: &[MethodSpec] = &[
    GET_CLASS,
    GET_INSTANCE_ID,
    CONNECT,
    DISCONNECT,
    IS_CONNECTED,
    EMIT_SIGNAL,
];

/// Raw ABI view of an `Object`
///
/// Every native temporary a call returns is adopted by the caller's
/// [`Lifetime`].
#[derive(Clone, Copy)]
pub struct ObjectClass<'a> {
    engine: &'a Engine,
    handle: ObjectHandle,
}

impl<'a> ObjectClass<'a> {
    pub(crate) fn new(engine: &'a Engine, handle: ObjectHandle) -> Self {
        Self { engine, handle }
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Pointer-call `spec` on this object
    pub(crate) fn ptrcall(&self, spec: &MethodSpec, frame: &mut CallFrame) -> Result<()> {
        let api = self.engine.api();
        if !self.handle.is_alive(api) {
            return Err(gdlink_core::Error::NullObject.into());
        }
        // Wrappers are only built for objects of the spec's class or a subclass
        unsafe {
            self.engine
                .methods()
                .ptrcall(api, spec, self.handle.ptr(), frame)?
        };
        Ok(())
    }

    pub fn get_class<'l>(&self, lifetime: &'l Lifetime) -> Result<Temp<'l, GString>> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<GString>();
        self.ptrcall(&GET_CLASS, &mut frame)?;
        Ok(lifetime.adopt(frame.get(ret)))
    }

    pub fn get_instance_id(&self) -> Result<i64> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<i64>();
        self.ptrcall(&GET_INSTANCE_ID, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn connect(&self, signal: GStringName, callable: GCallable, flags: i64) -> Result<i64> {
        let mut frame = CallFrame::with_capacity(3);
        frame.arg(signal).arg(callable).arg(flags);
        let ret = frame.ret::<i64>();
        self.ptrcall(&CONNECT, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn disconnect(&self, signal: GStringName, callable: GCallable) -> Result<()> {
        let mut frame = CallFrame::with_capacity(2);
        frame.arg(signal).arg(callable);
        self.ptrcall(&DISCONNECT, &mut frame)
    }

    pub fn is_connected(&self, signal: GStringName, callable: GCallable) -> Result<bool> {
        let mut frame = CallFrame::with_capacity(2);
        frame.arg(signal).arg(callable);
        let ret = frame.ret::<bool>();
        self.ptrcall(&IS_CONNECTED, &mut frame)?;
        Ok(frame.get(ret))
    }

    /// Variant call; `args` follow the signal name
    pub fn emit_signal(&self, signal: &str, args: &[Value]) -> Result<Value> {
        let api = self.engine.api();
        if !self.handle.is_alive(api) {
            return Err(gdlink_core::Error::NullObject.into());
        }
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(Value::StringName(signal.to_string()));
        values.extend_from_slice(args);
        let ret = unsafe {
            self.engine
                .methods()
                .call(api, &EMIT_SIGNAL, self.handle.ptr(), &values)?
        };
        Ok(ret)
    }
}

/// Host wrapper for any engine object
#[derive(Clone)]
pub struct Object {
    engine: Engine,
    handle: ObjectHandle,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.handle).finish()
    }
}

impl EngineClass for Object {
    const CLASS: &'static str = "Object";
    const PARENT: Option<&'static str> = None;
}

impl Object {
    /// Deferred delivery: the callable runs at idle time
    pub const CONNECT_DEFERRED: i64 = 1;
    /// Saved with the scene
    pub const CONNECT_PERSIST: i64 = 2;
    /// Disconnected after the first emission
    pub const CONNECT_ONE_SHOT: i64 = 4;
    /// Connecting twice counts references instead of failing
    pub const CONNECT_REFERENCE_COUNTED: i64 = 8;

    pub fn from_engine(engine: &Engine, handle: ObjectHandle) -> Self {
        Self {
            engine: engine.clone(),
            handle,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn class(&self) -> ObjectClass<'_> {
        ObjectClass::new(&self.engine, self.handle)
    }

    pub fn get_class(&self) -> Result<String> {
        let lifetime = Lifetime::new(self.engine.api());
        let name = self.class().get_class(&lifetime)?;
        let name = lifetime.read_string(&name)?;
        lifetime.end();
        Ok(name)
    }

    /// Re-wrap as a more specific class
    pub fn cast<T: EngineClass>(&self) -> Result<T> {
        self.engine.cast::<T>(self.handle)
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive(self.engine.api())
    }

    /// Destroy the object if the host owns it
    pub fn free(self) -> Result<()> {
        Ok(self.handle.free(self.engine.api())?)
    }

    /// Reference to this object as a value
    pub fn to_value(&self) -> Value {
        Value::Object(self.handle.instance_id())
    }

    /// Connect `func` to `signal`
    ///
    /// The closure gets the emitted arguments and its return value is handed
    /// back to the engine. The engine keeps the connection until it is
    /// disconnected or the object dies.
    pub fn connect<F>(&self, signal: &str, flags: i64, func: F) -> Result<SignalConnection>
    where
        F: FnMut(&[Value]) -> Value + 'static,
    {
        let lifetime = Lifetime::new(self.engine.api());
        let name = lifetime.string_name(signal);
        let callable = lifetime.callable(&format!("signal {signal}"), func);
        let code = self.class().connect(name.native(), callable.native(), flags)?;
        if code != 0 {
            return Err(Error::Connect {
                signal: signal.to_string(),
                code,
            });
        }
        let callable = callable.transfer();
        lifetime.end();
        tracing::debug!(
            signal,
            id = %self.handle.instance_id(),
            flags,
            "Signal connected"
        );
        Ok(SignalConnection {
            engine: self.engine.clone(),
            object: self.handle.borrowed(),
            signal: signal.to_string(),
            callable,
        })
    }

    /// Connect a callback taking decoded arguments
    ///
    /// An emission whose arguments do not decode as `A` is reported to the
    /// engine and skipped.
    pub fn connect_typed<A, F>(
        &self,
        signal: &str,
        flags: i64,
        mut func: F,
    ) -> Result<SignalConnection>
    where
        A: SignalArgs,
        F: FnMut(A) + 'static,
    {
        let api = self.engine.api().clone();
        let context = format!("signal {signal}");
        self.connect(signal, flags, move |args| {
            match A::from_values(args) {
                Some(decoded) => func(decoded),
                None => report(
                    &api,
                    &context,
                    &format!("{context}: expected {} argument(s), got {args:?}", A::ARITY),
                ),
            }
            Value::Nil
        })
    }

    pub fn emit_signal(&self, signal: &str, args: &[Value]) -> Result<()> {
        match self.class().emit_signal(signal, args)? {
            Value::Int(0) | Value::Nil => Ok(()),
            other => Err(Error::Emit {
                signal: signal.to_string(),
                code: other.as_int().unwrap_or(-1),
            }),
        }
    }
}

/// A live signal connection
///
/// Holds a reference to the connected callable. Dropping it only releases
/// that reference; the engine keeps the connection until
/// [`SignalConnection::disconnect`] or the object's death.
pub struct SignalConnection {
    engine: Engine,
    object: ObjectHandle,
    signal: String,
    callable: GCallable,
}

impl fmt::Debug for SignalConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalConnection")
            .field("object", &self.object)
            .field("signal", &self.signal)
            .finish()
    }
}

impl SignalConnection {
    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    pub fn is_connected(&self) -> Result<bool> {
        if !self.object.is_alive(self.engine.api()) {
            return Ok(false);
        }
        let lifetime = Lifetime::new(self.engine.api());
        let name = lifetime.string_name(&self.signal);
        let connected = ObjectClass::new(&self.engine, self.object)
            .is_connected(name.native(), self.callable)?;
        lifetime.end();
        Ok(connected)
    }

    /// Remove the connection; a dead object has none left to remove
    pub fn disconnect(self) -> Result<()> {
        if !self.object.is_alive(self.engine.api()) {
            return Ok(());
        }
        let lifetime = Lifetime::new(self.engine.api());
        let name = lifetime.string_name(&self.signal);
        ObjectClass::new(&self.engine, self.object).disconnect(name.native(), self.callable)?;
        lifetime.end();
        tracing::debug!(
            signal = %self.signal,
            id = %self.object.instance_id(),
            "Signal disconnected"
        );
        Ok(())
    }
}

impl Drop for SignalConnection {
    fn drop(&mut self) {
        unsafe { self.engine.api().destroy_callable(&mut self.callable) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdlink_core::mock::MockEngine;
    use gdlink_core::{ExtensionConfig, Ownership};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup() -> (MockEngine, Engine) {
        let mock = MockEngine::install_scene();
        let engine = Engine::init(&mock.api(), &ExtensionConfig::default()).unwrap();
        (mock, engine)
    }

    fn new_object(mock: &MockEngine, engine: &Engine) -> Object {
        let handle =
            ObjectHandle::from_ptr(engine.api(), mock.construct("Object"), Ownership::Owned)
                .unwrap();
        engine.object(handle)
    }

    #[test]
    fn test_get_class_and_id() {
        let (mock, engine) = setup();
        let object = new_object(&mock, &engine);
        assert_eq!(object.get_class().unwrap(), "Object");
        assert_eq!(
            object.class().get_instance_id().unwrap() as u64,
            object.handle().instance_id().raw()
        );
        assert_eq!(mock.live_strings(), 0);
    }

    #[test]
    fn test_connect_and_emit() {
        let (mock, engine) = setup();
        let object = new_object(&mock, &engine);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let connection = object
            .connect("pinged", 0, move |args| {
                sink.borrow_mut().push(args.to_vec());
                Value::Nil
            })
            .unwrap();
        assert!(connection.is_connected().unwrap());

        object.emit_signal("pinged", &[Value::Int(1)]).unwrap();
        object.emit_signal("pinged", &[Value::Int(2)]).unwrap();
        object.emit_signal("other", &[]).unwrap();
        assert_eq!(*seen.borrow(), vec![vec![Value::Int(1)], vec![Value::Int(2)]]);

        connection.disconnect().unwrap();
        object.emit_signal("pinged", &[Value::Int(3)]).unwrap();
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(mock.live_callables(), 0);
        assert_eq!(mock.live_string_names(), 0);
    }

    #[test]
    fn test_duplicate_connect_fails() {
        let (mock, engine) = setup();
        let object = new_object(&mock, &engine);
        let first = object.connect("pinged", 0, |_| Value::Nil).unwrap();
        let lifetime = Lifetime::new(engine.api());
        let name = lifetime.string_name("pinged");
        let code = object
            .class()
            .connect(name.native(), first.callable, 0)
            .unwrap();
        lifetime.end();
        assert_ne!(code, 0);
        assert_eq!(mock.connection_count(object.handle().ptr(), "pinged"), 1);
    }

    #[test]
    fn test_typed_callback_reports_bad_arguments() {
        let (mock, engine) = setup();
        let object = new_object(&mock, &engine);
        let total = Rc::new(RefCell::new(0i64));
        let sink = total.clone();
        let _connection = object
            .connect_typed("scored", 0, move |(points,): (i64,)| {
                *sink.borrow_mut() += points;
            })
            .unwrap();

        object.emit_signal("scored", &[Value::Int(5)]).unwrap();
        object.emit_signal("scored", &[Value::from("five")]).unwrap();
        assert_eq!(*total.borrow(), 5);
        assert!(mock
            .errors()
            .iter()
            .any(|e| e.contains("signal scored") && e.contains("expected 1 argument")));
    }

    #[test]
    fn test_calls_on_freed_object_fail() {
        let (mock, engine) = setup();
        let object = new_object(&mock, &engine);
        let view = object.clone();
        object.free().unwrap();
        assert!(!view.is_alive());
        assert!(matches!(
            view.get_class(),
            Err(Error::Core(gdlink_core::Error::NullObject))
        ));
        assert_eq!(mock.live_objects(), 0);
    }
}
