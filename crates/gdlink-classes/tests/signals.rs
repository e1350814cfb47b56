//! Host closures connected to engine signals

use gdlink_classes::{Engine, LineEdit, Object};
use gdlink_core::mock::MockEngine;
use gdlink_core::{ExtensionConfig, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn setup() -> (MockEngine, Engine) {
    let mock = MockEngine::install_scene();
    let engine = Engine::init(&mock.api(), &ExtensionConfig::default()).unwrap();
    (mock, engine)
}

#[test]
fn test_callback_runs_once_per_emission() {
    let (mock, engine) = setup();
    let edit = engine.instantiate::<LineEdit>().unwrap();
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let _connection = edit
        .connect("text_submitted", 0, move |_| {
            seen.set(seen.get() + 1);
            Value::Nil
        })
        .unwrap();

    for n in 1..=5 {
        let ran = mock.emit_signal(edit.handle().ptr(), "text_submitted", &[Value::from("go")]);
        assert_eq!(ran, 1);
        assert_eq!(calls.get(), n);
    }
    mock.emit_signal(edit.handle().ptr(), "text_changed", &[Value::from("go")]);
    assert_eq!(calls.get(), 5);
}

#[test]
fn test_every_connection_hears_the_signal() {
    let (_mock, engine) = setup();
    let object = engine.instantiate::<Object>().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let connections: Vec<_> = ["first", "second"]
        .into_iter()
        .map(|tag| {
            let log = log.clone();
            object
                .connect("fired", 0, move |args| {
                    log.borrow_mut().push((tag, args.to_vec()));
                    Value::Nil
                })
                .unwrap()
        })
        .collect();

    object.emit_signal("fired", &[Value::Int(9)]).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![("first", vec![Value::Int(9)]), ("second", vec![Value::Int(9)])]
    );
    assert!(connections.iter().all(|c| c.is_connected().unwrap()));
}

#[test]
fn test_callable_freed_with_object() {
    let (mock, engine) = setup();
    let edit = engine.instantiate::<LineEdit>().unwrap();
    let dropped = Rc::new(Cell::new(false));

    struct DropFlag(Rc<Cell<bool>>);
    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    let flag = DropFlag(dropped.clone());
    let connection = edit
        .on_text_changed(move |_| {
            let _ = &flag;
        })
        .unwrap();
    assert_eq!(mock.live_callables(), 1);

    // Dropping the host side leaves the engine's connection in place
    drop(connection);
    assert!(!dropped.get());
    edit.clear().unwrap();
    assert_eq!(mock.live_callables(), 1);

    edit.into_control().into_object().free().unwrap();
    assert!(dropped.get());
    assert_eq!(mock.live_callables(), 0);
    assert_eq!(mock.live_objects(), 0);
}

#[test]
fn test_connection_outliving_object() {
    let (mock, engine) = setup();
    let object = engine.instantiate::<Object>().unwrap();
    let connection = object.connect("fired", 0, |_| Value::Nil).unwrap();
    object.free().unwrap();

    assert!(!connection.is_connected().unwrap());
    assert_eq!(mock.live_callables(), 1);
    connection.disconnect().unwrap();
    assert_eq!(mock.live_callables(), 0);
}

#[test]
fn test_object_references_resolve_while_alive() {
    let (_mock, engine) = setup();
    let object = engine.instantiate::<Object>().unwrap();
    let value = object.to_value();
    let found = engine.object_from_value(&value).unwrap().unwrap();
    assert_eq!(found.handle().ptr(), object.handle().ptr());
    assert!(engine.object_from_value(&Value::Nil).unwrap().is_none());

    object.free().unwrap();
    assert!(engine.object_from_value(&value).unwrap().is_none());
}
