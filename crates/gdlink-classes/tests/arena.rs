//! Native temporaries created by the wrappers never outlive the call

use gdlink_classes::{AnimationNode, Engine, Error, LineEdit, Object};
use gdlink_core::mock::MockEngine;
use gdlink_core::{ExtensionConfig, Lifetime, Value, Vector2};
use std::cell::Cell;
use std::rc::Rc;

fn setup() -> (MockEngine, Engine) {
    let mock = MockEngine::install_scene();
    let engine = Engine::init(&mock.api(), &ExtensionConfig::default()).unwrap();
    (mock, engine)
}

fn assert_nothing_live(mock: &MockEngine) {
    assert_eq!(mock.live_strings(), 0);
    assert_eq!(mock.live_string_names(), 0);
    assert_eq!(mock.live_arrays(), 0);
}

#[test]
fn test_wrapper_calls_release_their_temporaries() {
    let (mock, engine) = setup();
    let edit = engine.instantiate::<LineEdit>().unwrap();
    edit.set_text("typed").unwrap();
    edit.set_placeholder("hint").unwrap();
    edit.set_tooltip_text("tip").unwrap();
    assert_eq!(edit.text().unwrap(), "typed");
    assert_eq!(edit.tooltip_text().unwrap(), "tip");
    assert_eq!(edit.get_class().unwrap(), "LineEdit");
    assert_nothing_live(&mock);

    let node = engine.instantiate::<AnimationNode>().unwrap();
    node.add_input("in").unwrap();
    node.set_parameter("weights", &Value::Array(vec![Value::Float(0.25), Value::from("x")]))
        .unwrap();
    assert_eq!(node.input_name(0).unwrap(), "in");
    assert_eq!(
        node.parameter("weights").unwrap(),
        Value::Array(vec![Value::Float(0.25), Value::from("x")])
    );
    assert_nothing_live(&mock);
}

#[test]
fn test_failed_call_still_releases() {
    let (mock, engine) = setup();
    let edit = engine.instantiate::<LineEdit>().unwrap();
    let view = edit.clone();
    edit.into_control().into_object().free().unwrap();

    assert!(matches!(
        view.set_text("lost"),
        Err(Error::Core(gdlink_core::Error::NullObject))
    ));
    assert!(view.text().is_err());
    assert_nothing_live(&mock);
}

#[test]
fn test_callbacks_run_in_a_nested_arena() {
    let (mock, engine) = setup();
    let object = engine.instantiate::<Object>().unwrap();
    let base = Lifetime::depth();
    let inner = Rc::new(Cell::new(0));
    let seen = inner.clone();
    let _connection = object
        .connect("probe", 0, move |_| {
            seen.set(Lifetime::depth());
            Value::Nil
        })
        .unwrap();

    mock.emit_signal(object.handle().ptr(), "probe", &[]);
    assert_eq!(inner.get(), base + 1);

    let outer = Lifetime::new(engine.api());
    mock.emit_signal(object.handle().ptr(), "probe", &[Value::from("held")]);
    assert_eq!(inner.get(), base + 2);
    outer.end();

    assert_eq!(Lifetime::depth(), base);
    assert_nothing_live(&mock);
}

#[test]
fn test_callback_results_are_handed_over() {
    let (mock, engine) = setup();
    let object = engine.instantiate::<Object>().unwrap();
    let lifetime = Lifetime::new(engine.api());
    let callable = lifetime.callable("echo", |args| {
        Value::Array(args.iter().rev().cloned().collect())
    });
    let result = mock.invoke_callable(callable.get(), &[Value::Int(1), Value::from("two")]);
    assert_eq!(result, Ok(Value::Array(vec![Value::from("two"), Value::Int(1)])));
    lifetime.end();

    assert_eq!(mock.live_callables(), 0);
    assert_nothing_live(&mock);
    object.free().unwrap();
}

#[test]
fn test_raw_view_uses_caller_arena() {
    let (mock, engine) = setup();
    let edit = engine.instantiate::<LineEdit>().unwrap();
    let lifetime = Lifetime::new(engine.api());
    let text = lifetime.string("kept");
    edit.line_edit_class().set_text(text.get()).unwrap();
    lifetime.end();

    edit.set_position(Vector2::new(3.0, 4.0)).unwrap();
    assert_eq!(edit.position().unwrap(), Vector2::new(3.0, 4.0));
    assert_eq!(edit.text().unwrap(), "kept");
    assert_nothing_live(&mock);
}
