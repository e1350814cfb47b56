//! Native classes the mock engine ships with
//!
//! Behaviour is a small stand-in (a property store plus the signals the
//! engine emits for these calls); hashes are the engine's own.

use super::state::{first_word, MockCallable};
use super::{MockEngine, NativeCall};
use crate::interface::CallErrorKind;
use crate::math::{Rect2, Vector2};
use crate::native::{GCallable, ObjectPtr};
use crate::variant::Value;
use std::ffi::c_void;

const ERR_INVALID_PARAMETER: i64 = 31;

fn callable_arg(call: &NativeCall, index: usize) -> *mut MockCallable {
    let callable = call.arg::<GCallable>(index);
    unsafe { first_word::<MockCallable>(&callable as *const GCallable as *const c_void) }
}

fn string_prop(call: &NativeCall, key: &str) -> String {
    call.prop(key).as_str().unwrap_or_default().to_string()
}

fn vector_prop(call: &NativeCall, key: &str) -> Vector2 {
    call.prop(key).as_vector2().unwrap_or_default()
}

pub(super) fn define_object(engine: &MockEngine) {
    engine.define_class("Object", None);

    engine.define_method("Object", "get_class", 201670096, |call| {
        let class = unsafe { super::state::object(call.object) }
            .map(|o| o.class.clone())
            .unwrap_or_default();
        call.ret_string(&class);
    });
    engine.define_method("Object", "get_instance_id", 3905245786, |call| {
        let id = call.instance_id() as i64;
        call.ret(id);
    });
    engine.define_method("Object", "connect", 1518946055, |call| {
        let signal = call.arg_string_name(0);
        let callable = callable_arg(call, 1);
        let code = if MockEngine::connect_on(call.object, &signal, callable) {
            0
        } else {
            ERR_INVALID_PARAMETER
        };
        call.ret(code);
    });
    engine.define_method("Object", "disconnect", 1874754934, |call| {
        let signal = call.arg_string_name(0);
        let callable = callable_arg(call, 1);
        MockEngine::disconnect_on(call.object, &signal, callable);
    });
    engine.define_method("Object", "is_connected", 768136979, |call| {
        let signal = call.arg_string_name(0);
        let callable = callable_arg(call, 1);
        let connected = MockEngine::is_connected_on(call.object, &signal, callable);
        call.ret(connected);
    });
    engine.define_vararg_method("Object", "emit_signal", 4047867050, |object, args| {
        let Some((signal, rest)) = args.split_first() else {
            return Err(CallErrorKind::TooFewArguments);
        };
        let Some(signal) = signal.as_str() else {
            return Err(CallErrorKind::InvalidArgument);
        };
        MockEngine::emit_on(object, signal, rest);
        Ok(Value::Int(0))
    });
}

pub(super) fn define_scene(engine: &MockEngine) {
    for (class, parent) in [
        ("Node", "Object"),
        ("CanvasItem", "Node"),
        ("Control", "CanvasItem"),
        ("LineEdit", "Control"),
        ("Viewport", "Node"),
        ("Window", "Viewport"),
        ("Popup", "Window"),
        ("PopupMenu", "Popup"),
        ("RefCounted", "Object"),
        ("Resource", "RefCounted"),
        ("AnimationNode", "Resource"),
    ] {
        engine.define_class(class, Some(parent));
    }
    define_control(engine);
    define_line_edit(engine);
    define_animation_node(engine);
}

fn define_control(engine: &MockEngine) {
    engine.define_method("Control", "set_position", 2436320129, |call| {
        let position = call.arg::<Vector2>(0);
        call.set_prop("position", Value::Vector2(position));
    });
    engine.define_method("Control", "get_position", 3341600327, |call| {
        let position = vector_prop(call, "position");
        call.ret(position);
    });
    engine.define_method("Control", "set_size", 2436320129, |call| {
        let size = call.arg::<Vector2>(0);
        let changed = vector_prop(call, "size") != size;
        call.set_prop("size", Value::Vector2(size));
        if changed {
            call.emit("resized", &[]);
        }
    });
    engine.define_method("Control", "get_size", 3341600327, |call| {
        let size = vector_prop(call, "size");
        call.ret(size);
    });
    engine.define_method("Control", "get_rect", 1639390495, |call| {
        let rect = Rect2::new(vector_prop(call, "position"), vector_prop(call, "size"));
        call.ret(rect);
    });
    engine.define_method("Control", "set_tooltip_text", 83702148, |call| {
        let text = call.arg_string(0);
        call.set_prop("tooltip_text", Value::String(text));
    });
    engine.define_method("Control", "get_tooltip_text", 201670096, |call| {
        let text = string_prop(call, "tooltip_text");
        call.ret_string(&text);
    });
}

fn define_line_edit(engine: &MockEngine) {
    engine.define_method("LineEdit", "set_text", 83702148, |call| {
        let mut text = call.arg_string(0);
        let max = call.prop("max_length").as_int().unwrap_or(0);
        if max > 0 {
            text = text.chars().take(max as usize).collect();
        }
        call.set_prop("text", Value::String(text));
    });
    engine.define_method("LineEdit", "get_text", 201670096, |call| {
        let text = string_prop(call, "text");
        call.ret_string(&text);
    });
    engine.define_method("LineEdit", "set_placeholder", 83702148, |call| {
        let text = call.arg_string(0);
        call.set_prop("placeholder", Value::String(text));
    });
    engine.define_method("LineEdit", "get_placeholder", 201670096, |call| {
        let text = string_prop(call, "placeholder");
        call.ret_string(&text);
    });
    engine.define_method("LineEdit", "set_max_length", 1286410249, |call| {
        let max = call.arg::<i64>(0).max(0);
        call.set_prop("max_length", Value::Int(max));
        let text = string_prop(call, "text");
        if max > 0 && text.chars().count() > max as usize {
            let truncated: String = text.chars().take(max as usize).collect();
            call.set_prop("text", Value::String(truncated));
        }
    });
    engine.define_method("LineEdit", "get_max_length", 3905245786, |call| {
        let max = call.prop("max_length").as_int().unwrap_or(0);
        call.ret(max);
    });
    engine.define_method("LineEdit", "clear", 3218959716, |call| {
        call.set_prop("text", Value::String(String::new()));
        call.emit("text_changed", &[Value::String(String::new())]);
    });
    engine.define_method("LineEdit", "select_all", 3218959716, |call| {
        call.set_prop("selected_all", Value::Bool(true));
    });
    engine.define_method("LineEdit", "get_menu", 229722558, |call| {
        let menu = match call.prop("menu") {
            Value::Object(id) => super::state::object_by_id(id.raw()) as *mut c_void,
            _ => std::ptr::null_mut(),
        };
        let menu = if menu.is_null() {
            let created = super::state::alloc_object("PopupMenu");
            let id = unsafe { (*created).id };
            call.set_prop("menu", Value::Object(crate::identity::InstanceId(id)));
            created as *mut c_void
        } else {
            menu
        };
        call.ret(ObjectPtr(menu));
    });
}

fn inputs(call: &NativeCall) -> Vec<String> {
    call.prop("inputs")
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn set_inputs(call: &NativeCall, inputs: Vec<String>) {
    call.set_prop(
        "inputs",
        Value::Array(inputs.into_iter().map(Value::String).collect()),
    );
}

fn valid_input_name(name: &str) -> bool {
    !name.contains('.') && !name.contains('/')
}

fn define_animation_node(engine: &MockEngine) {
    engine.define_method("AnimationNode", "add_input", 2323990056, |call| {
        let name = call.arg_string(0);
        let ok = valid_input_name(&name);
        if ok {
            let mut list = inputs(call);
            list.push(name);
            set_inputs(call, list);
        }
        call.ret(ok);
    });
    engine.define_method("AnimationNode", "remove_input", 1286410249, |call| {
        let index = call.arg::<i64>(0);
        let mut list = inputs(call);
        if index >= 0 && (index as usize) < list.len() {
            list.remove(index as usize);
            set_inputs(call, list);
        }
    });
    engine.define_method("AnimationNode", "set_input_name", 215573526, |call| {
        let index = call.arg::<i64>(0);
        let name = call.arg_string(1);
        let mut list = inputs(call);
        let ok = index >= 0 && (index as usize) < list.len() && valid_input_name(&name);
        if ok {
            list[index as usize] = name;
            set_inputs(call, list);
        }
        call.ret(ok);
    });
    engine.define_method("AnimationNode", "get_input_name", 844755477, |call| {
        let index = call.arg::<i64>(0);
        let name = usize::try_from(index)
            .ok()
            .and_then(|i| inputs(call).get(i).cloned())
            .unwrap_or_default();
        call.ret_string(&name);
    });
    engine.define_method("AnimationNode", "get_input_count", 3905245786, |call| {
        let count = inputs(call).len() as i64;
        call.ret(count);
    });
    engine.define_method("AnimationNode", "set_parameter", 3776071444, |call| {
        let name = call.arg_string_name(0);
        let value = call.arg_value(1);
        call.set_prop(&format!("parameters/{name}"), value);
    });
    engine.define_method("AnimationNode", "get_parameter", 2760726917, |call| {
        let name = call.arg_string_name(0);
        let value = call.prop(&format!("parameters/{name}"));
        call.ret_value(&value);
    });
    engine.define_method("AnimationNode", "blend_input", 1630801826, |call| {
        let index = call.arg::<i64>(0);
        let time = call.arg::<f64>(1);
        let blend = call.arg::<f64>(4);
        let count = inputs(call).len() as i64;
        let result = if (0..count).contains(&index) {
            time * blend
        } else {
            0.0
        };
        call.ret(result);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callframe::CallFrame;
    use crate::lifetime::Lifetime;
    use crate::method::{MethodSpec, MethodTable};
    use crate::native::GString;
    use crate::variant::VariantType;

    const SET_MAX_LENGTH: MethodSpec =
        MethodSpec::new("LineEdit", "set_max_length", 1286410249, &[VariantType::Int], None);
    const SET_TEXT: MethodSpec =
        MethodSpec::new("LineEdit", "set_text", 83702148, &[VariantType::String], None);
    const GET_TEXT: MethodSpec = MethodSpec::new(
        "LineEdit",
        "get_text",
        201670096,
        &[],
        Some(VariantType::String),
    );
    const GET_MENU: MethodSpec = MethodSpec::new(
        "LineEdit",
        "get_menu",
        229722558,
        &[],
        Some(VariantType::Object),
    );
    const EMIT_SIGNAL: MethodSpec = MethodSpec::new(
        "Object",
        "emit_signal",
        4047867050,
        &[VariantType::StringName],
        Some(VariantType::Int),
    )
    .vararg();

    #[test]
    fn test_max_length_truncates_text() {
        let engine = MockEngine::install_scene();
        let api = engine.api();
        let table =
            MethodTable::populate(&api, [&SET_MAX_LENGTH, &SET_TEXT, &GET_TEXT]).unwrap();
        let edit = engine.construct("LineEdit");
        let lifetime = Lifetime::new(&api);

        let mut frame = CallFrame::new();
        frame.arg(lifetime.string("hello world").native());
        unsafe { table.ptrcall(&api, &SET_TEXT, edit, &mut frame) }.unwrap();

        let mut frame = CallFrame::new();
        frame.arg(5i64);
        unsafe { table.ptrcall(&api, &SET_MAX_LENGTH, edit, &mut frame) }.unwrap();

        let mut frame = CallFrame::new();
        let ret = frame.ret::<GString>();
        unsafe { table.ptrcall(&api, &GET_TEXT, edit, &mut frame) }.unwrap();
        let text = lifetime.adopt(frame.get(ret));
        assert_eq!(lifetime.read_string(&text).unwrap(), "hello");
        lifetime.end();
        assert_eq!(engine.live_strings(), 0);
    }

    #[test]
    fn test_menu_is_created_once() {
        let engine = MockEngine::install_scene();
        let api = engine.api();
        let table = MethodTable::populate(&api, [&GET_MENU]).unwrap();
        let edit = engine.construct("LineEdit");

        let mut menus = Vec::new();
        for _ in 0..2 {
            let mut frame = CallFrame::new();
            let ret = frame.ret::<ObjectPtr>();
            unsafe { table.ptrcall(&api, &GET_MENU, edit, &mut frame) }.unwrap();
            menus.push(frame.get(ret));
        }
        assert_eq!(menus[0], menus[1]);
        assert_eq!(engine.class_of(menus[0]).as_deref(), Some("PopupMenu"));
        assert_eq!(engine.live_objects(), 2);
    }

    #[test]
    fn test_emit_signal_needs_a_name() {
        let engine = MockEngine::install();
        let api = engine.api();
        let table = MethodTable::populate(&api, [&EMIT_SIGNAL]).unwrap();
        let object = engine.construct("Object");

        let err = unsafe { table.call(&api, &EMIT_SIGNAL, object, &[]) }.unwrap_err();
        assert!(matches!(err, crate::Error::Call { .. }));

        let ret = unsafe {
            table.call(&api, &EMIT_SIGNAL, object, &[Value::StringName("ping".into())])
        }
        .unwrap();
        assert_eq!(ret, Value::Int(0));
    }
}
