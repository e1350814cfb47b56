//! The engine calling host overrides through the virtual trampolines

use gdlink_classdb::{ClassRegistrar, ExtensionClass, VirtualTable};
use gdlink_classes::{AnimationNode, Control, Engine};
use gdlink_core::mock::MockEngine;
use gdlink_core::{
    ExtensionConfig, GString, GVariant, Lifetime, ObjectHandle, ObjectPtr, Ownership, StringName,
    Value, Vector2,
};
use std::ffi::c_void;
use std::ptr;

struct Dial {
    radius: f32,
}

impl ExtensionClass for Dial {
    const CLASS: &'static str = "Dial";
    const PARENT: &'static str = "Control";

    fn init(_base: ObjectHandle) -> Self {
        Self { radius: 16.0 }
    }

    fn register_virtuals(table: &mut VirtualTable<Self>) {
        table
            .set(Control::HAS_POINT, |dial, (point,)| {
                let center = Vector2::new(dial.radius, dial.radius);
                Vector2::new(point.x - center.x, point.y - center.y).length() <= dial.radius
            })
            .set(Control::GET_MINIMUM_SIZE, |dial, ()| {
                Vector2::new(dial.radius * 2.0, dial.radius * 2.0)
            });
    }
}

struct Mixer {
    elapsed: f64,
}

impl ExtensionClass for Mixer {
    const CLASS: &'static str = "Mixer";
    const PARENT: &'static str = "AnimationNode";

    fn init(_base: ObjectHandle) -> Self {
        Self { elapsed: 0.0 }
    }

    fn register_virtuals(table: &mut VirtualTable<Self>) {
        table
            .set(AnimationNode::PROCESS, |mixer, (time, seek, _external, test_only)| {
                if seek {
                    mixer.elapsed = time;
                } else if !test_only {
                    mixer.elapsed += time;
                }
                mixer.elapsed
            })
            .set(AnimationNode::GET_CAPTION, |_, ()| "Mixer".to_string())
            .set(AnimationNode::IS_PARAMETER_READ_ONLY, |_, (name,): (StringName,)| {
                name.starts_with("elapsed")
            })
            .set(AnimationNode::GET_PARAMETER_DEFAULT_VALUE, |_, (name,): (StringName,)| {
                match &*name {
                    "mix" => Value::Float(0.5),
                    _ => Value::Nil,
                }
            });
    }
}

fn setup() -> (MockEngine, Engine, ClassRegistrar) {
    let mock = MockEngine::install_scene();
    let api = mock.api();
    let mut registrar = ClassRegistrar::new(&api);
    let engine = Engine::init_with(&api, &ExtensionConfig::default(), |classes| {
        registrar.register::<Dial, Engine>(classes)?;
        registrar.register::<Mixer, Engine>(classes)?;
        Ok(())
    })
    .unwrap();
    (mock, engine, registrar)
}

fn has_point(mock: &MockEngine, object: &Control, point: Vector2) -> bool {
    let args = [&point as *const Vector2 as *const c_void];
    let mut inside = false;
    let found = unsafe {
        mock.call_virtual(
            object.handle().ptr(),
            "_has_point",
            &args,
            &mut inside as *mut bool as *mut c_void,
        )
    };
    assert!(found);
    inside
}

#[test]
fn test_has_point_yields_host_result() {
    let (mock, engine, mut registrar) = setup();
    let handle =
        ObjectHandle::from_ptr(engine.api(), mock.construct("Dial"), Ownership::Owned).unwrap();
    let dial = engine.cast::<Control>(handle).unwrap();
    assert_eq!(dial.get_class().unwrap(), "Dial");

    assert!(has_point(&mock, &dial, Vector2::new(16.0, 16.0)));
    assert!(has_point(&mock, &dial, Vector2::new(4.0, 16.0)));
    assert!(!has_point(&mock, &dial, Vector2::new(1.0, 1.0)));

    let mut size = Vector2::ZERO;
    let found = unsafe {
        mock.call_virtual(
            dial.handle().ptr(),
            "_get_minimum_size",
            &[],
            &mut size as *mut Vector2 as *mut c_void,
        )
    };
    assert!(found);
    assert_eq!(size, Vector2::new(32.0, 32.0));
    assert_eq!(Lifetime::depth(), 0);

    // Ordinary Control methods still reach the native base
    dial.set_size(Vector2::new(32.0, 32.0)).unwrap();
    assert_eq!(dial.size().unwrap(), Vector2::new(32.0, 32.0));

    dial.into_object().free().unwrap();
    registrar.unregister_all();
    assert_eq!(mock.live_objects(), 0);
}

#[test]
fn test_extension_objects_wrap_as_nearest_engine_class() {
    let (mock, engine, mut registrar) = setup();
    let handle =
        ObjectHandle::from_ptr(engine.api(), mock.construct("Mixer"), Ownership::Owned).unwrap();
    assert!(engine.wrap(handle).unwrap().downcast_ref::<AnimationNode>().is_some());
    assert!(engine.cast::<Control>(handle).is_err());
    assert!(engine.classes().is_subclass("Mixer", "Resource"));
    handle.free(engine.api()).unwrap();
    registrar.unregister_all();
}

#[test]
fn test_process_keeps_per_instance_state() {
    let (mock, engine, mut registrar) = setup();
    let first = mock.construct("Mixer");
    let second = mock.construct("Mixer");

    let process = |object: ObjectPtr, time: f64, seek: bool| -> f64 {
        let (external, test_only) = (false, false);
        let args = [
            &time as *const f64 as *const c_void,
            &seek as *const bool as *const c_void,
            &external as *const bool as *const c_void,
            &test_only as *const bool as *const c_void,
        ];
        let mut remaining = 0.0f64;
        let found = unsafe {
            mock.call_virtual(object, "_process", &args, &mut remaining as *mut f64 as *mut c_void)
        };
        assert!(found);
        remaining
    };

    assert_eq!(process(first, 0.25, false), 0.25);
    assert_eq!(process(first, 0.25, false), 0.5);
    assert_eq!(process(second, 2.0, true), 2.0);
    assert_eq!(process(first, 0.0, true), 0.0);

    for object in [first, second] {
        ObjectHandle::from_ptr(engine.api(), object, Ownership::Owned)
            .unwrap()
            .free(engine.api())
            .unwrap();
    }
    registrar.unregister_all();
}

#[test]
fn test_string_and_variant_results_are_handed_to_the_engine() {
    let (mock, engine, mut registrar) = setup();
    let api = engine.api().clone();
    let mixer = mock.construct("Mixer");

    let mut caption = GString::zeroed();
    assert!(unsafe { mock.call_virtual(mixer, "_get_caption", &[], caption.as_mut_ptr()) });
    assert_eq!(unsafe { api.read_string(&caption) }.unwrap(), "Mixer");
    unsafe { api.destroy_string(&mut caption) };

    let lifetime = Lifetime::new(&api);
    let name = lifetime.string_name("elapsed_time");
    let mut read_only = false;
    assert!(unsafe {
        mock.call_virtual(
            mixer,
            "_is_parameter_read_only",
            &[name.get().as_ptr()],
            &mut read_only as *mut bool as *mut c_void,
        )
    });
    assert!(read_only);

    let mix = lifetime.string_name("mix");
    let mut default = GVariant::zeroed();
    assert!(unsafe {
        mock.call_virtual(
            mixer,
            "_get_parameter_default_value",
            &[mix.get().as_ptr()],
            default.as_mut_ptr(),
        )
    });
    let default = lifetime.adopt(default);
    assert_eq!(lifetime.read_value(&default).unwrap(), Value::Float(0.5));
    lifetime.end();

    assert_eq!(mock.live_strings(), 0);
    assert_eq!(mock.live_string_names(), 0);
    ObjectHandle::from_ptr(&api, mixer, Ownership::Owned)
        .unwrap()
        .free(&api)
        .unwrap();
    registrar.unregister_all();
}

#[test]
fn test_unknown_virtual_is_not_found() {
    let (mock, _engine, mut registrar) = setup();
    let dial = mock.construct("Dial");
    let found = unsafe { mock.call_virtual(dial, "_get_caption", &[], ptr::null_mut()) };
    assert!(!found);
    registrar.unregister_all();
}
