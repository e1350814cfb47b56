//! `Control`: base of the UI node hierarchy

use crate::engine::Engine;
use crate::error::Result;
use crate::object::{Object, ObjectClass, SignalConnection};
use gdlink_classdb::{EngineClass, Virtual};
use gdlink_core::{
    CallFrame, GString, Lifetime, MethodSpec, ObjectHandle, Rect2, Temp, VariantType, Vector2,
};
use std::fmt;
use std::ops::Deref;

const SET_POSITION: MethodSpec = MethodSpec::new(
    "Control",
    "set_position",
    2436320129,
    &[VariantType::Vector2, VariantType::Bool],
    None,
);
const GET_POSITION: MethodSpec = MethodSpec::new(
    "Control",
    "get_position",
    3341600327,
    &[],
    Some(VariantType::Vector2),
);
const SET_SIZE: MethodSpec = MethodSpec::new(
    "Control",
    "set_size",
    2436320129,
    &[VariantType::Vector2, VariantType::Bool],
    None,
);
const GET_SIZE: MethodSpec = MethodSpec::new(
    "Control",
    "get_size",
    3341600327,
    &[],
    Some(VariantType::Vector2),
);
const GET_RECT: MethodSpec = MethodSpec::new(
    "Control",
    "get_rect",
    1639390495,
    &[],
    Some(VariantType::Rect2),
);
const SET_TOOLTIP_TEXT: MethodSpec = MethodSpec::new(
    "Control",
    "set_tooltip_text",
    83702148,
    &[VariantType::String],
    None,
);
const GET_TOOLTIP_TEXT: MethodSpec = MethodSpec::new(
    "Control",
    "get_tooltip_text",
    201670096,
    &[],
    Some(VariantType::String),
);

pub(crate) const METHODS: &[MethodSpec] = &[
    SET_POSITION,
    GET_POSITION,
    SET_SIZE,
    GET_SIZE,
    GET_RECT,
    SET_TOOLTIP_TEXT,
    GET_TOOLTIP_TEXT,
];

/// Raw ABI view of a `Control`
#[derive(Clone, Copy)]
pub struct ControlClass<'a>(ObjectClass<'a>);

impl<'a> Deref for ControlClass<'a> {
    type Target = ObjectClass<'a>;

    fn deref(&self) -> &ObjectClass<'a> {
        &self.0
    }
}

impl<'a> ControlClass<'a> {
    pub(crate) fn new(engine: &'a Engine, handle: ObjectHandle) -> Self {
        Self(ObjectClass::new(engine, handle))
    }

    pub fn set_position(&self, position: Vector2, keep_offsets: bool) -> Result<()> {
        let mut frame = CallFrame::with_capacity(2);
        frame.arg(position).arg(keep_offsets);
        self.ptrcall(&SET_POSITION, &mut frame)
    }

    pub fn get_position(&self) -> Result<Vector2> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<Vector2>();
        self.ptrcall(&GET_POSITION, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn set_size(&self, size: Vector2, keep_offsets: bool) -> Result<()> {
        let mut frame = CallFrame::with_capacity(2);
        frame.arg(size).arg(keep_offsets);
        self.ptrcall(&SET_SIZE, &mut frame)
    }

    pub fn get_size(&self) -> Result<Vector2> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<Vector2>();
        self.ptrcall(&GET_SIZE, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn get_rect(&self) -> Result<Rect2> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<Rect2>();
        self.ptrcall(&GET_RECT, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn set_tooltip_text(&self, text: &GString) -> Result<()> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(*text);
        self.ptrcall(&SET_TOOLTIP_TEXT, &mut frame)
    }

    pub fn get_tooltip_text<'l>(&self, lifetime: &'l Lifetime) -> Result<Temp<'l, GString>> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<GString>();
        self.ptrcall(&GET_TOOLTIP_TEXT, &mut frame)?;
        Ok(lifetime.adopt(frame.get(ret)))
    }
}

/// Host wrapper for `Control`
#[derive(Clone)]
pub struct Control {
    object: Object,
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Control").field(&self.handle()).finish()
    }
}

impl Deref for Control {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.object
    }
}

impl EngineClass for Control {
    const CLASS: &'static str = "Control";
    const PARENT: Option<&'static str> = Some("CanvasItem");
}

impl Control {
    /// Custom hit test: is `point` (local coordinates) inside the control
    pub const HAS_POINT: Virtual<(Vector2,), bool> = Virtual::new("Control", "_has_point");
    /// Smallest size layout may shrink the control to
    pub const GET_MINIMUM_SIZE: Virtual<(), Vector2> = Virtual::new("Control", "_get_minimum_size");

    pub fn from_engine(engine: &Engine, handle: ObjectHandle) -> Self {
        Self {
            object: Object::from_engine(engine, handle),
        }
    }

    pub fn control_class(&self) -> ControlClass<'_> {
        ControlClass::new(self.engine(), self.handle())
    }

    pub fn into_object(self) -> Object {
        self.object
    }

    pub fn position(&self) -> Result<Vector2> {
        self.control_class().get_position()
    }

    pub fn set_position(&self, position: Vector2) -> Result<()> {
        self.control_class().set_position(position, false)
    }

    pub fn size(&self) -> Result<Vector2> {
        self.control_class().get_size()
    }

    pub fn set_size(&self, size: Vector2) -> Result<()> {
        self.control_class().set_size(size, false)
    }

    pub fn rect(&self) -> Result<Rect2> {
        self.control_class().get_rect()
    }

    pub fn tooltip_text(&self) -> Result<String> {
        let lifetime = Lifetime::new(self.engine().api());
        let text = self.control_class().get_tooltip_text(&lifetime)?;
        let text = lifetime.read_string(&text)?;
        lifetime.end();
        Ok(text)
    }

    pub fn set_tooltip_text(&self, text: &str) -> Result<()> {
        let lifetime = Lifetime::new(self.engine().api());
        let native = lifetime.string(text);
        self.control_class().set_tooltip_text(native.get())?;
        lifetime.end();
        Ok(())
    }

    pub fn on_resized(&self, mut func: impl FnMut() + 'static) -> Result<SignalConnection> {
        self.connect_typed("resized", 0, move |()| func())
    }

    pub fn on_mouse_entered(&self, mut func: impl FnMut() + 'static) -> Result<SignalConnection> {
        self.connect_typed("mouse_entered", 0, move |()| func())
    }
}
