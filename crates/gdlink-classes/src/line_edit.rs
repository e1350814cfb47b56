//! `LineEdit`: single-line text input

use crate::control::{Control, ControlClass};
use crate::engine::Engine;
use crate::error::Result;
use crate::object::{Object, SignalConnection};
use gdlink_classdb::EngineClass;
use gdlink_core::{
    CallFrame, GString, Lifetime, MethodSpec, ObjectHandle, ObjectPtr, Ownership, Temp,
    VariantType,
};
use std::fmt;
use std::ops::Deref;

const SET_TEXT: MethodSpec =
    MethodSpec::new("LineEdit", "set_text", 83702148, &[VariantType::String], None);
const GET_TEXT: MethodSpec = MethodSpec::new(
    "LineEdit",
    "get_text",
    201670096,
    &[],
    Some(VariantType::String),
);
const SET_PLACEHOLDER: MethodSpec = MethodSpec::new(
    "LineEdit",
    "set_placeholder",
    83702148,
    &[VariantType::String],
    None,
);
const GET_PLACEHOLDER: MethodSpec = MethodSpec::new(
    "LineEdit",
    "get_placeholder",
    201670096,
    &[],
    Some(VariantType::String),
);
const SET_MAX_LENGTH: MethodSpec =
    MethodSpec::new("LineEdit", "set_max_length", 1286410249, &[VariantType::Int], None);
const GET_MAX_LENGTH: MethodSpec = MethodSpec::new(
    "LineEdit",
    "get_max_length",
    3905245786,
    &[],
    Some(VariantType::Int),
);
const GET_MENU: MethodSpec = MethodSpec::new(
    "LineEdit",
    "get_menu",
    229722558,
    &[],
    Some(VariantType::Object),
);
const CLEAR: MethodSpec = MethodSpec::new("LineEdit", "clear", 3218959716, &[], None);
const SELECT_ALL: MethodSpec = MethodSpec::new("LineEdit", "select_all", 3218959716, &[], None);

pub(crate) const METHODS: &[MethodSpec] = &[
    SET_TEXT,
    GET_TEXT,
    SET_PLACEHOLDER,
    GET_PLACEHOLDER,
    SET_MAX_LENGTH,
    GET_MAX_LENGTH,
    GET_MENU,
    CLEAR,
    SELECT_ALL,
];

/// Raw ABI view of a `LineEdit`
#[derive(Clone, Copy)]
pub struct LineEditClass<'a>(ControlClass<'a>);

impl<'a> Deref for LineEditClass<'a> {
    type Target = ControlClass<'a>;

    fn deref(&self) -> &ControlClass<'a> {
        &self.0
    }
}

impl<'a> LineEditClass<'a> {
    pub(crate) fn new(engine: &'a Engine, handle: ObjectHandle) -> Self {
        Self(ControlClass::new(engine, handle))
    }

    fn get_string<'l>(
        &self,
        spec: &MethodSpec,
        lifetime: &'l Lifetime,
    ) -> Result<Temp<'l, GString>> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<GString>();
        self.ptrcall(spec, &mut frame)?;
        Ok(lifetime.adopt(frame.get(ret)))
    }

    fn set_string(&self, spec: &MethodSpec, text: &GString) -> Result<()> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(*text);
        self.ptrcall(spec, &mut frame)
    }

    pub fn set_text(&self, text: &GString) -> Result<()> {
        self.set_string(&SET_TEXT, text)
    }

    pub fn get_text<'l>(&self, lifetime: &'l Lifetime) -> Result<Temp<'l, GString>> {
        self.get_string(&GET_TEXT, lifetime)
    }

    pub fn set_placeholder(&self, text: &GString) -> Result<()> {
        self.set_string(&SET_PLACEHOLDER, text)
    }

    pub fn get_placeholder<'l>(&self, lifetime: &'l Lifetime) -> Result<Temp<'l, GString>> {
        self.get_string(&GET_PLACEHOLDER, lifetime)
    }

    pub fn set_max_length(&self, max: i64) -> Result<()> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(max);
        self.ptrcall(&SET_MAX_LENGTH, &mut frame)
    }

    pub fn get_max_length(&self) -> Result<i64> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<i64>();
        self.ptrcall(&GET_MAX_LENGTH, &mut frame)?;
        Ok(frame.get(ret))
    }

    /// The context menu; owned by the line edit
    pub fn get_menu(&self) -> Result<ObjectPtr> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<ObjectPtr>();
        self.ptrcall(&GET_MENU, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn clear(&self) -> Result<()> {
        self.ptrcall(&CLEAR, &mut CallFrame::new())
    }

    pub fn select_all(&self) -> Result<()> {
        self.ptrcall(&SELECT_ALL, &mut CallFrame::new())
    }
}

/// Host wrapper for `LineEdit`
#[derive(Clone)]
pub struct LineEdit {
    control: Control,
}

impl fmt::Debug for LineEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LineEdit").field(&self.handle()).finish()
    }
}

impl Deref for LineEdit {
    type Target = Control;

    fn deref(&self) -> &Control {
        &self.control
    }
}

impl EngineClass for LineEdit {
    const CLASS: &'static str = "LineEdit";
    const PARENT: Option<&'static str> = Some("Control");
}

impl LineEdit {
    pub fn from_engine(engine: &Engine, handle: ObjectHandle) -> Self {
        Self {
            control: Control::from_engine(engine, handle),
        }
    }

    pub fn line_edit_class(&self) -> LineEditClass<'_> {
        LineEditClass::new(self.engine(), self.handle())
    }

    pub fn into_control(self) -> Control {
        self.control
    }

    pub fn text(&self) -> Result<String> {
        let lifetime = Lifetime::new(self.engine().api());
        let text = self.line_edit_class().get_text(&lifetime)?;
        let text = lifetime.read_string(&text)?;
        lifetime.end();
        Ok(text)
    }

    /// Replace the text; the engine truncates it to `max_length`
    pub fn set_text(&self, text: &str) -> Result<()> {
        let lifetime = Lifetime::new(self.engine().api());
        let native = lifetime.string(text);
        self.line_edit_class().set_text(native.get())?;
        lifetime.end();
        Ok(())
    }

    pub fn placeholder(&self) -> Result<String> {
        let lifetime = Lifetime::new(self.engine().api());
        let text = self.line_edit_class().get_placeholder(&lifetime)?;
        let text = lifetime.read_string(&text)?;
        lifetime.end();
        Ok(text)
    }

    pub fn set_placeholder(&self, text: &str) -> Result<()> {
        let lifetime = Lifetime::new(self.engine().api());
        let native = lifetime.string(text);
        self.line_edit_class().set_placeholder(native.get())?;
        lifetime.end();
        Ok(())
    }

    /// Maximum number of characters, 0 for unlimited
    pub fn max_length(&self) -> Result<i64> {
        self.line_edit_class().get_max_length()
    }

    pub fn set_max_length(&self, max: i64) -> Result<()> {
        self.line_edit_class().set_max_length(max)
    }

    /// The context menu, whose lifetime is bound to this line edit
    pub fn menu(&self) -> Result<Object> {
        let ptr = self.line_edit_class().get_menu()?;
        let handle = ObjectHandle::from_ptr(self.engine().api(), ptr, Ownership::Borrowed)?
            .bound_to(self.handle().instance_id());
        Ok(self.engine().object(handle))
    }

    pub fn clear(&self) -> Result<()> {
        self.line_edit_class().clear()
    }

    pub fn select_all(&self) -> Result<()> {
        self.line_edit_class().select_all()
    }

    pub fn on_text_changed(&self, func: impl FnMut(String) + 'static) -> Result<SignalConnection> {
        self.on_text_signal("text_changed", func)
    }

    pub fn on_text_submitted(
        &self,
        func: impl FnMut(String) + 'static,
    ) -> Result<SignalConnection> {
        self.on_text_signal("text_submitted", func)
    }

    fn on_text_signal(
        &self,
        signal: &str,
        mut func: impl FnMut(String) + 'static,
    ) -> Result<SignalConnection> {
        self.connect_typed(signal, 0, move |(text,): (String,)| func(text))
    }
}
