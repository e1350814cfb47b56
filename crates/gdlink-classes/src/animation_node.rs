//! `AnimationNode`: a node of an animation blend tree
//!
//! The blending itself happens in the engine. Host subclasses override
//! [`AnimationNode::PROCESS`] and call back into
//! [`AnimationNode::blend_input`] for each input they mix.

use crate::engine::Engine;
use crate::error::Result;
use crate::object::{Object, ObjectClass, SignalConnection};
use gdlink_classdb::{EngineClass, Virtual};
use gdlink_core::{
    CallFrame, GString, GStringName, GVariant, Lifetime, MethodSpec, ObjectHandle, StringName,
    Temp, Value, VariantType,
};
use std::fmt;
use std::ops::Deref;

const ADD_INPUT: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "add_input",
    2323990056,
    &[VariantType::String],
    Some(VariantType::Bool),
);
const REMOVE_INPUT: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "remove_input",
    1286410249,
    &[VariantType::Int],
    None,
);
const SET_INPUT_NAME: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "set_input_name",
    215573526,
    &[VariantType::Int, VariantType::String],
    Some(VariantType::Bool),
);
const GET_INPUT_NAME: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "get_input_name",
    844755477,
    &[VariantType::Int],
    Some(VariantType::String),
);
const GET_INPUT_COUNT: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "get_input_count",
    3905245786,
    &[],
    Some(VariantType::Int),
);
const SET_PARAMETER: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "set_parameter",
    3776071444,
    &[VariantType::StringName, VariantType::Nil],
    None,
);
const GET_PARAMETER: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "get_parameter",
    2760726917,
    &[VariantType::StringName],
    Some(VariantType::Nil),
);
const BLEND_INPUT: MethodSpec = MethodSpec::new(
    "AnimationNode",
    "blend_input",
    1630801826,
    &[
        VariantType::Int,
        VariantType::Float,
        VariantType::Bool,
        VariantType::Bool,
        VariantType::Float,
        VariantType::Int,
        VariantType::Bool,
        VariantType::Bool,
    ],
    Some(VariantType::Float),
);

pub(crate) const METHODS: &[MethodSpec] = &[
    ADD_INPUT,
    REMOVE_INPUT,
    SET_INPUT_NAME,
    GET_INPUT_NAME,
    GET_INPUT_COUNT,
    SET_PARAMETER,
    GET_PARAMETER,
    BLEND_INPUT,
];

/// How an input's filtered tracks are treated while blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i64)]
pub enum FilterAction {
    #[default]
    Ignore = 0,
    Pass = 1,
    Stop = 2,
    Blend = 3,
}

/// Arguments of one `blend_input` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendInput {
    pub input: i64,
    pub time: f64,
    pub seek: bool,
    pub is_external_seeking: bool,
    pub blend: f64,
    pub filter: FilterAction,
    pub sync: bool,
    pub test_only: bool,
}

impl BlendInput {
    /// Plain playback of `input` at full weight
    pub fn new(input: i64, time: f64) -> Self {
        Self {
            input,
            time,
            seek: false,
            is_external_seeking: false,
            blend: 1.0,
            filter: FilterAction::Ignore,
            sync: true,
            test_only: false,
        }
    }

    pub fn with_blend(mut self, blend: f64) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_filter(mut self, filter: FilterAction) -> Self {
        self.filter = filter;
        self
    }
}

/// Raw ABI view of an `AnimationNode`
#[derive(Clone, Copy)]
pub struct AnimationNodeClass<'a>(ObjectClass<'a>);

impl<'a> Deref for AnimationNodeClass<'a> {
    type Target = ObjectClass<'a>;

    fn deref(&self) -> &ObjectClass<'a> {
        &self.0
    }
}

impl<'a> AnimationNodeClass<'a> {
    pub(crate) fn new(engine: &'a Engine, handle: ObjectHandle) -> Self {
        Self(ObjectClass::new(engine, handle))
    }

    pub fn add_input(&self, name: &GString) -> Result<bool> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(*name);
        let ret = frame.ret::<bool>();
        self.ptrcall(&ADD_INPUT, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn remove_input(&self, index: i64) -> Result<()> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(index);
        self.ptrcall(&REMOVE_INPUT, &mut frame)
    }

    pub fn set_input_name(&self, index: i64, name: &GString) -> Result<bool> {
        let mut frame = CallFrame::with_capacity(2);
        frame.arg(index).arg(*name);
        let ret = frame.ret::<bool>();
        self.ptrcall(&SET_INPUT_NAME, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn get_input_name<'l>(
        &self,
        index: i64,
        lifetime: &'l Lifetime,
    ) -> Result<Temp<'l, GString>> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(index);
        let ret = frame.ret::<GString>();
        self.ptrcall(&GET_INPUT_NAME, &mut frame)?;
        Ok(lifetime.adopt(frame.get(ret)))
    }

    pub fn get_input_count(&self) -> Result<i64> {
        let mut frame = CallFrame::new();
        let ret = frame.ret::<i64>();
        self.ptrcall(&GET_INPUT_COUNT, &mut frame)?;
        Ok(frame.get(ret))
    }

    pub fn set_parameter(&self, name: &GStringName, value: &GVariant) -> Result<()> {
        let mut frame = CallFrame::with_capacity(2);
        frame.arg(*name).arg(*value);
        self.ptrcall(&SET_PARAMETER, &mut frame)
    }

    pub fn get_parameter<'l>(
        &self,
        name: &GStringName,
        lifetime: &'l Lifetime,
    ) -> Result<Temp<'l, GVariant>> {
        let mut frame = CallFrame::with_capacity(1);
        frame.arg(*name);
        let ret = frame.ret::<GVariant>();
        self.ptrcall(&GET_PARAMETER, &mut frame)?;
        Ok(lifetime.adopt(frame.get(ret)))
    }

    pub fn blend_input(&self, args: &BlendInput) -> Result<f64> {
        let mut frame = CallFrame::with_capacity(8);
        frame
            .arg(args.input)
            .arg(args.time)
            .arg(args.seek)
            .arg(args.is_external_seeking)
            .arg(args.blend)
            .arg(args.filter as i64)
            .arg(args.sync)
            .arg(args.test_only);
        let ret = frame.ret::<f64>();
        self.ptrcall(&BLEND_INPUT, &mut frame)?;
        Ok(frame.get(ret))
    }
}

/// Host wrapper for `AnimationNode`
#[derive(Clone)]
pub struct AnimationNode {
    object: Object,
}

impl fmt::Debug for AnimationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnimationNode").field(&self.handle()).finish()
    }
}

impl Deref for AnimationNode {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.object
    }
}

impl EngineClass for AnimationNode {
    const CLASS: &'static str = "AnimationNode";
    const PARENT: Option<&'static str> = Some("Resource");
}

impl AnimationNode {
    /// Advance by `time` (seek, is_external_seeking, test_only); returns the
    /// remaining time
    pub const PROCESS: Virtual<(f64, bool, bool, bool), f64> =
        Virtual::new("AnimationNode", "_process");
    pub const GET_CAPTION: Virtual<(), String> = Virtual::new("AnimationNode", "_get_caption");
    pub const HAS_FILTER: Virtual<(), bool> = Virtual::new("AnimationNode", "_has_filter");
    pub const IS_PARAMETER_READ_ONLY: Virtual<(StringName,), bool> =
        Virtual::new("AnimationNode", "_is_parameter_read_only");
    pub const GET_PARAMETER_DEFAULT_VALUE: Virtual<(StringName,), Value> =
        Virtual::new("AnimationNode", "_get_parameter_default_value");

    pub fn from_engine(engine: &Engine, handle: ObjectHandle) -> Self {
        Self {
            object: Object::from_engine(engine, handle),
        }
    }

    pub fn animation_node_class(&self) -> AnimationNodeClass<'_> {
        AnimationNodeClass::new(self.engine(), self.handle())
    }

    pub fn into_object(self) -> Object {
        self.object
    }

    /// Append an input; names containing `.` or `/` are rejected
    pub fn add_input(&self, name: &str) -> Result<bool> {
        let lifetime = Lifetime::new(self.engine().api());
        let native = lifetime.string(name);
        let added = self.animation_node_class().add_input(native.get())?;
        lifetime.end();
        Ok(added)
    }

    pub fn remove_input(&self, index: i64) -> Result<()> {
        self.animation_node_class().remove_input(index)
    }

    pub fn set_input_name(&self, index: i64, name: &str) -> Result<bool> {
        let lifetime = Lifetime::new(self.engine().api());
        let native = lifetime.string(name);
        let renamed = self.animation_node_class().set_input_name(index, native.get())?;
        lifetime.end();
        Ok(renamed)
    }

    pub fn input_name(&self, index: i64) -> Result<String> {
        let lifetime = Lifetime::new(self.engine().api());
        let name = self.animation_node_class().get_input_name(index, &lifetime)?;
        let name = lifetime.read_string(&name)?;
        lifetime.end();
        Ok(name)
    }

    pub fn input_count(&self) -> Result<i64> {
        self.animation_node_class().get_input_count()
    }

    pub fn set_parameter(&self, name: &str, value: &Value) -> Result<()> {
        let lifetime = Lifetime::new(self.engine().api());
        let name = lifetime.string_name(name);
        let value = lifetime.variant(value)?;
        self.animation_node_class()
            .set_parameter(name.get(), value.get())?;
        lifetime.end();
        Ok(())
    }

    /// Current value of a parameter, `Nil` if it was never set
    pub fn parameter(&self, name: &str) -> Result<Value> {
        let lifetime = Lifetime::new(self.engine().api());
        let name = lifetime.string_name(name);
        let value = self
            .animation_node_class()
            .get_parameter(name.get(), &lifetime)?;
        let value = lifetime.read_value(&value)?;
        lifetime.end();
        Ok(value)
    }

    /// Blend one input; only meaningful from inside a `_process` override
    pub fn blend_input(&self, args: &BlendInput) -> Result<f64> {
        self.animation_node_class().blend_input(args)
    }

    pub fn on_tree_changed(&self, mut func: impl FnMut() + 'static) -> Result<SignalConnection> {
        self.connect_typed("tree_changed", 0, move |()| func())
    }

    /// `(object_id, old_name, new_name)`
    pub fn on_animation_node_renamed(
        &self,
        mut func: impl FnMut(i64, String, String) + 'static,
    ) -> Result<SignalConnection> {
        self.connect_typed(
            "animation_node_renamed",
            0,
            move |(id, old_name, new_name): (i64, String, String)| func(id, old_name, new_name),
        )
    }

    /// `(object_id, name)`
    pub fn on_animation_node_removed(
        &self,
        mut func: impl FnMut(i64, String) + 'static,
    ) -> Result<SignalConnection> {
        self.connect_typed(
            "animation_node_removed",
            0,
            move |(id, name): (i64, String)| func(id, name),
        )
    }
}
