//! The process-wide engine state: API table, method table and class registry
//!
//! Built once by [`Engine::init`] when the engine reaches the scene level,
//! then shared read-only. Every wrapper holds a clone.

use crate::animation_node::{self, AnimationNode};
use crate::control::{self, Control};
use crate::error::Result;
use crate::line_edit::{self, LineEdit};
use crate::object::{self, Object};
use gdlink_classdb::{ApiManifest, ClassDb, EngineClass};
use gdlink_core::{Api, ExtensionConfig, Lifetime, MethodSpec, MethodTable, ObjectHandle, Ownership};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

struct EngineInner {
    api: Api,
    methods: MethodTable,
    classes: ClassDb<Engine>,
    config: ExtensionConfig,
}

/// Shared handle to the initialized binding
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("version", &self.inner.api.version().to_string())
            .field("methods", &self.inner.methods.len())
            .field("classes", &self.inner.classes.len())
            .finish()
    }
}

/// Intermediate engine classes that have no wrapper of their own
const DECLARED: &[(&str, &str)] = &[
    ("Node", "Object"),
    ("CanvasItem", "Node"),
    ("Viewport", "Node"),
    ("Window", "Viewport"),
    ("Popup", "Window"),
    ("PopupMenu", "Popup"),
    ("RefCounted", "Object"),
    ("Resource", "RefCounted"),
];

fn wrapped_classes() -> Result<ClassDb<Engine>> {
    let mut classes = ClassDb::new();
    classes.register::<Object>(Object::from_engine)?;
    for (class, parent) in DECLARED {
        classes.declare(class, Some(parent))?;
    }
    classes.register::<Control>(Control::from_engine)?;
    classes.register::<LineEdit>(LineEdit::from_engine)?;
    classes.register::<AnimationNode>(AnimationNode::from_engine)?;
    Ok(classes)
}

impl Engine {
    /// Every method spec of every wrapped class
    pub fn specs() -> impl Iterator<Item = &'static MethodSpec> {
        object::METHODS
            .iter()
            .chain(control::METHODS)
            .chain(line_edit::METHODS)
            .chain(animation_node::METHODS)
    }

    /// Populate the method table and class registry
    pub fn init(api: &Api, config: &ExtensionConfig) -> Result<Self> {
        Self::init_with(api, config, |_| Ok(()))
    }

    /// Like [`Engine::init`], letting `extend` add classes (typically
    /// extension classes) before the registry is frozen
    pub fn init_with(
        api: &Api,
        config: &ExtensionConfig,
        extend: impl FnOnce(&mut ClassDb<Engine>) -> Result<()>,
    ) -> Result<Self> {
        if config.verify_manifest {
            let manifest = ApiManifest::bundled()?;
            manifest.check(Self::specs())?;
            tracing::debug!(classes = manifest.len(), "Method specs match API manifest");
        }
        let methods = MethodTable::populate(api, Self::specs())?;
        let mut classes = wrapped_classes()?;
        extend(&mut classes)?;

        tracing::info!(
            library = %config.library_name,
            methods = methods.len(),
            classes = classes.len(),
            "Engine initialized"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                api: api.clone(),
                methods,
                classes,
                config: config.clone(),
            }),
        })
    }

    pub fn api(&self) -> &Api {
        &self.inner.api
    }

    pub fn methods(&self) -> &MethodTable {
        &self.inner.methods
    }

    pub fn classes(&self) -> &ClassDb<Engine> {
        &self.inner.classes
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.inner.config
    }

    /// Untyped wrapper for any object
    pub fn object(&self, handle: ObjectHandle) -> Object {
        Object::from_engine(self, handle)
    }

    /// The engine-side class name of `handle`
    pub fn class_name(&self, handle: ObjectHandle) -> Result<String> {
        let lifetime = Lifetime::new(self.api());
        let name = self.object(handle).class().get_class(&lifetime)?;
        let name = lifetime.read_string(&name)?;
        lifetime.end();
        Ok(name)
    }

    /// Most derived wrapper registered for the object's class
    pub fn wrap(&self, handle: ObjectHandle) -> Result<Box<dyn Any>> {
        let class = self.class_name(handle)?;
        Ok(self.classes().construct(self, &class, handle)?)
    }

    /// Wrap `handle` as `T`, checking the engine-side class first
    pub fn cast<T: EngineClass>(&self, handle: ObjectHandle) -> Result<T> {
        let class = self.class_name(handle)?;
        Ok(self.classes().cast::<T>(self, &class, handle)?)
    }

    /// Construct a new engine object of class `T`, owned by the host
    pub fn instantiate<T: EngineClass>(&self) -> Result<T> {
        let lifetime = Lifetime::new(self.api());
        let class = lifetime.string_name(T::CLASS);
        let ptr = self.api().construct_object(class.get());
        lifetime.end();
        let handle = ObjectHandle::from_ptr(self.api(), ptr, Ownership::Owned)?;
        tracing::trace!(class = T::CLASS, id = %handle.instance_id(), "Instantiated object");
        self.cast::<T>(handle)
    }
}
