//! Host-side class registry
//!
//! Maps engine class names to their parent and, for wrapped classes, a
//! constructor thunk that turns an [`ObjectHandle`] into the typed wrapper.
//! The context `C` is whatever the wrappers need besides the handle
//! (usually the engine's shared state).

use crate::error::{Error, Result};
use gdlink_core::ObjectHandle;
use indexmap::IndexMap;
use std::any::Any;

/// A class the host knows by name
pub trait EngineClass: Sized + 'static {
    const CLASS: &'static str;
    const PARENT: Option<&'static str>;
}

type Constructor<C> = Box<dyn Fn(&C, ObjectHandle) -> Box<dyn Any> + Send + Sync>;

struct ClassEntry<C> {
    parent: Option<String>,
    construct: Option<Constructor<C>>,
}

/// Class name registry, filled once by the init routine
pub struct ClassDb<C> {
    classes: IndexMap<String, ClassEntry<C>>,
}

impl<C> Default for ClassDb<C> {
    fn default() -> Self {
        Self {
            classes: IndexMap::new(),
        }
    }
}

impl<C> std::fmt::Debug for ClassDb<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDb")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C: 'static> ClassDb<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class with no host wrapper (an intermediate engine class or
    /// a registered extension class)
    pub fn declare(&mut self, class: &str, parent: Option<&str>) -> Result<()> {
        self.insert(class, parent, None)
    }

    /// Register a wrapped class and its constructor thunk
    pub fn register<T: EngineClass>(&mut self, construct: fn(&C, ObjectHandle) -> T) -> Result<()> {
        let thunk: Constructor<C> = Box::new(move |context: &C, handle: ObjectHandle| {
            Box::new(construct(context, handle)) as Box<dyn Any>
        });
        self.insert(T::CLASS, T::PARENT, Some(thunk))
    }

    fn insert(
        &mut self,
        class: &str,
        parent: Option<&str>,
        construct: Option<Constructor<C>>,
    ) -> Result<()> {
        if self.classes.contains_key(class) {
            return Err(Error::DuplicateDefinition(class.to_string()));
        }
        if let Some(parent) = parent {
            if !self.classes.contains_key(parent) {
                return Err(Error::UnknownParent {
                    class: class.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        self.classes.insert(
            class.to_string(),
            ClassEntry {
                parent: parent.map(str::to_string),
                construct,
            },
        );
        Ok(())
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn parent(&self, class: &str) -> Option<&str> {
        self.classes.get(class)?.parent.as_deref()
    }

    /// Registered class names in registration order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// True when `class` is `base` or inherits from it
    pub fn is_subclass(&self, class: &str, base: &str) -> bool {
        let mut current = Some(class);
        while let Some(name) = current {
            if name == base {
                return true;
            }
            current = self.parent(name);
        }
        false
    }

    /// Build the most derived wrapper available for an object of `class`
    pub fn construct(
        &self,
        context: &C,
        class: &str,
        handle: ObjectHandle,
    ) -> Result<Box<dyn Any>> {
        let mut current = Some(class);
        while let Some(name) = current {
            let entry = self
                .classes
                .get(name)
                .ok_or_else(|| Error::UnregisteredClass(name.to_string()))?;
            if let Some(construct) = &entry.construct {
                return Ok(construct(context, handle));
            }
            current = entry.parent.as_deref();
        }
        Err(Error::UnregisteredClass(class.to_string()))
    }

    /// Wrap an object of engine class `class` as `T`
    ///
    /// Fails unless `class` is `T` or one of its subclasses.
    pub fn cast<T: EngineClass>(
        &self,
        context: &C,
        class: &str,
        handle: ObjectHandle,
    ) -> Result<T> {
        if !self.is_subclass(class, T::CLASS) {
            return Err(Error::InvalidCast {
                from: class.to_string(),
                to: T::CLASS.to_string(),
            });
        }
        let entry = self
            .classes
            .get(T::CLASS)
            .ok_or_else(|| Error::UnregisteredClass(T::CLASS.to_string()))?;
        let construct = entry
            .construct
            .as_ref()
            .ok_or_else(|| Error::UnregisteredClass(T::CLASS.to_string()))?;
        construct(context, handle)
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::InvalidCast {
                from: class.to_string(),
                to: T::CLASS.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdlink_core::mock::MockEngine;
    use gdlink_core::Ownership;

    struct Tag(&'static str);

    #[derive(Debug)]
    struct Object(ObjectHandle);

    impl EngineClass for Object {
        const CLASS: &'static str = "Object";
        const PARENT: Option<&'static str> = None;
    }

    #[derive(Debug)]
    struct Control(ObjectHandle, &'static str);

    impl EngineClass for Control {
        const CLASS: &'static str = "Control";
        const PARENT: Option<&'static str> = Some("CanvasItem");
    }

    fn registry() -> ClassDb<Tag> {
        let mut db: ClassDb<Tag> = ClassDb::new();
        db.register::<Object>(|_, handle| Object(handle)).unwrap();
        db.declare("Node", Some("Object")).unwrap();
        db.declare("CanvasItem", Some("Node")).unwrap();
        db.register::<Control>(|tag, handle| Control(handle, tag.0)).unwrap();
        db.declare("LineEdit", Some("Control")).unwrap();
        db
    }

    #[test]
    fn test_subclass_walks_parents() {
        let db = registry();
        assert!(db.is_subclass("LineEdit", "Object"));
        assert!(db.is_subclass("Control", "Control"));
        assert!(!db.is_subclass("Node", "Control"));
        assert!(!db.is_subclass("Unknown", "Object"));
        assert_eq!(db.parent("Control"), Some("CanvasItem"));
    }

    #[test]
    fn test_registration_order_is_checked() {
        let mut db: ClassDb<Tag> = ClassDb::new();
        assert!(matches!(
            db.declare("Node", Some("Object")),
            Err(Error::UnknownParent { .. })
        ));
        db.declare("Object", None).unwrap();
        assert!(matches!(
            db.declare("Object", None),
            Err(Error::DuplicateDefinition(_))
        ));
    }

    #[test]
    fn test_cast_up_and_down() {
        let engine = MockEngine::install_scene();
        let api = engine.api();
        let db = registry();
        let ptr = engine.construct("LineEdit");
        let handle = ObjectHandle::from_ptr(&api, ptr, Ownership::Borrowed).unwrap();

        let control: Control = db.cast(&Tag("ctx"), "LineEdit", handle).unwrap();
        assert_eq!(control.0.ptr(), ptr);
        assert_eq!(control.1, "ctx");
        let object: Object = db.cast(&Tag("ctx"), "LineEdit", handle).unwrap();
        assert_eq!(object.0.instance_id(), handle.instance_id());

        let err = db.cast::<Control>(&Tag("ctx"), "Node", handle).unwrap_err();
        assert!(matches!(err, Error::InvalidCast { .. }));
    }

    #[test]
    fn test_construct_uses_nearest_wrapper() {
        let engine = MockEngine::install_scene();
        let api = engine.api();
        let db = registry();
        let handle =
            ObjectHandle::from_ptr(&api, engine.construct("Node"), Ownership::Borrowed).unwrap();
        let built = db.construct(&Tag("ctx"), "Node", handle).unwrap();
        assert!(built.downcast_ref::<Object>().is_some());
        assert!(matches!(
            db.construct(&Tag("ctx"), "Sprite2D", handle),
            Err(Error::UnregisteredClass(_))
        ));
    }
}
