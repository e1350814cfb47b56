//! Foreign object handles
//!
//! An [`ObjectHandle`] never frees anything on its own. The ownership tag only
//! records who is responsible; releasing an owned object is an explicit
//! [`ObjectHandle::free`].

use crate::api::Api;
use crate::error::{Error, Result};
use crate::identity::InstanceId;
use crate::native::ObjectPtr;
use std::fmt;

/// Who is responsible for an engine object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The engine (or another object) owns it; the host only looks
    Borrowed,
    /// Ownership was transferred to the host, which must call `free`
    Owned,
    /// Lives exactly as long as the given parent object
    BoundTo(InstanceId),
}

/// Opaque pointer plus instance ID plus ownership tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    ptr: ObjectPtr,
    id: InstanceId,
    ownership: Ownership,
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.id.raw())
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl ObjectHandle {
    /// Build a handle from a raw pointer, asking the engine for its ID
    pub fn from_ptr(api: &Api, ptr: ObjectPtr, ownership: Ownership) -> Result<Self> {
        if ptr.is_null() {
            return Err(Error::NullObject);
        }
        Ok(Self {
            ptr,
            id: InstanceId(api.instance_id(ptr)),
            ownership,
        })
    }

    /// Look an object up by ID; fails if it no longer exists
    pub fn from_id(api: &Api, id: InstanceId, ownership: Ownership) -> Result<Self> {
        let ptr = api.object_from_id(id.raw());
        if ptr.is_null() {
            return Err(Error::NullObject);
        }
        Ok(Self { ptr, id, ownership })
    }

    pub fn ptr(&self) -> ObjectPtr {
        self.ptr
    }

    pub fn instance_id(&self) -> InstanceId {
        self.id
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Same object, borrowed view
    pub fn borrowed(&self) -> Self {
        Self {
            ownership: Ownership::Borrowed,
            ..*self
        }
    }

    /// Same object with its lifetime tied to `parent`
    pub fn bound_to(&self, parent: InstanceId) -> Self {
        Self {
            ownership: Ownership::BoundTo(parent),
            ..*self
        }
    }

    /// Whether the engine still knows this object
    pub fn is_alive(&self, api: &Api) -> bool {
        api.object_from_id(self.id.raw()) == self.ptr
    }

    /// Destroy an owned object
    ///
    /// Borrowed and bound handles are left alone: only the owner may free.
    pub fn free(self, api: &Api) -> Result<()> {
        match self.ownership {
            Ownership::Owned => {
                if !self.is_alive(api) {
                    return Err(Error::NullObject);
                }
                tracing::trace!(id = self.id.raw(), "Freeing owned object");
                unsafe { api.object_destroy(self.ptr) };
                Ok(())
            }
            Ownership::Borrowed | Ownership::BoundTo(_) => {
                tracing::warn!(
                    id = self.id.raw(),
                    ownership = ?self.ownership,
                    "Refusing to free an object the host does not own"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[test]
    fn test_null_pointer_rejected() {
        let engine = MockEngine::install();
        let api = engine.api();
        assert!(matches!(
            ObjectHandle::from_ptr(&api, ObjectPtr::NULL, Ownership::Borrowed),
            Err(Error::NullObject)
        ));
    }

    #[test]
    fn test_free_owned_only() {
        let engine = MockEngine::install();
        let api = engine.api();
        let ptr = engine.construct("Object");
        let owned = ObjectHandle::from_ptr(&api, ptr, Ownership::Owned).unwrap();
        assert!(owned.instance_id().is_valid());

        owned.borrowed().free(&api).unwrap();
        assert!(owned.is_alive(&api));

        owned.free(&api).unwrap();
        assert!(!owned.is_alive(&api));
        assert_eq!(engine.live_objects(), 0);
    }

    #[test]
    fn test_bound_handle_keeps_parent() {
        let engine = MockEngine::install();
        let api = engine.api();
        let parent = ObjectHandle::from_ptr(&api, engine.construct("Object"), Ownership::Owned)
            .unwrap();
        let child = ObjectHandle::from_ptr(&api, engine.construct("Object"), Ownership::Borrowed)
            .unwrap()
            .bound_to(parent.instance_id());
        assert_eq!(child.ownership(), Ownership::BoundTo(parent.instance_id()));
        let found = ObjectHandle::from_id(&api, child.instance_id(), Ownership::Borrowed).unwrap();
        assert_eq!(found.ptr(), child.ptr());
    }
}
