//! Identity types for engine objects and classes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-assigned identifier of an object instance
///
/// Unlike the object pointer, an instance ID is never reused while the
/// engine runs, so it is safe to hold after the object may have been freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Create a new instance ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The engine never hands out zero
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance:{}", self.0)
    }
}

/// Name of an engine or extension class (e.g. "Control")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(pub String);

impl ClassName {
    /// Create a new class name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClassName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClassName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for ClassName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id() {
        let id = InstanceId::new(42);
        assert_eq!(id.raw(), 42);
        assert!(id.is_valid());
        assert!(!InstanceId::default().is_valid());
        assert_eq!(format!("{}", id), "instance:42");
    }

    #[test]
    fn test_class_name() {
        let name = ClassName::new("Control");
        assert_eq!(name.as_str(), "Control");
        assert_eq!(format!("{}", name), "Control");
        assert_eq!(ClassName::from("Control"), name);
        assert!(name == *"Control");
    }
}
