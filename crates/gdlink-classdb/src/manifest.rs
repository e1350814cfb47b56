//! RON API manifest loader and verifier

use crate::error::{Error, Result};
use gdlink_core::{MethodSpec, VariantType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

const BUNDLED: &str = include_str!("../api/extension_api.ron");

/// Engine version the manifest was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVersion {
    pub major: u32,
    pub minor: u32,
}

/// One engine method as the manifest describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub hash: i64,
    #[serde(default)]
    pub args: Vec<VariantType>,
    /// `None` for methods without a return value
    #[serde(default)]
    pub ret: Option<VariantType>,
    #[serde(default)]
    pub vararg: bool,
}

/// An overridable virtual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<VariantType>,
    #[serde(default)]
    pub ret: Option<VariantType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<VariantType>,
}

/// Definition of one engine class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub virtuals: Vec<VirtualDef>,
    #[serde(default)]
    pub signals: Vec<SignalDef>,
}

impl ClassDef {
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Deserialize)]
struct ManifestFile {
    version: ManifestVersion,
    classes: Vec<ClassDef>,
}

/// How a generated method spec differs from the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    MissingClass,
    MissingMethod,
    Hash { manifest: i64, spec: i64 },
    Arity { manifest: usize, spec: usize },
    ArgType {
        index: usize,
        manifest: VariantType,
        spec: VariantType,
    },
    Return {
        manifest: Option<VariantType>,
        spec: Option<VariantType>,
    },
    Vararg { manifest: bool },
}

/// A method spec that disagrees with the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub method: String,
    pub kind: MismatchKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MismatchKind::MissingClass => write!(f, "{}: class not in manifest", self.method),
            MismatchKind::MissingMethod => write!(f, "{}: method not in manifest", self.method),
            MismatchKind::Hash { manifest, spec } => {
                write!(f, "{}: hash {spec}, manifest has {manifest}", self.method)
            }
            MismatchKind::Arity { manifest, spec } => {
                write!(f, "{}: {spec} arguments, manifest has {manifest}", self.method)
            }
            MismatchKind::ArgType {
                index,
                manifest,
                spec,
            } => write!(
                f,
                "{}: argument {index} is {spec:?}, manifest has {manifest:?}",
                self.method
            ),
            MismatchKind::Return { manifest, spec } => write!(
                f,
                "{}: returns {spec:?}, manifest has {manifest:?}",
                self.method
            ),
            MismatchKind::Vararg { manifest } => {
                write!(f, "{}: vararg flag differs (manifest {manifest})", self.method)
            }
        }
    }
}

/// Loaded API description, classes in declaration order
#[derive(Debug, Clone)]
pub struct ApiManifest {
    pub version: ManifestVersion,
    classes: IndexMap<String, ClassDef>,
}

impl ApiManifest {
    /// The manifest shipped with this crate
    pub fn bundled() -> Result<Self> {
        Self::from_ron(BUNDLED)
    }

    /// Parse a manifest from a RON string
    pub fn from_ron(content: &str) -> Result<Self> {
        let file: ManifestFile = ron::from_str(content)?;
        let mut classes = IndexMap::with_capacity(file.classes.len());
        for class in file.classes {
            check_unique(&class.name, class.methods.iter().map(|m| m.name.as_str()))?;
            check_unique(&class.name, class.virtuals.iter().map(|v| v.name.as_str()))?;
            check_unique(&class.name, class.signals.iter().map(|s| s.name.as_str()))?;
            if classes.contains_key(&class.name) {
                return Err(Error::DuplicateDefinition(class.name));
            }
            classes.insert(class.name.clone(), class);
        }
        for class in classes.values() {
            if let Some(parent) = &class.parent {
                if !classes.contains_key(parent) {
                    return Err(Error::UnknownParent {
                        class: class.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        Ok(Self {
            version: file.version,
            classes,
        })
    }

    /// Load a single RON file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// `class` followed by its ancestors, nearest first
    pub fn ancestry<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a ClassDef> + 'a {
        let mut next = self.classes.get(class);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .parent
                .as_deref()
                .and_then(|parent| self.classes.get(parent));
            Some(current)
        })
    }

    pub fn is_subclass(&self, class: &str, base: &str) -> bool {
        self.ancestry(class).any(|c| c.name == base)
    }

    /// Method declared by `class` itself
    pub fn method(&self, class: &str, name: &str) -> Option<&MethodDef> {
        self.classes.get(class)?.method(name)
    }

    /// Virtual declared by `class` or an ancestor
    pub fn virtual_def(&self, class: &str, name: &str) -> Option<&VirtualDef> {
        self.ancestry(class)
            .find_map(|c| c.virtuals.iter().find(|v| v.name == name))
    }

    /// Signal declared by `class` or an ancestor
    pub fn signal(&self, class: &str, name: &str) -> Option<&SignalDef> {
        self.ancestry(class)
            .find_map(|c| c.signals.iter().find(|s| s.name == name))
    }

    /// Compare generated method specs against the manifest
    pub fn verify<'s>(&self, specs: impl IntoIterator<Item = &'s MethodSpec>) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();
        for spec in specs {
            let method = spec.to_string();
            let Some(class) = self.classes.get(spec.class) else {
                mismatches.push(Mismatch {
                    method,
                    kind: MismatchKind::MissingClass,
                });
                continue;
            };
            let Some(def) = class.method(spec.name) else {
                mismatches.push(Mismatch {
                    method,
                    kind: MismatchKind::MissingMethod,
                });
                continue;
            };
            for kind in compare(def, spec) {
                mismatches.push(Mismatch {
                    method: method.clone(),
                    kind,
                });
            }
        }
        mismatches
    }

    /// `verify`, logging each mismatch and failing if there are any
    pub fn check<'s>(&self, specs: impl IntoIterator<Item = &'s MethodSpec>) -> Result<()> {
        let mismatches = self.verify(specs);
        for mismatch in &mismatches {
            tracing::error!(%mismatch, "Method spec disagrees with API manifest");
        }
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(Error::ManifestMismatch(mismatches.len()))
        }
    }
}

fn check_unique<'a>(class: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::DuplicateDefinition(format!("{class}.{name}")));
        }
    }
    Ok(())
}

fn compare(def: &MethodDef, spec: &MethodSpec) -> Vec<MismatchKind> {
    let mut kinds = Vec::new();
    if def.hash != spec.hash {
        kinds.push(MismatchKind::Hash {
            manifest: def.hash,
            spec: spec.hash,
        });
    }
    if def.args.len() != spec.args.len() {
        kinds.push(MismatchKind::Arity {
            manifest: def.args.len(),
            spec: spec.args.len(),
        });
    } else if let Some((index, (ours, theirs))) = def
        .args
        .iter()
        .zip(spec.args)
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        kinds.push(MismatchKind::ArgType {
            index,
            manifest: *ours,
            spec: *theirs,
        });
    }
    if def.ret != spec.ret {
        kinds.push(MismatchKind::Return {
            manifest: def.ret,
            spec: spec.ret,
        });
    }
    if def.vararg != spec.vararg {
        kinds.push(MismatchKind::Vararg {
            manifest: def.vararg,
        });
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_manifest_loads() {
        let manifest = ApiManifest::bundled().unwrap();
        assert_eq!(manifest.version, ManifestVersion { major: 4, minor: 3 });
        assert!(manifest.is_subclass("LineEdit", "Object"));
        assert!(manifest.is_subclass("PopupMenu", "Window"));
        assert!(!manifest.is_subclass("AnimationNode", "Node"));
        assert_eq!(
            manifest.method("Object", "get_class").map(|m| m.hash),
            Some(201670096)
        );
    }

    #[test]
    fn test_virtuals_and_signals_are_inherited() {
        let manifest = ApiManifest::bundled().unwrap();
        let has_point = manifest.virtual_def("LineEdit", "_has_point").unwrap();
        assert_eq!(has_point.args, vec![VariantType::Vector2]);
        assert_eq!(has_point.ret, Some(VariantType::Bool));
        assert!(manifest.signal("LineEdit", "resized").is_some());
        assert!(manifest.virtual_def("Object", "_has_point").is_none());
    }

    #[test]
    fn test_duplicate_method_is_rejected() {
        let content = r#"(
            version: (major: 4, minor: 3),
            classes: [(
                name: "Object",
                methods: [
                    (name: "get_class", hash: 1),
                    (name: "get_class", hash: 2),
                ],
            )],
        )"#;
        let err = ApiManifest::from_ron(content).unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition(ref name) if name == "Object.get_class"));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let content = r#"(
            version: (major: 4, minor: 3),
            classes: [(name: "Control", parent: Some("CanvasItem"))],
        )"#;
        assert!(matches!(
            ApiManifest::from_ron(content),
            Err(Error::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_verify_reports_each_difference() {
        let manifest = ApiManifest::bundled().unwrap();
        const GOOD: MethodSpec = MethodSpec::new(
            "Control",
            "set_size",
            2436320129,
            &[VariantType::Vector2, VariantType::Bool],
            None,
        );
        const SWAPPED: MethodSpec = MethodSpec::new(
            "Control",
            "set_size",
            2436320129,
            &[VariantType::Bool, VariantType::Vector2],
            None,
        );
        const WRONG_HASH: MethodSpec =
            MethodSpec::new("Object", "get_class", 1, &[], Some(VariantType::String));
        const MISSING: MethodSpec = MethodSpec::new("Control", "grab_focus", 1, &[], None);

        assert!(manifest.verify([&GOOD]).is_empty());
        let found = manifest.verify([&SWAPPED, &WRONG_HASH, &MISSING]);
        assert_eq!(found.len(), 3);
        assert_eq!(
            found[0].kind,
            MismatchKind::ArgType {
                index: 0,
                manifest: VariantType::Vector2,
                spec: VariantType::Bool,
            }
        );
        assert_eq!(found[1].kind, MismatchKind::Hash { manifest: 201670096, spec: 1 });
        assert_eq!(found[2].kind, MismatchKind::MissingMethod);
        assert_eq!(found[2].to_string(), "Control.grab_focus: method not in manifest");
        assert!(matches!(
            manifest.check([&MISSING]),
            Err(Error::ManifestMismatch(1))
        ));
    }
}
