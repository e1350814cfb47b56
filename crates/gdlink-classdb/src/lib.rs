//! gdlink ClassDB - class metadata and extension registration
//!
//! Everything the binding knows about engine classes beyond raw calls:
//! - The bundled RON API manifest and verification of method specs against it
//! - The host class registry (`ClassDb`): names, parents, wrapper constructors
//! - Typed virtual keys and per-class override tables
//! - Registration of host-defined subclasses (`ClassRegistrar`) and the
//!   virtual trampolines the engine calls into

mod error;
mod extension;
mod manifest;
mod registry;
mod virtuals;

pub use error::{Error, Result};
pub use extension::{ClassRegistrar, ExtensionClass};
pub use manifest::{
    ApiManifest, ClassDef, ManifestVersion, MethodDef, Mismatch, MismatchKind, SignalDef,
    VirtualDef,
};
pub use registry::{ClassDb, EngineClass};
pub use virtuals::{Virtual, VirtualEntry, VirtualTable};
