//! gdlink Core - the extension interface as safe Rust
//!
//! This crate provides the layer every wrapped engine class is built on:
//! - Interface loading through `get_proc_address` (`Api`, `InterfaceTable`)
//! - Builtin value representations (`GString`, `GStringName`, `GArray`,
//!   `GCallable`, `GVariant`) and the host `Value` they convert to
//! - Scoped release of engine allocations (`Lifetime`, `Temp`)
//! - Pointer-call argument frames (`CallFrame`) and method dispatch
//!   (`MethodSpec`, `MethodTable`)
//! - Object handles with explicit ownership (`ObjectHandle`)
//! - Rust closures as engine callables (`Lifetime::callable`)
//! - Panic containment at the extern boundary (`boundary`)
//!
//! ## Typical call
//!
//! ```
//! # #[cfg(feature = "mock-engine")] {
//! use gdlink_core::mock::MockEngine;
//! use gdlink_core::{CallFrame, GString, Lifetime, MethodSpec, MethodTable, VariantType};
//!
//! const GET_CLASS: MethodSpec =
//!     MethodSpec::new("Object", "get_class", 201670096, &[], Some(VariantType::String));
//!
//! let engine = MockEngine::install();
//! let api = engine.api();
//! let methods = MethodTable::populate(&api, [&GET_CLASS]).unwrap();
//! let object = engine.construct("Object");
//!
//! let lifetime = Lifetime::new(&api);
//! let mut frame = CallFrame::new();
//! let ret = frame.ret::<GString>();
//! unsafe { methods.ptrcall(&api, &GET_CLASS, object, &mut frame).unwrap() };
//! let class = lifetime.read_string(&lifetime.adopt(frame.get(ret))).unwrap();
//! assert_eq!(class, "Object");
//! lifetime.end();
//! # }
//! ```
//!
//! ## Mock engine
//!
//! Enable the `mock-engine` feature to get `mock::MockEngine`, an in-process
//! implementation of the interface for tests:
//! ```toml
//! gdlink-core = { version = "0.1", features = ["mock-engine"] }
//! ```

mod api;
pub mod boundary;
mod callable;
mod callframe;
mod config;
mod convert;
mod error;
mod handle;
mod identity;
pub mod interface;
mod lifetime;
pub mod logging;
mod marshal;
mod math;
mod method;
mod native;
mod variant;

#[cfg(any(test, feature = "mock-engine"))]
pub mod mock;

pub use api::{Api, EngineVersion, ARRAY_RESIZE_HASH, ARRAY_SIZE_HASH};
pub use callframe::{CallFrame, RetSlot};
pub use config::ExtensionConfig;
pub use error::{Error, Result};
pub use handle::{ObjectHandle, Ownership};
pub use identity::{ClassName, InstanceId};
pub use interface::{CallErrorKind, InitializationLevel, InterfaceTable};
pub use lifetime::{Allocation, Lifetime, Managed, Temp};
pub use marshal::{FrameValue, FromArg, IntoRet, StringName, VirtualArgs};
pub use math::{Color, Rect2, Vector2, Vector2i};
pub use method::{MethodBind, MethodSpec, MethodTable};
pub use native::{GArray, GCallable, GString, GStringName, GVariant, ObjectPtr};
pub use variant::{Value, VariantType};
