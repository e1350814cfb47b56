//! gdlink classes - wrapped engine classes and the GDExtension entry point
//!
//! Each wrapped class comes in two layers:
//! - a raw view (`ObjectClass`, `ControlClass`, ...) that performs
//!   method-bind pointer calls and hands native temporaries to a
//!   caller-supplied [`gdlink_core::Lifetime`]
//! - a host wrapper (`Object`, `Control`, ...) that opens and ends its own
//!   arena per call and speaks `&str`, `String`, `f64`, `Vector2` and `Value`
//!
//! Wrappers derive from their parent through `Deref`, so a [`LineEdit`] can
//! be used wherever a [`Control`] or an [`Object`] is expected.

mod animation_node;
mod bridge;
mod control;
mod engine;
mod entry;
mod error;
mod line_edit;
mod object;

pub use animation_node::{AnimationNode, AnimationNodeClass, BlendInput, FilterAction};
pub use bridge::{FromValue, SignalArgs};
pub use control::{Control, ControlClass};
pub use engine::Engine;
pub use entry::{config_from_env, gdlink_library_init, init_library, RegisterFn, CONFIG_ENV};
pub use error::{Error, Result};
pub use line_edit::{LineEdit, LineEditClass};
pub use object::{Object, ObjectClass, SignalConnection};
