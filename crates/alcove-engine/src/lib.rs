//! Alcove: sandboxed module loading and reflective invocation.
//!
//! The engine loads module images into isolated sandboxes, resolves
//! textual type descriptors through a layered chain (canonical index,
//! per-module lookup, generic construction), and invokes constructors
//! and methods matched exactly by parameter type. Values cross the
//! sandbox boundary as self-describing serialized payloads; named
//! variables persist results inside a sandbox between calls.
//!
//! The usual entry point is [`SandboxManager`]:
//!
//! ```ignore
//! let mut manager = SandboxManager::new();
//! let sandbox = manager.active_mut();
//! sandbox.load_module("widgets", &image_bytes);
//! sandbox.construct_into("g", "Greeter, widgets", &[], &ctor_descs, &ctor_args);
//! ```

pub mod descriptor;
pub mod error;
pub mod image;
pub mod interp;
pub mod invoke;
pub mod modules;
pub mod natives;
pub mod resolve;
pub mod sandbox;
pub mod types;
pub mod value;
pub mod variables;
pub mod wire;

pub use error::EngineError;
pub use image::{ModuleBuilder, ModuleImage};
pub use sandbox::{Sandbox, SandboxId, SandboxManager};
pub use types::{TypeId, TypeTable};
pub use value::Value;
