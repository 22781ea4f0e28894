//! Plugin descriptor domain model.
//!
//! # Responsibility
//! - Define the canonical plugin/binding records shared by parser,
//!   registry and engine.
//! - Resolve normal-mode triggers to dispatchable key codes.
//!
//! # Invariants
//! - Descriptors are replaced wholesale on every rescan, never patched.
//! - A binding is available only when its own flag AND its parent
//!   plugin's flag are both set.

pub mod descriptor;

pub use descriptor::{key_code, parse_mode, BindDescriptor, Mode, PluginDescriptor};
