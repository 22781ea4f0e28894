//! Extension engine for modal editor hosts.
//!
//! Parses plugin-definition documents into descriptors, merges them
//! into per-mode dispatch tables, persists enable state, and invokes
//! extension actions behind a failure boundary. Rendering, buffer
//! editing and extension business logic stay on the host side of the
//! `HostContext`/`HostNotifier` seams.

pub mod action;
pub mod engine;
pub mod logging;
pub mod model;
pub mod parser;
pub mod registry;
pub mod store;

pub use action::{
    Action, ActionAdapter, ActionCatalog, ActionCx, ActionError, ActionFactory, ActionPayload,
    ActionResult, AdaptError, AdaptResult, CatalogError, HostContext, HostNotifier, MemoryContext,
    RecurringHook,
};
pub use engine::{EngineError, EngineResult, PluginEngine};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{key_code, parse_mode, BindDescriptor, Mode, PluginDescriptor};
pub use parser::{parse, ParseError, ParseResult};
pub use registry::{BindRef, DispatchTables, ScanError, PLUGIN_FILE_EXTENSION};
pub use store::{JsonStateStore, PluginState, StateMap, StateStore, StoreError, StoreResult};

/// Returns the engine crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
