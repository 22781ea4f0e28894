//! Persisted enable-state store.
//!
//! # Responsibility
//! - Load and save the per-plugin / per-binding enable flags.
//! - Keep the on-disk shape stable: one JSON object keyed by plugin
//!   name, values `{"__enabled": bool, "__binds": {trigger: bool}}`.
//!
//! # Invariants
//! - Missing keys default to enabled.
//! - The file is rewritten in full on every save, synchronously.
//! - Entries for plugins or bindings absent from the current scan are
//!   retained and become effective again when a matching document
//!   reappears.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

/// Full persisted state: plugin name to its flags.
pub type StateMap = BTreeMap<String, PluginState>;

/// Persisted flags for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginState {
    /// Plugin-level switch; missing means enabled.
    #[serde(rename = "__enabled", default = "default_enabled")]
    pub enabled: bool,
    /// Per-binding switches keyed by trigger; missing means enabled.
    #[serde(rename = "__binds", default)]
    pub binds: BTreeMap<String, bool>,
}

impl Default for PluginState {
    fn default() -> Self {
        Self {
            enabled: true,
            binds: BTreeMap::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Store transport and decode errors.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "state file io error: {err}"),
            Self::Json(err) => write!(f, "state file is not valid JSON: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Persistence interface for enable state.
///
/// Callers degrade to defaults on load failure and log save failures;
/// no store error may propagate to the host event loop.
pub trait StateStore {
    fn load(&self) -> StoreResult<StateMap>;
    fn save(&self, state: &StateMap) -> StoreResult<()>;
}

/// JSON file implementation of the state store.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> StoreResult<StateMap> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            // An absent file is the empty store, not a failure.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(StateMap::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, state: &StateMap) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}
