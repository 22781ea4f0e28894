//! Plugin directory scanning and dispatch table construction.
//!
//! # Responsibility
//! - Enumerate `.plug` documents in deterministic lexicographic
//!   filename order and parse each one.
//! - Apply persisted enable flags onto freshly parsed descriptors.
//! - Derive the per-mode key map and the command map.
//!
//! # Invariants
//! - A document that fails to read or parse is skipped with a logged
//!   warning; the scan continues.
//! - Tables hold only enabled bindings of enabled plugins.
//! - On a `(mode, trigger)` collision the lexicographically later
//!   document wins.
//! - Rebuilds are total; no state survives from a previous build.

use crate::action::ActionAdapter;
use crate::model::{key_code, Mode, PluginDescriptor};
use crate::parser;
use crate::store::StateMap;
use log::{info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

/// File extension of plugin documents.
pub const PLUGIN_FILE_EXTENSION: &str = "plug";

/// Index of one binding inside the descriptor list: `(plugin, bind)`.
pub type BindRef = (usize, usize);

/// Directory enumeration failure. Per-file problems never surface
/// here; they are logged and skipped.
#[derive(Debug)]
pub enum ScanError {
    Io(io::Error),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "plugin directory scan failed: {err}"),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for ScanError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Derived dispatch tables. Rebuilt in full on every toggle or reload,
/// never patched incrementally.
#[derive(Debug, Default)]
pub struct DispatchTables {
    key_map: HashMap<Mode, HashMap<u32, BindRef>>,
    cmd_map: HashMap<String, BindRef>,
}

impl DispatchTables {
    /// Looks up a key press in one mode's namespace.
    pub fn lookup_key(&self, mode: Mode, key: u32) -> Option<BindRef> {
        self.key_map.get(&mode)?.get(&key).copied()
    }

    /// Looks up a typed command, case-insensitively.
    pub fn lookup_command(&self, command: &str) -> Option<BindRef> {
        self.cmd_map.get(&command.to_lowercase()).copied()
    }

    pub fn key_binding_count(&self) -> usize {
        self.key_map.values().map(HashMap::len).sum()
    }

    pub fn command_count(&self) -> usize {
        self.cmd_map.len()
    }
}

/// Parses every plugin document under `dir` in lexicographic filename
/// order.
///
/// # Side effects
/// - Emits `plugin_scan` logging events with duration and counts.
pub fn scan_dir(
    dir: &Path,
    adapter: &dyn ActionAdapter,
) -> Result<Vec<PluginDescriptor>, ScanError> {
    let started_at = Instant::now();
    info!(
        "event=plugin_scan module=registry status=start dir={}",
        dir.display()
    );

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_plugin = path
            .extension()
            .is_some_and(|ext| ext == PLUGIN_FILE_EXTENSION);
        if is_plugin {
            paths.push(path);
        }
    }
    // Deterministic scan order; collision policy depends on it.
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut plugins = Vec::new();
    for path in paths {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "event=plugin_scan module=registry status=error file={} reason=unreadable error={err}",
                    path.display()
                );
                continue;
            }
        };
        match parser::parse(&text, adapter) {
            Ok(plugin) => plugins.push(plugin),
            Err(err) => {
                warn!(
                    "event=plugin_scan module=registry status=error file={} reason=parse_failed error={err}",
                    path.display()
                );
            }
        }
    }

    info!(
        "event=plugin_scan module=registry status=ok count={} duration_ms={}",
        plugins.len(),
        started_at.elapsed().as_millis()
    );
    Ok(plugins)
}

/// Overlays persisted flags onto freshly parsed descriptors.
///
/// Descriptors without a matching entry keep their parsed defaults;
/// persisted entries without a matching descriptor stay dormant in the
/// store.
pub fn apply_state(plugins: &mut [PluginDescriptor], state: &StateMap) {
    for plugin in plugins {
        let Some(entry) = state.get(&plugin.name) else {
            continue;
        };
        plugin.enabled = entry.enabled;
        for bind in &mut plugin.binds {
            if let Some(&enabled) = entry.binds.get(&bind.trigger) {
                bind.enabled = enabled;
            }
        }
    }
}

/// Builds both dispatch tables from the current descriptor list.
pub fn build_tables(plugins: &[PluginDescriptor]) -> DispatchTables {
    let mut tables = DispatchTables::default();

    for (plugin_index, plugin) in plugins.iter().enumerate() {
        if !plugin.enabled {
            continue;
        }
        for (bind_index, bind) in plugin.binds.iter().enumerate() {
            if !bind.enabled {
                continue;
            }
            let bind_ref = (plugin_index, bind_index);
            match bind.mode {
                Mode::Command => {
                    tables
                        .cmd_map
                        .insert(bind.trigger.to_lowercase(), bind_ref);
                }
                Mode::Normal => match key_code(&bind.trigger) {
                    Some(code) => {
                        tables
                            .key_map
                            .entry(Mode::Normal)
                            .or_default()
                            .insert(code, bind_ref);
                    }
                    None => {
                        warn!(
                            "event=table_build module=registry status=warn plugin={} \
                             trigger={} reason=unresolvable_key",
                            plugin.name, bind.trigger
                        );
                    }
                },
            }
        }
    }

    tables
}
