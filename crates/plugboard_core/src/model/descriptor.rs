//! Plugin and binding descriptors.
//!
//! # Responsibility
//! - Hold the parsed shape of one plugin document: metadata plus an
//!   ordered list of trigger-to-action bindings.
//! - Provide the toggle helpers the engine mutates descriptors through.
//!
//! # Invariants
//! - `name` is the stable identity used for persisted state lookup.
//! - New descriptors and bindings start enabled.
//! - The plugin-level cascade overwrites per-binding flags (lossy).

use crate::action::Action;
use std::fmt::{self, Formatter};

/// Interaction mode a binding is scoped to.
///
/// Modes form independent dispatch namespaces: a normal-mode key and a
/// command name never collide with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Direct key presses in the editor's normal mode.
    Normal,
    /// Command names typed on the command line.
    Command,
}

impl Mode {
    /// Stable string form used in plugin documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Command => "command",
        }
    }
}

/// Parses a mode keyword from a plugin document.
pub fn parse_mode(value: &str) -> Option<Mode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(Mode::Normal),
        "command" => Some(Mode::Command),
        _ => None,
    }
}

/// One trigger-to-action mapping scoped to a single mode.
pub struct BindDescriptor {
    /// Single character or key name (normal mode), or a command name.
    pub trigger: String,
    /// Dispatch namespace this binding lives in.
    pub mode: Mode,
    /// Opaque invocable, adapted eagerly at parse time.
    pub action: Box<dyn Action>,
    /// Effective only while the parent plugin is also enabled.
    pub enabled: bool,
    /// Optional short label for settings UIs.
    pub title: Option<String>,
    /// Optional free-text description, possibly multi-line.
    pub description: Option<String>,
}

impl BindDescriptor {
    /// Creates an enabled binding with no metadata.
    pub fn new(trigger: impl Into<String>, mode: Mode, action: Box<dyn Action>) -> Self {
        Self {
            trigger: trigger.into(),
            mode,
            action,
            enabled: true,
            title: None,
            description: None,
        }
    }
}

impl fmt::Debug for BindDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindDescriptor")
            .field("trigger", &self.trigger)
            .field("mode", &self.mode)
            .field("enabled", &self.enabled)
            .field("title", &self.title)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Parsed shape of one plugin document.
#[derive(Debug)]
pub struct PluginDescriptor {
    /// Stable identity from the document's `def` line.
    pub name: String,
    /// Optional short label for settings UIs.
    pub title: Option<String>,
    /// Optional free-text description, possibly multi-line.
    pub description: Option<String>,
    /// Blunt master switch; cascaded onto bindings by the plugin toggle.
    pub enabled: bool,
    /// Bindings in document order. May be empty (registered but inert).
    pub binds: Vec<BindDescriptor>,
}

impl PluginDescriptor {
    /// Creates an enabled descriptor with no bindings yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            enabled: true,
            binds: Vec::new(),
        }
    }

    /// Sets the plugin flag and overwrites every binding flag with it.
    ///
    /// Prior per-binding heterogeneity is not preserved; the plugin
    /// toggle is an all-or-nothing switch.
    pub fn set_enabled_cascading(&mut self, enabled: bool) {
        self.enabled = enabled;
        for bind in &mut self.binds {
            bind.enabled = enabled;
        }
    }

    /// Recomputes the plugin flag as the OR of its binding flags.
    ///
    /// Used after an individual binding toggle, where the plugin flag
    /// becomes a derived summary. A plugin with no bindings keeps its
    /// current flag.
    pub fn recompute_enabled(&mut self) {
        if !self.binds.is_empty() {
            self.enabled = self.binds.iter().any(|bind| bind.enabled);
        }
    }
}

const NAMED_KEYS: &[(&str, u32)] = &[
    ("space", 32),
    ("tab", 9),
    ("enter", 10),
    ("esc", 27),
    ("backspace", 127),
];

/// Resolves a normal-mode trigger to a dispatchable key code.
///
/// A one-character trigger maps to its Unicode scalar value; the named
/// keys above map to their conventional terminal codes. Returns `None`
/// for anything else, in which case the binding stays in its descriptor
/// but never enters the key map.
pub fn key_code(trigger: &str) -> Option<u32> {
    let mut chars = trigger.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c as u32);
    }

    let lowered = trigger.to_ascii_lowercase();
    NAMED_KEYS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|&(_, code)| code)
}
