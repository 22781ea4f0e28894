//! Action invocation contracts.
//!
//! # Responsibility
//! - Define the invocation surface the engine guarantees to every
//!   action: host context access, log/status sinks, hook registration.
//! - Define the adapter seam that turns raw document payloads into
//!   invocables, eagerly at parse time.
//!
//! # Invariants
//! - Adaptation never happens at dispatch time.
//! - The engine reads no context keys itself; key ownership is
//!   documented per extension.

use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog;

pub use catalog::{ActionCatalog, ActionFactory, CatalogError};

pub type ActionResult<T> = Result<T, ActionError>;
pub type AdaptResult<T> = Result<T, AdaptError>;

/// Failure raised by an action during dispatch.
///
/// Caught at the dispatch boundary; never visible to the host event
/// loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The action could not complete.
    Failed(String),
    /// The action needs a context key the host did not provide.
    MissingContextKey(&'static str),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "{reason}"),
            Self::MissingContextKey(key) => write!(f, "missing context key: {key}"),
        }
    }
}

impl Error for ActionError {}

/// Failure turning a raw action payload into an invocable.
///
/// Raised once, at parse time; the offending binding is dropped and the
/// rest of the document survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdaptError {
    /// The payload contains no action reference at all.
    EmptyPayload,
    /// The payload head names no registered action.
    UnknownAction(String),
    /// The registered constructor rejected the payload arguments.
    InvalidArguments { action: String, reason: String },
}

impl Display for AdaptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "action payload is empty"),
            Self::UnknownAction(name) => write!(f, "unknown action: {name}"),
            Self::InvalidArguments { action, reason } => {
                write!(f, "invalid arguments for action `{action}`: {reason}")
            }
        }
    }
}

impl Error for AdaptError {}

/// Host-owned mutable state handed to every action.
///
/// An open-ended key-value association: actions may read and write any
/// named values, and the engine constrains nothing beyond documenting
/// key ownership per extension.
pub trait HostContext {
    fn get(&self, key: &str) -> Option<&Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
}

/// In-memory context bag for simple hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryContext {
    values: HashMap<String, Value>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostContext for MemoryContext {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

/// Host-supplied output sinks.
pub trait HostNotifier {
    /// Durable diagnostic output.
    fn log(&mut self, message: &str);
    /// Transient user-facing feedback.
    fn status(&mut self, message: &str);
}

/// Callback run by the host once per render cycle with the live context.
pub type RecurringHook = Box<dyn FnMut(&mut dyn HostContext)>;

/// Invocation scope handed to `Action::invoke`.
///
/// Bundles the three guarantees of the invocation contract plus
/// recurring-hook registration. Constructed by the engine only.
pub struct ActionCx<'a> {
    /// Host-owned mutable state.
    pub context: &'a mut dyn HostContext,
    notifier: &'a mut dyn HostNotifier,
    hooks: &'a mut Vec<RecurringHook>,
}

impl<'a> ActionCx<'a> {
    pub(crate) fn new(
        context: &'a mut dyn HostContext,
        notifier: &'a mut dyn HostNotifier,
        hooks: &'a mut Vec<RecurringHook>,
    ) -> Self {
        Self {
            context,
            notifier,
            hooks,
        }
    }

    /// Writes one durable diagnostic line through the host.
    pub fn log(&mut self, message: &str) {
        self.notifier.log(message);
    }

    /// Shows one transient status message to the user.
    pub fn status(&mut self, message: &str) {
        self.notifier.status(message);
    }

    /// Registers a callback the host runs once per render cycle via
    /// `PluginEngine::run_recurring_hooks`.
    pub fn add_recurring_hook(&mut self, hook: RecurringHook) {
        self.hooks.push(hook);
    }
}

/// Opaque unit of behavior a binding executes when matched.
pub trait Action {
    fn invoke(&self, cx: &mut ActionCx<'_>) -> ActionResult<()>;
}

impl std::fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Action")
    }
}

impl<F> Action for F
where
    F: Fn(&mut ActionCx<'_>) -> ActionResult<()>,
{
    fn invoke(&self, cx: &mut ActionCx<'_>) -> ActionResult<()> {
        self(cx)
    }
}

/// Raw action payload captured verbatim from a binding block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionPayload {
    lines: Vec<String>,
}

impl ActionPayload {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// All payload lines, block indentation already removed.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// First non-empty line, trimmed: the action reference.
    pub fn head(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
    }

    /// Lines after the head: constructor arguments.
    pub fn args(&self) -> &[String] {
        match self.lines.iter().position(|line| !line.trim().is_empty()) {
            Some(head) => &self.lines[head + 1..],
            None => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head().is_none()
    }
}

/// Adapter seam: builds an invocable from a raw payload, or reports why
/// it cannot.
pub trait ActionAdapter {
    fn adapt(&self, payload: &ActionPayload) -> AdaptResult<Box<dyn Action>>;
}
