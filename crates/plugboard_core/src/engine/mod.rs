//! Engine facade: event dispatch, toggles, reload, recurring hooks.
//!
//! # Responsibility
//! - Own the descriptor list, the dispatch tables, the recurring-hook
//!   list and the state store handle.
//! - Invoke matched actions inside the failure boundary.
//! - Mutate enable flags and keep tables plus persisted state in sync.
//!
//! # Invariants
//! - A matched event returns `true` even when the action fails; the
//!   match consumed it.
//! - No action failure, panic included, propagates to the host event
//!   loop.
//! - A toggle is complete only once its tables are rebuilt and the
//!   state write has returned (a failed write is logged and swallowed).
//! - Dispatch is single-threaded; re-entering dispatch from inside an
//!   action is unsupported and guarded by a recursion flag.

use crate::action::{ActionAdapter, ActionCx, HostContext, HostNotifier, RecurringHook};
use crate::logging::sanitize_message;
use crate::model::{Mode, PluginDescriptor};
use crate::registry::{self, BindRef, DispatchTables, ScanError};
use crate::store::{StateMap, StateStore};
use log::{error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

const MAX_STATUS_CHARS: usize = 120;

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine construction and toggle errors.
///
/// Dispatch itself never returns an error; its failures stop at the
/// boundary.
#[derive(Debug)]
pub enum EngineError {
    Io(io::Error),
    Scan(ScanError),
    PluginNotFound(usize),
    BindNotFound { plugin: usize, bind: usize },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Scan(err) => write!(f, "{err}"),
            Self::PluginNotFound(index) => write!(f, "no plugin at index {index}"),
            Self::BindNotFound { plugin, bind } => {
                write!(f, "no binding at index {bind} of plugin {plugin}")
            }
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Scan(err) => Some(err),
            Self::PluginNotFound(_) | Self::BindNotFound { .. } => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ScanError> for EngineError {
    fn from(value: ScanError) -> Self {
        Self::Scan(value)
    }
}

/// The extension engine.
///
/// Constructed once by the host application root and passed by
/// reference to every call site; there is no process-wide instance.
pub struct PluginEngine<A: ActionAdapter, S: StateStore> {
    plugin_dir: PathBuf,
    adapter: A,
    store: S,
    plugins: Vec<PluginDescriptor>,
    tables: DispatchTables,
    state: StateMap,
    hooks: Vec<RecurringHook>,
    dispatching: bool,
}

impl<A: ActionAdapter, S: StateStore> PluginEngine<A, S> {
    /// Creates the engine and performs the initial scan.
    ///
    /// The plugin directory is created when absent so a fresh install
    /// starts with an empty, working engine.
    pub fn new(plugin_dir: impl Into<PathBuf>, adapter: A, store: S) -> EngineResult<Self> {
        let plugin_dir = plugin_dir.into();
        std::fs::create_dir_all(&plugin_dir)?;

        let mut engine = Self {
            plugin_dir,
            adapter,
            store,
            plugins: Vec::new(),
            tables: DispatchTables::default(),
            state: StateMap::new(),
            hooks: Vec::new(),
            dispatching: false,
        };
        engine.reload()?;
        Ok(engine)
    }

    /// Rescans the plugin directory and rebuilds everything.
    ///
    /// Always total: parsed descriptors, applied state and tables are
    /// replaced wholesale; nothing leaks from the previous build.
    /// Registered recurring hooks survive a reload.
    pub fn reload(&mut self) -> EngineResult<()> {
        self.state = match self.store.load() {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    "event=state_load module=engine status=error reason={err} detail=falling_back_to_defaults"
                );
                StateMap::new()
            }
        };

        let mut plugins = registry::scan_dir(&self.plugin_dir, &self.adapter)?;
        registry::apply_state(&mut plugins, &self.state);
        self.tables = registry::build_tables(&plugins);
        self.plugins = plugins;
        Ok(())
    }

    /// Current plugin list, for settings UIs. Read-only.
    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Dispatches one key press in one mode.
    ///
    /// Returns `false` when no enabled binding maps the key, letting
    /// the caller fall through to default handling. Returns `true`
    /// whenever a binding matched, failed invocations included.
    pub fn handle_key_event(
        &mut self,
        mode: Mode,
        key: u32,
        context: &mut dyn HostContext,
        notifier: &mut dyn HostNotifier,
    ) -> bool {
        let Some(bind_ref) = self.tables.lookup_key(mode, key) else {
            return false;
        };
        self.run_bind(bind_ref, context, notifier)
    }

    /// Dispatches one typed command, case-insensitively.
    pub fn handle_command(
        &mut self,
        command: &str,
        context: &mut dyn HostContext,
        notifier: &mut dyn HostNotifier,
    ) -> bool {
        let Some(bind_ref) = self.tables.lookup_command(command) else {
            return false;
        };
        self.run_bind(bind_ref, context, notifier)
    }

    /// Flips one plugin's flag and cascades it onto every binding.
    ///
    /// Cascading is lossy: prior per-binding heterogeneity is not
    /// restored by toggling back.
    pub fn toggle_plugin(&mut self, index: usize) -> EngineResult<()> {
        let plugin = self
            .plugins
            .get_mut(index)
            .ok_or(EngineError::PluginNotFound(index))?;
        let next = !plugin.enabled;
        plugin.set_enabled_cascading(next);
        self.commit();
        Ok(())
    }

    /// Flips one binding's flag; the plugin flag becomes the OR of all
    /// its bindings.
    pub fn toggle_bind(&mut self, plugin_index: usize, bind_index: usize) -> EngineResult<()> {
        let plugin = self
            .plugins
            .get_mut(plugin_index)
            .ok_or(EngineError::PluginNotFound(plugin_index))?;
        let bind = plugin
            .binds
            .get_mut(bind_index)
            .ok_or(EngineError::BindNotFound {
                plugin: plugin_index,
                bind: bind_index,
            })?;
        bind.enabled = !bind.enabled;
        plugin.recompute_enabled();
        self.commit();
        Ok(())
    }

    /// Runs every registered recurring hook with the live context.
    ///
    /// Called by the host once per render cycle. A panicking hook is
    /// logged and dropped so it cannot wedge the render loop.
    pub fn run_recurring_hooks(&mut self, context: &mut dyn HostContext) {
        let mut running = std::mem::take(&mut self.hooks);
        running.retain_mut(|hook| {
            match catch_unwind(AssertUnwindSafe(|| hook(&mut *context))) {
                Ok(()) => true,
                Err(payload) => {
                    error!(
                        "event=recurring_hook module=engine status=error reason={} detail=hook_removed",
                        panic_summary(payload.as_ref())
                    );
                    false
                }
            }
        });
        // Hooks registered while this ran (none today, cheap to keep
        // correct) append after the survivors.
        running.append(&mut self.hooks);
        self.hooks = running;
    }

    /// Invokes one matched binding inside the failure boundary.
    fn run_bind(
        &mut self,
        (plugin_index, bind_index): BindRef,
        context: &mut dyn HostContext,
        notifier: &mut dyn HostNotifier,
    ) -> bool {
        if self.dispatching {
            warn!(
                "event=action_invoke module=engine status=warn reason=reentrant_dispatch \
                 plugin_index={plugin_index} bind_index={bind_index}"
            );
            return false;
        }
        // Tables are rebuilt with the descriptor list, so refs stay
        // valid; a miss here means a logic error upstream.
        let Some(plugin) = self.plugins.get(plugin_index) else {
            return false;
        };
        if plugin.binds.get(bind_index).is_none() {
            return false;
        }
        let plugin_name = plugin.name.clone();

        self.dispatching = true;
        let outcome = {
            let bind = &self.plugins[plugin_index].binds[bind_index];
            let hooks = &mut self.hooks;
            let mut cx = ActionCx::new(&mut *context, &mut *notifier, hooks);
            catch_unwind(AssertUnwindSafe(|| bind.action.invoke(&mut cx)))
        };
        self.dispatching = false;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.report_failure(&plugin_name, &err.to_string(), notifier);
            }
            Err(payload) => {
                self.report_failure(&plugin_name, &panic_summary(payload.as_ref()), notifier);
            }
        }
        true
    }

    /// Failure boundary tail: log with the owning plugin's name and
    /// surface a status message; never propagate.
    fn report_failure(&self, plugin_name: &str, detail: &str, notifier: &mut dyn HostNotifier) {
        let message = format!("plugin '{plugin_name}' error: {detail}");
        error!(
            "event=action_invoke module=engine status=error plugin={plugin_name} reason={}",
            sanitize_message(detail, MAX_STATUS_CHARS)
        );
        notifier.log(&message);
        notifier.status(&sanitize_message(&message, MAX_STATUS_CHARS));
    }

    /// Shared tail of both toggles: overlay flags into the retained
    /// state map, rebuild tables, persist.
    fn commit(&mut self) {
        for plugin in &self.plugins {
            let entry = self.state.entry(plugin.name.clone()).or_default();
            entry.enabled = plugin.enabled;
            for bind in &plugin.binds {
                entry.binds.insert(bind.trigger.clone(), bind.enabled);
            }
        }
        self.tables = registry::build_tables(&self.plugins);

        if let Err(err) = self.store.save(&self.state) {
            warn!("event=state_save module=engine status=error reason={err}");
        }
    }
}

fn panic_summary(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
