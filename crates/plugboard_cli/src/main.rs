//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `plugboard_core` linkage
//!   against a real plugin directory.
//! - Keep output deterministic for quick local sanity checks.

use plugboard_core::{Action, ActionCatalog, ActionCx, ActionResult, JsonStateStore, PluginEngine};
use std::path::PathBuf;
use std::process::ExitCode;

struct NoopAction;

impl Action for NoopAction {
    fn invoke(&self, _cx: &mut ActionCx<'_>) -> ActionResult<()> {
        Ok(())
    }
}

fn main() -> ExitCode {
    let plugin_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("plugins"));

    // One placeholder action so documents referencing `noop` survive
    // adaptation during a dry scan.
    let mut catalog = ActionCatalog::new();
    if let Err(err) = catalog.register("noop", |_args| Ok(Box::new(NoopAction) as Box<dyn Action>)) {
        eprintln!("plugboard_cli: {err}");
        return ExitCode::FAILURE;
    }

    let store = JsonStateStore::new(plugin_dir.join("plugins.conf"));
    let engine = match PluginEngine::new(&plugin_dir, catalog, store) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("plugboard_cli: cannot scan `{}`: {err}", plugin_dir.display());
            return ExitCode::FAILURE;
        }
    };

    println!("plugboard_core version={}", plugboard_core::core_version());
    println!("plugin_dir={}", plugin_dir.display());
    for plugin in engine.plugins() {
        println!(
            "plugin name={} enabled={} binds={}",
            plugin.name,
            plugin.enabled,
            plugin.binds.len()
        );
        for bind in &plugin.binds {
            println!(
                "  bind trigger={} mode={} enabled={}",
                bind.trigger,
                bind.mode.as_str(),
                bind.enabled
            );
        }
    }
    ExitCode::SUCCESS
}
