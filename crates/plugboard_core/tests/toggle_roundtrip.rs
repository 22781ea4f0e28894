use plugboard_core::{
    Action, ActionCatalog, ActionCx, ActionResult, EngineError, HostNotifier, JsonStateStore,
    MemoryContext, Mode, PluginEngine,
};
use std::fs;
use std::path::Path;

struct NoopAction;

impl Action for NoopAction {
    fn invoke(&self, _cx: &mut ActionCx<'_>) -> ActionResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier;

impl HostNotifier for RecordingNotifier {
    fn log(&mut self, _message: &str) {}
    fn status(&mut self, _message: &str) {}
}

fn catalog() -> ActionCatalog {
    let mut catalog = ActionCatalog::new();
    catalog
        .register("noop", |_args| Ok(Box::new(NoopAction) as Box<dyn Action>))
        .expect("noop registration");
    catalog
}

fn engine_for(dir: &Path) -> PluginEngine<ActionCatalog, JsonStateStore> {
    let store = JsonStateStore::new(dir.join("plugins.conf"));
    PluginEngine::new(dir, catalog(), store).expect("engine build")
}

const SCRATCH_DOC: &str = "\
def scratch
bind s mode normal
    noop
bind t mode normal
    noop
";

#[test]
fn plugin_toggle_cascades_and_is_lossy() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");
    let mut engine = engine_for(dir.path());

    // Heterogeneous per-binding state before the cascade.
    engine.toggle_bind(0, 1).expect("bind toggle");
    assert!(engine.plugins()[0].enabled);
    assert!(!engine.plugins()[0].binds[1].enabled);

    engine.toggle_plugin(0).expect("plugin toggle off");
    assert!(!engine.plugins()[0].enabled);
    assert!(engine.plugins()[0].binds.iter().all(|b| !b.enabled));

    engine.toggle_plugin(0).expect("plugin toggle on");
    assert!(engine.plugins()[0].enabled);
    assert!(
        engine.plugins()[0].binds.iter().all(|b| b.enabled),
        "cascade overwrites prior heterogeneity"
    );
}

#[test]
fn bind_toggle_recomputes_plugin_flag_as_or() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");
    let mut engine = engine_for(dir.path());

    engine.toggle_bind(0, 0).expect("first bind off");
    assert!(engine.plugins()[0].enabled, "one binding still on");

    engine.toggle_bind(0, 1).expect("second bind off");
    assert!(!engine.plugins()[0].enabled, "all bindings off");

    engine.toggle_bind(0, 0).expect("first bind back on");
    assert!(engine.plugins()[0].enabled);
}

#[test]
fn disabled_binding_leaves_the_dispatch_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");
    let mut engine = engine_for(dir.path());

    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier;
    assert!(engine.handle_key_event(Mode::Normal, u32::from('s'), &mut context, &mut notifier));

    engine.toggle_bind(0, 0).expect("bind off");
    assert!(!engine.handle_key_event(Mode::Normal, u32::from('s'), &mut context, &mut notifier));
    assert!(engine.handle_key_event(Mode::Normal, u32::from('t'), &mut context, &mut notifier));
}

#[test]
fn toggled_state_survives_engine_rebuild() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");

    {
        let mut engine = engine_for(dir.path());
        engine.toggle_bind(0, 0).expect("bind off");
    }

    // A fresh engine over the same directory and state file.
    let mut engine = engine_for(dir.path());
    assert!(!engine.plugins()[0].binds[0].enabled);
    assert!(engine.plugins()[0].binds[1].enabled);

    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier;
    assert!(!engine.handle_key_event(Mode::Normal, u32::from('s'), &mut context, &mut notifier));
    assert!(engine.handle_key_event(Mode::Normal, u32::from('t'), &mut context, &mut notifier));
}

#[test]
fn state_for_absent_plugins_is_retained_dormant() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");

    {
        let mut engine = engine_for(dir.path());
        engine.toggle_plugin(0).expect("plugin off");
    }

    // The document disappears; its state must stay in the file.
    fs::remove_file(dir.path().join("scratch.plug")).expect("fixture removal");
    {
        let mut engine = engine_for(dir.path());
        assert!(engine.plugins().is_empty());
        // A toggle-free save path would lose it; force a commit through
        // another plugin's toggle.
        fs::write(dir.path().join("other.plug"), "def other\nbind x mode normal\n    noop\n")
            .expect("fixture write");
        engine.reload().expect("reload");
        engine.toggle_plugin(0).expect("other off");
        engine.toggle_plugin(0).expect("other on");
    }

    // The original document reappears: dormant state applies again.
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");
    let engine = engine_for(dir.path());
    let scratch = engine
        .plugins()
        .iter()
        .find(|p| p.name == "scratch")
        .expect("scratch plugin");
    assert!(!scratch.enabled, "dormant disabled state re-applied");
}

#[test]
fn toggling_out_of_range_indices_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("scratch.plug"), SCRATCH_DOC).expect("fixture write");
    let mut engine = engine_for(dir.path());

    assert!(matches!(
        engine.toggle_plugin(7),
        Err(EngineError::PluginNotFound(7))
    ));
    assert!(matches!(
        engine.toggle_bind(0, 9),
        Err(EngineError::BindNotFound { plugin: 0, bind: 9 })
    ));
}
