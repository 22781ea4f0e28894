use plugboard_core::{
    Action, ActionCatalog, ActionCx, ActionError, ActionResult, HostContext, HostNotifier,
    JsonStateStore, MemoryContext, Mode, PluginEngine,
};
use serde_json::json;
use std::fs;
use std::path::Path;

struct TouchAction;

impl Action for TouchAction {
    fn invoke(&self, cx: &mut ActionCx<'_>) -> ActionResult<()> {
        cx.context.set("touched", json!(true));
        cx.status("touched");
        Ok(())
    }
}

struct FailAction;

impl Action for FailAction {
    fn invoke(&self, _cx: &mut ActionCx<'_>) -> ActionResult<()> {
        Err(ActionError::Failed("deliberate failure".to_string()))
    }
}

struct PanicAction;

impl Action for PanicAction {
    fn invoke(&self, _cx: &mut ActionCx<'_>) -> ActionResult<()> {
        panic!("deliberate panic");
    }
}

struct HookAction;

impl Action for HookAction {
    fn invoke(&self, cx: &mut ActionCx<'_>) -> ActionResult<()> {
        cx.add_recurring_hook(Box::new(|context: &mut dyn HostContext| {
            let count = context
                .get("hook.count")
                .and_then(|value| value.as_i64())
                .unwrap_or(0);
            context.set("hook.count", json!(count + 1));
        }));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    logs: Vec<String>,
    statuses: Vec<String>,
}

impl HostNotifier for RecordingNotifier {
    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }
}

fn catalog() -> ActionCatalog {
    let mut catalog = ActionCatalog::new();
    catalog
        .register("touch", |_args| Ok(Box::new(TouchAction) as Box<dyn Action>))
        .expect("touch registration");
    catalog
        .register("fail", |_args| Ok(Box::new(FailAction) as Box<dyn Action>))
        .expect("fail registration");
    catalog
        .register("panic", |_args| Ok(Box::new(PanicAction) as Box<dyn Action>))
        .expect("panic registration");
    catalog
        .register("hook", |_args| Ok(Box::new(HookAction) as Box<dyn Action>))
        .expect("hook registration");
    catalog
}

const DISPATCH_DOC: &str = "\
def demo
bind g mode normal
    touch
bind f mode normal
    fail
bind p mode normal
    panic
bind h mode normal
    hook
";

fn engine_for(dir: &Path) -> PluginEngine<ActionCatalog, JsonStateStore> {
    fs::write(dir.join("demo.plug"), DISPATCH_DOC).expect("fixture write");
    let store = JsonStateStore::new(dir.join("plugins.conf"));
    PluginEngine::new(dir, catalog(), store).expect("engine build")
}

#[test]
fn unmapped_key_falls_through() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut engine = engine_for(dir.path());
    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier::default();

    assert!(!engine.handle_key_event(Mode::Normal, u32::from('z'), &mut context, &mut notifier));
    assert!(notifier.statuses.is_empty());
}

#[test]
fn successful_action_reaches_context_and_status() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut engine = engine_for(dir.path());
    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier::default();

    assert!(engine.handle_key_event(Mode::Normal, u32::from('g'), &mut context, &mut notifier));
    assert_eq!(context.get("touched"), Some(&json!(true)));
    assert_eq!(notifier.statuses, ["touched".to_string()]);
}

#[test]
fn failing_action_still_consumes_the_key() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut engine = engine_for(dir.path());
    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier::default();

    let handled =
        engine.handle_key_event(Mode::Normal, u32::from('f'), &mut context, &mut notifier);
    assert!(handled, "a matched key is consumed even on failure");

    let status = notifier.statuses.last().expect("failure status message");
    assert!(status.contains("plugin 'demo' error"));
    assert!(status.contains("deliberate failure"));
    let logged = notifier.logs.last().expect("failure log line");
    assert!(logged.contains("demo"));
}

#[test]
fn panicking_action_is_contained_by_the_boundary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut engine = engine_for(dir.path());
    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier::default();

    let handled =
        engine.handle_key_event(Mode::Normal, u32::from('p'), &mut context, &mut notifier);
    assert!(handled);
    let status = notifier.statuses.last().expect("panic status message");
    assert!(status.contains("plugin 'demo' error"));

    // The engine stays usable after the panic.
    assert!(engine.handle_key_event(Mode::Normal, u32::from('g'), &mut context, &mut notifier));
    assert_eq!(context.get("touched"), Some(&json!(true)));
}

#[test]
fn recurring_hooks_run_once_per_render_cycle() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut engine = engine_for(dir.path());
    let mut context = MemoryContext::new();
    let mut notifier = RecordingNotifier::default();

    assert!(engine.handle_key_event(Mode::Normal, u32::from('h'), &mut context, &mut notifier));

    engine.run_recurring_hooks(&mut context);
    engine.run_recurring_hooks(&mut context);
    assert_eq!(context.get("hook.count"), Some(&json!(2)));

    // Hooks survive a reload; only descriptors are rebuilt.
    engine.reload().expect("reload");
    engine.run_recurring_hooks(&mut context);
    assert_eq!(context.get("hook.count"), Some(&json!(3)));
}
