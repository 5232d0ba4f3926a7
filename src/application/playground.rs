//! The playground session: owns the buffers, the console log and the render
//! scheduler, and drives the assemble → load → relay pipeline.
//!
//! All state lives on one task. Buffer mutation, log mutation and render
//! passes happen in the order commands and bus messages are processed, so no
//! locking is involved.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use serde_json::Value;
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use crate::application::assembler::assemble_buffers;
use crate::application::bridge::{self, ConsoleLog, MessageInbox, MessagePort};
use crate::application::editing::{self, KeyCombo, Selection, Shortcut};
use crate::application::format::{BasicFormatter, Formatter};
use crate::application::ports::{
    ConfirmGate, KeyValueStore, LogNotifier, Notifier, RenderPass, RenderSurface, StorageKey,
};
use crate::application::scheduler::{RenderReason, RenderScheduler, SchedulerState};
use crate::domain::buffers::{Language, SourceBuffers};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";
pub const CLEAR_PROMPT: &str = "Clear all code? This cannot be undone.";

pub(crate) const METRIC_RENDER_PASSES: &str = "codebox_render_pass_total";

/// Input events delivered to [`Playground::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Edit { language: Language, text: String },
    SwitchTab(Language),
    Select { start: usize, end: usize },
    Refresh,
    Format,
    ClearCode,
    ClearConsole,
    Save,
    RenameProject(String),
    Key(KeyCombo),
    Unload,
}

pub struct PlaygroundBuilder {
    store: Arc<dyn KeyValueStore>,
    surface: Box<dyn RenderSurface>,
    debounce: Duration,
    default_project_name: String,
    formatter: Arc<dyn Formatter>,
    notifier: Arc<dyn Notifier>,
    confirm: Arc<dyn ConfirmGate>,
}

impl PlaygroundBuilder {
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn default_project_name(mut self, name: impl Into<String>) -> Self {
        self.default_project_name = name.into();
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn confirm(mut self, confirm: Arc<dyn ConfirmGate>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Restore the persisted session and run the initial render.
    pub fn open(self) -> Playground {
        let mut buffers = SourceBuffers::new();
        for language in Language::ALL {
            let key = StorageKey::for_language(language).as_str();
            if let Some(text) = self.store.get(key) {
                buffers.get_mut(language).set_text(text);
            }
        }
        let project_name = self
            .store
            .get(StorageKey::ProjectName.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.default_project_name);

        let (port, inbox) = bridge::channel();
        let mut playground = Playground {
            buffers,
            active: Language::Markup,
            selection: Selection::default(),
            project_name,
            console: ConsoleLog::new(),
            scheduler: RenderScheduler::new(self.debounce),
            generation: 0,
            store: self.store,
            surface: self.surface,
            formatter: self.formatter,
            notifier: self.notifier,
            confirm: self.confirm,
            port,
            inbox,
        };
        info!(project = %playground.project_name, "playground opened");
        playground.render(RenderReason::Initial);
        playground
    }
}

pub struct Playground {
    buffers: SourceBuffers,
    active: Language,
    selection: Selection,
    project_name: String,
    console: ConsoleLog,
    scheduler: RenderScheduler,
    generation: u64,
    store: Arc<dyn KeyValueStore>,
    surface: Box<dyn RenderSurface>,
    formatter: Arc<dyn Formatter>,
    notifier: Arc<dyn Notifier>,
    confirm: Arc<dyn ConfirmGate>,
    port: MessagePort,
    inbox: MessageInbox,
}

impl Playground {
    pub fn builder(
        store: Arc<dyn KeyValueStore>,
        surface: Box<dyn RenderSurface>,
    ) -> PlaygroundBuilder {
        PlaygroundBuilder {
            store,
            surface,
            debounce: DEFAULT_DEBOUNCE,
            default_project_name: DEFAULT_PROJECT_NAME.to_string(),
            formatter: Arc::new(BasicFormatter),
            notifier: Arc::new(LogNotifier),
            confirm: Arc::new(|_: &str| true),
        }
    }

    pub fn buffers(&self) -> &SourceBuffers {
        &self.buffers
    }

    pub fn active_language(&self) -> Language {
        self.active
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Number of render passes run so far in this session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Port onto the host's shared message bus.
    pub fn message_port(&self) -> &MessagePort {
        &self.port
    }

    /// Replace a buffer's text and (re)arm the debounce window.
    pub fn edit(&mut self, language: Language, text: impl Into<String>) {
        self.buffers.get_mut(language).set_text(text);
        self.scheduler.notify_edit(Instant::now());
    }

    pub fn switch_tab(&mut self, language: Language) {
        if self.active != language {
            debug!(from = %self.active, to = %language, "switched tab");
        }
        self.active = language;
        self.selection = Selection::default();
    }

    pub fn select(&mut self, start: usize, end: usize) {
        self.selection = Selection::new(start, end).clamp_to(self.buffers.text(self.active));
    }

    pub fn refresh(&mut self) {
        self.render(RenderReason::Refresh);
        self.notifier.notify("Preview refreshed");
    }

    /// Reformat the active buffer. On failure the buffer is left untouched and
    /// the error is shown as a toast.
    pub fn format(&mut self) -> bool {
        let language = self.active;
        match self.formatter.format(language, self.buffers.text(language)) {
            Ok(formatted) => {
                self.buffers.get_mut(language).set_text(formatted);
                self.selection = self.selection.clamp_to(self.buffers.text(language));
                self.persist();
                self.render(RenderReason::Format);
                self.notifier.notify("Code formatted");
                true
            }
            Err(err) => {
                warn!(language = %language, error = %err, "format failed");
                self.notifier.notify(&format!("Format error: {err}"));
                false
            }
        }
    }

    /// Clear every buffer and the console after confirmation.
    pub fn clear_code(&mut self) -> bool {
        if !self.confirm.confirm(CLEAR_PROMPT) {
            debug!("clear declined");
            return false;
        }
        self.buffers.clear();
        self.selection = Selection::default();
        self.clear_console();
        self.persist();
        self.render(RenderReason::Clear);
        self.notifier.notify("Code cleared");
        true
    }

    /// Truncate the console. Messages already queued on the bus were produced
    /// before the clear and are discarded with it.
    pub fn clear_console(&mut self) {
        let mut discarded = 0usize;
        while self.inbox.try_recv().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "dropped queued bus messages on console clear");
        }
        self.console.clear();
    }

    pub fn save(&mut self) {
        self.persist();
        self.notifier.notify("Saved");
    }

    pub fn rename_project(&mut self, name: impl Into<String>) {
        self.project_name = name.into();
        self.persist();
    }

    pub fn toggle_comment(&mut self) {
        let language = self.active;
        let edit =
            editing::toggle_line_comment(self.buffers.text(language), self.selection, language);
        self.buffers.get_mut(language).set_text(edit.text);
        self.selection = edit.selection;
        self.persist();
        self.render(RenderReason::ToggleComment);
    }

    pub fn insert_indent(&mut self) {
        let language = self.active;
        let edit = editing::insert_indent(self.buffers.text(language), self.selection);
        self.selection = edit.selection;
        self.edit(language, edit.text);
    }

    /// Run the shortcut bound to `combo`. Returns `false` when the combination
    /// is not one of ours and should be left to the default handler.
    pub fn handle_key(&mut self, combo: &KeyCombo) -> bool {
        let Some(shortcut) = Shortcut::resolve(combo) else {
            return false;
        };
        match shortcut {
            Shortcut::Save => self.save(),
            Shortcut::Format => {
                self.format();
            }
            Shortcut::ToggleComment => self.toggle_comment(),
            Shortcut::InsertIndent => self.insert_indent(),
        }
        true
    }

    pub fn unload(&mut self) {
        self.persist();
    }

    /// Write buffers and the project label to the store.
    pub fn persist(&self) {
        let mut entries: Vec<(&str, &str)> = Language::ALL
            .into_iter()
            .map(|language| {
                (
                    StorageKey::for_language(language).as_str(),
                    self.buffers.text(language),
                )
            })
            .collect();
        entries.push((StorageKey::ProjectName.as_str(), self.project_name.as_str()));
        self.store.set_many(&entries);
    }

    /// Run the debounced pass if its window has elapsed at `now`.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.scheduler.poll(now) {
            Some(reason) => {
                self.render(reason);
                self.persist();
                true
            }
            None => false,
        }
    }

    pub fn on_message(&mut self, message: &Value) -> bool {
        self.console.on_message(message)
    }

    /// Feed every already-delivered bus message to the console.
    pub fn pump(&mut self) -> usize {
        let mut accepted = 0;
        while let Some(message) = self.inbox.try_recv() {
            if self.on_message(&message) {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn dispatch(&mut self, command: HostCommand) {
        match command {
            HostCommand::Edit { language, text } => self.edit(language, text),
            HostCommand::SwitchTab(language) => self.switch_tab(language),
            HostCommand::Select { start, end } => self.select(start, end),
            HostCommand::Refresh => self.refresh(),
            HostCommand::Format => {
                self.format();
            }
            HostCommand::ClearCode => {
                self.clear_code();
            }
            HostCommand::ClearConsole => self.clear_console(),
            HostCommand::Save => self.save(),
            HostCommand::RenameProject(name) => self.rename_project(name),
            HostCommand::Key(combo) => {
                self.handle_key(&combo);
            }
            HostCommand::Unload => self.unload(),
        }
    }

    /// Host event loop. Handles bus messages, commands and the debounce
    /// deadline until the command channel closes, then drains the bus and
    /// persists the session.
    pub async fn run(mut self, mut commands: mpsc::Receiver<HostCommand>) -> Self {
        loop {
            let deadline = self.scheduler.deadline();
            let wake_at = deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                biased;
                Some(message) = self.inbox.recv() => {
                    self.on_message(&message);
                }
                command = commands.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => break,
                },
                () = time::sleep_until(wake_at), if deadline.is_some() => {
                    self.fire_due(Instant::now());
                }
            }
        }
        self.pump();
        self.unload();
        info!(renders = self.generation, "playground closed");
        self
    }

    fn render(&mut self, reason: RenderReason) {
        self.scheduler.cancel();
        self.generation += 1;
        let pass = RenderPass {
            generation: self.generation,
            reason,
            document: assemble_buffers(&self.buffers),
            sources: self.buffers.clone(),
        };
        debug!(
            generation = pass.generation,
            reason = %reason,
            bytes = pass.document.as_str().len(),
            "render pass"
        );
        self.surface.load(&pass, &self.port);
        counter!(METRIC_RENDER_PASSES, "reason" => reason.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use serde_json::json;

    use super::*;
    use crate::application::format::FormatError;
    use crate::domain::console::{ConsoleEvent, ConsoleLevel};

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, String>>);

    impl KeyValueStore for MapStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.lock().expect("store lock").get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.0
                .lock()
                .expect("store lock")
                .insert(key.to_string(), value.to_string());
        }
    }

    /// Records the size of every write it receives.
    #[derive(Default)]
    struct BatchStore(Mutex<Vec<usize>>);

    impl KeyValueStore for BatchStore {
        fn get(&self, _: &str) -> Option<String> {
            None
        }

        fn set(&self, _: &str, _: &str) {
            self.0.lock().expect("batch lock").push(1);
        }

        fn set_many(&self, entries: &[(&str, &str)]) {
            self.0.lock().expect("batch lock").push(entries.len());
        }
    }

    #[derive(Clone, Default)]
    struct Passes(Arc<Mutex<Vec<RenderPass>>>);

    impl Passes {
        fn reasons(&self) -> Vec<RenderReason> {
            self.0
                .lock()
                .expect("passes lock")
                .iter()
                .map(|pass| pass.reason)
                .collect()
        }

        fn last(&self) -> RenderPass {
            self.0
                .lock()
                .expect("passes lock")
                .last()
                .cloned()
                .expect("at least one pass")
        }
    }

    impl RenderSurface for Passes {
        fn load(&mut self, pass: &RenderPass, _port: &MessagePort) {
            self.0.lock().expect("passes lock").push(pass.clone());
        }
    }

    #[derive(Default)]
    struct Toasts(Mutex<Vec<String>>);

    impl Notifier for Toasts {
        fn notify(&self, message: &str) {
            self.0.lock().expect("toast lock").push(message.to_string());
        }
    }

    impl Toasts {
        fn last(&self) -> Option<String> {
            self.0.lock().expect("toast lock").last().cloned()
        }
    }

    struct FailingFormatter;

    impl Formatter for FailingFormatter {
        fn format(&self, language: Language, _source: &str) -> Result<String, FormatError> {
            Err(FormatError::failed(language, "unbalanced braces"))
        }
    }

    fn open_with(store: Arc<MapStore>) -> (Playground, Passes, Arc<Toasts>) {
        let passes = Passes::default();
        let toasts = Arc::new(Toasts::default());
        let playground = Playground::builder(store, Box::new(passes.clone()))
            .notifier(toasts.clone())
            .open();
        (playground, passes, toasts)
    }

    #[test]
    fn open_restores_session_and_renders_once() {
        let store = Arc::new(MapStore::default());
        store.set("codebox_html", "<h1>saved</h1>");
        store.set("codebox_js", "console.log(1)");

        let (playground, passes, _) = open_with(store);

        assert_eq!(playground.buffers().markup(), "<h1>saved</h1>");
        assert_eq!(playground.buffers().style(), "");
        assert_eq!(playground.project_name(), DEFAULT_PROJECT_NAME);
        assert_eq!(passes.reasons(), vec![RenderReason::Initial]);
        assert!(passes.last().document.as_str().contains("<h1>saved</h1>"));
    }

    #[test]
    fn edit_arms_without_rendering() {
        let (mut playground, passes, _) = open_with(Arc::default());

        playground.edit(Language::Style, "p { color: red; }");

        assert!(matches!(
            playground.scheduler_state(),
            SchedulerState::Pending { .. }
        ));
        assert_eq!(passes.reasons(), vec![RenderReason::Initial]);
    }

    #[test]
    fn due_render_persists_buffers() {
        let store = Arc::new(MapStore::default());
        let (mut playground, passes, _) = open_with(store.clone());

        playground.edit(Language::Script, "let a = 1;");
        let deadline = match playground.scheduler_state() {
            SchedulerState::Pending { deadline } => deadline,
            SchedulerState::Idle => panic!("edit should arm the scheduler"),
        };

        assert!(!playground.fire_due(deadline - Duration::from_millis(1)));
        assert!(playground.fire_due(deadline));
        assert_eq!(
            passes.reasons(),
            vec![RenderReason::Initial, RenderReason::Debounced]
        );
        assert_eq!(store.get("codebox_js").as_deref(), Some("let a = 1;"));
    }

    #[test]
    fn refresh_supersedes_pending_render() {
        let (mut playground, passes, toasts) = open_with(Arc::default());

        playground.edit(Language::Markup, "<p>now</p>");
        playground.refresh();

        assert_eq!(playground.scheduler_state(), SchedulerState::Idle);
        assert!(!playground.fire_due(Instant::now() + Duration::from_secs(60)));
        assert_eq!(
            passes.reasons(),
            vec![RenderReason::Initial, RenderReason::Refresh]
        );
        assert!(passes.last().document.as_str().contains("<p>now</p>"));
        assert_eq!(toasts.last().as_deref(), Some("Preview refreshed"));
    }

    #[test]
    fn format_failure_leaves_buffer_unchanged() {
        let passes = Passes::default();
        let toasts = Arc::new(Toasts::default());
        let mut playground =
            Playground::builder(Arc::new(MapStore::default()), Box::new(passes.clone()))
                .notifier(toasts.clone())
                .formatter(Arc::new(FailingFormatter))
                .open();
        playground.edit(Language::Markup, "<div>");

        assert!(!playground.format());

        assert_eq!(playground.buffers().markup(), "<div>");
        assert_eq!(passes.reasons(), vec![RenderReason::Initial]);
        assert_eq!(
            toasts.last().as_deref(),
            Some("Format error: html formatter failed: unbalanced braces")
        );
    }

    #[test]
    fn format_rewrites_active_buffer_and_renders() {
        let (mut playground, passes, toasts) = open_with(Arc::default());
        playground.switch_tab(Language::Style);
        playground.edit(Language::Style, "a{b:c;}");

        assert!(playground.format());

        assert_eq!(playground.buffers().style(), "a {\n  b:c;\n}");
        assert_eq!(
            passes.reasons(),
            vec![RenderReason::Initial, RenderReason::Format]
        );
        assert_eq!(toasts.last().as_deref(), Some("Code formatted"));
    }

    #[test]
    fn declined_clear_keeps_everything() {
        let passes = Passes::default();
        let mut playground =
            Playground::builder(Arc::new(MapStore::default()), Box::new(passes.clone()))
                .confirm(Arc::new(|_: &str| false))
                .open();
        playground.edit(Language::Markup, "<p>keep</p>");

        assert!(!playground.clear_code());
        assert_eq!(playground.buffers().markup(), "<p>keep</p>");
    }

    #[test]
    fn clear_drops_content_console_and_queued_messages() {
        let store = Arc::new(MapStore::default());
        let (mut playground, passes, _) = open_with(store.clone());
        playground.edit(Language::Markup, "<p>old</p>");
        playground.on_message(&json!({"type": "console", "level": "log", "message": "old"}));
        playground
            .message_port()
            .post(json!({"type": "console", "level": "log", "message": "queued"}));

        assert!(playground.clear_code());
        playground.pump();

        assert!(playground.buffers().is_empty());
        assert!(playground.console().is_empty());
        assert!(!passes.last().document.as_str().contains("<p>old</p>"));
        assert_eq!(store.get("codebox_html").as_deref(), Some(""));
    }

    #[test]
    fn pump_applies_only_console_traffic() {
        let (mut playground, _, _) = open_with(Arc::default());
        let port = playground.message_port().clone();
        port.post(json!({"type": "console", "level": "info", "message": "one"}));
        port.post(json!({"source": "devtools"}));
        port.post(json!({"type": "console", "level": "warn", "message": "two"}));

        assert_eq!(playground.pump(), 2);
        assert_eq!(
            playground.console().entries(),
            &[
                ConsoleEvent::new(ConsoleLevel::Info, "one"),
                ConsoleEvent::new(ConsoleLevel::Warn, "two"),
            ]
        );
    }

    #[test]
    fn shortcuts_route_to_actions() {
        let store = Arc::new(MapStore::default());
        let (mut playground, passes, toasts) = open_with(store.clone());
        playground.switch_tab(Language::Script);
        playground.edit(Language::Script, "run();");
        playground.select(0, 0);

        assert!(playground.handle_key(&KeyCombo::new("/").ctrl()));
        assert_eq!(playground.buffers().script(), "// run();");
        assert_eq!(passes.last().reason, RenderReason::ToggleComment);

        assert!(playground.handle_key(&KeyCombo::new("s").meta()));
        assert_eq!(toasts.last().as_deref(), Some("Saved"));
        assert_eq!(store.get("codebox_js").as_deref(), Some("// run();"));

        assert!(!playground.handle_key(&KeyCombo::new("x").ctrl()));
    }

    #[test]
    fn persist_writes_the_session_as_one_batch() {
        let store = Arc::new(BatchStore::default());
        let mut playground =
            Playground::builder(store.clone(), Box::new(Passes::default())).open();

        playground.save();

        assert_eq!(*store.0.lock().expect("batch lock"), vec![4]);
    }

    #[test]
    fn tab_indents_only_inside_an_editor() {
        let (mut playground, _, _) = open_with(Arc::default());
        playground.edit(Language::Markup, "<p></p>");
        playground.select(3, 3);

        assert!(!playground.handle_key(&KeyCombo::new("Tab")));
        assert_eq!(playground.buffers().markup(), "<p></p>");

        assert!(playground.handle_key(&KeyCombo::new("Tab").in_editor()));
        assert_eq!(playground.buffers().markup(), "<p>  </p>");
    }

    #[test]
    fn indent_is_an_edit() {
        let (mut playground, _, _) = open_with(Arc::default());
        playground.edit(Language::Markup, "<p></p>");
        playground.select(3, 3);
        playground.fire_due(Instant::now() + Duration::from_secs(1));

        playground.insert_indent();

        assert_eq!(playground.buffers().markup(), "<p>  </p>");
        assert_eq!(playground.selection(), Selection::caret(5));
        assert!(matches!(
            playground.scheduler_state(),
            SchedulerState::Pending { .. }
        ));
    }

    #[test]
    fn render_passes_are_counted_by_reason() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let (mut playground, _, _) = open_with(Arc::default());
            playground.refresh();
            playground.refresh();
        });

        let refreshes = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(composite_key, _, _, value)| {
                let key = composite_key.key();
                let refresh = key.name() == METRIC_RENDER_PASSES
                    && key
                        .labels()
                        .any(|label| label.key() == "reason" && label.value() == "refresh");
                match (refresh, value) {
                    (true, DebugValue::Counter(count)) => Some(count),
                    _ => None,
                }
            });
        assert_eq!(refreshes, Some(2));
    }

    #[test]
    fn rename_persists_label() {
        let store = Arc::new(MapStore::default());
        let (mut playground, _, _) = open_with(store.clone());

        playground.rename_project("Demo");

        assert_eq!(playground.project_name(), "Demo");
        assert_eq!(store.get("codebox_project_name").as_deref(), Some("Demo"));
    }
}
