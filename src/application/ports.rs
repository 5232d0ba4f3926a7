//! Collaborator traits the playground session depends on.

use tracing::info;

use crate::application::assembler::AssembledDocument;
use crate::application::bridge::MessagePort;
use crate::application::scheduler::RenderReason;
use crate::domain::buffers::{Language, SourceBuffers};

/// Keys under which the session is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Markup,
    Style,
    Script,
    ProjectName,
    /// Owned by the theme toggle; reserved so the session never reuses it.
    Theme,
}

impl StorageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Markup => "codebox_html",
            StorageKey::Style => "codebox_css",
            StorageKey::Script => "codebox_js",
            StorageKey::ProjectName => "codebox_project_name",
            StorageKey::Theme => "codebox_theme",
        }
    }

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Markup => StorageKey::Markup,
            Language::Style => StorageKey::Style,
            Language::Script => StorageKey::Script,
        }
    }
}

/// Local key/value persistence. Writes are fire-and-forget and last-writer-wins;
/// implementations log their own failures.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);

    /// Write several values as one update.
    fn set_many(&self, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }
}

/// Everything a surface needs to replace its content for one render pass.
#[derive(Debug, Clone)]
pub struct RenderPass {
    /// Monotonic per session; a new generation fully replaces the previous one.
    pub generation: u64,
    pub reason: RenderReason,
    pub document: AssembledDocument,
    pub sources: SourceBuffers,
}

/// Embedded rendering context that accepts whole-document replacement.
///
/// Loading never reports failure to the caller: anything that goes wrong
/// while the document runs is surfaced as console output on `port`.
pub trait RenderSurface: Send {
    fn load(&mut self, pass: &RenderPass, port: &MessagePort);
}

/// Transient user notification ("toast").
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Emits toasts as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(toast = message, "notification");
    }
}

/// Yes/no gate in front of destructive actions.
pub trait ConfirmGate: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> ConfirmGate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}
