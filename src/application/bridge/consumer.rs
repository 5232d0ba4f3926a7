use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::console::ConsoleEvent;

use super::{BridgeMessage, CONSOLE_MESSAGE_TYPE, METRIC_CONSOLE_EVENTS, METRIC_IGNORED_MESSAGES};

/// Host-side console panel model.
///
/// Entries are kept in the order messages were received; the log only grows
/// through [`ConsoleLog::on_message`] and only shrinks through
/// [`ConsoleLog::clear`].
#[derive(Debug, Default, Clone)]
pub struct ConsoleLog {
    entries: Vec<ConsoleEvent>,
    scroll_anchor: Option<usize>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a message from the shared bus.
    ///
    /// Returns `true` when the message was a console event and was appended.
    /// Unrelated traffic and malformed console messages are ignored.
    pub fn on_message(&mut self, message: &Value) -> bool {
        let tag = message.get("type").and_then(Value::as_str);
        if tag != Some(CONSOLE_MESSAGE_TYPE) {
            counter!(METRIC_IGNORED_MESSAGES, "reason" => "untagged").increment(1);
            debug!(tag = ?tag, "ignoring non-console bus message");
            return false;
        }

        match BridgeMessage::deserialize(message) {
            Ok(BridgeMessage::Console(event)) => {
                self.append(event);
                true
            }
            Err(err) => {
                counter!(METRIC_IGNORED_MESSAGES, "reason" => "malformed").increment(1);
                debug!(error = %err, "ignoring malformed console message");
                false
            }
        }
    }

    fn append(&mut self, event: ConsoleEvent) {
        counter!(METRIC_CONSOLE_EVENTS, "level" => event.level.as_str()).increment(1);
        self.entries.push(event);
        self.scroll_anchor = Some(self.entries.len() - 1);
    }

    pub fn entries(&self) -> &[ConsoleEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry the view is scrolled to; always the newest one.
    pub fn scroll_anchor(&self) -> Option<usize> {
        self.scroll_anchor
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.scroll_anchor = None;
    }
}
