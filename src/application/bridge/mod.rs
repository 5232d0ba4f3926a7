//! Console bridge between the embedded preview realm and the host page.
//!
//! The two realms share no memory. The producer half serializes console calls
//! into [`BridgeMessage`]s and posts them on a [`MessagePort`]; the consumer
//! half reads the host's [`MessageInbox`] and appends accepted events to the
//! [`ConsoleLog`]. Delivery is one-way, fire-and-forget and ordered per sender.

mod bus;
mod consumer;
mod producer;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::console::ConsoleEvent;

pub use bus::{MessageInbox, MessagePort, PortLease, channel};
pub use consumer::ConsoleLog;
pub use producer::{Console, ConsoleArg, InstrumentedConsole, stringify_args};

/// Tag carried by every console message on the shared bus.
pub const CONSOLE_MESSAGE_TYPE: &str = "console";

pub(crate) const METRIC_CONSOLE_EVENTS: &str = "codebox_console_event_total";
pub(crate) const METRIC_IGNORED_MESSAGES: &str = "codebox_bridge_message_ignored_total";

/// Wire shape of a bridge message: `{"type": "console", "level": .., "message": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeMessage {
    Console(ConsoleEvent),
}

impl BridgeMessage {
    pub fn into_value(self) -> Value {
        match self {
            BridgeMessage::Console(event) => serde_json::json!({
                "type": CONSOLE_MESSAGE_TYPE,
                "level": event.level.as_str(),
                "message": event.message,
            }),
        }
    }
}
