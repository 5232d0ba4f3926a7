use std::{fmt, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::console::{ConsoleEvent, ConsoleLevel};

use super::{BridgeMessage, MessagePort};

/// Console capability available to code running inside a preview realm.
pub trait Console: Send + Sync {
    fn write(&self, level: ConsoleLevel, args: &[ConsoleArg]);

    fn log(&self, args: &[ConsoleArg]) {
        self.write(ConsoleLevel::Log, args);
    }

    fn info(&self, args: &[ConsoleArg]) {
        self.write(ConsoleLevel::Info, args);
    }

    fn warn(&self, args: &[ConsoleArg]) {
        self.write(ConsoleLevel::Warn, args);
    }

    fn error(&self, args: &[ConsoleArg]) {
        self.write(ConsoleLevel::Error, args);
    }
}

/// One console argument, already converted to text.
///
/// Structured values are rendered as pretty JSON; primitives as plain text. If
/// structured rendering fails the argument falls back to its `Debug` text, so
/// converting an argument never fails and never yields an empty string for a
/// value that has a representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleArg {
    text: String,
}

impl ConsoleArg {
    pub fn plain(value: impl fmt::Display) -> Self {
        Self {
            text: value.to_string(),
        }
    }

    pub fn structured<T>(value: &T) -> Self
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self { text },
            Err(err) => {
                debug!(error = %err, "structured console argument fell back to debug text");
                let fallback = format!("{value:?}");
                let text = if fallback.is_empty() {
                    std::any::type_name::<T>().to_string()
                } else {
                    fallback
                };
                Self { text }
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for ConsoleArg {
    fn from(value: &str) -> Self {
        Self::plain(value)
    }
}

impl From<String> for ConsoleArg {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<bool> for ConsoleArg {
    fn from(value: bool) -> Self {
        Self::plain(value)
    }
}

impl From<i64> for ConsoleArg {
    fn from(value: i64) -> Self {
        Self::plain(value)
    }
}

impl From<f64> for ConsoleArg {
    fn from(value: f64) -> Self {
        if value.is_infinite() {
            let text = if value.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            return Self::plain(text);
        }
        Self::plain(value)
    }
}

impl From<Value> for ConsoleArg {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self { text },
            Value::Array(_) | Value::Object(_) => Self::structured(&value),
            other => Self::plain(other),
        }
    }
}

/// Join converted arguments with a single space.
pub fn stringify_args(args: &[ConsoleArg]) -> String {
    args.iter()
        .map(ConsoleArg::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Console decorator installed once per realm.
///
/// Every call is posted to the host as a console message and then forwarded
/// to the realm's own console.
#[derive(Clone)]
pub struct InstrumentedConsole {
    native: Arc<dyn Console>,
    port: MessagePort,
}

impl InstrumentedConsole {
    pub fn install(native: Arc<dyn Console>, port: MessagePort) -> Self {
        Self { native, port }
    }

    /// Report an uncaught runtime error with its originating line.
    pub fn report_uncaught(&self, message: &str, line: u32) {
        self.error(&[ConsoleArg::plain(format!("{message} (Line {line})"))]);
    }

    /// Report an unhandled asynchronous rejection.
    pub fn report_rejection(&self, reason: &str) {
        self.error(&[ConsoleArg::plain(format!(
            "Unhandled Promise Rejection: {reason}"
        ))]);
    }
}

impl Console for InstrumentedConsole {
    fn write(&self, level: ConsoleLevel, args: &[ConsoleArg]) {
        let event = ConsoleEvent::new(level, stringify_args(args));
        self.port.post(BridgeMessage::Console(event).into_value());
        self.native.write(level, args);
    }
}

impl fmt::Debug for InstrumentedConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedConsole")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
