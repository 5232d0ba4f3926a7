#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use codebox::application::bridge::{Console, ConsoleArg, stringify_args};
use codebox::application::ports::RenderPass;
use codebox::domain::console::ConsoleLevel;
use codebox::infra::realm::{RealmScope, ScriptEngine, ScriptError};
use serde_json::Value;

/// Interprets a handful of one-line statements, enough to drive the preview
/// pipeline from tests:
///
/// - `console.log(..)` / `info` / `warn` / `error` with quoted strings, JSON
///   literals or bare words as arguments
/// - `throw new Error('message')`
/// - `setTimeout(() => console.log(..), ms)`
/// - `Promise.reject('reason')`
///
/// Statements are separated by `;` or newlines. Any other statement is a
/// syntax error, reported before anything runs.
#[derive(Debug, Clone, Default)]
pub struct MiniScript {
    runs: Arc<AtomicUsize>,
}

impl MiniScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of evaluated passes.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl ScriptEngine for MiniScript {
    fn evaluate(&mut self, pass: &RenderPass, scope: &RealmScope) -> Result<(), ScriptError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let program = parse(pass.sources.script())?;
        for statement in program {
            match statement {
                Statement::Console(level, args) => scope.console().write(level, &args),
                Statement::Throw(message) => return Err(ScriptError::thrown(message)),
                Statement::Timeout(delay, level, args) => scope.spawn(move |console| async move {
                    tokio::time::sleep(delay).await;
                    console.write(level, &args);
                    Ok::<(), ScriptError>(())
                }),
                Statement::Reject(reason) => {
                    scope.spawn(move |_| async move { Err::<(), _>(ScriptError::thrown(reason)) })
                }
            }
        }
        Ok(())
    }
}

enum Statement {
    Console(ConsoleLevel, Vec<ConsoleArg>),
    Throw(String),
    Timeout(Duration, ConsoleLevel, Vec<ConsoleArg>),
    Reject(String),
}

fn parse(script: &str) -> Result<Vec<Statement>, ScriptError> {
    let mut program = Vec::new();
    for (index, line) in script.lines().enumerate() {
        for raw in line.split(';') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let statement = parse_statement(raw).ok_or_else(|| {
                ScriptError::uncaught(
                    format!("SyntaxError: Unexpected token '{raw}'"),
                    index as u32 + 1,
                )
            })?;
            program.push(statement);
        }
    }
    Ok(program)
}

fn parse_statement(raw: &str) -> Option<Statement> {
    if let Some(rest) = raw.strip_prefix("throw new Error(") {
        return Some(Statement::Throw(unquote(rest.strip_suffix(')')?)?));
    }
    if let Some(rest) = raw.strip_prefix("Promise.reject(") {
        return Some(Statement::Reject(unquote(rest.strip_suffix(')')?)?));
    }
    if let Some(rest) = raw.strip_prefix("setTimeout(() => ") {
        let (call, delay) = rest.strip_suffix(')')?.rsplit_once(',')?;
        let delay = Duration::from_millis(delay.trim().parse().ok()?);
        let (level, args) = parse_console_call(call.trim())?;
        return Some(Statement::Timeout(delay, level, args));
    }
    let (level, args) = parse_console_call(raw)?;
    Some(Statement::Console(level, args))
}

fn parse_console_call(raw: &str) -> Option<(ConsoleLevel, Vec<ConsoleArg>)> {
    let rest = raw.strip_prefix("console.")?;
    let (method, rest) = rest.split_once('(')?;
    let level = match method {
        "log" => ConsoleLevel::Log,
        "info" => ConsoleLevel::Info,
        "warn" => ConsoleLevel::Warn,
        "error" => ConsoleLevel::Error,
        _ => return None,
    };
    let inner = rest.strip_suffix(')')?;
    Some((level, split_args(inner).into_iter().map(parse_arg).collect()))
}

fn parse_arg(raw: &str) -> ConsoleArg {
    if let Some(text) = unquote(raw) {
        return ConsoleArg::plain(text);
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => ConsoleArg::from(value),
        Err(_) => ConsoleArg::plain(raw),
    }
}

fn unquote(raw: &str) -> Option<String> {
    let raw = raw.trim();
    ['\'', '"'].into_iter().find_map(|quote| {
        raw.strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            .map(str::to_string)
    })
}

/// Split on top-level commas, ignoring those inside quotes or brackets.
fn split_args(inner: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in inner.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '{' | '[' | '(') => depth += 1,
            (None, '}' | ']' | ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                args.push(inner[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        args.push(last);
    }
    args
}

/// Native console that remembers what it was asked to print.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<(ConsoleLevel, String)>>,
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<(ConsoleLevel, String)> {
        self.lines.lock().expect("recording lock").clone()
    }
}

impl Console for RecordingConsole {
    fn write(&self, level: ConsoleLevel, args: &[ConsoleArg]) {
        let text = stringify_args(args);
        self.lines.lock().expect("recording lock").push((level, text));
    }
}

