//! Headless preview realm.
//!
//! A [`Realm`] is one isolated execution context for one render pass: it
//! installs the instrumented console, runs the pass's script through a
//! [`ScriptEngine`] inside an isolation block, and owns every task the script
//! schedules. Dropping a realm aborts those tasks and closes its scoped port,
//! so nothing it produces afterwards reaches the host.

use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
};

use futures::FutureExt;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::bridge::{
    Console, ConsoleArg, InstrumentedConsole, MessagePort, PortLease, stringify_args,
};
use crate::application::ports::{RenderPass, RenderSurface};
use crate::domain::console::ConsoleLevel;

use super::lock::mutex_lock;

const SOURCE: &str = "infra::realm";

/// Failure raised by a preview script. Never propagated to the host; the
/// realm turns it into an `error` console event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Runtime error thrown from the script body.
    #[error("{message}")]
    Thrown { message: String },
    /// Error that escaped every handler, such as a parse failure.
    #[error("{message} (Line {line})")]
    Uncaught { message: String, line: u32 },
}

impl ScriptError {
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown {
            message: message.into(),
        }
    }

    pub fn uncaught(message: impl Into<String>, line: u32) -> Self {
        Self::Uncaught {
            message: message.into(),
            line,
        }
    }
}

/// Executes the script of a render pass against a realm's capabilities.
pub trait ScriptEngine: Send + 'static {
    fn evaluate(&mut self, pass: &RenderPass, scope: &RealmScope) -> Result<(), ScriptError>;
}

impl<F> ScriptEngine for F
where
    F: FnMut(&RenderPass, &RealmScope) -> Result<(), ScriptError> + Send + 'static,
{
    fn evaluate(&mut self, pass: &RenderPass, scope: &RealmScope) -> Result<(), ScriptError> {
        self(pass, scope)
    }
}

/// Capabilities handed to a script while it runs.
pub struct RealmScope {
    generation: u64,
    console: InstrumentedConsole,
    tasks: Mutex<JoinSet<()>>,
}

impl RealmScope {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn console(&self) -> &InstrumentedConsole {
        &self.console
    }

    /// Schedule asynchronous work owned by this realm.
    ///
    /// An `Err` from the task is reported the way an unhandled rejection is,
    /// a panic the way a thrown error is. Without a runtime the task is
    /// dropped.
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(InstrumentedConsole) -> Fut,
        Fut: Future<Output = Result<(), ScriptError>> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!(
                generation = self.generation,
                "no runtime available, dropping realm task"
            );
            return;
        };
        let console = self.console.clone();
        let work = AssertUnwindSafe(task(console.clone())).catch_unwind();
        mutex_lock(&self.tasks, SOURCE, "spawn").spawn_on(
            async move {
                match work.await {
                    Ok(Ok(())) => {}
                    Ok(Err(ScriptError::Thrown { message })) => console.report_rejection(&message),
                    Ok(Err(ScriptError::Uncaught { message, line })) => {
                        console.report_uncaught(&message, line)
                    }
                    Err(payload) => report_thrown(&console, &panic_message(payload.as_ref())),
                }
            },
            &handle,
        );
    }

    fn pending_tasks(&self) -> usize {
        mutex_lock(&self.tasks, SOURCE, "pending_tasks").len()
    }
}

/// One booted preview context. Lives until the next pass replaces it.
pub struct Realm {
    scope: RealmScope,
    _lease: PortLease,
}

impl Realm {
    /// Boot a realm for `pass` and run its script to completion.
    pub fn boot<E>(
        engine: &mut E,
        pass: &RenderPass,
        port: &MessagePort,
        native: Arc<dyn Console>,
    ) -> Self
    where
        E: ScriptEngine + ?Sized,
    {
        let (scoped, lease) = port.scoped();
        let scope = RealmScope {
            generation: pass.generation,
            console: InstrumentedConsole::install(native, scoped),
            tasks: Mutex::new(JoinSet::new()),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.evaluate(pass, &scope)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(ScriptError::Thrown { message })) => report_thrown(&scope.console, &message),
            Ok(Err(ScriptError::Uncaught { message, line })) => {
                scope.console.report_uncaught(&message, line)
            }
            Err(payload) => report_thrown(&scope.console, &panic_message(payload.as_ref())),
        }

        debug!(
            generation = pass.generation,
            tasks = scope.pending_tasks(),
            "realm booted"
        );
        Self {
            scope,
            _lease: lease,
        }
    }

    pub fn generation(&self) -> u64 {
        self.scope.generation
    }

    /// Tasks scheduled by the script and still owned by this realm.
    pub fn pending_tasks(&self) -> usize {
        self.scope.pending_tasks()
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        let mut tasks = mutex_lock(&self.scope.tasks, SOURCE, "teardown");
        if !tasks.is_empty() {
            debug!(
                generation = self.scope.generation,
                aborted = tasks.len(),
                "aborting realm tasks"
            );
        }
        tasks.abort_all();
    }
}

fn report_thrown(console: &InstrumentedConsole, message: &str) {
    console.error(&[ConsoleArg::plain(format!("JavaScript Error: {message}"))]);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "script panicked".to_string()
    }
}

/// The realm's own console: user output is mirrored to the local log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn write(&self, level: ConsoleLevel, args: &[ConsoleArg]) {
        let message = stringify_args(args);
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => {
                info!(target: "codebox::preview", level = %level, "{message}")
            }
            ConsoleLevel::Warn => warn!(target: "codebox::preview", "{message}"),
            ConsoleLevel::Error => error!(target: "codebox::preview", "{message}"),
        }
    }
}

/// Render surface that hosts each pass in a fresh [`Realm`].
pub struct HeadlessSurface<E> {
    engine: E,
    native: Arc<dyn Console>,
    realm: Option<Realm>,
}

impl<E: ScriptEngine> HeadlessSurface<E> {
    pub fn new(engine: E) -> Self {
        Self::with_native_console(engine, Arc::new(TracingConsole))
    }

    pub fn with_native_console(engine: E, native: Arc<dyn Console>) -> Self {
        Self {
            engine,
            native,
            realm: None,
        }
    }

    pub fn realm(&self) -> Option<&Realm> {
        self.realm.as_ref()
    }
}

impl<E: ScriptEngine> RenderSurface for HeadlessSurface<E> {
    fn load(&mut self, pass: &RenderPass, port: &MessagePort) {
        // The previous realm must be gone before the next one can post.
        drop(self.realm.take());
        self.realm = Some(Realm::boot(
            &mut self.engine,
            pass,
            port,
            Arc::clone(&self.native),
        ));
    }
}
