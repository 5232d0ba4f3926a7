//! Debounced render scheduling as an explicit two-state machine.

use std::{fmt, time::Duration};

use tokio::time::Instant;
use tracing::{debug, warn};

/// Longest supported quiescence window. Longer requests are clamped so a
/// deadline always fits in an `Instant`.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Why a render pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderReason {
    /// Session opened.
    Initial,
    /// Quiescence window elapsed after the last edit.
    Debounced,
    Refresh,
    Format,
    Clear,
    ToggleComment,
}

impl RenderReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderReason::Initial => "initial",
            RenderReason::Debounced => "debounced",
            RenderReason::Refresh => "refresh",
            RenderReason::Format => "format",
            RenderReason::Clear => "clear",
            RenderReason::ToggleComment => "toggle_comment",
        }
    }
}

impl fmt::Display for RenderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A render is armed for `deadline`; at most one exists at a time.
    Pending { deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    window: Duration,
    state: SchedulerState,
}

impl RenderScheduler {
    pub fn new(window: Duration) -> Self {
        if window > MAX_WINDOW {
            warn!(
                requested_ms = window.as_millis() as u64,
                "debounce window clamped"
            );
        }
        Self {
            window: window.min(MAX_WINDOW),
            state: SchedulerState::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Pending { deadline } => Some(deadline),
        }
    }

    /// Arm (Idle -> Pending) or re-arm (Pending -> Pending) for a full window
    /// starting at `now`.
    pub fn notify_edit(&mut self, now: Instant) -> Instant {
        let deadline = now + self.window;
        let window_ms = self.window.as_millis() as u64;
        match self.state {
            SchedulerState::Idle => debug!(window_ms, "render armed"),
            SchedulerState::Pending { .. } => debug!(window_ms, "render re-armed"),
        }
        self.state = SchedulerState::Pending { deadline };
        deadline
    }

    /// Pending -> Idle once the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<RenderReason> {
        match self.state {
            SchedulerState::Pending { deadline } if now >= deadline => {
                self.state = SchedulerState::Idle;
                debug!("render window elapsed");
                Some(RenderReason::Debounced)
            }
            _ => None,
        }
    }

    /// Drop any armed render; used when a pass runs immediately.
    pub fn cancel(&mut self) {
        if let SchedulerState::Pending { .. } = self.state {
            debug!("pending render superseded");
        }
        self.state = SchedulerState::Idle;
    }
}
