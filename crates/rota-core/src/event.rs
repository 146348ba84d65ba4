//! Run outcomes delivered to subscribers.
//!
//! The controller logs every outcome itself; subscribers exist for callers
//! that need to react programmatically (metrics, tests, alerting).

use std::{fmt, sync::Arc};

use async_trait::async_trait;

/// Which path fired a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    Once,
    Periodic,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Once => "once",
            RunKind::Periodic => "periodic",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A previous run of this task is still active and the policy is `Skip`.
    OverlapSkipped,
    /// Another instance holds the lock or won the acquisition.
    ElectionLost,
    /// The lock backend failed; the run aborted without running the handler.
    ElectionFailed,
    /// Leadership granted; the handler is about to run.
    RunStarting,
    RunSucceeded,
    /// The handler returned an error.
    RunFailed,
    /// The handler panicked.
    RunCrashed,
    LockReleased,
    LockReleaseFailed,
}

impl EventKind {
    /// Returns `true` for the kinds that end a run before the handler runs.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            EventKind::OverlapSkipped | EventKind::ElectionLost | EventKind::ElectionFailed
        )
    }

    /// Returns `true` for the kinds that report how the handler ended.
    pub fn is_handler_outcome(&self) -> bool {
        matches!(
            self,
            EventKind::RunSucceeded | EventKind::RunFailed | EventKind::RunCrashed
        )
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub task: String,
    pub run: RunKind,
    /// Error text, panic message or election detail, when there is one.
    pub reason: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, task: impl Into<String>, run: RunKind) -> Self {
        Self {
            kind,
            task: task.into(),
            run,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Receives every event of the schedules it is registered with.
///
/// Called from inside the run, in registration order; a slow subscriber
/// delays the rest of that run, never the trigger engine.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    fn name(&self) -> &'static str {
        "subscriber"
    }
}

pub type SubscriberRef = Arc<dyn Subscribe>;
