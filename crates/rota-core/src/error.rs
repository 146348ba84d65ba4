use rota_model::ModelError;
use thiserror::Error;

/// Setup and lifecycle errors surfaced to callers of the builder, `serve`
/// and `shutdown`. Nothing that happens inside a run ends up here.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule config: {0}")]
    Config(#[from] ModelError),

    #[error("schedule '{task}' competes for leadership but has no lock")]
    MissingLock { task: String },

    #[error("trigger registration failed: {0}")]
    Trigger(#[from] TriggerError),

    #[error("schedule '{task}' is already serving")]
    AlreadyServing { task: String },
}

/// Failure talking to a lock backend.
///
/// A key that does not exist is never an error: backends report it as
/// "not held".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("lock backend unavailable: {0}")]
    Unavailable(String),

    #[error("lock backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("schedule spec is empty")]
    EmptySpec,

    #[error("invalid schedule spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("trigger engine has been stopped")]
    Stopped,

    #[error("trigger engine requires a running tokio runtime")]
    NoRuntime,
}
