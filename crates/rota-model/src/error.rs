use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("schedule name must not be empty")]
    EmptyName,

    #[error("schedule '{task}' is periodic but has no spec")]
    MissingSpec { task: String },

    #[error("schedule '{task}' lock TTL of {secs}s exceeds the maximum")]
    LockTtlTooLarge { task: String, secs: u64 },

    #[error("invalid schedule mode: {0} (expected: 0-3 or stopped|once|periodic|onceAndPeriodic)")]
    InvalidMode(String),

    #[error("schedule '{0}' is not configured")]
    UnknownTask(String),

    #[error("failed to parse schedules config: {0}")]
    Json(#[from] serde_json::Error),
}
