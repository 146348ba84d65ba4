use std::time::Duration;

use crate::{LockKey, ModelError, Mode, OverlapPolicy, Spec};

/// Lock TTL applied when none (or zero) is configured.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);

/// Longest lock TTL a descriptor may carry.
pub const MAX_LOCK_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

const QUALIFIED_PREFIX: &str = "schedules";
const LOCK_KEY_SUFFIX: &str = "locker";

/// Configuration of one schedulable job.
///
/// A descriptor is assembled once, validated, and then shared read-only with
/// every run of the task (handlers receive it as their context).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    /// Task identifier; unique within the application.
    pub name: String,
    /// Activation mode read by `serve`.
    pub mode: Mode,
    /// Namespace for the lock key; usually the application name.
    pub lock_key_prefix: String,
    /// How long a won lock stays held unless released earlier.
    pub lock_ttl: Duration,
    /// Release the lock as soon as the winning run completes.
    ///
    /// When disabled the key is left to expire after `lock_ttl`, which keeps
    /// other instances from re-running the same occurrence.
    pub auto_release: bool,
    /// Gate each run behind leader election.
    ///
    /// When disabled every instance runs every trigger and no lock calls occur.
    pub competitive: bool,
    /// Cron-style schedule; required for periodic modes.
    pub spec: Spec,
    /// Free-form arguments forwarded to handlers.
    pub args: serde_json::Value,
    /// In-process overlap policy.
    pub overlap: OverlapPolicy,
    /// Query `is_held` before the atomic acquisition.
    ///
    /// Advisory only: it saves a write when the race is obviously lost, but the
    /// atomic acquisition is the sole source of mutual exclusion.
    pub precheck: bool,
}

impl TaskDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Stopped,
            lock_key_prefix: String::new(),
            lock_ttl: DEFAULT_LOCK_TTL,
            auto_release: false,
            competitive: false,
            spec: String::new(),
            args: serde_json::Value::Null,
            overlap: OverlapPolicy::Allow,
            precheck: true,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_lock_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_key_prefix = prefix.into();
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    pub fn with_competitive(mut self, competitive: bool) -> Self {
        self.competitive = competitive;
        self
    }

    pub fn with_spec(mut self, spec: impl Into<Spec>) -> Self {
        self.spec = spec.into();
        self
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_precheck(mut self, precheck: bool) -> Self {
        self.precheck = precheck;
        self
    }

    /// Name qualified by the configuration namespace (`schedules.<name>`).
    pub fn qualified_name(&self) -> String {
        format!("{QUALIFIED_PREFIX}.{}", self.name)
    }

    /// Coordination key shared by every instance running this task.
    ///
    /// A pure function of `lock_key_prefix` and `name`.
    pub fn lock_key(&self) -> LockKey {
        format!(
            "{}.{}.{LOCK_KEY_SUFFIX}",
            self.lock_key_prefix,
            self.qualified_name()
        )
    }

    /// Fill unset fields: the lock prefix falls back to `app_name`,
    /// a zero TTL falls back to [`DEFAULT_LOCK_TTL`].
    pub fn apply_defaults(&mut self, app_name: &str) {
        if self.lock_key_prefix.is_empty() {
            self.lock_key_prefix = app_name.to_string();
        }
        if self.lock_ttl.is_zero() {
            self.lock_ttl = DEFAULT_LOCK_TTL;
        }
    }

    /// Check the invariants required before the descriptor can be served.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.mode.is_periodic() && self.spec.trim().is_empty() {
            return Err(ModelError::MissingSpec {
                task: self.name.clone(),
            });
        }
        if self.lock_ttl > MAX_LOCK_TTL {
            return Err(ModelError::LockTtlTooLarge {
                task: self.name.clone(),
                secs: self.lock_ttl.as_secs(),
            });
        }
        Ok(())
    }
}
