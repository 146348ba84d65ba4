use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_LOCK_TTL, ModelError, Mode, OverlapPolicy, TaskDescriptor};

/// File representation of one schedule.
///
/// Keys follow the established option names (`type`, `lockPrefix`,
/// `lockSeconds`, `autoUnlock`, `compete`, `spec`, `args`). Every field is
/// optional; missing values take the defaults applied by [`TaskConfig::into_descriptor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskConfig {
    /// Stopped: 0, Once: 1, Periodic: 2, OnceAndPeriodic: 3.
    #[serde(rename = "type")]
    pub mode: Mode,
    pub lock_prefix: String,
    /// Lock TTL in seconds; `0` means the default (10s).
    pub lock_seconds: u64,
    pub auto_unlock: bool,
    pub compete: bool,
    pub spec: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub args: serde_json::Value,
    pub overlap: OverlapPolicy,
    /// Advisory `is_held` check before acquisition; defaults to `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precheck: Option<bool>,
}

impl TaskConfig {
    pub fn lock_ttl(&self) -> Duration {
        match self.lock_seconds {
            0 => DEFAULT_LOCK_TTL,
            secs => Duration::from_secs(secs),
        }
    }

    /// Descriptor named `name` carrying exactly the configured values.
    ///
    /// No defaults are applied and nothing is validated; see
    /// [`TaskConfig::into_descriptor`] for the checked variant.
    pub fn to_descriptor(&self, name: impl Into<String>) -> TaskDescriptor {
        TaskDescriptor::new(name)
            .with_mode(self.mode)
            .with_lock_key_prefix(self.lock_prefix.clone())
            .with_lock_ttl(self.lock_ttl())
            .with_auto_release(self.auto_unlock)
            .with_competitive(self.compete)
            .with_spec(self.spec.clone())
            .with_args(self.args.clone())
            .with_overlap(self.overlap)
            .with_precheck(self.precheck.unwrap_or(true))
    }

    /// Turn the loaded config into a validated descriptor named `name`.
    ///
    /// `app_name` is the fallback lock prefix.
    pub fn into_descriptor(
        self,
        name: impl Into<String>,
        app_name: &str,
    ) -> Result<TaskDescriptor, ModelError> {
        let mut task = self.to_descriptor(name);
        task.apply_defaults(app_name);
        task.validate()?;
        Ok(task)
    }
}
