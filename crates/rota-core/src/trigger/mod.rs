use std::sync::Arc;

use crate::TriggerError;

mod cron;
pub use cron::CronTrigger;
#[cfg(any(test, feature = "test-support"))]
pub(crate) use cron::validate_spec;

/// Invoked by a trigger engine at every occurrence of a registered spec.
///
/// Must return quickly: the engine calls it inline from its timer task.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Fires callbacks on a schedule.
pub trait TriggerEngine: Send + 'static {
    /// Start firing `callback` at every occurrence of `spec`.
    ///
    /// Rejects empty or malformed specs without registering anything.
    fn register_periodic(&mut self, spec: &str, callback: Callback) -> Result<(), TriggerError>;

    /// Halt future firings. Callbacks already running are not interrupted.
    fn stop(&mut self);

    fn name(&self) -> &'static str {
        "trigger"
    }
}

/// Creates a fresh engine for every `serve` that needs one.
pub type TriggerFactory = Arc<dyn Fn() -> Box<dyn TriggerEngine> + Send + Sync>;

/// Factory producing [`CronTrigger`] engines.
pub fn cron_factory() -> TriggerFactory {
    Arc::new(|| -> Box<dyn TriggerEngine> { Box::new(CronTrigger::new()) })
}
