//! Execution controller for one task.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use rota_model::{LockKey, Mode, TaskDescriptor};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};

use crate::{
    Event, EventKind, HandlerRef, LockRef, RunKind, ScheduleError, SubscriberRef,
    trigger::{Callback, TriggerEngine, TriggerFactory},
};

mod builder;
pub use builder::ScheduleBuilder;

mod election;
mod run;

/// State shared by the controller and every run it spawns.
pub(crate) struct Inner {
    task: Arc<TaskDescriptor>,
    lock_key: LockKey,
    lock: Option<LockRef>,
    once: Option<HandlerRef>,
    periodic: Option<HandlerRef>,
    subscribers: Vec<SubscriberRef>,
    tracker: TaskTracker,
    /// Set while a run holds the overlap guard.
    running: AtomicBool,
}

impl Inner {
    fn event(&self, kind: EventKind, run: RunKind) -> Event {
        Event::new(kind, self.task.name.as_str(), run)
    }

    async fn emit(&self, event: Event) {
        for sub in &self.subscribers {
            sub.on_event(&event).await;
        }
    }
}

/// One task wired to its handlers, lock and trigger engine.
///
/// Built with [`Schedule::builder`]. `serve` activates the configured mode and
/// returns immediately; runs execute in the background, tracked so that
/// [`Schedule::drain`] can wait for them.
pub struct Schedule {
    inner: Arc<Inner>,
    trigger_factory: TriggerFactory,
    trigger: Mutex<Option<Box<dyn TriggerEngine>>>,
    serving: AtomicBool,
}

impl Schedule {
    pub fn builder(name: impl Into<String>) -> ScheduleBuilder {
        ScheduleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.task.name
    }

    pub fn task(&self) -> &Arc<TaskDescriptor> {
        &self.inner.task
    }

    pub fn lock_key(&self) -> &str {
        &self.inner.lock_key
    }

    /// Whether `serve` has activated the schedule and `shutdown` has not run since.
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Number of runs currently executing.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Activate the schedule according to its mode.
    ///
    /// Never waits for runs. Fails only when the trigger engine rejects the
    /// spec, or when the schedule is already serving.
    ///
    /// The once run is spawned before the spec is registered, so with
    /// [`Mode::OnceAndPeriodic`] a rejected spec still leaves that run going.
    #[instrument(level = "debug", skip(self), fields(task = %self.inner.task.name))]
    pub async fn serve(&self) -> Result<(), ScheduleError> {
        let mode = self.inner.task.mode;
        if mode == Mode::Stopped {
            info!(task = %self.name(), "schedule is stopped, nothing to serve");
            return Ok(());
        }
        if self.serving.swap(true, Ordering::AcqRel) {
            return Err(ScheduleError::AlreadyServing {
                task: self.name().to_string(),
            });
        }

        if mode.runs_once() {
            self.serve_once();
        }
        if mode.is_periodic() {
            if let Err(err) = self.serve_periodic() {
                self.serving.store(false, Ordering::Release);
                return Err(err);
            }
        }
        info!(task = %self.name(), %mode, "schedule serving");
        Ok(())
    }

    fn serve_once(&self) {
        match &self.inner.once {
            Some(handler) => run::spawn(&self.inner, RunKind::Once, Arc::clone(handler)),
            None => debug!(task = %self.name(), "no once handler configured"),
        }
    }

    fn serve_periodic(&self) -> Result<(), ScheduleError> {
        let Some(handler) = self.inner.periodic.clone() else {
            debug!(task = %self.name(), "no periodic handler configured, skipping registration");
            return Ok(());
        };

        let inner = Arc::clone(&self.inner);
        let callback: Callback =
            Arc::new(move || run::spawn(&inner, RunKind::Periodic, Arc::clone(&handler)));

        let mut engine = (self.trigger_factory)();
        engine.register_periodic(&self.inner.task.spec, callback)?;
        info!(
            task = %self.name(),
            spec = %self.inner.task.spec,
            engine = engine.name(),
            "periodic trigger registered"
        );

        if let Some(mut previous) = self.trigger_slot().replace(engine) {
            previous.stop();
        }
        Ok(())
    }

    /// Stop future firings. Runs already executing are left alone; use
    /// [`Schedule::drain`] to wait for them.
    #[instrument(level = "debug", skip(self), fields(task = %self.inner.task.name))]
    pub async fn shutdown(&self) -> Result<(), ScheduleError> {
        if let Some(mut engine) = self.trigger_slot().take() {
            engine.stop();
            info!(task = %self.name(), "periodic trigger stopped");
        }
        self.serving.store(false, Ordering::Release);
        Ok(())
    }

    /// Wait until every run spawned so far has finished.
    pub async fn drain(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    fn trigger_slot(&self) -> MutexGuard<'_, Option<Box<dyn TriggerEngine>>> {
        self.trigger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Schedule {
    fn drop(&mut self) {
        if let Some(mut engine) = self.trigger_slot().take() {
            engine.stop();
        }
    }
}

#[cfg(test)]
mod tests;
