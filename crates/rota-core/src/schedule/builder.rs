use std::sync::{Arc, Mutex, atomic::AtomicBool};

use rota_model::{TaskConfig, TaskDescriptor};
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::{
    HandlerRef, LockRef, ScheduleError, SubscriberRef,
    schedule::{Inner, Schedule},
    trigger::{TriggerFactory, cron_factory},
};

/// Assembles a [`Schedule`] from named options.
///
/// Defaults are applied and the configuration is validated in
/// [`ScheduleBuilder::build`], so a `Schedule` that exists is always servable.
pub struct ScheduleBuilder {
    task: TaskDescriptor,
    app_name: String,
    lock: Option<LockRef>,
    once: Option<HandlerRef>,
    periodic: Option<HandlerRef>,
    trigger_factory: Option<TriggerFactory>,
    subscribers: Vec<SubscriberRef>,
}

impl ScheduleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            task: TaskDescriptor::new(name),
            app_name: String::new(),
            lock: None,
            once: None,
            periodic: None,
            trigger_factory: None,
            subscribers: Vec::new(),
        }
    }

    /// Edit the task descriptor in place.
    pub fn with_task(mut self, f: impl FnOnce(TaskDescriptor) -> TaskDescriptor) -> Self {
        self.task = f(self.task);
        self
    }

    /// Replace the task descriptor, name included.
    pub fn with_descriptor(mut self, task: TaskDescriptor) -> Self {
        self.task = task;
        self
    }

    /// Take every task option from a loaded config entry, keeping the name.
    pub fn with_config(mut self, config: &TaskConfig) -> Self {
        self.task = config.to_descriptor(self.task.name.clone());
        self
    }

    /// Application name; the fallback lock key prefix.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_lock(mut self, lock: LockRef) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_once_handler(mut self, handler: HandlerRef) -> Self {
        self.once = Some(handler);
        self
    }

    pub fn with_periodic_handler(mut self, handler: HandlerRef) -> Self {
        self.periodic = Some(handler);
        self
    }

    /// Engine factory for periodic modes; defaults to [`cron_factory`].
    pub fn with_trigger_factory(mut self, factory: TriggerFactory) -> Self {
        self.trigger_factory = Some(factory);
        self
    }

    pub fn with_subscriber(mut self, subscriber: SubscriberRef) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn with_subscribers(mut self, subscribers: impl IntoIterator<Item = SubscriberRef>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    pub fn build(self) -> Result<Schedule, ScheduleError> {
        let mut task = self.task;
        task.apply_defaults(&self.app_name);
        task.validate()?;

        if task.competitive && self.lock.is_none() {
            return Err(ScheduleError::MissingLock { task: task.name });
        }

        let lock_key = task.lock_key();
        debug!(
            task = %task.name,
            mode = %task.mode,
            lock_key = %lock_key,
            competitive = task.competitive,
            "schedule built"
        );

        let inner = Inner {
            task: Arc::new(task),
            lock_key,
            lock: self.lock,
            once: self.once,
            periodic: self.periodic,
            subscribers: self.subscribers,
            tracker: TaskTracker::new(),
            running: AtomicBool::new(false),
        };

        Ok(Schedule {
            inner: Arc::new(inner),
            trigger_factory: self.trigger_factory.unwrap_or_else(cron_factory),
            trigger: Mutex::new(None),
            serving: AtomicBool::new(false),
        })
    }
}
