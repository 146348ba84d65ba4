//! Test doubles for the lock, trigger and handler seams.
//!
//! Enabled for this crate's tests and, through the `test-support` feature,
//! for downstream crates.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rota_model::TaskDescriptor;
use tokio::sync::{Notify, Semaphore};

use crate::{
    Event, EventKind, Handler, HandlerResult, LockCapability, LockError, Subscribe, TriggerError,
    trigger::{Callback, TriggerEngine, TriggerFactory, validate_spec},
};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock whose answers are set by the test. Counts every call.
#[derive(Default)]
pub struct ScriptedLock {
    held: AtomicBool,
    grant: AtomicBool,
    fail_is_held: AtomicBool,
    fail_acquire: AtomicBool,
    fail_release: AtomicBool,
    is_held_calls: AtomicUsize,
    acquire_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

impl ScriptedLock {
    /// `is_held` false, `try_acquire` true.
    pub fn granting() -> Arc<Self> {
        let lock = Self::default();
        lock.grant.store(true, Ordering::SeqCst);
        Arc::new(lock)
    }

    /// `is_held` false, `try_acquire` false.
    pub fn denying() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `is_held` true.
    pub fn held() -> Arc<Self> {
        let lock = Self::default();
        lock.held.store(true, Ordering::SeqCst);
        Arc::new(lock)
    }

    pub fn set_grant(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    pub fn set_held(&self, held: bool) {
        self.held.store(held, Ordering::SeqCst);
    }

    pub fn fail_is_held(&self, fail: bool) {
        self.fail_is_held.store(fail, Ordering::SeqCst);
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn is_held_calls(&self) -> usize {
        self.is_held_calls.load(Ordering::SeqCst)
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.is_held_calls() + self.acquire_calls() + self.release_calls()
    }
}

#[async_trait]
impl LockCapability for ScriptedLock {
    async fn try_acquire(&self, _key: &str, _ttl: Duration) -> Result<bool, LockError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("scripted acquire failure".into()));
        }
        Ok(self.grant.load(Ordering::SeqCst))
    }

    async fn is_held(&self, _key: &str) -> Result<bool, LockError> {
        self.is_held_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_is_held.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("scripted read failure".into()));
        }
        Ok(self.held.load(Ordering::SeqCst))
    }

    async fn release(&self, _key: &str) -> Result<(), LockError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(LockError::Backend("scripted release failure".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Default)]
struct ManualState {
    callbacks: Vec<Callback>,
    specs: Vec<String>,
    engines: usize,
    stopped: bool,
}

/// Trigger fired by hand. Specs are validated like the cron engine does.
#[derive(Clone, Default)]
pub struct ManualTrigger {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> TriggerFactory {
        let shared = self.clone();
        Arc::new(move || -> Box<dyn TriggerEngine> {
            {
                let mut state = locked(&shared.state);
                state.engines += 1;
                state.stopped = false;
            }
            Box::new(ManualEngine {
                shared: shared.clone(),
                stopped: false,
            })
        })
    }

    /// Invoke every registered callback once. Returns how many fired.
    pub fn fire(&self) -> usize {
        let callbacks = {
            let state = locked(&self.state);
            if state.stopped {
                return 0;
            }
            state.callbacks.clone()
        };
        for cb in &callbacks {
            cb();
        }
        callbacks.len()
    }

    pub fn engines_created(&self) -> usize {
        locked(&self.state).engines
    }

    pub fn registered_specs(&self) -> Vec<String> {
        locked(&self.state).specs.clone()
    }

    pub fn is_stopped(&self) -> bool {
        locked(&self.state).stopped
    }
}

struct ManualEngine {
    shared: ManualTrigger,
    stopped: bool,
}

impl TriggerEngine for ManualEngine {
    fn register_periodic(&mut self, spec: &str, callback: Callback) -> Result<(), TriggerError> {
        if self.stopped {
            return Err(TriggerError::Stopped);
        }
        validate_spec(spec)?;
        let mut state = locked(&self.shared.state);
        state.callbacks.push(callback);
        state.specs.push(spec.to_string());
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
        let mut state = locked(&self.shared.state);
        state.callbacks.clear();
        state.stopped = true;
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Subscriber that keeps every event it receives.
#[derive(Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<Event>>,
    notify: Notify,
}

impl RecordingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        locked(&self.events).clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        locked(&self.events).iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        locked(&self.events).iter().filter(|e| e.kind == kind).count()
    }

    /// Resolve once at least `n` events of `kind` have been recorded.
    pub async fn wait_for(&self, kind: EventKind, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.count(kind) >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Subscribe for RecordingSubscriber {
    async fn on_event(&self, event: &Event) {
        locked(&self.events).push(event.clone());
        self.notify.notify_waiters();
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

enum Behavior {
    Succeed,
    Fail(String),
    Panic(String),
    Sleep(Duration),
    Gated(Arc<Semaphore>),
}

/// Handler that counts invocations and behaves as configured.
pub struct CountingHandler {
    calls: AtomicUsize,
    seen: Mutex<Vec<Arc<TaskDescriptor>>>,
    behavior: Behavior,
}

impl CountingHandler {
    fn with(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            behavior,
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::with(Behavior::Succeed)
    }

    pub fn failing(reason: impl Into<String>) -> Arc<Self> {
        Self::with(Behavior::Fail(reason.into()))
    }

    pub fn panicking(message: impl Into<String>) -> Arc<Self> {
        Self::with(Behavior::Panic(message.into()))
    }

    pub fn sleeping(duration: Duration) -> Arc<Self> {
        Self::with(Behavior::Sleep(duration))
    }

    /// Blocks every invocation until [`CountingHandler::open`] is called.
    pub fn gated() -> Arc<Self> {
        Self::with(Behavior::Gated(Arc::new(Semaphore::new(0))))
    }

    pub fn open(&self) {
        if let Behavior::Gated(gate) = &self.behavior {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Descriptors passed to each invocation, in call order.
    pub fn seen(&self) -> Vec<Arc<TaskDescriptor>> {
        locked(&self.seen).clone()
    }
}

#[async_trait]
impl Handler for CountingHandler {
    async fn handle(&self, task: Arc<TaskDescriptor>) -> HandlerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.seen).push(task);

        match &self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(reason) => Err(reason.clone().into()),
            Behavior::Panic(message) => panic!("{message}"),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            Behavior::Gated(gate) => {
                let _permit = gate.acquire().await?;
                Ok(())
            }
        }
    }
}
