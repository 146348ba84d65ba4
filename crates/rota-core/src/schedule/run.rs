use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{Instrument, Span, error, info, info_span, warn};

use rota_model::OverlapPolicy;

use crate::{
    EventKind, HandlerRef, RunKind,
    schedule::{Inner, election},
};

/// Spawn one run into the schedule's tracker. Returns immediately.
pub(super) fn spawn(inner: &Arc<Inner>, run: RunKind, handler: HandlerRef) {
    let span = info_span!("run", task = %inner.task.name, run = %run);
    let inner = Arc::clone(inner);
    let tracker = inner.tracker.clone();
    tracker.spawn(execute(inner, run, handler).instrument(span));
}

async fn execute(inner: Arc<Inner>, run: RunKind, handler: HandlerRef) {
    let Some(_guard) = OverlapGuard::enter(&inner.running, inner.task.overlap) else {
        info!("previous run is still active, skipping");
        inner.emit(inner.event(EventKind::OverlapSkipped, run)).await;
        return;
    };

    let leadership = election::elect(&inner, run).await;
    if !leadership.may_run() {
        return;
    }

    inner.emit(inner.event(EventKind::RunStarting, run)).await;

    // The handler gets its own task so a panic stops at the join handle.
    let task = Arc::clone(&inner.task);
    let outcome = tokio::spawn(async move { handler.handle(task).await }.instrument(Span::current())).await;

    match outcome {
        Ok(Ok(())) => {
            info!("run succeeded");
            inner.emit(inner.event(EventKind::RunSucceeded, run)).await;
        }
        Ok(Err(err)) => {
            error!(error = %err, "run failed");
            inner
                .emit(inner.event(EventKind::RunFailed, run).with_reason(err.to_string()))
                .await;
        }
        Err(join) if join.is_panic() => {
            let message = panic_message(join.into_panic());
            // The backtrace, if any, was logged by the process panic hook.
            error!(panic = %message, "run crashed");
            inner
                .emit(inner.event(EventKind::RunCrashed, run).with_reason(message))
                .await;
        }
        Err(join) => {
            warn!(error = %join, "run was cancelled");
            inner
                .emit(inner.event(EventKind::RunFailed, run).with_reason(join.to_string()))
                .await;
        }
    }

    if leadership.is_winner() && inner.task.auto_release {
        election::release(&inner, run).await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Marks a run as active for the `Skip` overlap policy.
///
/// Under `Allow` the guard tracks nothing and always enters.
struct OverlapGuard<'a> {
    flag: Option<&'a AtomicBool>,
}

impl<'a> OverlapGuard<'a> {
    fn enter(flag: &'a AtomicBool, policy: OverlapPolicy) -> Option<Self> {
        if policy.allows_overlap() {
            return Some(Self { flag: None });
        }
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: Some(flag) })
    }
}

impl Drop for OverlapGuard<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.flag {
            flag.store(false, Ordering::Release);
        }
    }
}
