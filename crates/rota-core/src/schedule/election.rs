use tracing::{debug, error, info};

use crate::{EventKind, RunKind, schedule::Inner};

/// Outcome of the leadership check for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Leadership {
    /// Election disabled; every instance runs.
    Granted,
    /// This instance acquired the lock.
    Won,
    /// Another instance holds or took the lock.
    Lost,
    /// The backend failed; treated as not the winner.
    Failed,
}

impl Leadership {
    pub(super) fn may_run(self) -> bool {
        matches!(self, Leadership::Granted | Leadership::Won)
    }

    pub(super) fn is_winner(self) -> bool {
        self == Leadership::Won
    }
}

pub(super) async fn elect(inner: &Inner, run: RunKind) -> Leadership {
    let task = &inner.task;
    if !task.competitive {
        return Leadership::Granted;
    }

    let key = inner.lock_key.as_str();
    let Some(lock) = inner.lock.as_ref() else {
        error!(key, "competitive schedule has no lock, skipping run");
        inner
            .emit(inner.event(EventKind::ElectionFailed, run).with_reason("no lock configured"))
            .await;
        return Leadership::Failed;
    };

    if task.precheck {
        match lock.is_held(key).await {
            Ok(false) => {}
            Ok(true) => {
                info!(key, backend = lock.name(), "lock is held by another instance, skipping run");
                inner
                    .emit(inner.event(EventKind::ElectionLost, run).with_reason("lock already held"))
                    .await;
                return Leadership::Lost;
            }
            Err(err) => {
                error!(key, backend = lock.name(), error = %err, "lock check failed, skipping run");
                inner
                    .emit(inner.event(EventKind::ElectionFailed, run).with_reason(err.to_string()))
                    .await;
                return Leadership::Failed;
            }
        }
    }

    match lock.try_acquire(key, task.lock_ttl).await {
        Ok(true) => {
            debug!(key, ttl_ms = u64::try_from(task.lock_ttl.as_millis()).unwrap_or(u64::MAX), "lock acquired");
            Leadership::Won
        }
        Ok(false) => {
            info!(key, backend = lock.name(), "lost the lock race, skipping run");
            inner
                .emit(inner.event(EventKind::ElectionLost, run).with_reason("acquire rejected"))
                .await;
            Leadership::Lost
        }
        Err(err) => {
            error!(key, backend = lock.name(), error = %err, "lock acquisition failed, skipping run");
            inner
                .emit(inner.event(EventKind::ElectionFailed, run).with_reason(err.to_string()))
                .await;
            Leadership::Failed
        }
    }
}

pub(super) async fn release(inner: &Inner, run: RunKind) {
    let Some(lock) = inner.lock.as_ref() else {
        return;
    };
    let key = inner.lock_key.as_str();

    match lock.release(key).await {
        Ok(()) => {
            debug!(key, "lock released");
            inner.emit(inner.event(EventKind::LockReleased, run)).await;
        }
        Err(err) => {
            error!(key, backend = lock.name(), error = %err, "lock release failed");
            inner
                .emit(inner.event(EventKind::LockReleaseFailed, run).with_reason(err.to_string()))
                .await;
        }
    }
}
