use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Local};
use tokio::{
    runtime::Handle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    TriggerError,
    trigger::{Callback, TriggerEngine},
};

const EVERY_PREFIX: &str = "@every";

/// Longest `@every` interval; anything longer cannot be put on a timer.
const MAX_EVERY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// How often a registration fires.
#[derive(Debug, Clone)]
pub(crate) enum Cadence {
    /// Fixed interval, first firing one interval after registration.
    Every(Duration),
    /// Calendar expression evaluated in local time.
    Cron(Box<::cron::Schedule>),
}

/// Parse a spec the way [`CronTrigger`] does, without registering it.
#[cfg(any(test, feature = "test-support"))]
pub(crate) fn validate_spec(spec: &str) -> Result<(), TriggerError> {
    parse_spec(spec).map(|_| ())
}

pub(crate) fn parse_spec(spec: &str) -> Result<Cadence, TriggerError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(TriggerError::EmptySpec);
    }
    let invalid = |reason: String| TriggerError::InvalidSpec {
        spec: spec.to_string(),
        reason,
    };

    if let Some(rest) = spec.strip_prefix(EVERY_PREFIX) {
        let raw = rest.trim();
        if raw.is_empty() {
            return Err(invalid("missing duration after @every".into()));
        }
        let every = humantime::parse_duration(raw).map_err(|e| invalid(e.to_string()))?;
        if every.is_zero() {
            return Err(invalid("interval must be greater than zero".into()));
        }
        if every > MAX_EVERY {
            return Err(invalid("interval must not exceed 100 years".into()));
        }
        return Ok(Cadence::Every(every));
    }

    ::cron::Schedule::from_str(spec)
        .map(|s| Cadence::Cron(Box::new(s)))
        .map_err(|e| invalid(e.to_string()))
}

/// Trigger engine backed by tokio timers.
///
/// Accepts `@every <duration>` (humantime syntax) and cron expressions with a
/// leading seconds field, including the `@hourly`-style shorthands. Each
/// registration runs on its own timer task; callbacks fire sequentially per
/// registration. Dropping the engine stops it.
pub struct CronTrigger {
    token: CancellationToken,
    registrations: usize,
}

impl CronTrigger {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            registrations: 0,
        }
    }

    pub fn registrations(&self) -> usize {
        self.registrations
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for CronTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEngine for CronTrigger {
    fn register_periodic(&mut self, spec: &str, callback: Callback) -> Result<(), TriggerError> {
        if self.is_stopped() {
            return Err(TriggerError::Stopped);
        }
        let cadence = parse_spec(spec)?;
        let runtime = Handle::try_current().map_err(|_| TriggerError::NoRuntime)?;

        let token = self.token.child_token();
        let spec = spec.trim().to_string();
        debug!(target: "rota.trigger", %spec, "registering periodic trigger");

        match cadence {
            Cadence::Every(every) => runtime.spawn(fire_every(every, callback, token)),
            Cadence::Cron(schedule) => runtime.spawn(fire_cron(spec, schedule, callback, token)),
        };
        self.registrations += 1;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.token.is_cancelled() {
            debug!(target: "rota.trigger", registrations = self.registrations, "stopping trigger");
            self.token.cancel();
        }
    }

    fn name(&self) -> &'static str {
        "cron"
    }
}

impl Drop for CronTrigger {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn fire_every(every: Duration, callback: Callback, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                trace!(target: "rota.trigger", every_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX), "tick");
                callback();
            }
        }
    }
}

async fn fire_cron(
    spec: String,
    schedule: Box<::cron::Schedule>,
    callback: Callback,
    token: CancellationToken,
) {
    let mut last: Option<DateTime<Local>> = None;

    loop {
        let now = Local::now();
        // Never fire the same occurrence twice when the timer wakes early.
        let from = last.map_or(now, |l| l.max(now));
        let Some(next) = schedule.after(&from).next() else {
            warn!(target: "rota.trigger", %spec, "schedule has no upcoming occurrences");
            return;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {
                trace!(target: "rota.trigger", %spec, at = %next, "tick");
                last = Some(next);
                callback();
            }
        }
    }
}
