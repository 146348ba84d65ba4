use std::sync::atomic::{AtomicBool, Ordering};

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber described by `cfg`.
///
/// A second call fails with [`LoggerError::AlreadyInitialized`].
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    if INSTALLED.load(Ordering::Acquire) {
        return Err(LoggerError::AlreadyInitialized);
    }
    let filter = mk_filter(&cfg.level)?;

    let res = match cfg.format {
        LoggerFormat::Text => {
            let layer = fmt::layer()
                .with_ansi(cfg.use_color)
                .with_target(cfg.with_targets)
                .with_timer(mk_timer());
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
        LoggerFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(cfg.with_targets)
                .with_current_span(true)
                .with_timer(mk_timer());
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
        LoggerFormat::Journald => mk_journald(filter),
    };
    if res.is_ok() {
        INSTALLED.store(true, Ordering::Release);
    }
    res
}

fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .map_err(|e| LoggerError::InitializationFailed(e.to_string()))
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald(filter: EnvFilter) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?;
    init_with(tracing_subscriber::registry().with(filter).with(journald))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}
