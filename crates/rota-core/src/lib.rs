//! Leader-election-gated execution of recurring and one-shot tasks.
//!
//! A [`Schedule`] owns one task. When served it fires the one-shot path, the
//! periodic path (through a [`TriggerEngine`]) or both. Every firing becomes an
//! independent run: an optional overlap check, leader election through a
//! [`LockCapability`], the handler itself with panic isolation, and the
//! optional lock release.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rota_core::{MemoryLock, Schedule, handler_fn};
//! use rota_model::Mode;
//!
//! # async fn example() -> Result<(), rota_core::ScheduleError> {
//! let schedule = Schedule::builder("cleanup")
//!     .with_app_name("billing")
//!     .with_task(|t| t.with_mode(Mode::PeriodicOnly).with_spec("@every 30s").with_competitive(true))
//!     .with_lock(Arc::new(MemoryLock::new()))
//!     .with_periodic_handler(handler_fn(|task| async move {
//!         tracing::info!(task = %task.name, "cleaning up");
//!         Ok::<_, rota_core::HandlerError>(())
//!     }))
//!     .build()?;
//!
//! schedule.serve().await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{LockError, ScheduleError, TriggerError};

pub mod event;
pub use event::{Event, EventKind, RunKind, Subscribe, SubscriberRef};

pub mod handler;
pub use handler::{Handler, HandlerError, HandlerFn, HandlerRef, HandlerResult, handler_fn};

mod instance;
pub use instance::{holder_token, instance_id};

pub mod lock;
pub use lock::{LockCapability, LockRef, MemoryLock};

pub mod trigger;
pub use trigger::{Callback, CronTrigger, TriggerEngine, TriggerFactory, cron_factory};

pub mod schedule;
pub use schedule::{Schedule, ScheduleBuilder};

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use rota_model;
