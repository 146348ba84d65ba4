//! Public data model for rota schedules.
//!
//! Everything here is plain data: the controller in `rota-core` consumes these
//! types but nothing in this crate performs I/O or spawns work.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod config;
pub use config::{SchedulesConfig, TaskConfig};
