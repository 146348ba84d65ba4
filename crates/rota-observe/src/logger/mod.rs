mod config;
mod error;
mod format;
mod init;

pub use config::{ENV_LOG_FORMAT, ENV_LOG_LEVEL, LoggerConfig};
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use init::logger_init;
