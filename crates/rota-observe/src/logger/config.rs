use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Env var holding the log format (`text`, `json`, `journald`).
pub const ENV_LOG_FORMAT: &str = "ROTA_LOG_FORMAT";
/// Env var holding an `EnvFilter` directive; `RUST_LOG` is the fallback.
pub const ENV_LOG_LEVEL: &str = "ROTA_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `info,rota_core=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `ROTA_LOG_FORMAT` and `ROTA_LOG` / `RUST_LOG`.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            cfg.format = format.parse()?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).or_else(|| lookup("RUST_LOG")) {
            let level = level.trim();
            if !level.is_empty() {
                cfg.level = level.to_string();
            }
        }
        Ok(cfg)
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}
