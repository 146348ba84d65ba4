use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::logger::error::LoggerError;

/// Output sink for log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerFormat {
    /// Human-readable lines on stdout.
    #[default]
    Text,
    /// One JSON object per line on stdout.
    Json,
    /// systemd journal; needs the `journald` feature on Linux.
    Journald,
}

impl LoggerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        }
    }

    pub fn is_supported(&self) -> bool {
        match self {
            LoggerFormat::Journald => cfg!(all(target_os = "linux", feature = "journald")),
            _ => true,
        }
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => LoggerFormat::Text,
            "json" => LoggerFormat::Json,
            "journald" | "journal" => LoggerFormat::Journald,
            _ => return Err(LoggerError::InvalidFormat(s.to_string())),
        };
        if !format.is_supported() {
            return Err(LoggerError::JournaldNotSupported);
        }
        Ok(format)
    }
}
