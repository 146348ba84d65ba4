use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// How a schedule is activated by `serve`.
///
/// The mode is fixed when the schedule is built and read exactly once.
/// In configuration it is written either as the numeric code (`0`..=`3`)
/// or as its name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ModeRepr", into = "u8")]
pub enum Mode {
    /// Nothing runs; `serve` is a no-op.
    #[default]
    Stopped,
    /// Run the once-handler a single time when served.
    OnceOnly,
    /// Run the periodic handler on every trigger occurrence.
    PeriodicOnly,
    /// `OnceOnly` followed by `PeriodicOnly`, independently.
    OnceAndPeriodic,
}

impl Mode {
    /// Numeric code used in configuration files.
    pub fn code(self) -> u8 {
        match self {
            Mode::Stopped => 0,
            Mode::OnceOnly => 1,
            Mode::PeriodicOnly => 2,
            Mode::OnceAndPeriodic => 3,
        }
    }

    /// Short symbolic name, intended for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Stopped => "stopped",
            Mode::OnceOnly => "once",
            Mode::PeriodicOnly => "periodic",
            Mode::OnceAndPeriodic => "onceAndPeriodic",
        }
    }

    /// Returns `true` if serving fires the one-shot path.
    pub fn runs_once(self) -> bool {
        matches!(self, Mode::OnceOnly | Mode::OnceAndPeriodic)
    }

    /// Returns `true` if serving registers with a trigger engine.
    pub fn is_periodic(self) -> bool {
        matches!(self, Mode::PeriodicOnly | Mode::OnceAndPeriodic)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Mode {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Mode::Stopped),
            1 => Ok(Mode::OnceOnly),
            2 => Ok(Mode::PeriodicOnly),
            3 => Ok(Mode::OnceAndPeriodic),
            other => Err(ModelError::InvalidMode(other.to_string())),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode.code()
    }
}

impl FromStr for Mode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match norm.as_str() {
            "stopped" | "stop" => Ok(Mode::Stopped),
            "once" | "onceonly" => Ok(Mode::OnceOnly),
            "periodic" | "periodiconly" | "timing" => Ok(Mode::PeriodicOnly),
            "onceandperiodic" | "onceandtiming" => Ok(Mode::OnceAndPeriodic),
            _ => match norm.parse::<u8>() {
                Ok(code) => Mode::try_from(code),
                Err(_) => Err(ModelError::InvalidMode(s.to_string())),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<ModeRepr> for Mode {
    type Error = ModelError;

    fn try_from(repr: ModeRepr) -> Result<Self, Self::Error> {
        match repr {
            ModeRepr::Code(code) => Mode::try_from(code),
            ModeRepr::Name(name) => name.parse(),
        }
    }
}
