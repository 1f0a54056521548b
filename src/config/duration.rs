//! Human-readable durations for configuration files.
//!
//! Textual form is `<integer><suffix>` with an optional space in between,
//! e.g. `250ms`, `30 s`, `1d`. The unit a value was written in is kept so it
//! renders back to the same literal; comparison uses nanoseconds only.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Unit a duration is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Units ordered so that longer suffixes are tried before the shorter
    /// ones they end with (`ms` before `s`).
    const PARSE_ORDER: [TimeUnit; 7] = [
        TimeUnit::Nanoseconds,
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    pub fn nanos_per_unit(self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 60 * 60 * 1_000_000_000,
            TimeUnit::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }
}

/// Errors produced when parsing or building a [`ConfigDuration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration format '{0}': expected <integer><ns|us|ms|s|m|h|d>")]
    InvalidFormat(String),

    #[error("invalid duration magnitude '{0}'")]
    InvalidMagnitude(String),

    #[error("duration {magnitude}{suffix} overflows")]
    Overflow { magnitude: u64, suffix: &'static str },
}

/// A duration remembered in the unit it was written in.
#[derive(Debug, Clone, Copy)]
pub struct ConfigDuration {
    magnitude: u64,
    unit: TimeUnit,
    nanos: u64,
}

impl ConfigDuration {
    pub fn new(magnitude: u64, unit: TimeUnit) -> Result<Self, DurationError> {
        let nanos = magnitude
            .checked_mul(unit.nanos_per_unit())
            .ok_or(DurationError::Overflow {
                magnitude,
                suffix: unit.suffix(),
            })?;
        Ok(Self {
            magnitude,
            unit,
            nanos,
        })
    }

    pub const fn from_secs(secs: u32) -> Self {
        Self {
            magnitude: secs as u64,
            unit: TimeUnit::Seconds,
            nanos: secs as u64 * 1_000_000_000,
        }
    }

    pub const fn from_millis(millis: u32) -> Self {
        Self {
            magnitude: millis as u64,
            unit: TimeUnit::Milliseconds,
            nanos: millis as u64 * 1_000_000,
        }
    }

    /// Parse the textual form.
    pub fn parse(input: &str) -> Result<Self, DurationError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(DurationError::Empty);
        }

        for unit in TimeUnit::PARSE_ORDER {
            let Some(number) = text.strip_suffix(unit.suffix()) else {
                continue;
            };
            let number = number.trim_end();
            if number.is_empty() {
                return Err(DurationError::InvalidFormat(input.to_string()));
            }
            if !number.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let magnitude = number
                .parse::<u64>()
                .map_err(|_| DurationError::InvalidMagnitude(number.to_string()))?;
            return Self::new(magnitude, unit);
        }

        Err(DurationError::InvalidFormat(input.to_string()))
    }

    pub fn magnitude(&self) -> u64 {
        self.magnitude
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos
    }

    pub fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub fn to_std(&self) -> Duration {
        Duration::from_nanos(self.nanos)
    }
}

impl fmt::Display for ConfigDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

impl FromStr for ConfigDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ConfigDuration> for Duration {
    fn from(value: ConfigDuration) -> Self {
        value.to_std()
    }
}

impl PartialEq for ConfigDuration {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for ConfigDuration {}

impl Hash for ConfigDuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl PartialOrd for ConfigDuration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConfigDuration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Serialize for ConfigDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfigDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
