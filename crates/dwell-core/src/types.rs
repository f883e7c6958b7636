//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for configuration and analysis windows.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The smoothing factor was outside the open interval (0, 1).
    #[error("alpha must be strictly between 0.0 and 1.0, got {value}")]
    AlphaOutOfRange { value: f64 },

    /// A threshold was negative or not a number.
    #[error("{field} must be a non-negative number, got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },

    /// A ratio was outside \[0.0, 1.0\].
    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    RatioOutOfRange { field: &'static str, value: f64 },

    /// An hour of day was outside 0..24.
    #[error("{field} must be an hour between 0 and 23, got {value}")]
    HourOutOfRange { field: &'static str, value: u32 },

    /// A count or duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    /// The analysis window ends before it starts.
    #[error("analysis window end {end} is before start {start}")]
    InvertedWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// The seven sensor kinds understood by the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Heart,
    Breath,
    Radar,
    Pir,
    Light,
    DoorOpen,
    DoorClose,
}

impl SensorKind {
    /// Canonical name used in output and configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "heart_rate",
            Self::Breath => "breathing",
            Self::Radar => "radar_activity",
            Self::Pir => "pir_activity",
            Self::Light => "ambient_light",
            Self::DoorOpen => "door_open",
            Self::DoorClose => "door_close",
        }
    }

    /// Vital-sign sensors report several trailing per-minute samples at once.
    #[must_use]
    pub const fn is_vital(&self) -> bool {
        matches!(self, Self::Heart | Self::Breath)
    }

    /// Motion sensors feed the outing detector's presence checks.
    #[must_use]
    pub const fn is_motion(&self) -> bool {
        matches!(self, Self::Radar | Self::Pir)
    }

    /// Door sensors carry no value, only the instant.
    #[must_use]
    pub const fn is_door(&self) -> bool {
        matches!(self, Self::DoorOpen | Self::DoorClose)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = UnknownSensorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name.to_ascii_lowercase().as_str() {
            "heart_rate" | "heart" | "heartrate" => return Ok(Self::Heart),
            "breathing" | "breath" | "respiration" => return Ok(Self::Breath),
            "radar_activity" | "radar" => return Ok(Self::Radar),
            "pir_activity" | "pir" => return Ok(Self::Pir),
            "ambient_light" | "light" | "illuminance" => return Ok(Self::Light),
            "door_open" => return Ok(Self::DoorOpen),
            "door_close" | "door_closed" => return Ok(Self::DoorClose),
            _ => {}
        }

        // Gateway measurement names are localized and sometimes decorated
        // with units or suffixes, so they are matched by substring.
        if name.contains("문열림") {
            Ok(Self::DoorOpen)
        } else if name.contains("문닫힘") {
            Ok(Self::DoorClose)
        } else if name.contains("심박") {
            Ok(Self::Heart)
        } else if name.contains("호흡") {
            Ok(Self::Breath)
        } else if name.contains("레이더") {
            Ok(Self::Radar)
        } else if name.contains("PIR") {
            Ok(Self::Pir)
        } else if name.contains("조도") {
            Ok(Self::Light)
        } else {
            Err(UnknownSensorKind(name.to_string()))
        }
    }
}

impl Serialize for SensorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SensorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unrecognized sensor names.
#[derive(Debug, Clone, Error)]
#[error("unknown sensor kind: {0}")]
pub struct UnknownSensorKind(String);

/// Where the monitored person sleeps, judged from which sensors see them at night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// Vital-sign and radar sensors cover the bed.
    Bedroom,
    /// Only the PIR sensor sees the sleeper.
    LivingRoom,
}

impl RoomType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bedroom => "bedroom",
            Self::LivingRoom => "living_room",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that a threshold is a usable non-negative number.
pub(crate) fn check_threshold(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < 0.0 {
        return Err(ValidationError::InvalidThreshold { field, value });
    }
    Ok(())
}

/// Checks that a ratio lies in \[0.0, 1.0\].
pub(crate) fn check_ratio(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::RatioOutOfRange { field, value });
    }
    Ok(())
}
