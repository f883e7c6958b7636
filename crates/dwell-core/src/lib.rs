//! Core inference logic for dwell.
//!
//! This crate turns raw home sensor observations into:
//! - Sleep: room classification and per-night sleep periods
//! - Outings: departures and returns inferred from door events
//! - Activity: daily motion totals and per-user summaries

mod analysis;
pub mod grid;
pub mod observation;
pub mod outing;
pub mod period;
pub mod room;
pub mod sleep;
mod stats;
pub mod types;

pub use analysis::{
    AnalysisConfig, AnalysisReport, AnalysisWindow, UserInput, UserReport, analyze, analyze_batch,
};
pub use grid::{GridConfig, TimeGrid};
pub use observation::{Reading, SensorObservation, expand_readings, parse_timestamp};
pub use outing::{OutingAnalysis, OutingConfig, detect_outings};
pub use period::{Period, Presence, StatusEvent};
pub use sleep::{DailySleep, SleepAnalysis, SleepConfig, segment_sleep};
pub use stats::{DailyActivity, UserSummary, daily_activity};
pub use types::{RoomType, SensorKind, UnknownSensorKind, ValidationError};
