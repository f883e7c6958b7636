//! Per-minute alignment of irregular sensor readings.
//!
//! Every engine that looks at "what the home looked like at minute t" reads
//! from a [`TimeGrid`]: one row per minute over the analysis window, each
//! column carrying the most recent reading forward until a newer one arrives.
//!
//! # Forward fill
//!
//! Values are only ever carried forward, never backward: minutes before the
//! first reading of a sensor stay missing. By default the carry has no age
//! limit; [`GridConfig::max_fill_gap_minutes`] caps it so that a sensor that
//! went silent stops being reported after the given number of minutes.
//!
//! # Light threshold
//!
//! "Dark" is relative to the room: within each 12-hour bucket (00:00-11:59
//! and 12:00-23:59) a minute is dark when its light level is at most the
//! bucket minimum plus one.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::observation::Reading;
use crate::types::SensorKind;

/// A column of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Heart,
    Breath,
    Radar,
    Pir,
    Light,
}

impl Channel {
    const fn index(self) -> usize {
        match self {
            Self::Heart => 0,
            Self::Breath => 1,
            Self::Radar => 2,
            Self::Pir => 3,
            Self::Light => 4,
        }
    }

    /// Maps a sensor kind to its grid column. Door sensors have none.
    #[must_use]
    pub const fn from_kind(kind: SensorKind) -> Option<Self> {
        match kind {
            SensorKind::Heart => Some(Self::Heart),
            SensorKind::Breath => Some(Self::Breath),
            SensorKind::Radar => Some(Self::Radar),
            SensorKind::Pir => Some(Self::Pir),
            SensorKind::Light => Some(Self::Light),
            SensorKind::DoorOpen | SensorKind::DoorClose => None,
        }
    }
}

/// Grid construction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Maximum age in minutes of a carried-forward value. `None` carries
    /// values indefinitely.
    pub max_fill_gap_minutes: Option<i64>,
}

/// Sensor values at one minute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRow {
    pub at: NaiveDateTime,
    values: [Option<f64>; 5],
}

impl GridRow {
    fn empty(at: NaiveDateTime) -> Self {
        Self {
            at,
            values: [None; 5],
        }
    }

    /// Value of a column, `None` while the sensor has not reported yet.
    #[must_use]
    pub const fn get(&self, channel: Channel) -> Option<f64> {
        self.values[channel.index()]
    }

    #[must_use]
    pub const fn heart(&self) -> Option<f64> {
        self.get(Channel::Heart)
    }

    #[must_use]
    pub const fn breath(&self) -> Option<f64> {
        self.get(Channel::Breath)
    }

    #[must_use]
    pub const fn radar(&self) -> Option<f64> {
        self.get(Channel::Radar)
    }

    #[must_use]
    pub const fn pir(&self) -> Option<f64> {
        self.get(Channel::Pir)
    }

    #[must_use]
    pub const fn light(&self) -> Option<f64> {
        self.get(Channel::Light)
    }

    /// True when heart, breath and radar all read above zero.
    #[must_use]
    pub fn vitals_present(&self) -> bool {
        positive(self.heart()) && positive(self.breath()) && positive(self.radar())
    }

    /// True when heart, breath and radar all read exactly zero.
    #[must_use]
    pub fn vitals_silent(&self) -> bool {
        zero(self.heart()) && zero(self.breath()) && zero(self.radar())
    }

    /// True when heart, breath, radar and PIR all read exactly zero.
    #[must_use]
    pub fn all_signals_zero(&self) -> bool {
        self.vitals_silent() && zero(self.pir())
    }
}

/// `value > 0`, false when missing.
pub(crate) fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|v| v > 0.0)
}

/// `value == 0`, false when missing.
#[allow(clippy::float_cmp)]
pub(crate) fn zero(value: Option<f64>) -> bool {
    value.is_some_and(|v| v == 0.0)
}

/// A contiguous one-minute grid over an analysis window.
#[derive(Debug, Clone, Default)]
pub struct TimeGrid {
    rows: Vec<GridRow>,
    dark: Vec<bool>,
    observed: [bool; 5],
}

impl TimeGrid {
    /// Builds the grid over `[start, end]`, both truncated to the minute.
    ///
    /// Readings outside the window are ignored. Several readings for the same
    /// column and minute keep the latest one. An inverted window yields an
    /// empty grid.
    #[must_use]
    pub fn build(
        readings: &[Reading],
        start: NaiveDateTime,
        end: NaiveDateTime,
        config: &GridConfig,
    ) -> Self {
        let start = floor_minute(start);
        let end = floor_minute(end);
        if end < start {
            return Self::default();
        }

        let mut pivot: BTreeMap<NaiveDateTime, [Option<f64>; 5]> = BTreeMap::new();
        let mut observed = [false; 5];
        for reading in readings {
            let Some(channel) = Channel::from_kind(reading.kind) else {
                continue;
            };
            let minute = floor_minute(reading.at);
            if minute < start || minute > end {
                continue;
            }
            pivot.entry(minute).or_insert([None; 5])[channel.index()] = Some(reading.value);
            observed[channel.index()] = true;
        }

        let max_age = config.max_fill_gap_minutes.map(Duration::minutes);
        let capacity = usize::try_from((end - start).num_minutes() + 1).unwrap_or(0);
        let mut rows = Vec::with_capacity(capacity);
        let mut carried: [Option<(f64, NaiveDateTime)>; 5] = [None; 5];

        let mut minute = start;
        while minute <= end {
            if let Some(fresh) = pivot.get(&minute) {
                for (slot, value) in carried.iter_mut().zip(fresh) {
                    if let Some(v) = value {
                        *slot = Some((*v, minute));
                    }
                }
            }

            let mut row = GridRow::empty(minute);
            for (i, slot) in carried.iter().enumerate() {
                row.values[i] = if observed[i] {
                    slot.filter(|(_, seen)| max_age.is_none_or(|age| minute - *seen <= age))
                        .map(|(v, _)| v)
                } else {
                    Some(0.0)
                };
            }
            rows.push(row);
            minute += Duration::minutes(1);
        }

        let dark = dark_mask(&rows);
        tracing::debug!(
            rows = rows.len(),
            dark = dark.iter().filter(|d| **d).count(),
            "built minute grid"
        );

        Self {
            rows,
            dark,
            observed,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the minute at `index` is dark.
    #[must_use]
    pub fn is_dark(&self, index: usize) -> bool {
        self.dark.get(index).copied().unwrap_or(false)
    }

    /// Whether any reading of this column fell inside the window.
    ///
    /// Absent columns read as zero on every row.
    #[must_use]
    pub const fn has_column(&self, channel: Channel) -> bool {
        self.observed[channel.index()]
    }

    /// Row indices grouped by calendar date, in order.
    pub(crate) fn days(&self) -> impl Iterator<Item = (NaiveDate, std::ops::Range<usize>)> + '_ {
        let mut start = 0;
        self.rows
            .chunk_by(|a, b| a.at.date() == b.at.date())
            .map(move |chunk| {
                let range = start..start + chunk.len();
                start = range.end;
                (chunk[0].at.date(), range)
            })
    }
}

fn floor_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

fn half_day(at: NaiveDateTime) -> (NaiveDate, bool) {
    (at.date(), at.hour() >= 12)
}

fn dark_mask(rows: &[GridRow]) -> Vec<bool> {
    let mut dark = Vec::with_capacity(rows.len());
    for bucket in rows.chunk_by(|a, b| half_day(a.at) == half_day(b.at)) {
        let threshold = bucket
            .iter()
            .filter_map(GridRow::light)
            .reduce(f64::min)
            .map(|min| min + 1.0);
        dark.extend(bucket.iter().map(|row| match (row.light(), threshold) {
            (Some(light), Some(threshold)) => light <= threshold,
            _ => false,
        }));
    }
    dark
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::parse_timestamp;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn reading(kind: SensorKind, time: &str, value: f64) -> Reading {
        Reading {
            kind,
            at: at(time),
            value,
        }
    }

    #[test]
    fn grid_is_contiguous_one_row_per_minute() {
        let grid = TimeGrid::build(
            &[],
            at("2025-03-01T10:00:00"),
            at("2025-03-01T10:09:00"),
            &GridConfig::default(),
        );

        assert_eq!(grid.len(), 10);
        for pair in grid.rows().windows(2) {
            assert_eq!(pair[1].at - pair[0].at, Duration::minutes(1));
        }
    }

    #[test]
    fn values_carry_forward_but_not_backward() {
        let readings = vec![
            reading(SensorKind::Pir, "2025-03-01T10:03:00", 5.0),
            reading(SensorKind::Pir, "2025-03-01T10:06:00", 0.0),
        ];
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T10:00:00"),
            at("2025-03-01T10:08:00"),
            &GridConfig::default(),
        );

        let pir: Vec<_> = grid.rows().iter().map(GridRow::pir).collect();
        assert_eq!(pir[2], None);
        assert_eq!(pir[3], Some(5.0));
        assert_eq!(pir[5], Some(5.0));
        assert_eq!(pir[6], Some(0.0));
        assert_eq!(pir[8], Some(0.0));
    }

    #[test]
    fn long_gaps_are_filled_without_a_cap() {
        let readings = vec![reading(SensorKind::Radar, "2025-03-01T00:00:00", 2.0)];
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T00:00:00"),
            at("2025-03-02T00:00:00"),
            &GridConfig::default(),
        );

        assert_eq!(grid.rows().last().unwrap().radar(), Some(2.0));
    }

    #[test]
    fn fill_cap_expires_stale_values() {
        let readings = vec![reading(SensorKind::Radar, "2025-03-01T10:00:00", 2.0)];
        let config = GridConfig {
            max_fill_gap_minutes: Some(3),
        };
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T10:00:00"),
            at("2025-03-01T10:05:00"),
            &config,
        );

        let radar: Vec<_> = grid.rows().iter().map(GridRow::radar).collect();
        assert_eq!(radar[3], Some(2.0));
        assert_eq!(radar[4], None);
    }

    #[test]
    fn absent_columns_read_as_zero() {
        let readings = vec![reading(SensorKind::Pir, "2025-03-01T10:00:00", 1.0)];
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T10:00:00"),
            at("2025-03-01T10:01:00"),
            &GridConfig::default(),
        );

        assert!(grid.has_column(Channel::Pir));
        assert!(!grid.has_column(Channel::Heart));
        assert_eq!(grid.rows()[0].heart(), Some(0.0));
    }

    #[test]
    fn seconds_are_truncated_and_outside_readings_ignored() {
        let readings = vec![
            reading(SensorKind::Light, "2025-03-01T09:59:00", 80.0),
            reading(SensorKind::Light, "2025-03-01T10:01:42", 30.0),
        ];
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T10:00:00"),
            at("2025-03-01T10:02:00"),
            &GridConfig::default(),
        );

        assert_eq!(grid.rows()[0].light(), None);
        assert_eq!(grid.rows()[1].light(), Some(30.0));
    }

    #[test]
    fn dark_threshold_is_per_half_day() {
        let readings = vec![
            reading(SensorKind::Light, "2025-03-01T11:58:00", 0.0),
            reading(SensorKind::Light, "2025-03-01T11:59:00", 50.0),
            reading(SensorKind::Light, "2025-03-01T12:00:00", 50.0),
            reading(SensorKind::Light, "2025-03-01T12:01:00", 51.0),
            reading(SensorKind::Light, "2025-03-01T12:02:00", 52.0),
        ];
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T11:58:00"),
            at("2025-03-01T12:02:00"),
            &GridConfig::default(),
        );

        let dark: Vec<_> = (0..grid.len()).map(|i| grid.is_dark(i)).collect();
        assert_eq!(dark, vec![true, false, true, true, false]);
    }

    #[test]
    fn missing_light_is_never_dark() {
        let readings = vec![reading(SensorKind::Light, "2025-03-01T10:01:00", 0.0)];
        let grid = TimeGrid::build(
            &readings,
            at("2025-03-01T10:00:00"),
            at("2025-03-01T10:01:00"),
            &GridConfig::default(),
        );

        assert!(!grid.is_dark(0));
        assert!(grid.is_dark(1));
    }

    #[test]
    fn inverted_window_is_empty() {
        let grid = TimeGrid::build(
            &[],
            at("2025-03-02T00:00:00"),
            at("2025-03-01T00:00:00"),
            &GridConfig::default(),
        );
        assert!(grid.is_empty());
    }

    #[test]
    fn days_partition_rows_by_date() {
        let grid = TimeGrid::build(
            &[],
            at("2025-03-01T23:58:00"),
            at("2025-03-02T00:01:00"),
            &GridConfig::default(),
        );

        let days: Vec<_> = grid.days().collect();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].1, 0..2);
        assert_eq!(days[1].1, 2..4);
    }
}
