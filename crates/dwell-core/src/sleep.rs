//! Sleep segmentation.
//!
//! Works on a [`TimeGrid`] in four passes:
//!
//! 1. **Sleep start** per calendar day: among dark minutes from the evening
//!    hour on, the minute where the room's activity signal drops the most.
//! 2. **Wake start** per calendar day: among light minutes, the first minute
//!    that closes a run of consecutive awake minutes.
//! 3. **Timeline**: minutes from a day's sleep start to the next day's wake
//!    start are asleep, except sustained awake stretches inside them.
//! 4. **Exception filtering**: dark stretches dominated by all-zero sensors
//!    are treated as sensor dropout, not sleep.
//!
//! The room type decided by [`classify_room`] picks which signals count as
//! activity and as awake for every pass.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::grid::TimeGrid;
use crate::period::{Period, periods_from_states};
use crate::room::{classify_room, is_awake, sleep_activity};
use crate::types::{RoomType, ValidationError, check_ratio};

/// Tunables for sleep segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Earliest hour of day a sleep start may be detected. Default: 20.
    pub evening_start_hour: u32,

    /// Consecutive awake light minutes that confirm waking up. Default: 10.
    pub wake_window_minutes: usize,

    /// An awake stretch inside a night spanning at least this many minutes
    /// (first to last awake minute) splits the night. Default: 60.
    pub sustained_wake_minutes: i64,

    /// Share of all-zero minutes that voids a dark stretch. Default: 0.9.
    pub run_dropout_ratio: f64,

    /// Share of all-zero minutes among remaining dark sleep minutes that
    /// voids the whole run. Default: 0.6.
    pub global_dropout_ratio: f64,

    /// Sleep ending before this hour counts toward the same date, otherwise
    /// toward the next one. Default: 12.
    pub wake_date_cutoff_hour: u32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            evening_start_hour: 20,
            wake_window_minutes: 10,
            sustained_wake_minutes: 60,
            run_dropout_ratio: 0.9,
            global_dropout_ratio: 0.6,
            wake_date_cutoff_hour: 12,
        }
    }
}

impl SleepConfig {
    /// Checks every field is in range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.evening_start_hour > 23 {
            return Err(ValidationError::HourOutOfRange {
                field: "evening_start_hour",
                value: self.evening_start_hour,
            });
        }
        if self.wake_date_cutoff_hour > 23 {
            return Err(ValidationError::HourOutOfRange {
                field: "wake_date_cutoff_hour",
                value: self.wake_date_cutoff_hour,
            });
        }
        if self.wake_window_minutes == 0 {
            return Err(ValidationError::Zero {
                field: "wake_window_minutes",
            });
        }
        if self.sustained_wake_minutes <= 0 {
            return Err(ValidationError::Zero {
                field: "sustained_wake_minutes",
            });
        }
        check_ratio("run_dropout_ratio", self.run_dropout_ratio)?;
        check_ratio("global_dropout_ratio", self.global_dropout_ratio)
    }
}

/// Total sleep attributed to one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySleep {
    pub date: NaiveDate,
    pub total_minutes: i64,
    /// Sleep periods attributed to this date.
    pub periods: usize,
}

/// Output of a segmentation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepAnalysis {
    pub room_type: RoomType,
    pub periods: Vec<Period>,
    pub daily: Vec<DailySleep>,
}

/// Date a sleep ending at `wake` belongs to.
#[must_use]
pub fn effective_wake_date(wake: NaiveDateTime, cutoff_hour: u32) -> NaiveDate {
    if wake.hour() < cutoff_hour {
        wake.date()
    } else {
        wake.date() + Duration::days(1)
    }
}

/// Runs the full segmentation and returns its results.
#[must_use]
pub fn segment_sleep(grid: &TimeGrid, config: &SleepConfig) -> SleepAnalysis {
    let mut segmenter = SleepSegmenter::new(grid, config);
    segmenter.run();
    segmenter.into_analysis()
}

/// Per-run segmentation state. The timeline is owned by one run and is
/// final once [`SleepSegmenter::into_analysis`] consumes it.
#[derive(Debug)]
pub struct SleepSegmenter<'a> {
    grid: &'a TimeGrid,
    config: &'a SleepConfig,
    room: RoomType,
    awake: Vec<bool>,
    sleep_starts: BTreeMap<NaiveDate, usize>,
    wake_starts: BTreeMap<NaiveDate, usize>,
    asleep: Vec<bool>,
}

impl<'a> SleepSegmenter<'a> {
    /// Classifies the room and prepares an all-awake timeline.
    #[must_use]
    pub fn new(grid: &'a TimeGrid, config: &'a SleepConfig) -> Self {
        Self::with_room(grid, config, classify_room(grid))
    }

    /// Prepares a run with a room type decided elsewhere.
    #[must_use]
    pub fn with_room(grid: &'a TimeGrid, config: &'a SleepConfig, room: RoomType) -> Self {
        let awake = grid.rows().iter().map(|row| is_awake(row, room)).collect();
        Self {
            grid,
            config,
            room,
            awake,
            sleep_starts: BTreeMap::new(),
            wake_starts: BTreeMap::new(),
            asleep: vec![false; grid.len()],
        }
    }

    #[must_use]
    pub const fn room_type(&self) -> RoomType {
        self.room
    }

    /// Runs every pass in order.
    pub fn run(&mut self) {
        self.detect_sleep_starts();
        self.detect_wake_starts();
        self.apply_sleep_state();
        filter_exceptions(self.grid, &mut self.asleep, self.config);
    }

    /// Detected sleep-start instants keyed by the day they were found on.
    #[must_use]
    pub fn sleep_starts(&self) -> BTreeMap<NaiveDate, NaiveDateTime> {
        self.instants(&self.sleep_starts)
    }

    /// Detected wake-start instants keyed by the day they were found on.
    #[must_use]
    pub fn wake_starts(&self) -> BTreeMap<NaiveDate, NaiveDateTime> {
        self.instants(&self.wake_starts)
    }

    /// The per-minute sleep state, aligned with the grid rows.
    #[must_use]
    pub fn timeline(&self) -> &[bool] {
        &self.asleep
    }

    /// Consumes the run and converts the timeline into periods.
    #[must_use]
    pub fn into_analysis(self) -> SleepAnalysis {
        let samples = self
            .grid
            .rows()
            .iter()
            .zip(&self.asleep)
            .map(|(row, asleep)| (row.at, *asleep));
        let periods = periods_from_states(samples);

        let mut by_date: BTreeMap<NaiveDate, (i64, usize)> = BTreeMap::new();
        for period in &periods {
            let date = effective_wake_date(period.end, self.config.wake_date_cutoff_hour);
            let entry = by_date.entry(date).or_default();
            entry.0 += period.duration_minutes();
            entry.1 += 1;
        }
        let daily = by_date
            .into_iter()
            .map(|(date, (total_minutes, periods))| DailySleep {
                date,
                total_minutes,
                periods,
            })
            .collect();

        tracing::info!(
            room = %self.room,
            periods = periods.len(),
            "sleep segmentation finished"
        );

        SleepAnalysis {
            room_type: self.room,
            periods,
            daily,
        }
    }

    fn instants(&self, indices: &BTreeMap<NaiveDate, usize>) -> BTreeMap<NaiveDate, NaiveDateTime> {
        indices
            .iter()
            .map(|(date, i)| (*date, self.grid.rows()[*i].at))
            .collect()
    }

    /// Largest minute-to-minute drop of the activity signal, per day.
    fn detect_sleep_starts(&mut self) {
        let grid = self.grid;
        let rows = grid.rows();
        for (date, range) in grid.days() {
            let mut previous: Option<f64> = None;
            let mut best: Option<(f64, usize)> = None;

            for i in range {
                let row = &rows[i];
                if !grid.is_dark(i) || row.at.hour() < self.config.evening_start_hour {
                    continue;
                }
                let Some(activity) = sleep_activity(row, self.room) else {
                    continue;
                };
                if let Some(prev) = previous {
                    let drop = prev - activity;
                    if best.is_none_or(|(max, _)| drop > max) {
                        best = Some((drop, i));
                    }
                }
                previous = Some(activity);
            }

            if let Some((drop, i)) = best {
                tracing::debug!(%date, at = %rows[i].at, drop, "sleep start");
                self.sleep_starts.insert(date, i);
            }
        }
    }

    /// First light minute closing a full window of awake minutes, per day.
    fn detect_wake_starts(&mut self) {
        let grid = self.grid;
        let window = self.config.wake_window_minutes;
        for (date, range) in grid.days() {
            let mut streak = 0usize;
            for i in range {
                if grid.is_dark(i) {
                    continue;
                }
                streak = if self.awake[i] { streak + 1 } else { 0 };
                if streak >= window {
                    tracing::debug!(%date, at = %grid.rows()[i].at, "wake start");
                    self.wake_starts.insert(date, i);
                    break;
                }
            }
        }
    }

    /// Marks each night asleep, then reopens sustained awake stretches.
    fn apply_sleep_state(&mut self) {
        for (date, &start) in &self.sleep_starts {
            let Some(&end) = self.wake_starts.get(&(*date + Duration::days(1))) else {
                continue;
            };
            if end <= start {
                continue;
            }

            self.asleep[start..end].fill(true);

            let mut i = start;
            while i < end {
                let awake = self.awake[i];
                let mut j = i + 1;
                while j < end && self.awake[j] == awake {
                    j += 1;
                }
                let span = (self.grid.rows()[j - 1].at - self.grid.rows()[i].at).num_minutes();
                if awake && span >= self.config.sustained_wake_minutes {
                    self.asleep[i..j].fill(false);
                }
                i = j;
            }
        }
    }
}

/// Clears sleep that is better explained by dead sensors.
///
/// Each maximal stretch of consecutive dark minutes where at least
/// `run_dropout_ratio` of minutes read zero on heart, breath, radar and PIR
/// is cleared. Then, if at least `global_dropout_ratio` of the dark minutes
/// still marked asleep read all zero, every one of those minutes is cleared.
///
/// # Panics
///
/// Panics if `asleep` does not hold one state per grid row.
pub fn filter_exceptions(grid: &TimeGrid, asleep: &mut [bool], config: &SleepConfig) {
    assert_eq!(
        asleep.len(),
        grid.len(),
        "sleep timeline must hold one state per grid row"
    );
    let rows = grid.rows();
    let dark: Vec<usize> = (0..rows.len()).filter(|&i| grid.is_dark(i)).collect();

    let mut voided_runs = 0usize;
    for run in dark.chunk_by(|a, b| rows[*b].at - rows[*a].at == Duration::minutes(1)) {
        let zeros = run.iter().filter(|&&i| rows[i].all_signals_zero()).count();
        if ratio(zeros, run.len()) >= config.run_dropout_ratio {
            for &i in run {
                asleep[i] = false;
            }
            voided_runs += 1;
        }
    }
    if voided_runs > 0 {
        tracing::debug!(voided_runs, "cleared dark stretches with dead sensors");
    }

    let valid: Vec<usize> = dark.into_iter().filter(|&i| asleep[i]).collect();
    if valid.is_empty() {
        return;
    }
    let zeros = valid.iter().filter(|&&i| rows[i].all_signals_zero()).count();
    let share = ratio(zeros, valid.len());
    if share >= config.global_dropout_ratio {
        tracing::warn!(
            share,
            minutes = valid.len(),
            "sensors read zero for most of the detected sleep; discarding sleep for this window"
        );
        for i in valid {
            asleep[i] = false;
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridConfig;
    use crate::observation::{Reading, parse_timestamp};
    use crate::types::SensorKind;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn r(kind: SensorKind, time: &str, value: f64) -> Reading {
        Reading {
            kind,
            at: at(time),
            value,
        }
    }

    /// Lights on through the first day, off from 20:00, back on at 06:00.
    fn lights() -> Vec<Reading> {
        vec![
            r(SensorKind::Light, "2025-03-01T00:00", 100.0),
            r(SensorKind::Light, "2025-03-01T20:00", 0.0),
            r(SensorKind::Light, "2025-03-02T06:00", 100.0),
        ]
    }

    fn vitals(time: &str, heart: f64, breath: f64, radar: f64, pir: f64) -> Vec<Reading> {
        vec![
            r(SensorKind::Heart, time, heart),
            r(SensorKind::Breath, time, breath),
            r(SensorKind::Radar, time, radar),
            r(SensorKind::Pir, time, pir),
        ]
    }

    /// Active in bed from 20:00, settles at 23:10, gets up at 06:00.
    fn bedroom_night() -> Vec<Reading> {
        let mut readings = lights();
        readings.extend(vitals("2025-03-01T20:00", 70.0, 18.0, 5.0, 0.0));
        readings.extend(vitals("2025-03-01T23:10", 55.0, 12.0, 1.0, 0.0));
        readings.extend(vitals("2025-03-02T06:00", 0.0, 0.0, 0.0, 8.0));
        readings
    }

    fn grid(mut readings: Vec<Reading>) -> TimeGrid {
        readings.sort_by_key(|r| r.at);
        TimeGrid::build(
            &readings,
            at("2025-03-01T00:00"),
            at("2025-03-02T11:59"),
            &GridConfig::default(),
        )
    }

    fn period(start: &str, end: &str) -> Period {
        Period {
            start: at(start),
            end: at(end),
        }
    }

    #[test]
    fn bedroom_night_yields_one_period() {
        let grid = grid(bedroom_night());
        let config = SleepConfig::default();
        let mut segmenter = SleepSegmenter::new(&grid, &config);
        segmenter.run();

        assert_eq!(segmenter.room_type(), RoomType::Bedroom);
        assert_eq!(
            segmenter.sleep_starts().get(&at("2025-03-01T00:00").date()),
            Some(&at("2025-03-01T23:10"))
        );
        assert_eq!(
            segmenter.wake_starts().get(&at("2025-03-02T00:00").date()),
            Some(&at("2025-03-02T06:09"))
        );

        let analysis = segmenter.into_analysis();
        assert_eq!(
            analysis.periods,
            vec![period("2025-03-01T23:10", "2025-03-02T06:09")]
        );
        assert_eq!(analysis.periods[0].duration_minutes(), 419);
        assert_eq!(
            analysis.daily,
            vec![DailySleep {
                date: at("2025-03-02T00:00").date(),
                total_minutes: 419,
                periods: 1,
            }]
        );
    }

    #[test]
    fn timeline_matches_periods() {
        let grid = grid(bedroom_night());
        let config = SleepConfig::default();
        let mut segmenter = SleepSegmenter::new(&grid, &config);
        segmenter.run();

        let timeline = segmenter.timeline().to_vec();
        let analysis = segmenter.into_analysis();
        for p in &analysis.periods {
            for (row, asleep) in grid.rows().iter().zip(&timeline) {
                if row.at >= p.start && row.at < p.end {
                    assert!(asleep, "minute {} should be asleep", row.at);
                }
                if row.at == p.end {
                    assert!(!asleep, "minute {} should be awake", row.at);
                }
            }
        }
    }

    #[test]
    fn living_room_night_uses_pir() {
        let mut readings = lights();
        readings.push(r(SensorKind::Pir, "2025-03-01T20:00", 9.0));
        readings.push(r(SensorKind::Pir, "2025-03-01T22:30", 2.0));
        readings.push(r(SensorKind::Pir, "2025-03-02T06:00", 0.0));

        let analysis = segment_sleep(&grid(readings), &SleepConfig::default());

        assert_eq!(analysis.room_type, RoomType::LivingRoom);
        assert_eq!(
            analysis.periods,
            vec![period("2025-03-01T22:30", "2025-03-02T06:09")]
        );
    }

    #[test]
    fn sustained_wake_splits_the_night() {
        let mut readings = bedroom_night();
        readings.extend(vitals("2025-03-02T01:00", 55.0, 12.0, 0.0, 0.0));
        readings.extend(vitals("2025-03-02T02:30", 55.0, 12.0, 1.0, 0.0));

        let analysis = segment_sleep(&grid(readings), &SleepConfig::default());

        assert_eq!(
            analysis.periods,
            vec![
                period("2025-03-01T23:10", "2025-03-02T01:00"),
                period("2025-03-02T02:30", "2025-03-02T06:09"),
            ]
        );
        assert_eq!(analysis.daily.len(), 1);
        assert_eq!(analysis.daily[0].total_minutes, 110 + 219);
        assert_eq!(analysis.daily[0].periods, 2);
    }

    #[test]
    fn wake_spanning_exactly_an_hour_splits_the_night() {
        // Awake from 01:00 through 02:00: sixty minutes first to last.
        let mut readings = bedroom_night();
        readings.extend(vitals("2025-03-02T01:00", 55.0, 12.0, 0.0, 0.0));
        readings.extend(vitals("2025-03-02T02:01", 55.0, 12.0, 1.0, 0.0));

        let analysis = segment_sleep(&grid(readings), &SleepConfig::default());

        assert_eq!(
            analysis.periods,
            vec![
                period("2025-03-01T23:10", "2025-03-02T01:00"),
                period("2025-03-02T02:01", "2025-03-02T06:09"),
            ]
        );
    }

    #[test]
    fn wake_one_minute_short_of_an_hour_is_merged_back() {
        let mut readings = bedroom_night();
        readings.extend(vitals("2025-03-02T01:00", 55.0, 12.0, 0.0, 0.0));
        readings.extend(vitals("2025-03-02T02:00", 55.0, 12.0, 1.0, 0.0));

        let analysis = segment_sleep(&grid(readings), &SleepConfig::default());

        assert_eq!(
            analysis.periods,
            vec![period("2025-03-01T23:10", "2025-03-02T06:09")]
        );
    }

    #[test]
    fn brief_wake_is_merged_back() {
        let mut readings = bedroom_night();
        readings.extend(vitals("2025-03-02T01:00", 55.0, 12.0, 0.0, 0.0));
        readings.extend(vitals("2025-03-02T01:30", 55.0, 12.0, 1.0, 0.0));

        let analysis = segment_sleep(&grid(readings), &SleepConfig::default());

        assert_eq!(
            analysis.periods,
            vec![period("2025-03-01T23:10", "2025-03-02T06:09")]
        );
    }

    #[test]
    fn no_wake_start_means_no_period() {
        let mut readings = lights();
        readings.extend(vitals("2025-03-01T20:00", 70.0, 18.0, 5.0, 0.0));
        readings.extend(vitals("2025-03-01T23:10", 55.0, 12.0, 1.0, 0.0));

        let analysis = segment_sleep(&grid(readings), &SleepConfig::default());

        assert!(analysis.periods.is_empty());
        assert!(analysis.daily.is_empty());
    }

    #[test]
    fn empty_grid_yields_empty_results() {
        let analysis = segment_sleep(&TimeGrid::default(), &SleepConfig::default());

        assert_eq!(analysis.room_type, RoomType::Bedroom);
        assert!(analysis.periods.is_empty());
        assert!(analysis.daily.is_empty());
    }

    #[test]
    fn segmentation_is_deterministic() {
        let grid = grid(bedroom_night());
        let config = SleepConfig::default();

        assert_eq!(segment_sleep(&grid, &config), segment_sleep(&grid, &config));
    }

    /// A dark 100-minute window where the first `zero_minutes` read all zero.
    fn dropout_grid(zero_minutes: i64) -> TimeGrid {
        let start = at("2025-03-01T22:00");
        let mut readings = vec![r(SensorKind::Light, "2025-03-01T22:00", 0.0)];
        readings.extend(vitals("2025-03-01T22:00", 0.0, 0.0, 0.0, 0.0));
        let resume = (start + Duration::minutes(zero_minutes))
            .format("%Y-%m-%dT%H:%M")
            .to_string();
        readings.extend(vitals(&resume, 60.0, 14.0, 1.0, 0.0));
        readings.sort_by_key(|r| r.at);
        TimeGrid::build(
            &readings,
            start,
            start + Duration::minutes(99),
            &GridConfig::default(),
        )
    }

    #[test]
    fn dead_sensor_stretch_is_cleared() {
        let grid = dropout_grid(95);
        let mut asleep = vec![true; grid.len()];

        filter_exceptions(&grid, &mut asleep, &SleepConfig::default());

        assert!(asleep.iter().all(|a| !a));
    }

    #[test]
    fn mostly_zero_sleep_is_discarded_globally() {
        let grid = dropout_grid(70);
        let mut asleep = vec![true; grid.len()];

        filter_exceptions(&grid, &mut asleep, &SleepConfig::default());

        assert!(asleep.iter().all(|a| !a));
        let samples = grid.rows().iter().zip(&asleep).map(|(row, a)| (row.at, *a));
        assert!(periods_from_states(samples).is_empty());
    }

    #[test]
    fn stretch_at_exactly_the_run_ratio_is_cleared() {
        // Keep the global pass out of the way so only the per-stretch check can clear.
        let config = SleepConfig {
            global_dropout_ratio: 1.0,
            ..SleepConfig::default()
        };

        let grid = dropout_grid(90);
        let mut asleep = vec![true; grid.len()];
        filter_exceptions(&grid, &mut asleep, &config);
        assert!(asleep.iter().all(|a| !a));

        let grid = dropout_grid(89);
        let mut asleep = vec![true; grid.len()];
        filter_exceptions(&grid, &mut asleep, &config);
        assert!(asleep.iter().all(|a| *a));
    }

    #[test]
    fn sleep_at_exactly_the_global_ratio_is_discarded() {
        let grid = dropout_grid(60);
        let mut asleep = vec![true; grid.len()];
        filter_exceptions(&grid, &mut asleep, &SleepConfig::default());
        assert!(asleep.iter().all(|a| !a));

        let grid = dropout_grid(59);
        let mut asleep = vec![true; grid.len()];
        filter_exceptions(&grid, &mut asleep, &SleepConfig::default());
        assert!(asleep.iter().all(|a| *a));
    }

    #[test]
    #[should_panic(expected = "one state per grid row")]
    fn filter_rejects_a_short_timeline() {
        let grid = dropout_grid(50);
        let mut asleep = vec![true; grid.len() - 1];
        filter_exceptions(&grid, &mut asleep, &SleepConfig::default());
    }

    #[test]
    fn reliable_sleep_survives_exception_filter() {
        let grid = dropout_grid(50);
        let mut asleep = vec![true; grid.len()];

        filter_exceptions(&grid, &mut asleep, &SleepConfig::default());

        assert!(asleep.iter().all(|a| *a));
    }

    #[test]
    fn effective_wake_date_rolls_over_at_noon() {
        assert_eq!(
            effective_wake_date(at("2025-03-02T06:09"), 12),
            at("2025-03-02T00:00").date()
        );
        assert_eq!(
            effective_wake_date(at("2025-03-02T13:00"), 12),
            at("2025-03-03T00:00").date()
        );
    }

    #[test]
    fn config_validation() {
        assert!(SleepConfig::default().validate().is_ok());
        let bad = SleepConfig {
            global_dropout_ratio: 1.2,
            ..SleepConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = SleepConfig {
            evening_start_hour: 24,
            ..SleepConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
