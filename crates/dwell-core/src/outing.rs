//! Outing detection from door events.
//!
//! A door closing is only a candidate departure. The detector looks at what
//! the in-home sensors saw around it: if vital signs stay quiet afterwards
//! and motion does not pick up, the person left. When the door opens again,
//! the return is placed at the first half hour where motion comes back, or
//! at the door opening itself.
//!
//! Thresholds adapt to the household: every accepted departure or return
//! pulls the corresponding threshold toward what was just observed, by an
//! exponential smoothing factor `alpha`.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::observation::Reading;
use crate::period::{Period, Presence, StatusEvent, periods_from_status};
use crate::types::{SensorKind, ValidationError, check_threshold};

/// A close followed by an open within this many minutes is a reopen, not a departure.
const SPURIOUS_REOPEN_MINUTES: i64 = 3;

/// Initial thresholds and adaptation rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutingConfig {
    /// Heart+breath activity in the 25 minutes after a close at or below
    /// which the home looks empty. Default: 10.
    pub threshold_heart_breath: f64,

    /// Radar+PIR activity in the half hour after that at or above which
    /// someone is still home. Default: 15.
    pub threshold_radar_pir: f64,

    /// Radar+PIR activity in a half hour at or above which the person is
    /// back. Default: 50.
    pub threshold_home_activity: f64,

    /// Smoothing factor, strictly between 0 and 1. Larger adapts faster.
    /// Default: 0.005.
    pub alpha: f64,
}

impl Default for OutingConfig {
    fn default() -> Self {
        Self {
            threshold_heart_breath: 10.0,
            threshold_radar_pir: 15.0,
            threshold_home_activity: 50.0,
            alpha: 0.005,
        }
    }
}

impl OutingConfig {
    /// Checks thresholds are non-negative and `alpha` is in (0, 1).
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_threshold("threshold_heart_breath", self.threshold_heart_breath)?;
        check_threshold("threshold_radar_pir", self.threshold_radar_pir)?;
        check_threshold("threshold_home_activity", self.threshold_home_activity)?;
        if self.alpha.is_nan() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(ValidationError::AlphaOutOfRange { value: self.alpha });
        }
        Ok(())
    }
}

/// Thresholds as they stand at some point of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThresholds {
    pub heart_breath: f64,
    pub radar_pir: f64,
    pub home_activity: f64,
}

impl From<&OutingConfig> for AdaptiveThresholds {
    fn from(config: &OutingConfig) -> Self {
        Self {
            heart_breath: config.threshold_heart_breath,
            radar_pir: config.threshold_radar_pir,
            home_activity: config.threshold_home_activity,
        }
    }
}

fn smooth(current: f64, observed: f64, alpha: f64) -> f64 {
    alpha * observed + (1.0 - alpha) * current
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorCode {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorEvent {
    pub at: NaiveDateTime,
    pub code: DoorCode,
}

/// Door events in chronological order. Ties keep input order.
#[must_use]
pub fn door_events(readings: &[Reading]) -> Vec<DoorEvent> {
    let mut events: Vec<DoorEvent> = readings
        .iter()
        .filter_map(|r| {
            let code = match r.kind {
                SensorKind::DoorOpen => DoorCode::Open,
                SensorKind::DoorClose => DoorCode::Close,
                _ => return None,
            };
            Some(DoorEvent { at: r.at, code })
        })
        .collect();
    events.sort_by_key(|e| e.at);
    events
}

/// Raw vital and motion readings, sorted for window sums.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    vitals: Vec<(NaiveDateTime, f64)>,
    motion: Vec<(NaiveDateTime, f64)>,
}

impl ActivityLog {
    #[must_use]
    pub fn from_readings(readings: &[Reading]) -> Self {
        let mut log = Self::default();
        for r in readings {
            if r.kind.is_vital() {
                log.vitals.push((r.at, r.value));
            } else if r.kind.is_motion() {
                log.motion.push((r.at, r.value));
            }
        }
        log.vitals.sort_by_key(|(at, _)| *at);
        log.motion.sort_by_key(|(at, _)| *at);
        log
    }

    /// Heart+breath sum over `[from, to)`.
    #[must_use]
    pub fn vital_sum(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        window_sum(&self.vitals, from, to)
    }

    /// Radar+PIR sum over `[from, to)`.
    #[must_use]
    pub fn motion_sum(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        window_sum(&self.motion, from, to)
    }
}

fn window_sum(series: &[(NaiveDateTime, f64)], from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    if to <= from {
        return 0.0;
    }
    let lo = series.partition_point(|(at, _)| *at < from);
    let hi = series.partition_point(|(at, _)| *at < to);
    series[lo..hi].iter().map(|(_, v)| v).sum()
}

/// Output of an outing detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutingAnalysis {
    pub status: Vec<StatusEvent>,
    pub periods: Vec<Period>,
    /// Thresholds after the last event was processed.
    pub thresholds: AdaptiveThresholds,
}

/// Detects outings from readings that include door events.
#[must_use]
pub fn detect_outings(readings: &[Reading], config: &OutingConfig) -> OutingAnalysis {
    let doors = door_events(readings);
    if doors.is_empty() {
        tracing::debug!("no door events, skipping outing detection");
    }
    let activity = ActivityLog::from_readings(readings);

    let mut detector = OutingDetector::new(config);
    detector.process(&doors, &activity);
    detector.into_analysis()
}

/// Door state machine for one run.
#[derive(Debug, Clone)]
pub struct OutingDetector {
    alpha: f64,
    thresholds: AdaptiveThresholds,
    is_outside: bool,
    last_door_close: Option<NaiveDateTime>,
    status: Vec<StatusEvent>,
}

impl OutingDetector {
    #[must_use]
    pub fn new(config: &OutingConfig) -> Self {
        Self {
            alpha: config.alpha,
            thresholds: AdaptiveThresholds::from(config),
            is_outside: false,
            last_door_close: None,
            status: Vec::new(),
        }
    }

    #[must_use]
    pub const fn thresholds(&self) -> AdaptiveThresholds {
        self.thresholds
    }

    #[must_use]
    pub const fn is_outside(&self) -> bool {
        self.is_outside
    }

    #[must_use]
    pub fn status_events(&self) -> &[StatusEvent] {
        &self.status
    }

    /// Folds the door events, in order, into status events.
    ///
    /// `doors` must be sorted by time; see [`door_events`].
    pub fn process(&mut self, doors: &[DoorEvent], activity: &ActivityLog) {
        for (i, event) in doors.iter().enumerate() {
            match event.code {
                DoorCode::Close => self.on_close(event.at, doors.get(i + 1), activity),
                DoorCode::Open if self.is_outside => self.on_open(event.at, activity),
                DoorCode::Open => {}
            }
        }
    }

    fn on_close(&mut self, t: NaiveDateTime, next: Option<&DoorEvent>, activity: &ActivityLog) {
        self.last_door_close = Some(t);

        let reopened = next.is_some_and(|n| {
            n.code == DoorCode::Open && n.at - t <= Duration::minutes(SPURIOUS_REOPEN_MINUTES)
        });
        if reopened {
            tracing::debug!(at = %t, "door reopened right away, ignoring close");
            return;
        }

        let vitals_after = activity.vital_sum(t + Duration::minutes(5), t + Duration::minutes(30));
        let mut is_exit = vitals_after <= self.thresholds.heart_breath;

        let mut motion_after = 0.0;
        if is_exit {
            motion_after = activity.motion_sum(t + Duration::minutes(30), t + Duration::minutes(60));
            // Overlaps the close and the start of the vitals window on purpose.
            let motion_around =
                activity.motion_sum(t - Duration::minutes(30), t + Duration::minutes(30));
            if motion_after >= self.thresholds.radar_pir || motion_around * 0.5 < motion_after {
                is_exit = false;
            }
        }

        tracing::debug!(
            at = %t,
            vitals_after,
            motion_after,
            is_exit,
            "evaluated door close"
        );

        if is_exit && !self.is_outside {
            self.is_outside = true;
            self.status.push(StatusEvent {
                at: t,
                status: Presence::Outside,
            });
            self.thresholds.heart_breath =
                smooth(self.thresholds.heart_breath, vitals_after * 1.5, self.alpha);
            self.thresholds.radar_pir =
                smooth(self.thresholds.radar_pir, motion_after * 1.5, self.alpha);
        }
    }

    fn on_open(&mut self, t: NaiveDateTime, activity: &ActivityLog) {
        let half_hour = Duration::minutes(30);
        let mut returned = t;

        if let Some(closed) = self.last_door_close {
            let mut window_start = closed + half_hour;
            while window_start < t {
                let window_end = window_start + half_hour;
                let motion = activity.motion_sum(window_start, window_end);
                if motion >= self.thresholds.home_activity {
                    returned = window_end;
                    self.thresholds.home_activity =
                        smooth(self.thresholds.home_activity, motion * 0.7, self.alpha);
                    break;
                }
                window_start = window_end;
            }
        }

        let returned = returned.min(t);
        tracing::debug!(opened = %t, returned = %returned, "person back home");
        self.status.push(StatusEvent {
            at: returned,
            status: Presence::Inside,
        });
        self.is_outside = false;
    }

    /// Consumes the detector and pairs its status events into periods.
    #[must_use]
    pub fn into_analysis(self) -> OutingAnalysis {
        let periods = periods_from_status(&self.status);
        tracing::info!(outings = periods.len(), "outing detection finished");
        OutingAnalysis {
            status: self.status,
            periods,
            thresholds: self.thresholds,
        }
    }
}
