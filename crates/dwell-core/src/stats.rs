//! Per-day activity totals and per-user summaries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::observation::Reading;
use crate::period::Period;
use crate::sleep::DailySleep;
use crate::types::SensorKind;

/// Motion totals for one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub pir_total: f64,
    pub radar_total: f64,
}

/// Sums PIR and radar readings per date.
///
/// Dates with no motion readings at all are absent.
#[must_use]
pub fn daily_activity(readings: &[Reading]) -> Vec<DailyActivity> {
    let mut by_date: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
    for r in readings {
        if !r.kind.is_motion() {
            continue;
        }
        let date = r.at.date();
        let day = by_date.entry(date).or_insert(DailyActivity {
            date,
            pir_total: 0.0,
            radar_total: 0.0,
        });
        match r.kind {
            SensorKind::Pir => day.pir_total += r.value,
            SensorKind::Radar => day.radar_total += r.value,
            _ => {}
        }
    }
    by_date.into_values().collect()
}

/// Feature vector for one user over the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user: String,
    pub total_outings: usize,
    /// Mean daily outing minutes, over dates with at least one outing.
    pub avg_outing_minutes: f64,
    /// Mean nightly sleep minutes, over effective wake dates.
    pub avg_sleep_minutes: f64,
    /// Mean of sleep periods minus one, over effective wake dates.
    pub avg_intermediate_awakenings: f64,
    pub avg_pir: f64,
    pub avg_radar: f64,
}

impl UserSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(
        user: impl Into<String>,
        outings: &[Period],
        sleep: &[DailySleep],
        activity: &[DailyActivity],
    ) -> Self {
        let mut outing_days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for period in outings {
            *outing_days.entry(period.date()).or_default() += period.duration_minutes();
        }

        Self {
            user: user.into(),
            total_outings: outings.len(),
            avg_outing_minutes: mean(outing_days.values().map(|m| *m as f64)),
            avg_sleep_minutes: mean(sleep.iter().map(|d| d.total_minutes as f64)),
            avg_intermediate_awakenings: mean(
                sleep.iter().map(|d| d.periods.saturating_sub(1) as f64),
            ),
            avg_pir: mean(activity.iter().map(|d| d.pir_total)),
            avg_radar: mean(activity.iter().map(|d| d.radar_total)),
        }
    }
}

/// Arithmetic mean, 0 for no values.
#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
