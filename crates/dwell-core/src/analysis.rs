//! End-to-end analysis of one or many users.
//!
//! Ties the pieces together: observations are expanded to readings, clipped
//! to the analysis window, laid on a minute grid for sleep segmentation and
//! summed into daily activity totals. The outing detector sees every reading,
//! since its activity windows reach past the door events on either side.

use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::{GridConfig, TimeGrid};
use crate::observation::{Reading, SensorObservation, date_span, expand_readings};
use crate::outing::{OutingAnalysis, OutingConfig, detect_outings};
use crate::sleep::{SleepAnalysis, SleepConfig, segment_sleep};
use crate::stats::{DailyActivity, UserSummary, daily_activity};
use crate::types::ValidationError;

/// All engine tunables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub grid: GridConfig,
    pub sleep: SleepConfig,
    pub outing: OutingConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sleep.validate()?;
        self.outing.validate()
    }
}

/// Inclusive window `[start, end]` at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// From 00:00 of the first reading's date to 23:59 of the last one's.
    #[must_use]
    pub fn spanning(readings: &[Reading]) -> Option<Self> {
        let (first, last) = date_span(readings)?;
        Some(Self {
            start: first.and_hms_opt(0, 0, 0)?,
            end: last.and_hms_opt(23, 59, 0)?,
        })
    }

    /// Whether `at` falls in the window, the whole last minute included.
    #[must_use]
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end + Duration::minutes(1)
    }
}

/// Everything computed for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// `None` when no window was given and no reading was usable.
    pub window: Option<AnalysisWindow>,
    pub sleep: SleepAnalysis,
    pub outings: OutingAnalysis,
    pub activity: Vec<DailyActivity>,
}

impl AnalysisReport {
    #[must_use]
    pub fn summary(&self, user: impl Into<String>) -> UserSummary {
        UserSummary::compute(
            user,
            &self.outings.periods,
            &self.sleep.daily,
            &self.activity,
        )
    }
}

/// Analyzes one user's observations.
///
/// Without an explicit window, the window spans the dates the readings
/// cover. Malformed observations are skipped; only an invalid configuration
/// is an error.
pub fn analyze(
    observations: &[SensorObservation],
    window: Option<AnalysisWindow>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, ValidationError> {
    config.validate()?;
    Ok(run(observations, window, config))
}

fn run(
    observations: &[SensorObservation],
    window: Option<AnalysisWindow>,
    config: &AnalysisConfig,
) -> AnalysisReport {
    let readings = expand_readings(observations);

    let Some(window) = window.or_else(|| AnalysisWindow::spanning(&readings)) else {
        tracing::warn!(
            observations = observations.len(),
            "no usable readings, nothing to analyze"
        );
        return AnalysisReport {
            window: None,
            sleep: segment_sleep(&TimeGrid::default(), &config.sleep),
            outings: detect_outings(&[], &config.outing),
            activity: Vec::new(),
        };
    };

    let clipped: Vec<Reading> = readings
        .iter()
        .filter(|r| window.contains(r.at))
        .copied()
        .collect();
    tracing::debug!(
        start = %window.start,
        end = %window.end,
        readings = clipped.len(),
        "analyzing window"
    );

    let grid = TimeGrid::build(&clipped, window.start, window.end, &config.grid);

    AnalysisReport {
        window: Some(window),
        sleep: segment_sleep(&grid, &config.sleep),
        outings: detect_outings(&readings, &config.outing),
        activity: daily_activity(&clipped),
    }
}

/// One user's observations for batch analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub user: String,
    pub observations: Vec<SensorObservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReport {
    pub user: String,
    pub report: AnalysisReport,
    pub summary: UserSummary,
}

/// Analyzes users in parallel. Output order matches input order.
///
/// Users share nothing; each run owns its grid and detector state.
pub fn analyze_batch(
    inputs: &[UserInput],
    window: Option<AnalysisWindow>,
    config: &AnalysisConfig,
) -> Result<Vec<UserReport>, ValidationError> {
    config.validate()?;

    let reports = inputs
        .par_iter()
        .map(|input| {
            let report = run(&input.observations, window, config);
            let summary = report.summary(input.user.clone());
            tracing::debug!(user = %input.user, outings = summary.total_outings, "user analyzed");
            UserReport {
                user: input.user.clone(),
                report,
                summary,
            }
        })
        .collect();

    Ok(reports)
}
