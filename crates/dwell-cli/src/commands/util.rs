//! Shared utilities for CLI commands.

use std::path::Path;

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveDateTime};
use dwell_core::{AnalysisWindow, SensorObservation, parse_timestamp};

/// Which end of the window a bare date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parse a window bound as a date or a datetime.
///
/// Supports:
/// - Date: "2025-03-01" (00:00 as a start, 23:59 as an end)
/// - Datetime: "2025-03-01T22:30", "2025-03-01 22:30:00", RFC 3339
pub fn parse_bound(s: &str, bound: Bound) -> anyhow::Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let (hour, minute) = match bound {
            Bound::Start => (0, 0),
            Bound::End => (23, 59),
        };
        return date
            .and_hms_opt(hour, minute, 0)
            .context("invalid time of day");
    }

    let Some(at) = parse_timestamp(s) else {
        bail!("Invalid date or datetime: {s}. Use e.g. 2025-03-01 or 2025-03-01T22:30");
    };
    Ok(at)
}

/// Builds the analysis window from optional `--start`/`--end` values.
///
/// With neither given, returns `None` so each resident's own date span is
/// used. A missing side is taken from `fallback`.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    fallback: impl FnOnce() -> Option<AnalysisWindow>,
) -> anyhow::Result<Option<AnalysisWindow>> {
    if start.is_none() && end.is_none() {
        return Ok(None);
    }

    let start = start.map(|s| parse_bound(s, Bound::Start)).transpose()?;
    let end = end.map(|s| parse_bound(s, Bound::End)).transpose()?;

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (start, end) => {
            let Some(span) = fallback() else {
                bail!("no readings to infer the other end of the window from");
            };
            (start.unwrap_or(span.start), end.unwrap_or(span.end))
        }
    };

    Ok(Some(AnalysisWindow::new(start, end)?))
}

/// Loads a JSON array of observations from a file.
pub fn load_observations(path: &Path) -> anyhow::Result<Vec<SensorObservation>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let observations: Vec<SensorObservation> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse observations in {}", path.display()))?;
    tracing::debug!(path = %path.display(), count = observations.len(), "loaded observations");
    Ok(observations)
}

/// Resident name for an observation file: its file stem.
pub fn user_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// Formats minutes as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
pub fn format_minutes(total_minutes: i64) -> String {
    let total_minutes = total_minutes.max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
