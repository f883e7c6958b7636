//! Raw sensor observations and their expansion into timestamped readings.
//!
//! Observations arrive exactly as the home gateway reports them: a sensor
//! name, an ISO-8601 timestamp and a list of values. Vital-sign sensors batch
//! several trailing per-minute samples into one observation; everything else
//! carries a single value. Records that cannot be understood are skipped, never
//! fatal.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::SensorKind;

/// One observation as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorObservation {
    /// Sensor name, canonical or localized (e.g. `heart_rate`, `심박`).
    #[serde(alias = "sensor_type_name", alias = "sensor_kind")]
    pub sensor: String,

    /// ISO-8601 timestamp of the most recent value.
    #[serde(alias = "measurement_time", alias = "timestamp")]
    pub time: String,

    /// Reported values. Kept untyped so a single bad entry only drops itself.
    #[serde(default, alias = "measurement_values")]
    pub values: Vec<serde_json::Value>,
}

impl SensorObservation {
    /// Convenience constructor for numeric observations.
    pub fn new(sensor: impl Into<String>, time: impl Into<String>, values: &[f64]) -> Self {
        Self {
            sensor: sensor.into(),
            time: time.into(),
            values: values.iter().map(|v| serde_json::Value::from(*v)).collect(),
        }
    }
}

/// A single sensor value pinned to an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub kind: SensorKind,
    pub at: NaiveDateTime,
    pub value: f64,
}

/// Expands observations into readings sorted by time.
///
/// A vital-sign observation with N values at time `t` yields value `i` at
/// `t - (N - 1 - i)` minutes. Door observations yield one reading with value
/// 0. Unknown sensors, unparsable timestamps and non-numeric values are
/// dropped.
#[must_use]
pub fn expand_readings(observations: &[SensorObservation]) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(observations.len());
    let mut skipped = 0usize;

    for obs in observations {
        let kind = match obs.sensor.parse::<SensorKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::trace!(error = %e, "skipping observation from unknown sensor");
                skipped += 1;
                continue;
            }
        };
        let Some(at) = parse_timestamp(&obs.time) else {
            tracing::trace!(sensor = %kind, time = %obs.time, "skipping observation with bad timestamp");
            skipped += 1;
            continue;
        };

        if kind.is_door() {
            readings.push(Reading {
                kind,
                at,
                value: 0.0,
            });
        } else if kind.is_vital() {
            let n = obs.values.len() as i64;
            for (i, raw) in (0_i64..).zip(&obs.values) {
                match numeric(raw) {
                    Some(value) => readings.push(Reading {
                        kind,
                        at: at - Duration::minutes(n - 1 - i),
                        value,
                    }),
                    None => skipped += 1,
                }
            }
        } else {
            match obs.values.first().and_then(numeric) {
                Some(value) => readings.push(Reading { kind, at, value }),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, kept = readings.len(), "dropped malformed sensor records");
    }

    readings.sort_by_key(|r| r.at);
    readings
}

/// Parses a gateway timestamp into a wall-clock instant.
///
/// Offsets are dropped rather than converted: the clock time as written is
/// the local time of the home the sensor sits in.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    let s = s.strip_suffix('Z').unwrap_or(s);
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Returns the first and last calendar dates covered by the readings.
#[must_use]
pub fn date_span(readings: &[Reading]) -> Option<(NaiveDate, NaiveDate)> {
    let first = readings.iter().map(|r| r.at).min()?;
    let last = readings.iter().map(|r| r.at).max()?;
    Some((first.date(), last.date()))
}

fn numeric(value: &serde_json::Value) -> Option<f64> {
    let v = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}
