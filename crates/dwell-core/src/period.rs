//! Conversion of state timelines and status events into closed intervals.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A closed-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Period {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whole minutes, rounded down.
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Calendar date the interval starts on.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// Whether the monitored person is away from home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Inside,
    Outside,
}

impl Presence {
    /// Numeric code used in reports (1 = outside, 0 = inside).
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Inside => 0,
            Self::Outside => 1,
        }
    }
}

/// A change of presence at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub at: NaiveDateTime,
    pub status: Presence,
}

/// Turns an ordered boolean timeline into the intervals where it is true.
///
/// A period opens on a false-to-true transition and closes on the next
/// true-to-false transition. The first sample has no predecessor, so a
/// timeline that starts true does not open a period there. A period still
/// open at the end of the input is dropped.
pub fn periods_from_states<I>(samples: I) -> Vec<Period>
where
    I: IntoIterator<Item = (NaiveDateTime, bool)>,
{
    let mut periods = Vec::new();
    let mut previous: Option<bool> = None;
    let mut open: Option<NaiveDateTime> = None;

    for (at, state) in samples {
        match (previous, state) {
            (Some(false), true) => open = Some(at),
            (Some(true), false) => {
                if let Some(start) = open.take() {
                    periods.push(Period { start, end: at });
                }
            }
            _ => {}
        }
        previous = Some(state);
    }

    periods
}

/// Pairs each `Outside` with the next `Inside`.
///
/// A later `Outside` replaces an unmatched earlier one; an `Inside` with
/// nothing open is ignored, as is a trailing unmatched `Outside`.
#[must_use]
pub fn periods_from_status(events: &[StatusEvent]) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut open: Option<NaiveDateTime> = None;

    for event in events {
        match event.status {
            Presence::Outside => open = Some(event.at),
            Presence::Inside => {
                if let Some(start) = open.take().filter(|start| event.at > *start) {
                    periods.push(Period {
                        start,
                        end: event.at,
                    });
                }
            }
        }
    }

    periods
}
