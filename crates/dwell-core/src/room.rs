//! Sleep location inference.

use crate::grid::{GridRow, TimeGrid, zero};
use crate::types::RoomType;

/// Night-time minutes that look like someone in a bed covered by vital-sign sensors.
#[must_use]
pub fn is_bedroom_candidate(row: &GridRow, dark: bool) -> bool {
    dark && row.vitals_present()
}

/// Night-time minutes where only the PIR sensor sees movement.
#[must_use]
pub fn is_living_candidate(row: &GridRow, dark: bool) -> bool {
    dark && row.pir().is_some_and(|p| p > 3.0) && row.vitals_silent()
}

/// Decides once, for the whole window, which kind of room the person sleeps in.
///
/// Ties go to [`RoomType::Bedroom`], so an empty grid is a bedroom.
#[must_use]
pub fn classify_room(grid: &TimeGrid) -> RoomType {
    let mut bedroom = 0usize;
    let mut living = 0usize;
    for (i, row) in grid.rows().iter().enumerate() {
        let dark = grid.is_dark(i);
        if is_bedroom_candidate(row, dark) {
            bedroom += 1;
        } else if is_living_candidate(row, dark) {
            living += 1;
        }
    }

    let room = if bedroom >= living {
        RoomType::Bedroom
    } else {
        RoomType::LivingRoom
    };
    tracing::debug!(bedroom, living, %room, "classified sleep location");
    room
}

/// Whether the person looks awake at this minute, given the room type.
#[must_use]
pub fn is_awake(row: &GridRow, room: RoomType) -> bool {
    match room {
        RoomType::Bedroom => {
            let vitals_gone = zero(row.heart()) && zero(row.breath());
            vitals_gone || zero(row.radar())
        }
        RoomType::LivingRoom => zero(row.pir()),
    }
}

/// The signal whose drop marks falling asleep, or `None` if the minute does not qualify.
#[must_use]
pub fn sleep_activity(row: &GridRow, room: RoomType) -> Option<f64> {
    match room {
        RoomType::Bedroom => {
            if row.vitals_present() {
                Some(row.heart()? + row.breath()? + row.radar()?)
            } else {
                None
            }
        }
        RoomType::LivingRoom => row.pir().filter(|p| *p > 0.0),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::grid::GridConfig;
    use crate::observation::{Reading, parse_timestamp};
    use crate::types::SensorKind;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn night_grid(readings: &[(SensorKind, f64)]) -> TimeGrid {
        let mut all: Vec<Reading> = readings
            .iter()
            .map(|(kind, value)| Reading {
                kind: *kind,
                at: at("2025-03-01T22:00:00"),
                value: *value,
            })
            .collect();
        all.push(Reading {
            kind: SensorKind::Light,
            at: at("2025-03-01T22:00:00"),
            value: 0.0,
        });
        TimeGrid::build(
            &all,
            at("2025-03-01T22:00:00"),
            at("2025-03-01T22:29:00"),
            &GridConfig::default(),
        )
    }

    #[test]
    fn vitals_in_the_dark_mean_bedroom() {
        let grid = night_grid(&[
            (SensorKind::Heart, 60.0),
            (SensorKind::Breath, 14.0),
            (SensorKind::Radar, 2.0),
            (SensorKind::Pir, 0.0),
        ]);
        assert_eq!(classify_room(&grid), RoomType::Bedroom);
    }

    #[test]
    fn pir_only_in_the_dark_means_living_room() {
        let grid = night_grid(&[
            (SensorKind::Heart, 0.0),
            (SensorKind::Breath, 0.0),
            (SensorKind::Radar, 0.0),
            (SensorKind::Pir, 6.0),
        ]);
        assert_eq!(classify_room(&grid), RoomType::LivingRoom);
    }

    #[test]
    fn weak_pir_is_not_a_living_room_candidate() {
        let grid = night_grid(&[(SensorKind::Pir, 3.0)]);
        assert_eq!(classify_room(&grid), RoomType::Bedroom);
    }

    #[test]
    fn empty_grid_ties_to_bedroom() {
        assert_eq!(classify_room(&TimeGrid::default()), RoomType::Bedroom);
    }

    #[test]
    fn awake_indicator_depends_on_room() {
        let grid = night_grid(&[
            (SensorKind::Heart, 0.0),
            (SensorKind::Breath, 0.0),
            (SensorKind::Radar, 1.0),
            (SensorKind::Pir, 4.0),
        ]);
        let row = &grid.rows()[0];

        assert!(is_awake(row, RoomType::Bedroom));
        assert!(!is_awake(row, RoomType::LivingRoom));
        assert_eq!(sleep_activity(row, RoomType::Bedroom), None);
        assert_eq!(sleep_activity(row, RoomType::LivingRoom), Some(4.0));
    }
}
