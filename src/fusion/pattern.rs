//! Sustained-presence heuristic over a single role's recent history.

use crate::sensor::SensorReading;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Readings required before any pattern is reported.
pub const MIN_PATTERN_READINGS: usize = 3;
/// Number of trailing readings examined.
pub const PATTERN_WINDOW: usize = 5;
const CONSISTENT_MOTION_COUNT: usize = 2;
const CONSISTENT_PROXIMITY_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternReason {
    InsufficientData,
    MotionAndProximity,
    ConsistentActivity,
    NoPresenceIndicators,
}

impl PatternReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient_data",
            Self::MotionAndProximity => "motion_and_proximity",
            Self::ConsistentActivity => "consistent_activity",
            Self::NoPresenceIndicators => "no_presence_indicators",
        }
    }
}

impl fmt::Display for PatternReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresencePattern {
    pub detected: bool,
    pub reason: PatternReason,
}

impl PresencePattern {
    fn new(detected: bool, reason: PatternReason) -> Self {
        Self { detected, reason }
    }
}

pub fn detect_presence_pattern(
    history: &VecDeque<SensorReading>,
    distance_threshold_cm: f64,
) -> PresencePattern {
    if history.len() < MIN_PATTERN_READINGS {
        return PresencePattern::new(false, PatternReason::InsufficientData);
    }

    let mut motion_count = 0usize;
    let mut close_count = 0usize;
    for reading in history.iter().rev().take(PATTERN_WINDOW) {
        if reading.motion {
            motion_count += 1;
        }
        if reading
            .distance_cm
            .is_some_and(|distance| distance < distance_threshold_cm)
        {
            close_count += 1;
        }
    }

    if motion_count > 0 && close_count > 0 {
        PresencePattern::new(true, PatternReason::MotionAndProximity)
    } else if motion_count >= CONSISTENT_MOTION_COUNT || close_count >= CONSISTENT_PROXIMITY_COUNT {
        PresencePattern::new(true, PatternReason::ConsistentActivity)
    } else {
        PresencePattern::new(false, PatternReason::NoPresenceIndicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    const THRESHOLD: f64 = 50.0;

    fn history(readings: &[(bool, Option<f64>)]) -> VecDeque<SensorReading> {
        readings
            .iter()
            .map(|(motion, distance)| SensorReading::new(*motion, *distance, UNIX_EPOCH))
            .collect()
    }

    #[test]
    fn fewer_than_three_readings_is_insufficient() {
        for len in 0..MIN_PATTERN_READINGS {
            let readings = vec![(true, Some(10.0)); len];
            let pattern = detect_presence_pattern(&history(&readings), THRESHOLD);

            assert_eq!(pattern, PresencePattern::new(false, PatternReason::InsufficientData));
        }
    }

    #[test]
    fn motion_with_proximity() {
        let pattern = detect_presence_pattern(
            &history(&[(false, Some(200.0)), (true, Some(200.0)), (false, Some(30.0))]),
            THRESHOLD,
        );

        assert_eq!(pattern, PresencePattern::new(true, PatternReason::MotionAndProximity));
    }

    #[test]
    fn three_close_readings_without_motion_is_consistent() {
        let pattern = detect_presence_pattern(
            &history(&[(false, Some(40.0)), (false, Some(40.0)), (false, Some(40.0))]),
            THRESHOLD,
        );

        assert_eq!(pattern, PresencePattern::new(true, PatternReason::ConsistentActivity));
    }

    #[test]
    fn repeated_motion_without_distance_is_consistent() {
        let pattern = detect_presence_pattern(
            &history(&[(true, None), (false, None), (true, None)]),
            THRESHOLD,
        );

        assert_eq!(pattern, PresencePattern::new(true, PatternReason::ConsistentActivity));
    }

    #[test]
    fn threshold_is_exclusive() {
        let pattern = detect_presence_pattern(
            &history(&[(false, Some(50.0)), (false, Some(50.0)), (false, Some(50.0))]),
            THRESHOLD,
        );

        assert_eq!(pattern, PresencePattern::new(false, PatternReason::NoPresenceIndicators));
    }

    #[test]
    fn only_last_five_readings_count() {
        let pattern = detect_presence_pattern(
            &history(&[
                (true, Some(10.0)),
                (true, Some(10.0)),
                (false, Some(999.0)),
                (false, Some(999.0)),
                (false, Some(999.0)),
                (false, Some(999.0)),
                (false, Some(999.0)),
            ]),
            THRESHOLD,
        );

        assert_eq!(pattern, PresencePattern::new(false, PatternReason::NoPresenceIndicators));
    }
}
