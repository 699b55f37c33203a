use serde::Serialize;
use std::time::{Duration, SystemTime};

pub mod normalizer;

/// Distance assigned when a payload omits its distance field. Always "far".
pub const MISSING_DISTANCE_CM: f64 = 999.0;

/// Physical sensor inputs, each stored in its own history buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorRole {
    Group1,
    Group2Pir,
    Group2Ultrasonic,
    Group3,
}

impl SensorRole {
    pub const ALL: [SensorRole; 4] = [
        SensorRole::Group1,
        SensorRole::Group2Pir,
        SensorRole::Group2Ultrasonic,
        SensorRole::Group3,
    ];

    /// Resolve an inbound transport topic. Unknown topics yield `None`.
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "/group1/sensors" => Some(Self::Group1),
            "group2/sensors/pir" => Some(Self::Group2Pir),
            "group2/sensors/ultrasonic" => Some(Self::Group2Ultrasonic),
            "group3/status" => Some(Self::Group3),
            _ => None,
        }
    }

    pub fn topic(self) -> &'static str {
        match self {
            Self::Group1 => "/group1/sensors",
            Self::Group2Pir => "group2/sensors/pir",
            Self::Group2Ultrasonic => "group2/sensors/ultrasonic",
            Self::Group3 => "group3/status",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group1 => "group1",
            Self::Group2Pir => "group2_pir",
            Self::Group2Ultrasonic => "group2_ultrasonic",
            Self::Group3 => "group3",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Group1 => 0,
            Self::Group2Pir => 1,
            Self::Group2Ultrasonic => 2,
            Self::Group3 => 3,
        }
    }
}

/// A single normalized observation. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub motion: bool,
    /// Distance in centimetres; `None` for sensors without a range finder.
    pub distance_cm: Option<f64>,
    pub observed_at: SystemTime,
}

impl SensorReading {
    pub fn new(motion: bool, distance_cm: Option<f64>, observed_at: SystemTime) -> Self {
        Self {
            motion,
            distance_cm,
            observed_at,
        }
    }

    /// Age relative to `now`. Readings stamped in the future count as fresh.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.observed_at).unwrap_or(Duration::ZERO)
    }

    pub fn is_recent(&self, now: SystemTime, window: Duration) -> bool {
        self.age(now) <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn topic_table_round_trips_every_role() {
        for role in SensorRole::ALL {
            assert_eq!(SensorRole::from_topic(role.topic()), Some(role));
        }
    }

    #[test]
    fn unknown_topic_is_unrecognized() {
        assert_eq!(SensorRole::from_topic("group1/sensors"), None);
        assert_eq!(SensorRole::from_topic("group3/command"), None);
    }

    #[test]
    fn recency_window_is_inclusive() {
        let reading = SensorReading::new(false, Some(80.0), UNIX_EPOCH + Duration::from_secs(100));
        let window = Duration::from_secs(10);

        assert!(reading.is_recent(UNIX_EPOCH + Duration::from_secs(110), window));
        assert!(!reading.is_recent(UNIX_EPOCH + Duration::from_millis(110_001), window));
    }

    #[test]
    fn future_reading_counts_as_fresh() {
        let reading = SensorReading::new(true, None, UNIX_EPOCH + Duration::from_secs(50));

        assert_eq!(reading.age(UNIX_EPOCH), Duration::ZERO);
    }
}
