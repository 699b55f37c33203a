//! Per-group occupancy judgments.
//!
//! Groups 1 and 3 are analyzed from their own history. Group 2's PIR and
//! ultrasonic sensors are fused into a single virtual sensor that is active
//! when either sub-sensor reported inside the recency window.

use crate::fusion::FusionSettings;
use crate::fusion::history::HistoryStore;
use crate::fusion::pattern::detect_presence_pattern;
use crate::sensor::SensorRole;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

/// The logical sensors that take part in voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteSource {
    Group1,
    Group2Combined,
    Group3,
}

impl VoteSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group1 => "group1",
            Self::Group2Combined => "group2_combined",
            Self::Group3 => "group3",
        }
    }
}

impl fmt::Display for VoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group's judgment that it currently observes occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyVote {
    #[serde(rename = "sensor")]
    pub source: VoteSource,
    pub motion: bool,
    pub distance: Option<f64>,
    #[serde(rename = "occupancy_reasons")]
    pub reasons: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pir_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultrasonic_active: Option<bool>,
}

/// Outcome for a group that was active this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAnalysis {
    pub source: VoteSource,
    pub vote: Option<OccupancyVote>,
}

/// Analyze group 1 or group 3. Returns `None` when the role has no reading
/// inside the recency window.
pub fn analyze_single(
    source: VoteSource,
    role: SensorRole,
    history: &HistoryStore,
    now: SystemTime,
    settings: &FusionSettings,
) -> Option<GroupAnalysis> {
    let latest = history
        .latest(role)
        .filter(|reading| reading.is_recent(now, settings.recency_window))?;

    let motion_detected = latest.motion;
    let within_range = latest
        .distance_cm
        .is_some_and(|distance| distance < settings.occupancy_distance_cm);
    let pattern = detect_presence_pattern(history.history(role), settings.occupancy_distance_cm);

    let vote = (motion_detected || (within_range && pattern.detected)).then(|| {
        let mut reasons = BTreeSet::new();
        if motion_detected {
            reasons.insert("motion".to_string());
        }
        if within_range && pattern.detected {
            reasons.insert(format!("proximity_{}", pattern.reason));
        }
        OccupancyVote {
            source,
            motion: motion_detected,
            distance: latest.distance_cm,
            reasons,
            pir_active: None,
            ultrasonic_active: None,
        }
    });

    Some(GroupAnalysis { source, vote })
}

/// Analyze the PIR + ultrasonic pair as one sensor.
pub fn analyze_group2_combined(
    history: &HistoryStore,
    now: SystemTime,
    settings: &FusionSettings,
) -> Option<GroupAnalysis> {
    let fresh = |role| {
        history
            .latest(role)
            .filter(|reading| reading.is_recent(now, settings.recency_window))
            .copied()
    };
    let pir = fresh(SensorRole::Group2Pir);
    let ultrasonic = fresh(SensorRole::Group2Ultrasonic);
    if pir.is_none() && ultrasonic.is_none() {
        return None;
    }

    let mut reasons = BTreeSet::new();
    let mut motion = false;
    let mut distance = f64::INFINITY;

    if let Some(pir) = pir
        && pir.motion
    {
        motion = true;
        reasons.insert("pir_motion".to_string());
    }

    if let Some(ultrasonic) = ultrasonic {
        if ultrasonic.motion {
            motion = true;
            reasons.insert("ultrasonic_motion".to_string());
        }
        if let Some(measured) = ultrasonic.distance_cm {
            distance = distance.min(measured);
        }
        let pattern = detect_presence_pattern(
            history.history(SensorRole::Group2Ultrasonic),
            settings.occupancy_distance_cm,
        );
        if distance < settings.occupancy_distance_cm && pattern.detected {
            reasons.insert(format!("ultrasonic_proximity_{}", pattern.reason));
        }
    }

    let within_range = distance < settings.occupancy_distance_cm;
    let vote = (motion || within_range).then(|| {
        if reasons.is_empty() {
            reasons.insert("combined_detection".to_string());
        }
        OccupancyVote {
            source: VoteSource::Group2Combined,
            motion,
            distance: distance.is_finite().then_some(distance),
            reasons,
            pir_active: Some(pir.is_some()),
            ultrasonic_active: Some(ultrasonic.is_some()),
        }
    });

    Some(GroupAnalysis {
        source: VoteSource::Group2Combined,
        vote,
    })
}

/// Run every group analyzer, in group order, keeping only active groups.
pub fn analyze_groups(
    history: &HistoryStore,
    now: SystemTime,
    settings: &FusionSettings,
) -> Vec<GroupAnalysis> {
    [
        analyze_single(VoteSource::Group1, SensorRole::Group1, history, now, settings),
        analyze_group2_combined(history, now, settings),
        analyze_single(VoteSource::Group3, SensorRole::Group3, history, now, settings),
    ]
    .into_iter()
    .flatten()
    .collect()
}
