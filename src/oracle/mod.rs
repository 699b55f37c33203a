//! Decision oracle adapter.
//!
//! The vote/timeout computation is only a pre-filter: the oracle's verdict is
//! what commits a state change. This module serializes the aggregate snapshot
//! into a chat prompt, hands it to a pluggable [`DecisionOracle`] and reduces
//! the free-text reply to an [`OccupancyState`]. Any failure yields no
//! verdict, and the cycle ends without touching state.

use crate::fusion::FusionSettings;
use crate::fusion::analyzer::{OccupancyVote, VoteSource};
use crate::fusion::history::HistoryStore;
use crate::fusion::voting::AggregateSnapshot;
use crate::sensor::{SensorReading, SensorRole};
use crate::state::OccupancyState;
use crate::timestamp::format_rfc3339;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

pub mod ollama;

/// Readings per role included in the prompt.
pub const PROMPT_HISTORY_TAIL: usize = 3;

pub const SYSTEM_PROMPT: &str = "\
You are an intelligent occupancy detection system analyzing multi-sensor data. \
Respond with 'OCCUPIED', 'VACANT', or 'UNKNOWN'. YOU DO NOT HAVE TO PROVIDE ANY REASON. \
Rules: \
- motion=true means movement detected, motion=false means no movement \
- distance in cm (smaller = closer to sensor) \
- group2_combined represents PIR and ultrasonic sensors working together as ONE sensor \
- group1 and group3 are individual sensors \
- Multiple sensors agreeing = higher confidence \
- Recent motion + close proximity = likely occupied \
- No motion for longer than the vacancy timeout = likely vacant \
- Consider sensor reliability and patterns \
Focus on determining current room/space occupancy status.";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode oracle context: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("timestamp error: {0}")]
    Timestamp(#[from] time::error::Format),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Prompt sent to the oracle for one analysis cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub messages: Vec<ChatMessage>,
}

/// External advisory service returning free text for a prompt.
///
/// Implementations may block; they are only called from the analysis worker.
pub trait DecisionOracle: Send + Sync + std::fmt::Debug {
    fn consult(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleReply {
    pub verdict: OccupancyState,
    pub raw_text: String,
}

#[derive(Debug, Serialize)]
struct OracleContext<'a> {
    occupancy_analysis: OccupancyAnalysis<'a>,
    sensor_histories: BTreeMap<&'static str, Vec<HistoryEntry>>,
    latest_readings: BTreeMap<&'static str, HistoryEntry>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct OccupancyAnalysis<'a> {
    active_sensors: &'a [VoteSource],
    occupancy_sensors: &'a [OccupancyVote],
    voting_result: String,
    voting_threshold: usize,
    time_since_motion_secs: Option<f64>,
    vacancy_timeout_secs: u64,
    occupancy_distance_cm: f64,
    predicted_state: OccupancyState,
    current_state: OccupancyState,
    group2_treated_as_single: bool,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    motion: bool,
    distance: Option<f64>,
    observed_at: String,
}

impl HistoryEntry {
    fn from_reading(reading: &SensorReading) -> Result<Self, OracleError> {
        Ok(Self {
            motion: reading.motion,
            distance: reading.distance_cm,
            observed_at: format_rfc3339(reading.observed_at)?,
        })
    }
}

impl OracleRequest {
    pub fn build(
        snapshot: &AggregateSnapshot,
        history: &HistoryStore,
        current_state: OccupancyState,
        settings: &FusionSettings,
    ) -> Result<Self, OracleError> {
        let mut sensor_histories = BTreeMap::new();
        let mut latest_readings = BTreeMap::new();
        for role in SensorRole::ALL {
            if let Some(latest) = history.latest(role) {
                latest_readings.insert(role.as_str(), HistoryEntry::from_reading(latest)?);
            }
            let tail = history.recent(role, PROMPT_HISTORY_TAIL);
            if tail.is_empty() {
                continue;
            }
            let entries = tail
                .iter()
                .map(HistoryEntry::from_reading)
                .collect::<Result<Vec<_>, _>>()?;
            sensor_histories.insert(role.as_str(), entries);
        }

        let context = OracleContext {
            occupancy_analysis: OccupancyAnalysis {
                active_sensors: &snapshot.active_sources,
                occupancy_sensors: &snapshot.votes,
                voting_result: format!("{} sensors indicate occupancy", snapshot.voting_result()),
                voting_threshold: settings.min_sensors_for_occupancy,
                time_since_motion_secs: snapshot.time_since_motion().map(|d| d.as_secs_f64()),
                vacancy_timeout_secs: settings.vacancy_timeout.as_secs(),
                occupancy_distance_cm: settings.occupancy_distance_cm,
                predicted_state: snapshot.predicted_state,
                current_state,
                group2_treated_as_single: true,
            },
            sensor_histories,
            latest_readings,
            timestamp: format_rfc3339(snapshot.at)?,
        };

        let user_prompt = format!(
            "Analyze this occupancy data: {}",
            serde_json::to_string_pretty(&context)?
        );

        Ok(Self {
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: user_prompt,
                },
            ],
        })
    }
}

/// Reduce free text to a verdict by whole-word, case-insensitive match.
/// `OCCUPIED` is checked before `VACANT`; words such as `unoccupied` match
/// neither.
pub fn parse_verdict(text: &str) -> OccupancyState {
    let upper = text.to_uppercase();
    let has_word = |token: &str| {
        upper
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == token)
    };
    if has_word("OCCUPIED") {
        OccupancyState::Occupied
    } else if has_word("VACANT") {
        OccupancyState::Vacant
    } else {
        OccupancyState::Unknown
    }
}

/// Consult the oracle, logging and swallowing failures.
pub fn request_verdict(oracle: &dyn DecisionOracle, request: &OracleRequest) -> Option<OracleReply> {
    match oracle.consult(request) {
        Ok(raw_text) => {
            let verdict = parse_verdict(&raw_text);
            info!(%verdict, reply = raw_text.trim(), "Decision oracle replied");
            Some(OracleReply { verdict, raw_text })
        }
        Err(err) => {
            warn!(error = %err, "Decision oracle call failed, skipping cycle");
            None
        }
    }
}
