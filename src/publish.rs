//! Outbound messages emitted on every accepted state transition.

use crate::fusion::analyzer::{OccupancyVote, VoteSource};
use crate::fusion::voting::AggregateSnapshot;
use crate::state::{Confidence, OccupancyState, StateTransition};
use crate::timestamp::format_rfc3339;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

pub const OCCUPANCY_TOPIC: &str = "group3/occupancy";
pub const COMMAND_TOPIC: &str = "group3/command";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("timestamp error: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("transport rejected message: {0}")]
    Transport(String),
}

/// Fire-and-forget sink for outbound topic messages. No retries.
///
/// Called with the engine write lock held, so implementations must not block.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyMessage {
    pub occupancy_state: OccupancyState,
    pub previous_state: OccupancyState,
    pub voting_result: String,
    pub occupancy_sensors: Vec<OccupancyVote>,
    pub active_sensors: Vec<VoteSource>,
    pub ai_analysis: String,
    pub timestamp: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandMessage {
    pub occupancy_state: OccupancyState,
    pub confidence: Confidence,
    pub active_sensors_count: usize,
}

impl OccupancyMessage {
    pub fn new(
        transition: &StateTransition,
        snapshot: &AggregateSnapshot,
        oracle_text: &str,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            occupancy_state: transition.new_state,
            previous_state: transition.previous_state,
            voting_result: format!("{} sensors", snapshot.voting_result()),
            occupancy_sensors: snapshot.votes.clone(),
            active_sensors: snapshot.active_sources.clone(),
            ai_analysis: oracle_text.to_string(),
            timestamp: format_rfc3339(transition.at)?,
            confidence: transition.confidence,
        })
    }
}

impl CommandMessage {
    pub fn new(transition: &StateTransition, snapshot: &AggregateSnapshot) -> Self {
        Self {
            occupancy_state: transition.new_state,
            confidence: transition.confidence,
            active_sensors_count: snapshot.active_sources.len(),
        }
    }
}

/// Emit the occupancy record followed by the downstream command.
pub fn publish_transition(
    publisher: &dyn Publisher,
    transition: &StateTransition,
    snapshot: &AggregateSnapshot,
    oracle_text: &str,
) -> Result<(), PublishError> {
    let occupancy = OccupancyMessage::new(transition, snapshot, oracle_text)?;
    let command = CommandMessage::new(transition, snapshot);

    publisher.publish(OCCUPANCY_TOPIC, serde_json::to_vec(&occupancy)?)?;
    publisher.publish(COMMAND_TOPIC, serde_json::to_vec(&command)?)?;
    Ok(())
}

/// In-process publisher that records every message.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Decoded JSON payloads published on `topic`, oldest first.
    pub fn json_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, payload)| serde_json::from_slice(&payload).ok())
            .collect()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| PublishError::Transport("memory publisher lock poisoned".to_string()))?;
        guard.push((topic.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::{Duration, UNIX_EPOCH};

    fn snapshot() -> AggregateSnapshot {
        AggregateSnapshot {
            at: UNIX_EPOCH + Duration::from_secs(60),
            active_sources: vec![VoteSource::Group1, VoteSource::Group2Combined, VoteSource::Group3],
            votes: vec![
                OccupancyVote {
                    source: VoteSource::Group1,
                    motion: true,
                    distance: Some(30.0),
                    reasons: BTreeSet::from(["motion".to_string()]),
                    pir_active: None,
                    ultrasonic_active: None,
                },
                OccupancyVote {
                    source: VoteSource::Group2Combined,
                    motion: true,
                    distance: None,
                    reasons: BTreeSet::from(["pir_motion".to_string()]),
                    pir_active: Some(true),
                    ultrasonic_active: Some(false),
                },
            ],
            occupancy_confirmed: true,
            last_motion_at: Some(UNIX_EPOCH + Duration::from_secs(59)),
            vacancy_timeout: false,
            predicted_state: OccupancyState::Occupied,
        }
    }

    fn transition() -> StateTransition {
        StateTransition {
            previous_state: OccupancyState::Vacant,
            new_state: OccupancyState::Occupied,
            at: UNIX_EPOCH + Duration::from_secs(60),
            confidence: Confidence::High,
        }
    }

    #[test]
    fn transition_emits_occupancy_then_command() -> Result<(), PublishError> {
        let publisher = MemoryPublisher::new();

        publish_transition(&publisher, &transition(), &snapshot(), "OCCUPIED.")?;

        let topics: Vec<String> = publisher.messages().into_iter().map(|(t, _)| t).collect();
        assert_eq!(topics, vec![OCCUPANCY_TOPIC, COMMAND_TOPIC]);
        Ok(())
    }

    #[test]
    fn occupancy_message_shape() -> Result<(), PublishError> {
        let publisher = MemoryPublisher::new();

        publish_transition(&publisher, &transition(), &snapshot(), "OCCUPIED.")?;

        let occupancy = &publisher.json_on(OCCUPANCY_TOPIC)[0];
        assert_eq!(occupancy["occupancy_state"], "occupied");
        assert_eq!(occupancy["previous_state"], "vacant");
        assert_eq!(occupancy["voting_result"], "2/3 sensors");
        assert_eq!(occupancy["ai_analysis"], "OCCUPIED.");
        assert_eq!(occupancy["timestamp"], "1970-01-01T00:01:00Z");
        assert_eq!(occupancy["confidence"], "high");
        assert_eq!(
            occupancy["active_sensors"],
            serde_json::json!(["group1", "group2_combined", "group3"])
        );
        assert_eq!(occupancy["occupancy_sensors"][0]["sensor"], "group1");
        assert!(occupancy["occupancy_sensors"][0].get("pir_active").is_none());
        assert_eq!(occupancy["occupancy_sensors"][1]["pir_active"], true);
        assert!(occupancy["occupancy_sensors"][1]["distance"].is_null());
        Ok(())
    }

    #[test]
    fn command_message_shape() -> Result<(), PublishError> {
        let publisher = MemoryPublisher::new();

        publish_transition(&publisher, &transition(), &snapshot(), "OCCUPIED.")?;

        assert_eq!(
            publisher.json_on(COMMAND_TOPIC),
            vec![serde_json::json!({
                "occupancy_state": "occupied",
                "confidence": "high",
                "active_sensors_count": 3
            })]
        );
        Ok(())
    }
}
