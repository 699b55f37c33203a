use crate::fusion::analyzer::VoteSource;
use crate::sensor::SensorRole;
use crate::state::{Confidence, OccupancyState};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OccupancyStatusResponse {
    pub occupancy_state: OccupancyState,
    pub last_occupied_time: Option<String>,
    pub last_vacant_time: Option<String>,
    pub last_transition: Option<TransitionResponse>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransitionResponse {
    pub previous_state: OccupancyState,
    pub new_state: OccupancyState,
    pub at: String,
    pub confidence: Confidence,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SensorsSuccessResponse {
    pub sensors: Vec<SensorHistoryResponse>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SensorHistoryResponse {
    pub sensor: SensorRole,
    pub topic: &'static str,
    pub readings: Vec<ReadingResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReadingResponse {
    pub motion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_cm: Option<f64>,
    pub observed_at: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub active_sensors: Vec<VoteSource>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InternalError,
}
