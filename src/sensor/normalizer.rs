//! Maps raw transport events onto canonical [`SensorReading`]s.
//!
//! Each topic carries its own payload schema; field names differ per group.
//! Missing fields are defaulted (distance far, no motion) instead of failing
//! the event, while payloads that are not JSON objects, or fields holding
//! values that cannot be read as numbers, are rejected.

use crate::sensor::{MISSING_DISTANCE_CM, SensorReading, SensorRole};
use serde_json::{Map, Value};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("field `{field}` has unusable value {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Normalize an inbound `(topic, payload)` pair.
///
/// Returns `Ok(None)` for topics outside the static lookup table; callers drop
/// those silently.
pub fn normalize(
    topic: &str,
    payload: &[u8],
    observed_at: SystemTime,
) -> Result<Option<(SensorRole, SensorReading)>, NormalizeError> {
    let Some(role) = SensorRole::from_topic(topic) else {
        return Ok(None);
    };
    let reading = decode_payload(role, payload, observed_at)?;
    Ok(Some((role, reading)))
}

pub fn decode_payload(
    role: SensorRole,
    payload: &[u8],
    observed_at: SystemTime,
) -> Result<SensorReading, NormalizeError> {
    let value: Value = serde_json::from_slice(payload)?;
    let fields = value.as_object().ok_or(NormalizeError::NotAnObject)?;

    let reading = match role {
        SensorRole::Group1 => SensorReading::new(
            flag(fields, "motion_detected")?.unwrap_or(false),
            Some(distance(fields, "distance_cm")?),
            observed_at,
        ),
        SensorRole::Group2Pir => {
            let motion = match flag(fields, "motion_detected")? {
                Some(motion) => Some(motion),
                None => flag(fields, "motion")?,
            };
            SensorReading::new(motion.unwrap_or(false), None, observed_at)
        }
        SensorRole::Group2Ultrasonic => {
            SensorReading::new(false, Some(distance(fields, "distance_cm")?), observed_at)
        }
        SensorRole::Group3 => SensorReading::new(
            flag(fields, "motion")?.unwrap_or(false),
            Some(distance(fields, "distance")?),
            observed_at,
        ),
    };
    Ok(reading)
}

fn distance(fields: &Map<String, Value>, field: &'static str) -> Result<f64, NormalizeError> {
    Ok(number(fields, field)?.unwrap_or(MISSING_DISTANCE_CM))
}

fn number(fields: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, NormalizeError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| invalid(field, n)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(field, s)),
        Some(other) => Err(invalid(field, other)),
    }
}

/// Motion flags arrive as 0/1 integers; 1 means motion.
fn flag(fields: &Map<String, Value>, field: &'static str) -> Result<Option<bool>, NormalizeError> {
    match fields.get(field) {
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|v| Some(v == 1))
            .map_err(|_| invalid(field, s)),
        _ => Ok(number(fields, field)?.map(|v| v.trunc() == 1.0)),
    }
}

fn invalid(field: &'static str, value: impl std::fmt::Display) -> NormalizeError {
    NormalizeError::InvalidField {
        field,
        value: value.to_string(),
    }
}
