use crate::api::responses::{
    ErrorCode, ErrorResponse, HealthStatus, HealthSuccessResponse, OccupancyStatusResponse,
    ReadingResponse, SensorHistoryResponse, SensorsSuccessResponse, TransitionResponse,
};
use crate::fusion::SharedEngine;
use crate::fusion::analyzer::VoteSource;
use crate::sensor::SensorRole;
use crate::timestamp::{format_rfc3339, rfc3339_lossy};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::SystemTime;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const MONITORED_GROUPS: usize = 3;

pub enum ApiResponse<T> {
    Success { status: StatusCode, body: T },
    Error { status: StatusCode, body: ErrorResponse },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_occupancy(State(engine): State<SharedEngine>) -> impl IntoResponse {
    build_occupancy_response(&engine, SystemTime::now())
}

pub async fn get_sensors(State(engine): State<SharedEngine>) -> impl IntoResponse {
    build_sensors_response(&engine, SystemTime::now())
}

pub async fn get_health(State(engine): State<SharedEngine>) -> impl IntoResponse {
    build_health_response(&engine, SystemTime::now())
}

fn build_occupancy_response(
    engine: &SharedEngine,
    now: SystemTime,
) -> ApiResponse<OccupancyStatusResponse> {
    let (current, last_occupied, last_vacant, last_transition) = match engine.read() {
        Ok(guard) => {
            let state = guard.state();
            (
                state.current(),
                state.last_occupied_time(),
                state.last_vacant_time(),
                state.last_transition().copied(),
            )
        }
        Err(_) => return internal_error("/api/occupancy", "state lock poisoned while reading occupancy"),
    };

    let formatted = (|| -> Result<OccupancyStatusResponse, time::error::Format> {
        Ok(OccupancyStatusResponse {
            occupancy_state: current,
            last_occupied_time: last_occupied.map(format_rfc3339).transpose()?,
            last_vacant_time: last_vacant.map(format_rfc3339).transpose()?,
            last_transition: last_transition
                .map(|t| {
                    Ok::<_, time::error::Format>(TransitionResponse {
                        previous_state: t.previous_state,
                        new_state: t.new_state,
                        at: format_rfc3339(t.at)?,
                        confidence: t.confidence,
                    })
                })
                .transpose()?,
            timestamp: format_rfc3339(now)?,
        })
    })();

    match formatted {
        Ok(body) => ApiResponse::Success {
            status: StatusCode::OK,
            body,
        },
        Err(_) => internal_error("/api/occupancy", "timestamp formatting failure"),
    }
}

fn build_sensors_response(engine: &SharedEngine, now: SystemTime) -> ApiResponse<SensorsSuccessResponse> {
    let guard = match engine.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error("/api/sensors", "state lock poisoned while reading history"),
    };

    let mut sensors = Vec::with_capacity(SensorRole::ALL.len());
    for role in SensorRole::ALL {
        let mut readings = Vec::new();
        for reading in guard.history().history(role) {
            match format_rfc3339(reading.observed_at) {
                Ok(observed_at) => readings.push(ReadingResponse {
                    motion: reading.motion,
                    distance_cm: reading.distance_cm,
                    observed_at,
                }),
                Err(_) => return internal_error("/api/sensors", "timestamp formatting failure"),
            }
        }
        sensors.push(SensorHistoryResponse {
            sensor: role,
            topic: role.topic(),
            readings,
        });
    }
    drop(guard);

    match format_rfc3339(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: SensorsSuccessResponse { sensors, timestamp },
        },
        Err(_) => internal_error("/api/sensors", "timestamp formatting failure"),
    }
}

fn build_health_response(engine: &SharedEngine, now: SystemTime) -> ApiResponse<HealthSuccessResponse> {
    let active_sensors = match engine.read() {
        Ok(guard) => guard.snapshot(now).active_sources,
        Err(_) => return internal_error("/api/health", "state lock poisoned while reading sensors"),
    };

    let status = derive_health_status(&active_sensors);
    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    match format_rfc3339(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: status_code,
            body: HealthSuccessResponse {
                status,
                active_sensors,
                timestamp,
            },
        },
        Err(_) => internal_error("/api/health", "timestamp formatting failure"),
    }
}

fn derive_health_status(active: &[VoteSource]) -> HealthStatus {
    match active.len() {
        0 => HealthStatus::Ko,
        n if n >= MONITORED_GROUPS => HealthStatus::Ok,
        _ => HealthStatus::Degraded,
    }
}

fn internal_error<T>(route: &str, message: &str) -> ApiResponse<T> {
    error!(route, message, "Internal error while handling request");
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: rfc3339_lossy(SystemTime::now()),
        },
    }
}
