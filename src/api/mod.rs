use crate::fusion::SharedEngine;
use axum::Router;
use axum::routing::get;

pub mod handlers;
pub mod responses;

pub fn router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/api/occupancy", get(handlers::get_occupancy))
        .route("/api/sensors", get(handlers::get_sensors))
        .route("/api/health", get(handlers::get_health))
        .with_state(engine)
}
