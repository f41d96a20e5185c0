use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::debug;

use super::ReportFeed;

// ---

pub fn router() -> Router<ReportFeed> {
    // ---
    Router::new()
        .route("/stations", get(list))
        .route("/stations/{id}", get(detail))
}

/// Full report from the latest reporting tick.
async fn list(State(feed): State<ReportFeed>) -> impl IntoResponse {
    // ---
    let report = feed.borrow().clone();
    debug!("GET /stations - {} stations", report.stations.len());
    Json((*report).clone())
}

/// Snapshot of one station from the latest reporting tick.
async fn detail(Path(id): Path<String>, State(feed): State<ReportFeed>) -> impl IntoResponse {
    // ---
    let report = feed.borrow().clone();
    match report.station(&id) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot.clone())).into_response(),
        None => {
            debug!("GET /stations/{} - unknown station", id);
            (StatusCode::NOT_FOUND, Json("Unknown station")).into_response()
        }
    }
}
