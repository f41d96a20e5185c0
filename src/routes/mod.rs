//! HTTP gateway: merges the read-only subrouters and binds their state.
//!
//! Handlers only ever read the latest published [`Report`]; polling them does
//! not flush hourly buckets or advance alert throttles.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;

use crate::report::Report;

mod health;
mod stations;

// ---

/// Latest report produced by the reporting loop.
pub type ReportFeed = watch::Receiver<Arc<Report>>;

pub fn router(feed: ReportFeed) -> Router {
    // ---
    Router::new()
        .merge(stations::router())
        .merge(health::router())
        .with_state(feed)
}
