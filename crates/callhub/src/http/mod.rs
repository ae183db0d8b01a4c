//! Axum router wiring (§6). Handlers live in sibling modules grouped the
//! way the spec's endpoint table groups them.

pub mod batch;
pub mod calls;
pub mod error;
pub mod extract;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/calls/start-call", post(calls::start_call))
        .route("/calls/stream", get(calls::stream_calls))
        .route("/batch/trigger-batch-call", post(batch::trigger_batch_call))
        .route("/batch/batch-status/:id", get(batch::batch_status))
        .route("/batch/batch-cancel/:id", post(batch::batch_cancel))
        .route("/batch-view", get(batch::batch_view))
        .route("/batch-id/:batch_id", get(batch::batch_by_id))
        .route("/batch/stats", get(batch::batch_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
