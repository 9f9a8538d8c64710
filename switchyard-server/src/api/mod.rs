//! API Routes
//!
//! Operator endpoints under `/api` plus the tenant-facing completion handler.

pub mod channels;
pub mod completions;
mod error;


use axum::{
    routing::{get, post},
    Router,
};

pub use error::ApiError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/:id/test", post(channels::test_channel))
        .route("/channels/:id/metrics", get(channels::channel_metrics))
}
