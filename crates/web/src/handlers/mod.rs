use axum::{Router, routing::post};

use crate::AppState;

mod webhook;

pub fn build_router() -> Router<AppState> {
    Router::new()
        // Legacy mount point, existing hooks post to the root path
        .route("/", post(webhook::webhook))
        .route("/api/bitbucket/webhook", post(webhook::webhook))
}
