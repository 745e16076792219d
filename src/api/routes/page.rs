//! Page Routes
//!
//! - GET / - Static client page
//! - GET /favicon.ico - Empty response

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::state::AppState;

/// GET /
///
/// Serves the configured page. A read failure is reported as the response
/// body rather than an error status.
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    let path = &state.config.server.page_path;

    match tokio::fs::read_to_string(path).await {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to read page");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
                .into_response()
        }
    }
}

/// GET /favicon.ico
pub async fn favicon() -> StatusCode {
    StatusCode::OK
}
