//! Response construction.
//!
//! Every non-relay response the gateway produces is a JSON object with a
//! human-readable `error` and a stable machine-readable `code`. Upstream
//! detail never leaks through here; callers pass curated messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Build a structured error response.
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}
