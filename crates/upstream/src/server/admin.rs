//! Operator controls. These bypass admission control: an operator must be
//! able to lift an outage or clear the window while the API is refusing work.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::{json_error, AppState};

#[derive(Debug, Default, Deserialize)]
struct DownRequest {
    down: Option<bool>,
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// POST /admin/down
///
/// `{"down": true|false}` sets outage mode; an empty body or a missing
/// `down` field toggles it.
pub(crate) async fn handle_admin_down(State(service): State<AppState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        DownRequest::default()
    } else {
        match serde_json::from_slice::<DownRequest>(&body) {
            Ok(r) => r,
            Err(e) => {
                return json_error(StatusCode::BAD_REQUEST, "Bad Request", e.to_string())
                    .into_response()
            }
        }
    };

    let admission = service.admission();
    let down_mode = match request.down {
        Some(down) => admission.set_outage(down).await,
        None => admission.toggle_outage().await,
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({ "down_mode": down_mode })),
    )
        .into_response()
}

/// POST /admin/reset-rate-limit
pub(crate) async fn handle_admin_reset(State(service): State<AppState>) -> impl IntoResponse {
    service.admission().reset().await;
    tracing::info!("rate limit window cleared by operator");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Rate limit reset" })),
    )
}

/// GET /admin/status
pub(crate) async fn handle_admin_status(State(service): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(service.admission().status().await))
}
