//! Upstream HTTP surface: the CRM API plus an operator admin API.
//!
//! Endpoints:
//! - GET  /health                   - liveness, bypasses admission control
//! - GET  /api/contacts             - list contacts (`?company=`)
//! - POST /api/contacts             - create a contact
//! - GET  /api/deals                - list deals (`?min_amount=&company=`)
//! - POST /api/deals                - create a deal
//! - POST /admin/down               - set (`{"down": bool}`) or toggle outage mode
//! - POST /admin/reset-rate-limit   - clear the admission window
//! - GET  /admin/status             - admission snapshot
//!
//! Only `/api/*` goes through the admission controller. All responses are
//! JSON; errors use the `{error, message}` body.

mod admin;
mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use shadowcrm_model::ErrorBody;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::service::RecordService;

use self::admin::{handle_admin_down, handle_admin_reset, handle_admin_status, handle_health};
use self::handlers::{
    handle_create_contact, handle_create_deal, handle_list_contacts, handle_list_deals,
    handle_not_found,
};

/// Shared handler state.
pub(crate) type AppState = Arc<RecordService>;

/// Construct a JSON error response with the given status code.
pub(crate) fn json_error(status: StatusCode, error: &str, message: impl Into<String>) -> impl IntoResponse {
    (status, Json(ErrorBody::new(error, message)))
}

/// Build the full router around one record service.
pub fn router(service: Arc<RecordService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/contacts",
            get(handle_list_contacts).post(handle_create_contact),
        )
        .route("/api/deals", get(handle_list_deals).post(handle_create_deal))
        .route("/admin/down", post(handle_admin_down))
        .route("/admin/reset-rate-limit", post(handle_admin_reset))
        .route("/admin/status", get(handle_admin_status))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: Arc<RecordService>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `0.0.0.0:port` and serve until Ctrl+C.
pub async fn start_server(
    port: u16,
    service: Arc<RecordService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let policy = service.admission().policy();
    tracing::info!(
        %addr,
        rate_limit = policy.limit,
        window_secs = policy.window.as_secs(),
        "CRM simulator listening"
    );

    serve(listener, service, shutdown_signal()).await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
