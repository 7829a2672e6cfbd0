//! CRM API handlers. Every one of them goes through the record service and
//! therefore through admission control.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shadowcrm_model::{
    ContactCreated, ContactDraft, ContactFilter, ContactList, DealCreated, DealDraft, DealFilter,
    DealList, ValidationError,
};

use super::{json_error, AppState};
use crate::admission::AdmissionError;
use crate::service::ServiceError;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ServiceError::Rejected(AdmissionError::RateLimited { .. }) => {
                json_error(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests", message)
                    .into_response()
            }
            ServiceError::Rejected(AdmissionError::ServiceUnavailable) => json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                message,
            )
            .into_response(),
            ServiceError::Validation(_) => {
                json_error(StatusCode::BAD_REQUEST, "Validation Error", message).into_response()
            }
            ServiceError::Storage(err) => {
                tracing::error!(error = %err, "record store failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error", message)
                    .into_response()
            }
        }
    }
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "Not Found", "no such endpoint")
}

/// Parse a request body leniently: an empty body is an empty draft, anything
/// that is not a JSON object is a validation failure.
fn parse_body(body: &Bytes) -> Result<serde_json::Value, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::Validation(ValidationError::Malformed(e.to_string())))
}

fn bad_query(rejection: QueryRejection) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "Validation Error",
        rejection.body_text(),
    )
    .into_response()
}

/// GET /api/contacts
pub(crate) async fn handle_list_contacts(
    State(service): State<AppState>,
    filter: Result<Query<ContactFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match filter {
        Ok(q) => q,
        Err(rejection) => return bad_query(rejection),
    };
    match service.list_contacts(&filter).await {
        Ok(contacts) => (StatusCode::OK, Json(ContactList::new(contacts))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// POST /api/contacts
pub(crate) async fn handle_create_contact(State(service): State<AppState>, body: Bytes) -> Response {
    let parsed = parse_body(&body).and_then(|v| ContactDraft::from_json(v).map_err(ServiceError::from));
    let draft = match parsed {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };
    match service.create_contact(draft).await {
        Ok(contact) => (
            StatusCode::CREATED,
            Json(ContactCreated {
                contact,
                message: "Contact created successfully".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// GET /api/deals
pub(crate) async fn handle_list_deals(
    State(service): State<AppState>,
    filter: Result<Query<DealFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match filter {
        Ok(q) => q,
        Err(rejection) => return bad_query(rejection),
    };
    match service.list_deals(&filter).await {
        Ok(deals) => (StatusCode::OK, Json(DealList::new(deals))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// POST /api/deals
pub(crate) async fn handle_create_deal(State(service): State<AppState>, body: Bytes) -> Response {
    let parsed = parse_body(&body).and_then(|v| DealDraft::from_json(v).map_err(ServiceError::from));
    let draft = match parsed {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };
    match service.create_deal(draft).await {
        Ok(deal) => (
            StatusCode::CREATED,
            Json(DealCreated {
                deal,
                message: "Deal created successfully".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
