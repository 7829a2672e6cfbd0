//! CRM client over HTTP.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so that a
//! slow upstream never stalls the async runtime.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shadowcrm_model::{
    Contact, ContactCreated, ContactDraft, ContactFilter, ContactList, Deal, DealCreated,
    DealDraft, DealFilter, DealList, ErrorBody,
};
use ureq::http::Response;
use ureq::Body;

use super::{CrmClient, UpstreamError, DEFAULT_TIMEOUT};

/// Talks to the upstream's `/api/*` endpoints.
#[derive(Clone)]
pub struct HttpCrmClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpCrmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds each call end to end.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        HttpCrmClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T>(&self, path: &str, query: Vec<(&'static str, String)>) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = format!("{}{}", self.base_url, path);
        tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&url);
            for (key, value) in &query {
                request = request.query(*key, value);
            }
            let response = request.call().map_err(transport)?;
            read_response(response)
        })
        .await
        .map_err(|e| UpstreamError::Protocol(format!("task join error: {}", e)))?
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, UpstreamError>
    where
        B: Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = format!("{}{}", self.base_url, path);
        let body = serde_json::to_value(body).map_err(|e| UpstreamError::Protocol(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let response = agent.post(&url).send_json(&body).map_err(transport)?;
            read_response(response)
        })
        .await
        .map_err(|e| UpstreamError::Protocol(format!("task join error: {}", e)))?
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, UpstreamError> {
        let mut query = Vec::new();
        if let Some(company) = &filter.company {
            query.push(("company", company.clone()));
        }
        let list: ContactList = self.get("/api/contacts", query).await?;
        Ok(list.contacts)
    }

    async fn create_contact(&self, draft: &ContactDraft) -> Result<Contact, UpstreamError> {
        let created: ContactCreated = self.post("/api/contacts", draft).await?;
        Ok(created.contact)
    }

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, UpstreamError> {
        let mut query = Vec::new();
        if let Some(min) = filter.min_amount {
            query.push(("min_amount", min.to_string()));
        }
        if let Some(company) = &filter.company {
            query.push(("company", company.clone()));
        }
        let list: DealList = self.get("/api/deals", query).await?;
        Ok(list.deals)
    }

    async fn create_deal(&self, draft: &DealDraft) -> Result<Deal, UpstreamError> {
        let created: DealCreated = self.post("/api/deals", draft).await?;
        Ok(created.deal)
    }
}

/// Anything that prevented a response from arriving.
fn transport(err: ureq::Error) -> UpstreamError {
    match err {
        ureq::Error::Timeout(_) => UpstreamError::Unreachable("request timed out".to_string()),
        other => UpstreamError::Unreachable(other.to_string()),
    }
}

/// Map a status code onto the upstream error taxonomy.
fn read_response<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T, UpstreamError> {
    let status = response.status().as_u16();
    match status {
        200 | 201 => response
            .body_mut()
            .read_json()
            .map_err(|e| UpstreamError::Protocol(format!("failed to parse response: {}", e))),
        429 => Err(UpstreamError::RateLimited),
        503 => Err(UpstreamError::ServiceUnavailable),
        400 => {
            let message = match response.body_mut().read_json::<ErrorBody>() {
                Ok(body) if !body.message.is_empty() => body.message,
                Ok(body) => body.error,
                Err(_) => "upstream rejected the request".to_string(),
            };
            Err(UpstreamError::Validation(message))
        }
        other => {
            let text = response.body_mut().read_to_string().unwrap_or_default();
            Err(UpstreamError::Protocol(format!("HTTP {}: {}", other, text)))
        }
    }
}
