//! CRM client that calls a [`RecordService`] in the same process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shadowcrm_model::{Contact, ContactDraft, ContactFilter, Deal, DealDraft, DealFilter};
use shadowcrm_upstream::{AdmissionError, RecordService, ServiceError};

use super::{CrmClient, UpstreamError, DEFAULT_TIMEOUT};

/// Same admission control and latency as the HTTP surface, without the
/// socket. Calls are bounded by the same deadline the HTTP client uses.
#[derive(Clone)]
pub struct InProcessClient {
    service: Arc<RecordService>,
    timeout: Duration,
}

impl InProcessClient {
    pub fn new(service: Arc<RecordService>) -> Self {
        InProcessClient {
            service,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service(&self) -> &Arc<RecordService> {
        &self.service
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, UpstreamError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(UpstreamError::from),
            Err(_) => Err(UpstreamError::Unreachable(format!(
                "no response within {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

impl From<ServiceError> for UpstreamError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(AdmissionError::RateLimited { .. }) => UpstreamError::RateLimited,
            ServiceError::Rejected(AdmissionError::ServiceUnavailable) => {
                UpstreamError::ServiceUnavailable
            }
            ServiceError::Validation(e) => UpstreamError::Validation(e.to_string()),
            ServiceError::Storage(e) => UpstreamError::Protocol(e.to_string()),
        }
    }
}

#[async_trait]
impl CrmClient for InProcessClient {
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, UpstreamError> {
        self.bounded(self.service.list_contacts(filter)).await
    }

    async fn create_contact(&self, draft: &ContactDraft) -> Result<Contact, UpstreamError> {
        self.bounded(self.service.create_contact(draft.clone())).await
    }

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, UpstreamError> {
        self.bounded(self.service.list_deals(filter)).await
    }

    async fn create_deal(&self, draft: &DealDraft) -> Result<Deal, UpstreamError> {
        self.bounded(self.service.create_deal(draft.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowcrm_storage::RecordStore;
    use shadowcrm_upstream::{AdmissionPolicy, Latency};

    fn client(latency: Latency) -> InProcessClient {
        let store = RecordStore::open_in_memory().unwrap();
        InProcessClient::new(Arc::new(RecordService::new(
            store,
            AdmissionPolicy::default(),
            latency,
        )))
    }

    #[tokio::test]
    async fn outage_maps_to_service_unavailable() {
        let client = client(Latency::NONE);
        client.service().admission().set_outage(true).await;
        let err = client.list_contacts(&ContactFilter::default()).await.unwrap_err();
        assert_eq!(err, UpstreamError::ServiceUnavailable);
    }

    #[tokio::test]
    async fn validation_message_is_carried() {
        let client = client(Latency::NONE);
        let err = client
            .create_contact(&ContactDraft::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Validation("Missing required field: first_name".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_is_unreachable_after_deadline() {
        let client = client(Latency {
            read: Duration::from_secs(30),
            write: Duration::ZERO,
        })
        .with_timeout(Duration::from_secs(10));

        let start = tokio::time::Instant::now();
        let err = client.list_deals(&DealFilter::default()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unreachable(_)));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
