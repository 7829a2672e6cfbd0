//! The upstream record service: admission, validation, latency, storage.

use std::sync::Arc;
use std::time::Duration;

use shadowcrm_model::{
    now_timestamp, Contact, ContactDraft, ContactFilter, Deal, DealDraft, DealFilter,
    ValidationError,
};
use shadowcrm_storage::{RecordStore, StorageError};

use crate::admission::{AdmissionController, AdmissionError, AdmissionPolicy};
use crate::config::UpstreamConfig;

/// Simulated per-operation latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub read: Duration,
    pub write: Duration,
}

impl Latency {
    /// No delay at all; for tests and embedded use.
    pub const NONE: Latency = Latency {
        read: Duration::ZERO,
        write: Duration::ZERO,
    };
}

impl Default for Latency {
    fn default() -> Self {
        UpstreamConfig::default().latency()
    }
}

/// Tagged failure of one record service call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] AdmissionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("record store failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate(message) => {
                ServiceError::Validation(ValidationError::Conflict(message))
            }
            other => ServiceError::Storage(other),
        }
    }
}

impl ServiceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::Rejected(AdmissionError::RateLimited { .. }))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ServiceError::Rejected(AdmissionError::ServiceUnavailable))
    }
}

/// Canonical store for contacts and deals, reachable only through admission
/// control.
///
/// Each operation admits first and returns a rejection without waiting.
/// Creates validate before the simulated latency, so bad input fails fast.
/// The latency is a `tokio` sleep: it holds up the calling task only.
/// Store calls run on the blocking pool.
pub struct RecordService {
    admission: AdmissionController,
    store: Arc<RecordStore>,
    latency: Latency,
}

impl RecordService {
    pub fn new(store: RecordStore, policy: AdmissionPolicy, latency: Latency) -> Self {
        RecordService {
            admission: AdmissionController::new(policy),
            store: Arc::new(store),
            latency,
        }
    }

    pub fn from_config(store: RecordStore, config: &UpstreamConfig) -> Self {
        Self::new(store, config.admission_policy(), config.latency())
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, ServiceError> {
        self.admission.admit().await?;
        tokio::time::sleep(self.latency.read).await;
        let filter = filter.clone();
        let contacts = self.on_store(move |store| store.list_contacts(&filter)).await?;
        tracing::debug!(count = contacts.len(), "listed contacts");
        Ok(contacts)
    }

    pub async fn create_contact(&self, draft: ContactDraft) -> Result<Contact, ServiceError> {
        self.admission.admit().await?;
        let contact = draft.validate()?;
        tokio::time::sleep(self.latency.write).await;
        let created = self
            .on_store(move |store| store.insert_contact(&contact, &now_timestamp()))
            .await?;
        tracing::info!(id = created.id, company = %created.company, "contact created");
        Ok(created)
    }

    pub async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, ServiceError> {
        self.admission.admit().await?;
        tokio::time::sleep(self.latency.read).await;
        let filter = filter.clone();
        let deals = self.on_store(move |store| store.list_deals(&filter)).await?;
        tracing::debug!(count = deals.len(), "listed deals");
        Ok(deals)
    }

    pub async fn create_deal(&self, draft: DealDraft) -> Result<Deal, ServiceError> {
        self.admission.admit().await?;
        let deal = draft.validate()?;
        tokio::time::sleep(self.latency.write).await;
        let created = self
            .on_store(move |store| store.insert_deal(&deal, &now_timestamp()))
            .await?;
        tracing::info!(id = created.id, amount = %created.amount, "deal created");
        Ok(created)
    }

    async fn on_store<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&RecordStore) -> Result<T, StorageError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| StorageError::Unavailable {
                path: self.store.path().display().to_string(),
                message: format!("store task failed: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn service(latency: Latency) -> RecordService {
        RecordService::new(
            RecordStore::open_in_memory().unwrap(),
            AdmissionPolicy::default(),
            latency,
        )
    }

    fn jane() -> ContactDraft {
        ContactDraft::from_json(json!({
            "first_name": "Jane",
            "last_name": "Smith",
            "email": "jane@acme.com",
            "company": "Acme Corp",
            "title": "VP of Engineering"
        }))
        .unwrap()
    }

    fn deal(amount: i64) -> DealDraft {
        DealDraft::from_json(json!({
            "name": format!("Deal {}", amount),
            "company": "Acme Corp",
            "amount": amount,
            "stage": "Prospecting",
            "close_date": "2026-12-01"
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn reads_and_writes_take_their_configured_latency() {
        let svc = service(Latency::default());

        let start = tokio::time::Instant::now();
        svc.create_contact(jane()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(1500));

        let start = tokio::time::Instant::now();
        let contacts = svc.list_contacts(&ContactFilter::default()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(contacts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn validation_fails_before_latency() {
        let svc = service(Latency::default());
        let mut draft = jane();
        draft.email = None;

        let start = tokio::time::Instant::now();
        let err = svc.create_contact(draft).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::MissingField("email"))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_returns_immediately() {
        let svc = service(Latency::default());
        svc.admission().set_outage(true).await;

        let start = tokio::time::Instant::now();
        let err = svc.list_deals(&DealFilter::default()).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn store_work_runs_off_the_runtime_thread() {
        let svc = service(Latency::NONE);
        let runtime_thread = std::thread::current().id();
        let store_thread = svc
            .on_store(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(store_thread, runtime_thread);
    }

    #[tokio::test]
    async fn every_endpoint_shares_one_window() {
        let svc = service(Latency::NONE);
        svc.list_contacts(&ContactFilter::default()).await.unwrap();
        svc.create_contact(jane()).await.unwrap();
        svc.list_deals(&DealFilter::default()).await.unwrap();
        svc.create_deal(deal(1000)).await.unwrap();
        svc.list_contacts(&ContactFilter::default()).await.unwrap();

        assert!(svc.create_deal(deal(2000)).await.unwrap_err().is_rate_limited());
        assert!(svc.list_contacts(&ContactFilter::default()).await.unwrap_err().is_rate_limited());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_validation_error() {
        let svc = service(Latency::NONE);
        svc.create_contact(jane()).await.unwrap();
        let err = svc.create_contact(jane()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::Conflict(_))));
    }

    #[tokio::test]
    async fn min_amount_filter_orders_descending() {
        let svc = service(Latency::NONE);
        for amount in [60_000, 20_000, 50_000] {
            svc.create_deal(deal(amount)).await.unwrap();
        }
        svc.admission().reset().await;
        let deals = svc
            .list_deals(&DealFilter::min_amount(50_000))
            .await
            .unwrap();
        let amounts: Vec<Decimal> = deals.iter().map(|d| d.amount).collect();
        assert_eq!(amounts, [Decimal::from(60_000), Decimal::from(50_000)]);
    }
}
