//! Bulk population of the shadow mirror from upstream.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shadowcrm_model::{now_timestamp, ContactFilter, DealFilter};
use shadowcrm_storage::ShadowStore;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::client::CrmClient;
use crate::on_mirror;
use crate::retry::{with_retry, RetryPolicy};

/// Result of the most recent [`SyncOrchestrator::sync_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// RFC 3339 time the sync finished.
    pub last_sync: Option<String>,
    pub contacts_synced: usize,
    pub deals_synced: usize,
    /// Failures of this attempt only, one per entity kind at most.
    pub errors: Vec<String>,
    pub elapsed_seconds: f64,
}

impl SyncMetadata {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct SyncOrchestrator {
    client: Arc<dyn CrmClient>,
    shadow: Arc<ShadowStore>,
    retry: RetryPolicy,
    /// Held for the whole of `sync_all`, so syncs never interleave.
    last: Mutex<Option<SyncMetadata>>,
}

impl SyncOrchestrator {
    pub fn new(client: Arc<dyn CrmClient>, shadow: Arc<ShadowStore>, retry: RetryPolicy) -> Self {
        SyncOrchestrator {
            client,
            shadow,
            retry,
            last: Mutex::new(None),
        }
    }

    /// Pull every contact and deal into the mirror.
    ///
    /// Never fails: a kind that cannot be fetched or stored is skipped and
    /// reported in `errors`, and the other kind still syncs.
    pub async fn sync_all(&self) -> SyncMetadata {
        let mut last = self.last.lock().await;
        let start = Instant::now();
        let mut meta = SyncMetadata::default();

        if let Err(err) = on_mirror(&self.shadow, |m| m.create_if_absent()).await {
            meta.errors.push(format!("mirror: {}", err));
        } else {
            let every_contact = ContactFilter::default();
            match with_retry(&self.retry, "contacts", || {
                self.client.list_contacts(&every_contact)
            })
            .await
            {
                Ok(contacts) => match on_mirror(&self.shadow, move |m| m.upsert_contacts(&contacts))
                    .await
                {
                    Ok(n) => meta.contacts_synced = n,
                    Err(err) => meta.errors.push(format!("contacts: {}", err)),
                },
                Err(failure) => meta.errors.push(format!("contacts: {}", failure)),
            }

            let every_deal = DealFilter::default();
            match with_retry(&self.retry, "deals", || self.client.list_deals(&every_deal))
            .await
            {
                Ok(deals) => match on_mirror(&self.shadow, move |m| m.upsert_deals(&deals))
                    .await
                {
                    Ok(n) => meta.deals_synced = n,
                    Err(err) => meta.errors.push(format!("deals: {}", err)),
                },
                Err(failure) => meta.errors.push(format!("deals: {}", failure)),
            }
        }

        meta.elapsed_seconds = crate::round_to(start.elapsed().as_secs_f64(), 2);
        meta.last_sync = Some(now_timestamp());
        if meta.is_clean() {
            tracing::info!(
                contacts = meta.contacts_synced,
                deals = meta.deals_synced,
                elapsed = meta.elapsed_seconds,
                "mirror synced"
            );
        } else {
            tracing::warn!(errors = ?meta.errors, "mirror sync incomplete");
        }

        *last = Some(meta.clone());
        meta
    }

    /// Metadata of the last finished sync, if any. Waits for a running one.
    pub async fn last_sync(&self) -> Option<SyncMetadata> {
        self.last.lock().await.clone()
    }

    pub fn shadow(&self) -> &Arc<ShadowStore> {
        &self.shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InProcessClient;
    use serde_json::json;
    use shadowcrm_model::{ContactDraft, DealDraft};
    use shadowcrm_storage::{EntityKind, MirrorState, RecordStore};
    use shadowcrm_upstream::{AdmissionPolicy, Latency, RecordService};
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        service: Arc<RecordService>,
        shadow: Arc<ShadowStore>,
        sync: SyncOrchestrator,
    }

    fn fixture(policy: AdmissionPolicy) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(RecordService::new(
            RecordStore::open_in_memory().unwrap(),
            policy,
            Latency::NONE,
        ));
        let shadow = Arc::new(ShadowStore::new(dir.path().join("shadow.db")));
        let sync = SyncOrchestrator::new(
            Arc::new(InProcessClient::new(service.clone())),
            shadow.clone(),
            RetryPolicy::default(),
        );
        Fixture {
            _dir: dir,
            service,
            shadow,
            sync,
        }
    }

    async fn populate(service: &RecordService) {
        let contact = ContactDraft::from_json(json!({
            "first_name": "Ada", "last_name": "Lovelace", "email": "ada@engines.io",
            "company": "Analytical Engines", "title": "CTO"
        }))
        .unwrap();
        service.create_contact(contact).await.unwrap();
        service.admission().reset().await;
        let deal = DealDraft::from_json(json!({
            "name": "Difference Engine", "company": "Analytical Engines",
            "amount": 75000, "stage": "Negotiation", "close_date": "2026-11-30"
        }))
        .unwrap();
        service.create_deal(deal).await.unwrap();
        service.admission().reset().await;
    }

    #[tokio::test]
    async fn sync_populates_and_is_idempotent() {
        let fx = fixture(AdmissionPolicy::default());
        populate(&fx.service).await;
        assert_eq!(fx.shadow.lifecycle().unwrap(), MirrorState::Absent);

        let first = fx.sync.sync_all().await;
        assert!(first.is_clean(), "{:?}", first.errors);
        assert_eq!((first.contacts_synced, first.deals_synced), (1, 1));
        let rows_after_first = fx.shadow.query("SELECT * FROM contacts").unwrap();

        fx.service.admission().reset().await;
        let second = fx.sync.sync_all().await;
        assert!(second.is_clean());
        assert_eq!(fx.shadow.query("SELECT * FROM contacts").unwrap(), rows_after_first);
        assert_eq!(fx.shadow.count(EntityKind::Deals).unwrap(), 1);
        assert_eq!(fx.sync.last_sync().await, Some(second));
    }

    #[tokio::test]
    async fn outage_is_reported_per_kind() {
        let fx = fixture(AdmissionPolicy::default());
        fx.service.admission().set_outage(true).await;

        let meta = fx.sync.sync_all().await;
        assert_eq!(
            meta.errors,
            [
                "contacts: CRM API is down (503)",
                "deals: CRM API is down (503)"
            ]
        );
        assert_eq!(fx.shadow.lifecycle().unwrap(), MirrorState::Empty);
        assert!(meta.last_sync.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_kind_retries_after_backoff() {
        // one slot: contacts succeed, deals are refused until the window
        // slides past the contacts request
        let fx = fixture(AdmissionPolicy {
            limit: 1,
            window: Duration::from_secs(1),
        });
        populate(&fx.service).await;

        let meta = fx.sync.sync_all().await;
        assert!(meta.is_clean(), "{:?}", meta.errors);
        assert_eq!(meta.deals_synced, 1);
        assert_eq!(meta.elapsed_seconds, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_skips_the_kind() {
        let fx = fixture(AdmissionPolicy {
            limit: 1,
            window: Duration::from_secs(60),
        });
        populate(&fx.service).await;

        let meta = fx.sync.sync_all().await;
        assert_eq!(meta.contacts_synced, 1);
        assert_eq!(meta.deals_synced, 0);
        assert_eq!(
            meta.errors,
            ["deals: Rate limit exceeded (429) (after 2 attempts)"]
        );
    }
}
