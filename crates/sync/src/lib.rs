//! The local side: a mirror of the upstream CRM that takes over reads once
//! it is populated.
//!
//! - [`client`]: the [`CrmClient`] seam, over HTTP or in-process.
//! - [`retry`]: the single retry helper used for upstream reads.
//! - [`orchestrator`]: bulk mirror population and sync metadata.
//! - [`dispatch`]: phase-aware routing of every tool call to upstream,
//!   mirror or both.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod orchestrator;
pub mod retry;

pub use client::{CrmClient, HttpCrmClient, InProcessClient, UpstreamError};
pub use config::SyncConfig;
pub use dispatch::{
    DispatchError, Dispatched, Dispatcher, MirrorReport, Outcome, Phase, Placement, Source, Tool,
};
pub use orchestrator::{SyncMetadata, SyncOrchestrator};
pub use retry::{with_retry, RetryFailure, RetryPolicy};

use std::sync::Arc;

use shadowcrm_storage::{ShadowStore, StorageError};

/// Run `work` against the mirror on the blocking pool. SQLite calls never
/// run on a runtime worker.
pub(crate) async fn on_mirror<T, F>(shadow: &Arc<ShadowStore>, work: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce(&ShadowStore) -> Result<T, StorageError> + Send + 'static,
{
    let store = shadow.clone();
    tokio::task::spawn_blocking(move || work(&store))
        .await
        .map_err(|e| StorageError::Unavailable {
            path: shadow.path().display().to_string(),
            message: format!("mirror task failed: {}", e),
        })?
}

/// Round to `places` decimal digits, for reported durations.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
