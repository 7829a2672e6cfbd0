pub(crate) mod admin;
pub(crate) mod mirror;
pub(crate) mod seed;
pub(crate) mod serve;
pub(crate) mod session;
pub(crate) mod tool;

use std::sync::Arc;

use shadowcrm_storage::{RecordStore, ShadowStore};
use shadowcrm_sync::{CrmClient, Dispatcher, HttpCrmClient, InProcessClient};
use shadowcrm_upstream::RecordService;

use crate::config::Settings;

/// A dispatcher wired to the configured mirror, talking to upstream over
/// HTTP or, with `in_process`, to a record service on the upstream database.
pub(crate) fn build_dispatcher(settings: &Settings, in_process: bool) -> Result<Dispatcher, String> {
    let timeout = settings.sync.request_timeout();
    let client: Arc<dyn CrmClient> = if in_process {
        let store = RecordStore::open(&settings.upstream.db_path).map_err(|e| e.to_string())?;
        let service = Arc::new(RecordService::from_config(store, &settings.upstream));
        Arc::new(InProcessClient::new(service).with_timeout(timeout))
    } else {
        Arc::new(HttpCrmClient::with_timeout(&settings.sync.base_url, timeout))
    };
    let shadow = Arc::new(ShadowStore::new(&settings.sync.shadow_db_path));
    Ok(Dispatcher::new(client, shadow, settings.sync.retry_policy()))
}
