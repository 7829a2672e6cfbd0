use std::sync::Arc;

use shadowcrm_storage::RecordStore;
use shadowcrm_upstream::{seed_demo_data, server, RecordService, SeedOptions};

use crate::config::Settings;

pub(crate) fn cmd_serve(settings: &Settings, seed: bool) -> i32 {
    let config = &settings.upstream;
    let fresh = !config.db_path.exists();
    let store = match RecordStore::open(&config.db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    if seed && fresh {
        if let Err(e) = seed_demo_data(&store, &SeedOptions::default()) {
            eprintln!("error: seeding failed: {}", e);
            return 1;
        }
    }

    let service = Arc::new(RecordService::from_config(store, config));
    let latency = service.latency();
    tracing::info!(
        db = %config.db_path.display(),
        read_delay = ?latency.read,
        write_delay = ?latency.write,
        "opening CRM simulator"
    );

    let rt = crate::runtime();
    match rt.block_on(server::start_server(config.port, service)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Server error: {}", e);
            1
        }
    }
}
