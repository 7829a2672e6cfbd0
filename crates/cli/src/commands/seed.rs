use shadowcrm_storage::RecordStore;
use shadowcrm_upstream::{seed_demo_data, SeedOptions};

use crate::config::Settings;

pub(crate) fn cmd_seed(settings: &Settings, options: SeedOptions) -> i32 {
    let path = &settings.upstream.db_path;
    let result = RecordStore::open(path).and_then(|store| seed_demo_data(&store, &options));
    match result {
        Ok(summary) => {
            crate::print_json(&serde_json::json!({
                "db_path": path.display().to_string(),
                "contacts": summary.contacts,
                "deals": summary.deals,
            }));
            0
        }
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}
