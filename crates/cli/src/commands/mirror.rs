use serde_json::json;
use shadowcrm_storage::{EntityKind, MirrorState, ShadowStore, StorageError};

use crate::config::Settings;
use crate::MirrorAction;

pub(crate) fn cmd_mirror(settings: &Settings, action: MirrorAction) -> i32 {
    let shadow = ShadowStore::new(&settings.sync.shadow_db_path);
    let result = match action {
        MirrorAction::Status => status(&shadow),
        MirrorAction::Pending => shadow.pending_writes().map(|pending| {
            let count = pending.len();
            json!({ "pending_writes": pending, "count": count })
        }),
    };
    match result {
        Ok(value) => {
            crate::print_json(&value);
            0
        }
        Err(e) => {
            crate::print_json(&json!({ "error": e.to_string() }));
            1
        }
    }
}

fn status(shadow: &ShadowStore) -> Result<serde_json::Value, StorageError> {
    let state = shadow.lifecycle()?;
    let mut report = json!({
        "path": shadow.path().display().to_string(),
        "mirror": state,
    });
    if state != MirrorState::Absent {
        report["contacts"] = json!(shadow.count(EntityKind::Contacts)?);
        report["deals"] = json!(shadow.count(EntityKind::Deals)?);
        report["pending_writes"] = json!(shadow.pending_writes()?.len());
    }
    Ok(report)
}
