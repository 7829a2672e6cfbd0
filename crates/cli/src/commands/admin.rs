//! `shadowcrm admin` -- HTTP client for the operator endpoints.

use serde_json::{json, Value};

use crate::config::Settings;
use crate::AdminAction;

pub(crate) fn cmd_admin(settings: &Settings, action: AdminAction) -> i32 {
    let base = settings.sync.base_url.trim_end_matches('/');
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(settings.sync.request_timeout()))
        .http_status_as_error(false)
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let result = match action {
        AdminAction::Down => agent
            .post(&format!("{}/admin/down", base))
            .send_json(json!({"down": true})),
        AdminAction::Up => agent
            .post(&format!("{}/admin/down", base))
            .send_json(json!({"down": false})),
        AdminAction::Toggle => agent.post(&format!("{}/admin/down", base)).send_empty(),
        AdminAction::Reset => agent
            .post(&format!("{}/admin/reset-rate-limit", base))
            .send_empty(),
        AdminAction::Status => agent.get(&format!("{}/admin/status", base)).call(),
    };

    let mut response = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: CRM server at {} is unreachable: {}", base, e);
            return 1;
        }
    };
    let status = response.status();
    let body: Value = match response.body_mut().read_json() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: unexpected response ({}): {}", status, e);
            return 1;
        }
    };
    crate::print_json(&body);
    if status.is_success() {
        0
    } else {
        1
    }
}
