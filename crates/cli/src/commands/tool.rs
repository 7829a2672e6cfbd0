use serde_json::{json, Value};

use crate::config::Settings;

/// Run a single tool call. Each invocation starts in the upstream-only
/// phase; use `session` to keep phase across calls.
///
/// Exits 0 on success, 1 when the tool reports an error, 2 for unparsable
/// arguments and 3 when the mirror storage is unusable.
pub(crate) fn cmd_tool(settings: &Settings, name: &str, raw_args: &str, in_process: bool) -> i32 {
    let args: Value = match serde_json::from_str(raw_args) {
        Ok(v) => v,
        Err(e) => {
            crate::print_json(&json!({ "error": format!("Invalid arguments: {}", e) }));
            return 2;
        }
    };
    let dispatcher = match super::build_dispatcher(settings, in_process) {
        Ok(d) => d,
        Err(e) => {
            crate::print_json(&json!({ "error": e }));
            return 1;
        }
    };

    let rt = crate::runtime();
    let dispatched = rt.block_on(dispatcher.dispatch(name, args));
    crate::print_json(&dispatched.to_json());
    match &dispatched.outcome {
        Ok(_) => 0,
        Err(err) if err.is_fatal() => 3,
        Err(_) => 1,
    }
}
