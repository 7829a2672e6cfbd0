//! `shadowcrm session` -- a long-lived dispatcher fed by JSON lines.
//!
//! Each input line is one of:
//! - `{"tool": "<name>", "arguments": {...}}`
//! - `<name> {json arguments}` (arguments optional)
//! - `status`, `pending`, `help`, `quit`
//!
//! Every line produces exactly one JSON line on stdout. Phase state lives
//! for the whole session.

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};
use shadowcrm_sync::{Dispatcher, Tool};

use crate::config::Settings;

pub(crate) fn cmd_session(settings: &Settings, in_process: bool) -> i32 {
    let dispatcher = match super::build_dispatcher(settings, in_process) {
        Ok(d) => d,
        Err(e) => {
            crate::print_json(&json!({ "error": e }));
            return 1;
        }
    };
    let rt = crate::runtime();

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("error reading input: {}", e);
                return 1;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match trimmed {
            "quit" | "exit" => break,
            "help" => help(),
            "status" => match rt.block_on(dispatcher.report()) {
                Ok(report) => json!(report),
                Err(e) => json!({ "error": e.to_string() }),
            },
            "pending" => match dispatcher.pending_writes() {
                Ok(pending) => json!({ "pending_writes": pending }),
                Err(e) => json!({ "error": e.to_string() }),
            },
            _ => match parse_call(trimmed) {
                Ok((name, args)) => rt.block_on(run(&dispatcher, &name, args)),
                Err(e) => json!({ "error": e }),
            },
        };

        println!("{}", reply);
        if io::stdout().flush().is_err() {
            break;
        }
    }
    0
}

async fn run(dispatcher: &Dispatcher, name: &str, args: Value) -> Value {
    let dispatched = dispatcher.dispatch(name, args).await;
    let mut reply = dispatched.to_json();
    if let Value::Object(map) = &mut reply {
        map.insert("phase".into(), json!(dispatcher.phase().await));
    }
    reply
}

/// Split a line into a tool name and its arguments.
fn parse_call(line: &str) -> Result<(String, Value), String> {
    if line.starts_with('{') {
        let mut call: Value =
            serde_json::from_str(line).map_err(|e| format!("Invalid request: {}", e))?;
        let name = call
            .get("tool")
            .and_then(Value::as_str)
            .ok_or_else(|| "Invalid request: 'tool' is required".to_string())?
            .to_string();
        let args = call
            .get_mut("arguments")
            .map(Value::take)
            .unwrap_or_else(|| json!({}));
        return Ok((name, args));
    }

    let (name, rest) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line, ""));
    let rest = rest.trim();
    let args = if rest.is_empty() {
        json!({})
    } else {
        serde_json::from_str(rest).map_err(|e| format!("Invalid arguments: {}", e))?
    };
    Ok((name.to_string(), args))
}

fn help() -> Value {
    let tools: Vec<&str> = Tool::ALL.iter().map(Tool::name).collect();
    json!({
        "tools": tools,
        "commands": ["status", "pending", "help", "quit"],
        "usage": "{\"tool\": \"<name>\", \"arguments\": {...}} or <name> {json}",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_line_forms() {
        let (name, args) =
            parse_call(r#"{"tool": "crm_list_deals", "arguments": {"filters": {"min_amount": 5}}}"#)
                .unwrap();
        assert_eq!(name, "crm_list_deals");
        assert_eq!(args, json!({"filters": {"min_amount": 5}}));

        let (name, args) = parse_call(r#"local_db_query {"sql": "SELECT 1"}"#).unwrap();
        assert_eq!(name, "local_db_query");
        assert_eq!(args["sql"], "SELECT 1");

        let (name, args) = parse_call("sync_crm_to_local").unwrap();
        assert_eq!(name, "sync_crm_to_local");
        assert_eq!(args, json!({}));
    }

    #[test]
    fn rejects_requests_without_a_tool() {
        assert!(parse_call(r#"{"arguments": {}}"#).is_err());
        assert!(parse_call("crm_list_contacts {not json").is_err());
    }
}
