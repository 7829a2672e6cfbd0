//! Tool names and argument shapes.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::DispatchError;

/// Every operation the dispatch layer can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    ListContacts,
    CreateContact,
    ListDeals,
    CreateDeal,
    CreateLocalDb,
    LocalDbQuery,
    LocalDbInsert,
    SyncCrmToLocal,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::ListContacts,
        Tool::CreateContact,
        Tool::ListDeals,
        Tool::CreateDeal,
        Tool::CreateLocalDb,
        Tool::LocalDbQuery,
        Tool::LocalDbInsert,
        Tool::SyncCrmToLocal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::ListContacts => "crm_list_contacts",
            Tool::CreateContact => "crm_create_contact",
            Tool::ListDeals => "crm_list_deals",
            Tool::CreateDeal => "crm_create_deal",
            Tool::CreateLocalDb => "create_local_db",
            Tool::LocalDbQuery => "local_db_query",
            Tool::LocalDbInsert => "local_db_insert",
            Tool::SyncCrmToLocal => "sync_crm_to_local",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == s.trim())
            .ok_or_else(|| DispatchError::UnknownTool(s.to_string()))
    }
}

/// `{"filters": {...}}`; a missing or null `filters` means no filter.
pub(crate) fn filters<T: DeserializeOwned + Default>(args: &Value) -> Result<T, DispatchError> {
    match args.get("filters") {
        None | Some(Value::Null) => Ok(T::default()),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| DispatchError::InvalidArguments(format!("filters: {}", e))),
    }
}

/// `{"data": {...}}` or the record fields directly.
pub(crate) fn payload(args: Value) -> Value {
    match args {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// `{"sql": "..."}`.
pub(crate) fn sql(args: &Value) -> Result<String, DispatchError> {
    args.get("sql")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DispatchError::InvalidArguments("'sql' is required".to_string()))
}

/// `{"table": "...", "data": {...}}`. Missing parts come back empty and are
/// rejected by the mirror itself.
pub(crate) fn insert_args(args: &Value) -> Result<(String, Map<String, Value>), DispatchError> {
    let table = args
        .get("table")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let data = match args.get("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(DispatchError::InvalidArguments(
                "'data' must be an object".to_string(),
            ))
        }
    };
    Ok((table, data))
}
