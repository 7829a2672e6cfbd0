//! What a dispatched operation produced, and its JSON rendering.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Map, Value};
use shadowcrm_model::{Contact, Deal, ValidationError};
use shadowcrm_storage::{MirrorState, PendingWrite, QueryRow, StorageError};

use crate::client::UpstreamError;
use crate::orchestrator::SyncMetadata;

use super::Phase;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    /// The mirror file itself is unusable; retrying the call will not help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Storage(err) if err.is_fatal())
    }
}

/// Where a listing was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Upstream,
    Mirror,
}

/// Where a create ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Upstream only; no mirror involved.
    Upstream,
    /// Upstream, with the returned entity copied into the mirror.
    Mirrored,
    /// Mirror only, with a ledger entry for the upstream write.
    Queued {
        pending: PendingWrite,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Contacts {
        contacts: Vec<Contact>,
        source: Source,
    },
    Deals {
        deals: Vec<Deal>,
        source: Source,
    },
    ContactCreated {
        contact: Contact,
        placement: Placement,
    },
    DealCreated {
        deal: Deal,
        placement: Placement,
    },
    MirrorCreated {
        path: PathBuf,
    },
    Rows(Vec<QueryRow>),
    Inserted {
        table: String,
    },
    Synced(SyncMetadata),
}

impl Outcome {
    /// The JSON payload, without timing.
    pub fn to_json(&self) -> Value {
        match self {
            Outcome::Contacts { contacts, source } => json!({
                "contacts": contacts,
                "count": contacts.len(),
                "source": source,
            }),
            Outcome::Deals { deals, source } => json!({
                "deals": deals,
                "count": deals.len(),
                "source": source,
            }),
            Outcome::ContactCreated { contact, placement } => {
                created("contact", json!(contact), "Contact", placement)
            }
            Outcome::DealCreated { deal, placement } => {
                created("deal", json!(deal), "Deal", placement)
            }
            Outcome::MirrorCreated { path } => json!({
                "message": "Local shadow database created",
                "path": path.display().to_string(),
            }),
            Outcome::Rows(rows) => json!({
                "results": rows,
                "count": rows.len(),
            }),
            Outcome::Inserted { table } => json!({
                "message": format!("Inserted into {}", table),
            }),
            Outcome::Synced(meta) => json!(meta),
        }
    }
}

fn created(key: &str, entity: Value, noun: &str, placement: &Placement) -> Value {
    let mut body = Map::new();
    body.insert(key.to_string(), entity);
    match placement {
        Placement::Upstream => {
            body.insert("message".into(), json!(format!("{} created successfully", noun)));
        }
        Placement::Mirrored => {
            body.insert("message".into(), json!(format!("{} created successfully", noun)));
            body.insert("mirrored".into(), json!(true));
        }
        Placement::Queued { pending, reason } => {
            body.insert(
                "message".into(),
                json!(format!(
                    "{} saved locally; CRM write queued for sync ({})",
                    noun, reason
                )),
            );
            body.insert("mirrored".into(), json!(true));
            body.insert("pending_sync_id".into(), json!(pending.id));
        }
    }
    Value::Object(body)
}

/// One dispatched call: the tool name as given, its result and how long it
/// took.
#[derive(Debug)]
pub struct Dispatched {
    pub tool: String,
    pub outcome: Result<Outcome, DispatchError>,
    pub elapsed: Duration,
}

impl Dispatched {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        crate::round_to(self.elapsed.as_secs_f64(), 4)
    }

    /// Payload plus `elapsed_seconds`, or `{error, elapsed_seconds}`.
    /// Calls rejected before running (unknown tool, bad arguments) carry no
    /// timing.
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            Ok(outcome) => {
                let mut value = outcome.to_json();
                if let Value::Object(map) = &mut value {
                    map.insert("elapsed_seconds".into(), json!(self.elapsed_seconds()));
                }
                value
            }
            Err(err @ (DispatchError::UnknownTool(_) | DispatchError::InvalidArguments(_))) => {
                json!({ "error": err.to_string() })
            }
            Err(err) => json!({
                "error": err.to_string(),
                "elapsed_seconds": self.elapsed_seconds(),
            }),
        }
    }
}

/// Snapshot of the local side for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorReport {
    pub phase: Phase,
    pub mirror: MirrorState,
    pub path: PathBuf,
    pub contacts: usize,
    pub deals: usize,
    pub pending_writes: usize,
    pub last_sync: Option<SyncMetadata>,
}
