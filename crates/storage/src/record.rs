use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// The two mirrored entity kinds. Each maps to one table of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contacts,
    Deals,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Contacts => "contacts",
            EntityKind::Deals => "deals",
        }
    }

    /// Writable columns, `id` first.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Contacts => &[
                "id",
                "first_name",
                "last_name",
                "email",
                "company",
                "title",
                "phone",
                "created_at",
            ],
            EntityKind::Deals => &[
                "id",
                "name",
                "company",
                "amount",
                "stage",
                "close_date",
                "contact_id",
                "created_at",
            ],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EntityKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "contacts" => Ok(EntityKind::Contacts),
            "deals" => Ok(EntityKind::Deals),
            "" => Err(StorageError::InvalidArgument(
                "table name is required".to_string(),
            )),
            other => Err(StorageError::InvalidArgument(format!(
                "unknown table '{}' (expected contacts or deals)",
                other
            ))),
        }
    }
}

/// Where the mirror is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorState {
    /// No mirror file exists and none was created.
    Absent,
    /// Schema exists, no contacts or deals yet.
    Empty,
    /// At least one mirrored row.
    Populated,
}

/// One entry of the pending write ledger: a write accepted locally that the
/// upstream has not confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub id: i64,
    pub table_name: String,
    pub operation: String,
    pub data: serde_json::Value,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}
