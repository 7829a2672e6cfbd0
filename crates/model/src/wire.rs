//! JSON bodies of the upstream HTTP surface.

use serde::{Deserialize, Serialize};

use crate::{Contact, Deal};

/// `GET /api/contacts` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactList {
    pub contacts: Vec<Contact>,
    pub count: usize,
}

/// `POST /api/contacts` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCreated {
    pub contact: Contact,
    pub message: String,
}

/// `GET /api/deals` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealList {
    pub deals: Vec<Deal>,
    pub count: usize,
}

/// `POST /api/deals` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealCreated {
    pub deal: Deal,
    pub message: String,
}

/// Every non-2xx response carries one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl ContactList {
    pub fn new(contacts: Vec<Contact>) -> Self {
        let count = contacts.len();
        ContactList { contacts, count }
    }
}

impl DealList {
    pub fn new(deals: Vec<Deal>) -> Self {
        let count = deals.len();
        DealList { deals, count }
    }
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            message: message.into(),
        }
    }
}
