use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Contact, Deal};

/// Optional narrowing of a contact listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl ContactFilter {
    pub fn company(company: impl Into<String>) -> Self {
        ContactFilter {
            company: Some(company.into()),
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        self.company
            .as_deref()
            .map_or(true, |company| contact.company == company)
    }
}

/// Optional narrowing of a deal listing. `min_amount` is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl DealFilter {
    pub fn min_amount(amount: impl Into<Decimal>) -> Self {
        DealFilter {
            min_amount: Some(amount.into()),
            company: None,
        }
    }

    pub fn matches(&self, deal: &Deal) -> bool {
        self.min_amount.map_or(true, |min| deal.amount >= min)
            && self
                .company
                .as_deref()
                .map_or(true, |company| deal.company == company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn min_amount_accepts_numbers_and_strings() {
        let from_number: DealFilter = serde_json::from_value(json!({"min_amount": 50000})).unwrap();
        let from_text: DealFilter = serde_json::from_value(json!({"min_amount": "50000"})).unwrap();
        assert_eq!(from_number.min_amount, Some(Decimal::from(50000)));
        assert_eq!(from_number, from_text);
    }

    #[test]
    fn empty_object_means_no_filter() {
        let filter: ContactFilter = serde_json::from_value(json!({})).unwrap();
        assert_eq!(filter, ContactFilter::default());
    }
}
