use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{required_text, ValidationError};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Pipeline stage of a deal. Serialized as its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStage {
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
}

impl DealStage {
    pub const ALL: [DealStage; 6] = [
        DealStage::Prospecting,
        DealStage::Qualification,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Prospecting => "Prospecting",
            DealStage::Qualification => "Qualification",
            DealStage::Proposal => "Proposal",
            DealStage::Negotiation => "Negotiation",
            DealStage::ClosedWon => "Closed Won",
            DealStage::ClosedLost => "Closed Lost",
        }
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStage {
    type Err = ValidationError;

    /// Case-insensitive; `closed_won` and `closed-won` are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        DealStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ValidationError::invalid("stage", format!("unknown stage '{}'", s)))
    }
}

/// A deal as stored upstream and mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub name: String,
    pub company: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub stage: DealStage,
    #[serde(with = "iso_date")]
    pub close_date: Date,
    #[serde(default)]
    pub contact_id: Option<i64>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

/// Caller-supplied deal fields, loosely typed so that a bad amount or date
/// surfaces as a validation message naming the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<i64>,
}

/// A validated deal that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeal {
    pub name: String,
    pub company: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub stage: DealStage,
    #[serde(with = "iso_date")]
    pub close_date: Date,
    pub contact_id: Option<i64>,
}

impl DealDraft {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Required: name, company, amount, stage, close date (in that order).
    pub fn validate(self) -> Result<NewDeal, ValidationError> {
        let name = required_text("name", self.name)?;
        let company = required_text("company", self.company)?;
        let amount = match self.amount {
            None | Some(serde_json::Value::Null) => {
                return Err(ValidationError::MissingField("amount"))
            }
            Some(raw) => parse_amount(&raw)?,
        };
        let stage: DealStage = required_text("stage", self.stage)?.parse()?;
        let close_date = parse_date(&required_text("close_date", self.close_date)?)?;
        Ok(NewDeal {
            name,
            company,
            amount,
            stage,
            close_date,
            contact_id: self.contact_id,
        })
    }
}

impl NewDeal {
    pub fn into_deal(self, id: i64, created_at: String) -> Deal {
        Deal {
            id,
            name: self.name,
            company: self.company,
            amount: self.amount,
            stage: self.stage,
            close_date: self.close_date,
            contact_id: self.contact_id,
            created_at,
        }
    }
}

/// Parse `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Result<Date, ValidationError> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(text.trim(), &format)
        .map_err(|e| ValidationError::invalid("close_date", format!("expected YYYY-MM-DD ({})", e)))
}

fn parse_amount(raw: &serde_json::Value) -> Result<Decimal, ValidationError> {
    let text = match raw {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        other => {
            return Err(ValidationError::invalid(
                "amount",
                format!("expected a number, got {}", other),
            ))
        }
    };
    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ValidationError::invalid("amount", format!("'{}' is not a number", text)))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::invalid("amount", "must be non-negative"));
    }
    Ok(amount.normalize())
}
