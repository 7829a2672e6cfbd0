use serde::{Deserialize, Serialize};

use crate::{optional_text, required_text, ValidationError};

/// A contact as stored upstream and mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: String,
    pub title: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

/// Caller-supplied contact fields. Every field is optional until
/// [`ContactDraft::validate`] says otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A validated contact that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: String,
    pub title: String,
    pub phone: Option<String>,
}

impl ContactDraft {
    /// Parse a draft out of arbitrary JSON, reporting type mismatches as
    /// validation failures rather than transport errors.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Check required fields in declaration order: first name, last name,
    /// email, company, title.
    pub fn validate(self) -> Result<NewContact, ValidationError> {
        let first_name = required_text("first_name", self.first_name)?;
        let last_name = required_text("last_name", self.last_name)?;
        let email = required_text("email", self.email)?;
        if !email.contains('@') {
            return Err(ValidationError::invalid("email", "expected an address"));
        }
        Ok(NewContact {
            first_name,
            last_name,
            email,
            company: required_text("company", self.company)?,
            title: required_text("title", self.title)?,
            phone: optional_text(self.phone),
        })
    }
}

impl NewContact {
    pub fn into_contact(self, id: i64, created_at: String) -> Contact {
        Contact {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            company: self.company,
            title: self.title,
            phone: self.phone,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jane() -> ContactDraft {
        ContactDraft::from_json(json!({
            "first_name": "Jane",
            "last_name": "Smith",
            "email": "jane@acme.com",
            "company": "Acme Corp",
            "title": "VP of Engineering"
        }))
        .unwrap()
    }

    #[test]
    fn complete_draft_validates() {
        let contact = jane().validate().unwrap();
        assert_eq!(contact.first_name, "Jane");
        assert_eq!(contact.company, "Acme Corp");
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn first_missing_field_is_reported() {
        let mut draft = jane();
        draft.last_name = None;
        draft.title = None;
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("last_name"))
        );
    }

    #[test]
    fn blank_field_counts_as_missing() {
        let mut draft = jane();
        draft.company = Some("   ".into());
        let err = draft.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: company");
    }

    #[test]
    fn wrong_json_type_is_malformed() {
        let err = ContactDraft::from_json(json!({"first_name": 7})).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn blank_phone_is_dropped() {
        let mut draft = jane();
        draft.phone = Some(String::new());
        assert_eq!(draft.validate().unwrap().phone, None);
    }
}
