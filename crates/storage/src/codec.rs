//! Conversions between SQLite rows/values and records/JSON.

use base64::Engine;
use rusqlite::types::{Type, Value as SqlValue, ValueRef};
use rusqlite::Row;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value;

use shadowcrm_model::{Contact, Deal, DealStage};

pub(crate) const CONTACT_COLUMNS: &str =
    "id, first_name, last_name, email, company, title, phone, created_at";

pub(crate) const DEAL_COLUMNS: &str =
    "id, name, company, amount, stage, close_date, contact_id, created_at";

/// Decode a row selected with [`CONTACT_COLUMNS`].
pub(crate) fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        first_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        last_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        email: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        company: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        title: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        phone: row
            .get::<_, Option<String>>(6)?
            .filter(|p| !p.is_empty()),
        created_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

/// Decode a row selected with [`DEAL_COLUMNS`].
pub(crate) fn deal_from_row(row: &Row<'_>) -> rusqlite::Result<Deal> {
    let raw_amount: f64 = row.get(3)?;
    let amount = Decimal::from_f64(raw_amount)
        .ok_or_else(|| conversion_error(3, format!("amount {} is not representable", raw_amount)))?;
    let stage_text: String = row.get(4)?;
    let stage: DealStage = stage_text
        .parse()
        .map_err(|e: shadowcrm_model::ValidationError| conversion_error(4, e.to_string()))?;
    let date_text: String = row.get(5)?;
    let close_date = shadowcrm_model::parse_date(&date_text)
        .map_err(|e| conversion_error(5, e.to_string()))?;
    Ok(Deal {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        company: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        amount: amount.normalize(),
        stage,
        close_date,
        contact_id: row.get(6)?,
        created_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

/// Amounts are stored as REAL, as the upstream schema declares them.
pub(crate) fn amount_to_sql(amount: &Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

pub(crate) fn date_to_sql(date: &time::Date) -> String {
    date.to_string()
}

/// Render a raw column value for the query escape hatch.
pub(crate) fn json_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

/// Bind a JSON field for the typed upsert path. Nested values are stored as
/// their JSON text.
pub(crate) fn sql_from_json(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_bind_as_integer_or_real() {
        assert_eq!(sql_from_json(&json!(7)), SqlValue::Integer(7));
        assert_eq!(sql_from_json(&json!(7.5)), SqlValue::Real(7.5));
        assert_eq!(sql_from_json(&json!(true)), SqlValue::Integer(1));
        assert_eq!(
            sql_from_json(&json!({"a": 1})),
            SqlValue::Text("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn blobs_render_as_base64() {
        assert_eq!(json_from_sql(ValueRef::Blob(b"hi")), json!("aGk="));
        assert_eq!(json_from_sql(ValueRef::Real(f64::NAN)), Value::Null);
    }
}
