use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection};

use shadowcrm_model::{Contact, ContactFilter, Deal, DealFilter, NewContact, NewDeal};

use crate::codec::{
    amount_to_sql, contact_from_row, date_to_sql, deal_from_row, CONTACT_COLUMNS, DEAL_COLUMNS,
};
use crate::{schema, EntityKind, StorageError};

/// The upstream's durable system of record.
///
/// Assigns identifiers on insert. Listing order is fixed: contacts by last
/// name, deals by amount descending, ties broken by id.
pub struct RecordStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| StorageError::from_sqlite(&path, e))?;
        Self::from_connection(path, conn)
    }

    /// A throwaway store, used by tests and embedded simulations.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|e| StorageError::from_sqlite(&path, e))?;
        Self::from_connection(path, conn)
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Result<Self, StorageError> {
        schema::init(&conn, schema::RECORD_SCHEMA).map_err(|e| StorageError::from_sqlite(&path, e))?;
        Ok(RecordStore {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::poisoned(&self.path))
    }

    fn sqlite(&self, err: rusqlite::Error) -> StorageError {
        StorageError::from_sqlite(&self.path, err)
    }

    pub fn insert_contact(
        &self,
        contact: &NewContact,
        created_at: &str,
    ) -> Result<Contact, StorageError> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO contacts (first_name, last_name, email, company, title, phone, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                contact.first_name,
                contact.last_name,
                contact.email,
                contact.company,
                contact.title,
                contact.phone,
                created_at,
            ],
        );
        match result.map_err(|e| self.sqlite(e)) {
            Ok(_) => {}
            Err(StorageError::Duplicate(_)) => {
                return Err(StorageError::Duplicate(format!(
                    "a contact with email '{}' already exists",
                    contact.email
                )))
            }
            Err(e) => return Err(e),
        }
        let id = conn.last_insert_rowid();
        Ok(contact.clone().into_contact(id, created_at.to_string()))
    }

    pub fn insert_deal(&self, deal: &NewDeal, created_at: &str) -> Result<Deal, StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO deals (name, company, amount, stage, close_date, contact_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                deal.name,
                deal.company,
                amount_to_sql(&deal.amount),
                deal.stage.as_str(),
                date_to_sql(&deal.close_date),
                deal.contact_id,
                created_at,
            ],
        )
        .map_err(|e| self.sqlite(e))?;
        let id = conn.last_insert_rowid();
        Ok(deal.clone().into_deal(id, created_at.to_string()))
    }

    pub fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StorageError> {
        let conn = self.lock()?;
        select_contacts(&conn, filter, Decode::Strict).map_err(|e| self.sqlite(e))
    }

    pub fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, StorageError> {
        let conn = self.lock()?;
        select_deals(&conn, filter, Decode::Strict).map_err(|e| self.sqlite(e))
    }

    pub fn count(&self, kind: EntityKind) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        count_rows(&conn, kind).map_err(|e| self.sqlite(e))
    }

    /// Delete every contact and deal, restarting identifier assignment.
    pub fn clear(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM deals; DELETE FROM contacts; \
             DELETE FROM sqlite_sequence WHERE name IN ('contacts', 'deals');",
        )
        .map_err(|e| self.sqlite(e))
    }
}

/// How typed listings treat rows that do not decode into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decode {
    /// Any bad row fails the whole listing.
    Strict,
    /// Bad rows are logged and left out.
    SkipInvalid,
}

fn collect_rows<T>(
    kind: EntityKind,
    decode: Decode,
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> rusqlite::Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        match row {
            Ok(record) => out.push(record),
            Err(
                err @ (rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::IntegralValueOutOfRange(..)),
            ) if decode == Decode::SkipInvalid => {
                tracing::warn!(table = %kind, error = %err, "skipping undecodable row");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}

pub(crate) fn select_contacts(
    conn: &Connection,
    filter: &ContactFilter,
    decode: Decode,
) -> rusqlite::Result<Vec<Contact>> {
    let mut sql = format!("SELECT {} FROM contacts", CONTACT_COLUMNS);
    let mut args: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(company) = &filter.company {
        sql.push_str(" WHERE company = ?1");
        args.push(company.clone().into());
    }
    sql.push_str(" ORDER BY last_name ASC, id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), contact_from_row)?;
    collect_rows(EntityKind::Contacts, decode, rows)
}

pub(crate) fn select_deals(
    conn: &Connection,
    filter: &DealFilter,
    decode: Decode,
) -> rusqlite::Result<Vec<Deal>> {
    let mut sql = format!("SELECT {} FROM deals", DEAL_COLUMNS);
    let mut conditions = Vec::new();
    let mut args: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(min) = &filter.min_amount {
        args.push(amount_to_sql(min).into());
        conditions.push(format!("amount >= ?{}", args.len()));
    }
    if let Some(company) = &filter.company {
        args.push(company.clone().into());
        conditions.push(format!("company = ?{}", args.len()));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY amount DESC, id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), deal_from_row)?;
    collect_rows(EntityKind::Deals, decode, rows)
}

pub(crate) fn count_rows(conn: &Connection, kind: EntityKind) -> rusqlite::Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shadowcrm_model::{ContactDraft, DealDraft};
    use serde_json::json;

    fn contact(first: &str, last: &str, company: &str) -> NewContact {
        ContactDraft::from_json(json!({
            "first_name": first,
            "last_name": last,
            "email": format!("{}.{}@example.com", first, last).to_lowercase(),
            "company": company,
            "title": "CTO"
        }))
        .unwrap()
        .validate()
        .unwrap()
    }

    fn deal(name: &str, amount: i64) -> NewDeal {
        DealDraft::from_json(json!({
            "name": name,
            "company": "Initech",
            "amount": amount,
            "stage": "Proposal",
            "close_date": "2026-06-30"
        }))
        .unwrap()
        .validate()
        .unwrap()
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let store = RecordStore::open_in_memory().unwrap();
        let a = store.insert_contact(&contact("Ann", "Lee", "Hooli"), "t1").unwrap();
        let b = store.insert_contact(&contact("Bob", "Kim", "Hooli"), "t2").unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.count(EntityKind::Contacts).unwrap(), 2);
    }

    #[test]
    fn contacts_list_by_last_name_and_filter_by_company() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_contact(&contact("Zed", "Young", "Hooli"), "t").unwrap();
        store.insert_contact(&contact("Amy", "Adams", "Hooli"), "t").unwrap();
        store.insert_contact(&contact("Max", "Baker", "Initech"), "t").unwrap();

        let all = store.list_contacts(&ContactFilter::default()).unwrap();
        let names: Vec<_> = all.iter().map(|c| c.last_name.as_str()).collect();
        assert_eq!(names, ["Adams", "Baker", "Young"]);

        let hooli = store.list_contacts(&ContactFilter::company("Hooli")).unwrap();
        assert_eq!(hooli.len(), 2);
        assert!(hooli.iter().all(|c| c.company == "Hooli"));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_contact(&contact("Ann", "Lee", "Hooli"), "t").unwrap();
        let err = store
            .insert_contact(&contact("Ann", "Lee", "Initech"), "t")
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(msg) if msg.contains("ann.lee@example.com")));
    }

    #[test]
    fn deals_filter_by_min_amount_and_sort_descending() {
        let store = RecordStore::open_in_memory().unwrap();
        for (name, amount) in [("small", 10_000), ("edge", 50_000), ("big", 120_000), ("mid", 75_000)] {
            store.insert_deal(&deal(name, amount), "t").unwrap();
        }
        let deals = store.list_deals(&DealFilter::min_amount(50_000)).unwrap();
        let amounts: Vec<Decimal> = deals.iter().map(|d| d.amount).collect();
        assert_eq!(
            amounts,
            [Decimal::from(120_000), Decimal::from(75_000), Decimal::from(50_000)]
        );
    }

    #[test]
    fn clear_restarts_identifiers() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_contact(&contact("Ann", "Lee", "Hooli"), "t").unwrap();
        store.clear().unwrap();
        let again = store.insert_contact(&contact("Ann", "Lee", "Hooli"), "t").unwrap();
        assert_eq!(again.id, 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crm.db");
        {
            let store = RecordStore::open(&path).unwrap();
            store.insert_deal(&deal("kept", 5), "t").unwrap();
        }
        let store = RecordStore::open(&path).unwrap();
        assert_eq!(store.count(EntityKind::Deals).unwrap(), 1);
    }

    #[test]
    fn unopenable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("crm.db");
        let err = RecordStore::open(&path).err().unwrap();
        assert!(err.is_fatal(), "{err}");
    }
}
