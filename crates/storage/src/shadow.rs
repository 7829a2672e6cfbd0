use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, Transaction};
use serde::Serialize;
use serde_json::{Map, Value};

use shadowcrm_model::{now_timestamp, Contact, ContactFilter, Deal, DealFilter, NewContact, NewDeal};

use crate::codec::{amount_to_sql, date_to_sql, json_from_sql, sql_from_json};
use crate::record_store::{count_rows, select_contacts, select_deals, Decode};
use crate::{schema, EntityKind, MirrorState, PendingWrite, StorageError};

/// One row of a raw query, keyed by column name.
pub type QueryRow = Map<String, Value>;

/// The local mirror of upstream contacts and deals.
///
/// Mirrored rows carry upstream identifiers, which are always positive.
/// Rows accepted locally while upstream could not take them get negative
/// identifiers, so a later sync never overwrites them.
///
/// The file is not touched until [`create_if_absent`](Self::create_if_absent)
/// runs or some operation finds a mirror file left by an earlier process.
/// Until then every operation fails with [`StorageError::NotInitialized`].
pub struct ShadowStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl ShadowStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ShadowStore {
            path: path.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a mirror is available, either opened here or left on disk.
    pub fn exists(&self) -> bool {
        let opened = self.conn.lock().map(|c| c.is_some()).unwrap_or(false);
        opened || self.path.exists()
    }

    /// Create the schema if it is missing. Idempotent.
    pub fn create_if_absent(&self) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.as_ref() {
            Some(conn) => schema::init(conn, schema::MIRROR_SCHEMA).map_err(|e| self.sqlite(e)),
            None => {
                *guard = Some(self.open()?);
                tracing::debug!(path = %self.path.display(), "shadow store created");
                Ok(())
            }
        }
    }

    pub fn lifecycle(&self) -> Result<MirrorState, StorageError> {
        if !self.exists() {
            return Ok(MirrorState::Absent);
        }
        let rows = self.with_conn(|conn| {
            Ok(count_rows(conn, EntityKind::Contacts)? + count_rows(conn, EntityKind::Deals)?)
        })?;
        Ok(if rows == 0 {
            MirrorState::Empty
        } else {
            MirrorState::Populated
        })
    }

    pub fn count(&self, kind: EntityKind) -> Result<usize, StorageError> {
        self.with_conn(|conn| count_rows(conn, kind))
    }

    /// Run a literal statement and return its rows.
    ///
    /// The statement is not inspected; callers are expected to send reads.
    pub fn query(&self, sql: &str) -> Result<Vec<QueryRow>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let rows = stmt.query_map([], |row| {
                let mut map = Map::with_capacity(columns.len());
                for (idx, name) in columns.iter().enumerate() {
                    map.insert(name.clone(), json_from_sql(row.get_ref(idx)?));
                }
                Ok(map)
            })?;
            rows.collect()
        })
    }

    /// Insert or replace one row by identifier.
    ///
    /// `table` must name a mirrored entity kind and every key of `fields`
    /// must be one of its columns.
    pub fn upsert(&self, table: &str, fields: &Map<String, Value>) -> Result<(), StorageError> {
        if table.trim().is_empty() || fields.is_empty() {
            return Err(StorageError::InvalidArgument(
                "Both 'table' and 'data' are required.".to_string(),
            ));
        }
        let kind: EntityKind = table.parse()?;
        if let Some(unknown) = fields.keys().find(|k| !kind.columns().contains(&k.as_str())) {
            return Err(StorageError::InvalidArgument(format!(
                "unknown column '{}' for table {}",
                unknown, kind
            )));
        }

        let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            kind.table(),
            columns.join(", "),
            placeholders.join(", ")
        );
        let values: Vec<_> = fields.values().map(sql_from_json).collect();
        self.with_conn(|conn| conn.execute(&sql, params_from_iter(values)))?;
        tracing::debug!(table = %kind, "mirror row upserted");
        Ok(())
    }

    /// Replace the mirrored copies of `contacts` in one transaction.
    pub fn upsert_contacts(&self, contacts: &[Contact]) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO contacts \
                     (id, first_name, last_name, email, company, title, phone, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for c in contacts {
                    stmt.execute(params![
                        c.id,
                        c.first_name,
                        c.last_name,
                        c.email,
                        c.company,
                        c.title,
                        c.phone,
                        c.created_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(contacts.len())
        })
    }

    /// Replace the mirrored copies of `deals` in one transaction.
    pub fn upsert_deals(&self, deals: &[Deal]) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO deals \
                     (id, name, company, amount, stage, close_date, contact_id, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for d in deals {
                    stmt.execute(params![
                        d.id,
                        d.name,
                        d.company,
                        amount_to_sql(&d.amount),
                        d.stage.as_str(),
                        date_to_sql(&d.close_date),
                        d.contact_id,
                        d.created_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(deals.len())
        })
    }

    pub fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StorageError> {
        self.with_conn(|conn| select_contacts(conn, filter, Decode::SkipInvalid))
    }

    pub fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, StorageError> {
        self.with_conn(|conn| select_deals(conn, filter, Decode::SkipInvalid))
    }

    /// Store a contact the upstream has not acknowledged and record it in
    /// the pending write ledger, both in one transaction.
    pub fn accept_local_contact(
        &self,
        contact: &NewContact,
    ) -> Result<(Contact, PendingWrite), StorageError> {
        self.accept_local(EntityKind::Contacts, |tx, id, created_at| {
            tx.execute(
                "INSERT INTO contacts \
                 (id, first_name, last_name, email, company, title, phone, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    contact.first_name,
                    contact.last_name,
                    contact.email,
                    contact.company,
                    contact.title,
                    contact.phone,
                    created_at,
                ],
            )?;
            Ok(contact.clone().into_contact(id, created_at.to_string()))
        })
    }

    /// Deal counterpart of [`accept_local_contact`](Self::accept_local_contact).
    pub fn accept_local_deal(&self, deal: &NewDeal) -> Result<(Deal, PendingWrite), StorageError> {
        self.accept_local(EntityKind::Deals, |tx, id, created_at| {
            tx.execute(
                "INSERT INTO deals \
                 (id, name, company, amount, stage, close_date, contact_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    deal.name,
                    deal.company,
                    amount_to_sql(&deal.amount),
                    deal.stage.as_str(),
                    date_to_sql(&deal.close_date),
                    deal.contact_id,
                    created_at,
                ],
            )?;
            Ok(deal.clone().into_deal(id, created_at.to_string()))
        })
    }

    /// Insert a locally accepted row under the next free negative id, then
    /// append a `create` entry holding that row to the ledger.
    fn accept_local<T: Serialize>(
        &self,
        kind: EntityKind,
        insert: impl FnOnce(&Transaction<'_>, i64, &str) -> rusqlite::Result<T>,
    ) -> Result<(T, PendingWrite), StorageError> {
        let created_at = now_timestamp();
        let (record, pending) = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let id: i64 = tx.query_row(
                &format!("SELECT MIN(0, COALESCE(MIN(id), 0)) - 1 FROM {}", kind.table()),
                [],
                |row| row.get(0),
            )?;
            let record = insert(&tx, id, &created_at)?;
            let data = serde_json::to_value(&record)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                "INSERT INTO pending_sync (table_name, operation, data, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind.table(), "create", data.to_string(), created_at],
            )?;
            let pending = PendingWrite {
                id: tx.last_insert_rowid(),
                table_name: kind.table().to_string(),
                operation: "create".to_string(),
                data,
                created_at: created_at.clone(),
            };
            tx.commit()?;
            Ok((record, pending))
        })?;
        tracing::warn!(
            table = %kind,
            ledger_id = pending.id,
            "record kept locally; write queued for upstream"
        );
        Ok((record, pending))
    }

    /// The whole ledger, oldest first.
    pub fn pending_writes(&self) -> Result<Vec<PendingWrite>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, table_name, operation, data, created_at FROM pending_sync ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                let raw: Option<String> = row.get(3)?;
                let data = raw
                    .map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)))
                    .unwrap_or(Value::Null);
                Ok(PendingWrite {
                    id: row.get(0)?,
                    table_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    operation: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    data,
                    created_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            })?;
            rows.collect()
        })
    }

    fn open(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path).map_err(|e| self.sqlite(e))?;
        schema::init(&conn, schema::MIRROR_SCHEMA).map_err(|e| self.sqlite(e))?;
        Ok(conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::poisoned(&self.path))
    }

    fn sqlite(&self, err: rusqlite::Error) -> StorageError {
        StorageError::from_sqlite(&self.path, err)
    }

    /// Run `f` against the mirror connection, opening a mirror file left by
    /// an earlier process if needed. The lock is held for the whole call.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            if !self.path.exists() {
                return Err(StorageError::NotInitialized);
            }
            *guard = Some(self.open()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(StorageError::NotInitialized);
        };
        f(conn).map_err(|e| self.sqlite(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shadowcrm_model::{ContactDraft, DealDraft};

    fn mirror() -> (tempfile::TempDir, ShadowStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ShadowStore::new(dir.path().join("shadow.db"));
        (dir, store)
    }

    fn contact(id: i64, last: &str, company: &str) -> Contact {
        Contact {
            id,
            first_name: "Pat".into(),
            last_name: last.into(),
            email: format!("pat.{}@example.com", last.to_lowercase()),
            company: company.into(),
            title: "Head of Sales".into(),
            phone: Some("+1-555-010-0000".into()),
            created_at: "2026-01-02T03:04:05Z".into(),
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn operations_before_creation_are_not_initialized() {
        let (_dir, store) = mirror();
        assert_eq!(store.lifecycle().unwrap(), MirrorState::Absent);
        assert!(matches!(store.query("SELECT 1"), Err(StorageError::NotInitialized)));
        assert!(matches!(
            store.upsert("contacts", &object(json!({"id": 1}))),
            Err(StorageError::NotInitialized)
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn create_is_idempotent_and_starts_empty() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        store.create_if_absent().unwrap();
        assert_eq!(store.lifecycle().unwrap(), MirrorState::Empty);
        store.upsert_contacts(&[contact(4, "Hill", "Hooli")]).unwrap();
        assert_eq!(store.lifecycle().unwrap(), MirrorState::Populated);
    }

    #[test]
    fn prior_mirror_file_is_reopened() {
        let (dir, store) = mirror();
        store.create_if_absent().unwrap();
        store.upsert_contacts(&[contact(4, "Hill", "Hooli")]).unwrap();
        drop(store);

        let reopened = ShadowStore::new(dir.path().join("shadow.db"));
        let rows = reopened.query("SELECT id, last_name FROM contacts").unwrap();
        assert_eq!(rows, vec![object(json!({"id": 4, "last_name": "Hill"}))]);
    }

    #[test]
    fn upsert_replaces_by_identifier() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        store
            .upsert("contacts", &object(json!({"id": 9, "first_name": "Old", "company": "Initech"})))
            .unwrap();
        store
            .upsert("contacts", &object(json!({"id": 9, "first_name": "New", "company": "Initech"})))
            .unwrap();
        let rows = store.query("SELECT first_name FROM contacts WHERE id = 9").unwrap();
        assert_eq!(rows, vec![object(json!({"first_name": "New"}))]);
    }

    #[test]
    fn upsert_rejects_empty_and_unknown_input() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        assert!(matches!(
            store.upsert("", &object(json!({"id": 1}))),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.upsert("contacts", &Map::new()),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.upsert("accounts", &object(json!({"id": 1}))),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.upsert("deals", &object(json!({"id": 1, "name; DROP TABLE deals": "x"}))),
            Err(StorageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn query_syntax_errors_surface_verbatim() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        let err = store.query("SELEC * FROM contacts").unwrap_err();
        assert!(matches!(err, StorageError::Query(_)));
        assert!(err.to_string().contains("syntax error"), "{err}");
    }

    #[test]
    fn typed_listing_matches_upstream_order() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        store
            .upsert_contacts(&[
                contact(1, "Young", "Hooli"),
                contact(2, "Adams", "Initech"),
                contact(3, "Baker", "Hooli"),
            ])
            .unwrap();
        let hooli = store.list_contacts(&ContactFilter::company("Hooli")).unwrap();
        let ids: Vec<i64> = hooli.iter().map(|c| c.id).collect();
        assert_eq!(ids, [3, 1]);
        assert_eq!(hooli[0], contact(3, "Baker", "Hooli"));
    }

    #[test]
    fn mirrored_deals_round_trip() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        let deal = DealDraft::from_json(json!({
            "name": "Hooli - Annual Renewal",
            "company": "Hooli",
            "amount": 98500.25,
            "stage": "Negotiation",
            "close_date": "2026-09-01",
            "contact_id": 1
        }))
        .unwrap()
        .validate()
        .unwrap()
        .into_deal(17, "2026-01-01T00:00:00Z".into());
        store.upsert_deals(std::slice::from_ref(&deal)).unwrap();
        assert_eq!(store.list_deals(&DealFilter::default()).unwrap(), vec![deal]);
    }

    fn lou() -> NewContact {
        ContactDraft::from_json(json!({
            "first_name": "Lou",
            "last_name": "Reed",
            "email": "lou@hooli.com",
            "company": "Hooli",
            "title": "CFO"
        }))
        .unwrap()
        .validate()
        .unwrap()
    }

    #[test]
    fn local_accepts_use_negative_ids_and_fill_the_ledger() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        store.upsert_contacts(&[contact(40, "Hill", "Hooli")]).unwrap();

        let (local, entry) = store.accept_local_contact(&lou()).unwrap();
        assert_eq!(local.id, -1);
        let mut other = lou();
        other.email = "lou.two@hooli.com".into();
        let (second, _) = store.accept_local_contact(&other).unwrap();
        assert_eq!(second.id, -2);

        let ledger = store.pending_writes().unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0], entry);
        assert_eq!(ledger[0].table_name, "contacts");
        assert_eq!(ledger[0].operation, "create");
        assert_eq!(ledger[0].data["email"], json!("lou@hooli.com"));
        assert_eq!(ledger[0].data["id"], json!(-1));
    }

    #[test]
    fn mirroring_upstream_ids_keeps_local_rows() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        let (local, _) = store.accept_local_contact(&lou()).unwrap();

        store
            .upsert_contacts(&[contact(1, "Adams", "Hooli"), contact(2, "Baker", "Hooli")])
            .unwrap();
        let emails: Vec<String> = store
            .list_contacts(&ContactFilter::default())
            .unwrap()
            .into_iter()
            .map(|c| c.email)
            .collect();
        assert_eq!(emails.len(), 3);
        assert!(emails.contains(&local.email));
    }

    #[test]
    fn undecodable_deal_rows_are_skipped_in_listings() {
        let (_dir, store) = mirror();
        store.create_if_absent().unwrap();
        let deal = DealDraft::from_json(json!({
            "name": "Initech - Pilot",
            "company": "Initech",
            "amount": 1200,
            "stage": "Prospecting",
            "close_date": "2026-11-15"
        }))
        .unwrap()
        .validate()
        .unwrap()
        .into_deal(3, "2026-01-01T00:00:00Z".into());
        store.upsert_deals(std::slice::from_ref(&deal)).unwrap();
        store
            .upsert("deals", &object(json!({"id": 900, "name": "Manual", "amount": 10.5})))
            .unwrap();
        store
            .upsert("deals", &object(json!({"id": 901, "name": "Odd", "amount": 5, "stage": "Won", "close_date": "soon"})))
            .unwrap();

        assert_eq!(store.list_deals(&DealFilter::default()).unwrap(), vec![deal]);
        assert_eq!(store.count(EntityKind::Deals).unwrap(), 3);
    }
}
