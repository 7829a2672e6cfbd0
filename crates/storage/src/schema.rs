use rusqlite::Connection;

/// Upstream tables. The record store owns identifiers, so ids autoincrement
/// and emails are unique.
pub(crate) const RECORD_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    company TEXT NOT NULL,
    title TEXT NOT NULL,
    phone TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS deals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    company TEXT NOT NULL,
    amount REAL NOT NULL,
    stage TEXT NOT NULL,
    close_date TEXT NOT NULL,
    contact_id INTEGER,
    created_at TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id)
);
";

/// Mirror tables. Ids come from upstream, so there is no autoincrement on
/// the entity tables and no constraint beyond the primary key.
pub(crate) const MIRROR_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY,
    first_name TEXT, last_name TEXT, email TEXT,
    company TEXT, title TEXT, phone TEXT, created_at TEXT
);
CREATE TABLE IF NOT EXISTS deals (
    id INTEGER PRIMARY KEY,
    name TEXT, company TEXT, amount REAL, stage TEXT,
    close_date TEXT, contact_id INTEGER, created_at TEXT
);
CREATE TABLE IF NOT EXISTS pending_sync (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT, operation TEXT, data TEXT,
    created_at TEXT
);
";

pub(crate) fn init(conn: &Connection, schema: &str) -> rusqlite::Result<()> {
    conn.execute_batch(schema)
}
