//! Database Connection and Setup
//!
//! Opens the SQLite file backing [`super::SqliteStore`], creates the schema and
//! holds the queries shared by the store and its change watcher.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};

use crate::domain::{DocumentFields, ItemId, RawDocument, StoreError, StoreResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Open a connection and run migrations
pub fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Create the schema if missing
fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (collection, id)
        )",
        [],
    )
    .map_err(backend)?;
    Ok(())
}

/// Changes whenever another connection commits to the database
pub fn data_version(conn: &Connection) -> StoreResult<i64> {
    conn.query_row("PRAGMA data_version", [], |row| row.get(0))
        .map_err(backend)
}

/// Full ordered listing of a collection
pub fn load_collection(conn: &Connection, collection: &str) -> StoreResult<Vec<RawDocument>> {
    let mut stmt = conn
        .prepare("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY id ASC")
        .map_err(backend)?;
    let rows = stmt
        .query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(backend)?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, raw_fields) = row.map_err(backend)?;
        let fields = match serde_json::from_str::<DocumentFields>(&raw_fields) {
            Ok(fields) => fields,
            Err(e) => {
                log::warn!("[sqlite] document {} has unreadable fields: {}", id, e);
                DocumentFields::new()
            }
        };
        docs.push(RawDocument::new(id, fields));
    }
    Ok(docs)
}

pub fn insert_document(
    conn: &Connection,
    collection: &str,
    id: &ItemId,
    fields: &DocumentFields,
) -> StoreResult<()> {
    let encoded =
        serde_json::to_string(fields).map_err(|e| StoreError::Rejected(e.to_string()))?;
    conn.execute(
        "INSERT INTO documents (collection, id, fields, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            collection,
            id.as_str(),
            encoded,
            chrono::Utc::now().timestamp_millis()
        ],
    )
    .map_err(backend)?;
    Ok(())
}

/// Returns the number of rows removed
pub fn delete_document(conn: &Connection, collection: &str, id: &ItemId) -> StoreResult<usize> {
    conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
        params![collection, id.as_str()],
    )
    .map_err(backend)
}
