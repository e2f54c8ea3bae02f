//! SQLite-backed registration store.

use crate::error::{AdminError, AdminResult};
use crate::store::RegistrationStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use zkadmin_types::{Alias, ClusterRegistration, ConnState};

/// Persistent registration store backed by a single SQLite file.
pub struct SqliteRegistrationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistrationStore {
    /// Opens (or creates) a store at the given path.
    pub fn new(path: &str) -> AdminResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| AdminError::Storage(format!("failed to open registration store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> AdminResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AdminError::Storage(format!("failed to open in-memory registration store: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AdminResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> AdminResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cluster_registrations (
                alias TEXT PRIMARY KEY,
                hosts TEXT NOT NULL,
                conn_state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cluster_registrations_hosts
                ON cluster_registrations (hosts);
            ",
        )
        .map_err(|e| AdminError::Storage(format!("failed to init registration schema: {e}")))?;
        Ok(())
    }
}

type RawRow = (String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode((alias, hosts, conn_state, updated_at): RawRow) -> AdminResult<ClusterRegistration> {
    let alias = Alias::parse(&alias)
        .map_err(|e| AdminError::Storage(format!("corrupt alias in store: {e}")))?;
    let conn_state: ConnState = conn_state
        .parse()
        .map_err(|e| AdminError::Storage(format!("corrupt state for {alias}: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AdminError::Storage(format!("corrupt timestamp for {alias}: {e}")))?;
    Ok(ClusterRegistration {
        alias,
        hosts,
        conn_state,
        updated_at,
    })
}

impl RegistrationStore for SqliteRegistrationStore {
    fn list_all(&self) -> AdminResult<Vec<ClusterRegistration>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT alias, hosts, conn_state, updated_at FROM cluster_registrations ORDER BY alias",
            )
            .map_err(|e| AdminError::Storage(format!("failed to prepare registration query: {e}")))?;
        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| AdminError::Storage(format!("failed to query registrations: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let raw =
                row.map_err(|e| AdminError::Storage(format!("failed to read registration row: {e}")))?;
            result.push(decode(raw)?);
        }
        Ok(result)
    }

    fn find_by_alias(&self, alias: &Alias) -> AdminResult<Option<ClusterRegistration>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                "SELECT alias, hosts, conn_state, updated_at FROM cluster_registrations WHERE alias = ?1",
                params![alias.as_str()],
                read_row,
            )
            .optional()
            .map_err(|e| AdminError::Storage(format!("failed to load registration: {e}")))?;
        raw.map(decode).transpose()
    }

    fn save(&self, registration: &ClusterRegistration) -> AdminResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cluster_registrations (alias, hosts, conn_state, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(alias) DO UPDATE SET
                hosts = excluded.hosts,
                conn_state = excluded.conn_state,
                updated_at = excluded.updated_at",
            params![
                registration.alias.as_str(),
                registration.hosts,
                registration.conn_state.as_str(),
                registration.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| AdminError::Storage(format!("failed to save registration: {e}")))?;
        Ok(())
    }

    fn update_conn_state_by_alias(&self, alias: &Alias, state: ConnState) -> AdminResult<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE cluster_registrations SET conn_state = ?1, updated_at = ?2 WHERE alias = ?3",
                params![state.as_str(), Utc::now().to_rfc3339(), alias.as_str()],
            )
            .map_err(|e| AdminError::Storage(format!("failed to update connection state: {e}")))?;
        Ok(updated > 0)
    }

    fn update_conn_state_by_hosts(&self, hosts: &str, state: ConnState) -> AdminResult<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE cluster_registrations SET conn_state = ?1, updated_at = ?2 WHERE hosts = ?3",
            params![state.as_str(), Utc::now().to_rfc3339(), hosts],
        )
        .map_err(|e| AdminError::Storage(format!("failed to update connection state: {e}")))
    }

    fn delete_by_alias(&self, alias: &Alias) -> AdminResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM cluster_registrations WHERE alias = ?1",
                params![alias.as_str()],
            )
            .map_err(|e| AdminError::Storage(format!("failed to delete registration: {e}")))?;
        Ok(deleted > 0)
    }
}
