//! DuckDB destination
//!
//! Table layout: `_key VARCHAR PRIMARY KEY, _data VARCHAR, _extracted_at
//! TIMESTAMP`. `_data` holds the record as JSON text; DuckDB's JSON
//! functions can query it in place.

use super::{check_table_name, keyed_rows, TableSink};
use crate::error::{Error, Result};
use crate::types::WriteDisposition;
use async_trait::async_trait;
use duckdb::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// DuckDB-backed table sink.
///
/// A single connection behind a mutex; writes from parallel endpoints are
/// serialized.
pub struct DuckDbSink {
    conn: Mutex<Connection>,
    location: String,
}

impl DuckDbSink {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::sink(format!("Failed to open {}: {e}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    /// In-memory database, gone when the sink is dropped
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::sink(format!("Failed to open in-memory database: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: ":memory:".to_string(),
        })
    }

    /// Where the database lives, for logs and reports
    pub fn location(&self) -> &str {
        &self.location
    }

    /// All records of a table, ordered by key
    pub fn records(&self, table: &str) -> Result<Vec<Value>> {
        let conn = self.lock()?;
        if !table_exists(&conn, table)? {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT _data FROM {} ORDER BY _key", quote_ident(table));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for data in rows {
            records.push(serde_json::from_str(&data?)?);
        }
        Ok(records)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::sink("DuckDB connection lock poisoned"))
    }
}

impl std::fmt::Debug for DuckDbSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSink")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TableSink for DuckDbSink {
    async fn prepare(&self, table: &str, disposition: WriteDisposition) -> Result<()> {
        check_table_name(table)?;
        let conn = self.lock()?;
        let ident = quote_ident(table);

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {ident} (
                _key VARCHAR PRIMARY KEY,
                _data VARCHAR NOT NULL,
                _extracted_at TIMESTAMP NOT NULL
            );"
        ))?;

        if disposition == WriteDisposition::Replace {
            conn.execute_batch(&format!("DELETE FROM {ident};"))?;
            debug!(table, "table truncated for replace");
        }
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        primary_key: &[String],
        disposition: WriteDisposition,
        records: &[Value],
    ) -> Result<u64> {
        check_table_name(table)?;
        let rows = keyed_rows(primary_key, disposition, records)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (_key, _data, _extracted_at) VALUES (?, ?, current_timestamp)",
            quote_ident(table)
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (key, record) in &rows {
                let data = serde_json::to_string(record)?;
                stmt.execute(params![key, data])?;
            }
        }
        tx.commit()?;

        Ok(rows.len() as u64)
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let conn = self.lock()?;
        if !table_exists(&conn, table)? {
            return Ok(0);
        }
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
