//! Destination tables
//!
//! Every endpoint loads into one table named after the endpoint. Rows are
//! keyed by the endpoint's primary key and stored as JSON text, so the
//! destination never needs to know the shape of a record up front.
//!
//! - [`DuckDbSink`] - DuckDB file or in-memory database
//! - [`MemorySink`] - plain in-memory tables, used by tests and dry runs

mod duckdb_sink;
mod memory;

pub use duckdb_sink::DuckDbSink;
pub use memory::MemorySink;

use crate::error::{Error, Result};
use crate::path::{self, type_name, Lookup};
use crate::types::{scalar_to_string, WriteDisposition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// A table store that endpoints write their records into
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Create the table if needed. `Replace` empties it.
    ///
    /// Called once per endpoint per run, before the first page is written.
    async fn prepare(&self, table: &str, disposition: WriteDisposition) -> Result<()>;

    /// Write a batch of records, returning the number of rows written.
    ///
    /// `Merge` and `Replace` upsert by primary key (last writer wins);
    /// `Append` always inserts.
    async fn upsert(
        &self,
        table: &str,
        primary_key: &[String],
        disposition: WriteDisposition,
        records: &[Value],
    ) -> Result<u64>;

    /// Number of rows currently in a table (0 if it does not exist)
    async fn row_count(&self, table: &str) -> Result<u64>;
}

/// Build the row key for a record from its primary key fields.
///
/// Composite keys join their parts with `|`.
pub fn record_key(record: &Value, primary_key: &[String]) -> Result<String> {
    if primary_key.is_empty() {
        return Err(Error::sink("primary key is empty"));
    }

    let mut parts = Vec::with_capacity(primary_key.len());
    for field in primary_key {
        let part = match path::lookup(record, field) {
            Lookup::Found(value) => scalar_to_string(value).ok_or_else(|| {
                Error::data_shape(
                    field,
                    format!("primary key must be a scalar, found {}", type_name(value)),
                )
            })?,
            Lookup::Null | Lookup::Missing => {
                return Err(Error::data_shape(field, "record has no primary key value"))
            }
        };
        parts.push(part);
    }
    Ok(parts.join("|"))
}

/// Keys for appended rows: unique within the process
fn append_key() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{now:x}-{}", SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Resolve the key for each record under a disposition.
///
/// For upserts, a key repeated within the batch keeps only its last record.
fn keyed_rows<'a>(
    primary_key: &[String],
    disposition: WriteDisposition,
    records: &'a [Value],
) -> Result<Vec<(String, &'a Value)>> {
    let mut rows: Vec<(String, &Value)> = Vec::with_capacity(records.len());
    for record in records {
        let key = match disposition {
            WriteDisposition::Append => append_key(),
            WriteDisposition::Merge | WriteDisposition::Replace => {
                record_key(record, primary_key)?
            }
        };
        rows.push((key, record));
    }

    if disposition != WriteDisposition::Append {
        let mut seen = std::collections::HashSet::new();
        let mut deduped: Vec<_> = rows
            .into_iter()
            .rev()
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect();
        deduped.reverse();
        rows = deduped;
    }
    Ok(rows)
}

/// Reject table names that cannot be a single identifier
fn check_table_name(table: &str) -> Result<()> {
    if table.is_empty() || table.contains('\0') {
        return Err(Error::sink(format!("invalid table name '{table}'")));
    }
    Ok(())
}
