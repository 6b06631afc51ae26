//! In-memory destination

use super::{check_table_name, keyed_rows, TableSink};
use crate::error::{Error, Result};
use crate::types::WriteDisposition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

type Table = BTreeMap<String, Value>;

/// Tables held in memory, keyed by row key
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of a table, ordered by key
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .map(|tables| {
                tables
                    .get(table)
                    .map(|t| t.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Row stored under a key
    pub fn get(&self, table: &str, key: &str) -> Option<Value> {
        let tables = self.tables.lock().ok()?;
        tables.get(table)?.get(key).cloned()
    }

    /// Names of the tables written so far
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .tables
            .lock()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, Table>) -> T) -> Result<T> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::sink("memory sink lock poisoned"))?;
        Ok(f(&mut tables))
    }
}

#[async_trait]
impl TableSink for MemorySink {
    async fn prepare(&self, table: &str, disposition: WriteDisposition) -> Result<()> {
        check_table_name(table)?;
        self.with_tables(|tables| {
            let rows = tables.entry(table.to_string()).or_default();
            if disposition == WriteDisposition::Replace {
                rows.clear();
            }
        })
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
        let written = rows.len() as u64;

        self.with_tables(|tables| {
            let target = tables.entry(table.to_string()).or_default();
            for (key, record) in rows {
                target.insert(key, record.clone());
            }
        })?;
        Ok(written)
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        self.with_tables(|tables| tables.get(table).map_or(0, |t| t.len() as u64))
    }
}
