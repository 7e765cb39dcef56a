//! In-memory warehouse driver.

use std::collections::HashMap;

use async_trait::async_trait;
use engine_core::{Error, Field, Result, Row, Schema};
use parking_lot::Mutex;

use crate::driver::Driver;

#[derive(Debug, Default)]
struct Table {
    fields: Vec<Field>,
    rows: Vec<Row>,
}

/// Keeps tables, their columns and written rows in process memory.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn fields(&self, table: &str) -> Option<Vec<Field>> {
        self.tables.lock().get(table).map(|t| t.fields.clone())
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |t| t.rows.len())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn create_table(&self, table: &str, schema: &Schema) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.contains_key(table) {
            return Err(Error::TableAlreadyExists(table.to_string()));
        }
        tables.insert(
            table.to_string(),
            Table {
                fields: schema.fields().to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn missing_columns(&self, table: &str, schema: &Schema) -> Result<Vec<Field>> {
        let tables = self.tables.lock();
        let existing = tables
            .get(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        Ok(schema
            .fields()
            .iter()
            .filter(|f| !existing.fields.iter().any(|e| e.name == f.name))
            .cloned()
            .collect())
    }

    async fn add_column(&self, table: &str, field: &Field) -> Result<()> {
        let mut tables = self.tables.lock();
        let existing = tables
            .get_mut(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        if !existing.fields.iter().any(|f| f.name == field.name) {
            existing.fields.push(field.clone());
        }
        Ok(())
    }

    async fn write(&self, table: &str, _schema: &Schema, rows: &[Row]) -> Result<()> {
        let mut tables = self.tables.lock();
        let existing = tables
            .get_mut(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        existing.rows.extend_from_slice(rows);
        Ok(())
    }
}
