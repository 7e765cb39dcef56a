//! Mapping of logical columns onto physical warehouse tables.

use std::collections::HashMap;
use std::sync::Arc;

use engine_core::{Field, Result, Row, Schema, Session};
use telemetry::metrics;
use tracing::warn;

use crate::column::Columns;

/// A table and the schema it must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub schema: Schema,
}

/// Rows destined for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub table: String,
    pub rows: Vec<Row>,
}

pub trait Layout: Send + Sync {
    fn tables(&self, columns: &Columns) -> Vec<TableSchema>;

    fn to_rows(&self, columns: &Columns, sessions: Vec<Session>) -> Result<Vec<TableRows>>;
}

/// One events table; session values are repeated on every event row under
/// prefixed names.
pub struct EmbeddedSessionColumnsLayout {
    events_table: String,
    session_prefix: String,
}

impl EmbeddedSessionColumnsLayout {
    pub fn new(events_table: impl Into<String>, session_prefix: impl Into<String>) -> Self {
        Self {
            events_table: events_table.into(),
            session_prefix: session_prefix.into(),
        }
    }

    fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.session_prefix, name)
    }
}

impl Layout for EmbeddedSessionColumnsLayout {
    fn tables(&self, columns: &Columns) -> Vec<TableSchema> {
        let mut fields: Vec<Field> = columns.event.iter().map(|c| c.field().clone()).collect();
        fields.extend(columns.session_scoped_event.iter().map(|c| c.field().clone()));
        fields.extend(
            columns
                .session
                .iter()
                .map(|c| c.field().renamed(self.prefixed(&c.field().name))),
        );
        vec![TableSchema {
            table: self.events_table.clone(),
            schema: Schema::new(fields),
        }]
    }

    fn to_rows(&self, _columns: &Columns, sessions: Vec<Session>) -> Result<Vec<TableRows>> {
        let mut rows = Vec::with_capacity(sessions.iter().map(Session::len).sum());
        for session in &sessions {
            for event in &session.events {
                let mut row: Row = event
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (k, v) in &session.values {
                    row.insert(self.prefixed(k), v.clone());
                }
                rows.push(row);
            }
        }
        Ok(vec![TableRows {
            table: self.events_table.clone(),
            rows,
        }])
    }
}

/// Runs the inner layout over fixed-size chunks of sessions and merges
/// the output into one entry per table.
pub struct BatchingSchemaLayout {
    inner: Arc<dyn Layout>,
    batch_size: usize,
}

impl BatchingSchemaLayout {
    pub fn new(inner: Arc<dyn Layout>, batch_size: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
        }
    }
}

impl Layout for BatchingSchemaLayout {
    fn tables(&self, columns: &Columns) -> Vec<TableSchema> {
        self.inner.tables(columns)
    }

    fn to_rows(&self, columns: &Columns, sessions: Vec<Session>) -> Result<Vec<TableRows>> {
        let mut merged: Vec<TableRows> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut remaining = sessions.into_iter().peekable();
        while remaining.peek().is_some() {
            let chunk: Vec<Session> = remaining.by_ref().take(self.batch_size).collect();
            for table_rows in self.inner.to_rows(columns, chunk)? {
                match index.get(&table_rows.table) {
                    Some(&i) => merged[i].rows.extend(table_rows.rows),
                    None => {
                        index.insert(table_rows.table.clone(), merged.len());
                        merged.push(table_rows);
                    }
                }
            }
        }
        Ok(merged)
    }
}

/// Drops broken sessions and broken events before delegating.
pub struct BrokenFilteringLayout {
    inner: Arc<dyn Layout>,
}

impl BrokenFilteringLayout {
    pub fn new(inner: Arc<dyn Layout>) -> Self {
        Self { inner }
    }
}

impl Layout for BrokenFilteringLayout {
    fn tables(&self, columns: &Columns) -> Vec<TableSchema> {
        self.inner.tables(columns)
    }

    fn to_rows(&self, columns: &Columns, sessions: Vec<Session>) -> Result<Vec<TableRows>> {
        let mut kept = Vec::with_capacity(sessions.len());
        for mut session in sessions {
            if let Some(reason) = &session.broken {
                warn!(property_id = %session.property_id, reason = %reason, "Dropping broken session");
                metrics().sessions_broken.inc();
                continue;
            }
            session.events.retain(|event| match &event.broken {
                Some(reason) => {
                    warn!(event_id = %event.hit.id, reason = %reason, "Dropping broken event");
                    metrics().events_broken.inc();
                    false
                }
                None => true,
            });
            if !session.events.is_empty() {
                kept.push(session);
            }
        }
        self.inner.to_rows(columns, kept)
    }
}
