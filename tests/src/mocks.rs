//! Mock implementations for testing.

use async_trait::async_trait;
use engine_core::{Error, Field, Result, Row, Schema, Session};
use parking_lot::Mutex;
use sessions::SessionWriter;
use std::sync::Arc;
use warehouse::{Driver, MemoryDriver};

/// Warehouse driver that records every write.
///
/// DDL goes to an inner [`MemoryDriver`] so the schema guard behaves as it
/// would against a real warehouse; writes are captured per call and can be
/// made to fail.
#[derive(Clone)]
pub struct MockDriver {
    tables: Arc<MemoryDriver>,
    writes: Arc<Mutex<Vec<(String, Vec<Row>)>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(MemoryDriver::new()),
            writes: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Every `(table, rows)` pair written so far.
    pub fn captured_writes(&self) -> Vec<(String, Vec<Row>)> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Rows written to `table`, across all calls.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.writes
            .lock()
            .iter()
            .filter(|(t, _)| t == table)
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }

    pub fn fields(&self, table: &str) -> Option<Vec<Field>> {
        self.tables.fields(table)
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn create_table(&self, table: &str, schema: &Schema) -> Result<()> {
        self.tables.create_table(table, schema).await
    }

    async fn missing_columns(&self, table: &str, schema: &Schema) -> Result<Vec<Field>> {
        self.tables.missing_columns(table, schema).await
    }

    async fn add_column(&self, table: &str, field: &Field) -> Result<()> {
        self.tables.add_column(table, field).await
    }

    async fn write(&self, table: &str, _schema: &Schema, rows: &[Row]) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::warehouse("Mock driver failure"));
        }
        self.writes.lock().push((table.to_string(), rows.to_vec()));
        Ok(())
    }
}

/// Session writer that captures every batch it is handed.
#[derive(Clone)]
pub struct MockSessionWriter {
    batches: Arc<Mutex<Vec<Vec<Session>>>>,
    calls: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockSessionWriter {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// A writer whose every call fails.
    pub fn failing() -> Self {
        let writer = Self::new();
        writer.set_should_fail(true);
        writer
    }

    /// Batches of successful calls.
    pub fn captured_batches(&self) -> Vec<Vec<Session>> {
        self.batches.lock().clone()
    }

    pub fn session_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    /// Calls made, failed ones included.
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }
}

impl Default for MockSessionWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionWriter for MockSessionWriter {
    async fn write(&self, sessions: Vec<Session>) -> Result<()> {
        *self.calls.lock() += 1;
        if *self.should_fail.lock() {
            return Err(Error::retryable("Mock writer failure"));
        }
        self.batches.lock().push(sessions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{DataType, Hit, Value};

    #[tokio::test]
    async fn test_mock_driver_captures_rows() {
        let driver = MockDriver::new();
        let schema = Schema::new(vec![Field::new("event_id", DataType::String)]);
        driver.create_table("events", &schema).await.unwrap();

        let row: Row = [("event_id".to_string(), Value::from("e1"))].into();
        driver.write("events", &schema, &[row]).await.unwrap();

        assert_eq!(driver.write_count(), 1);
        assert_eq!(driver.rows("events").len(), 1);
        assert!(driver.fields("events").is_some());
    }

    #[tokio::test]
    async fn test_mock_driver_failure() {
        let driver = MockDriver::new();
        driver.set_should_fail(true);
        let schema = Schema::new(vec![]);
        assert!(driver.write("events", &schema, &[]).await.is_err());
        assert_eq!(driver.write_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_writer_counts_failed_calls() {
        let writer = MockSessionWriter::failing();
        let session = Session::from_hits(vec![Hit::new("p1")]);
        assert!(writer.write(vec![session]).await.is_err());
        assert_eq!(writer.call_count(), 1);
        assert_eq!(writer.session_count(), 0);

        writer.set_should_fail(false);
        writer
            .write(vec![Session::from_hits(vec![Hit::new("p1")])])
            .await
            .unwrap();
        assert_eq!(writer.call_count(), 2);
        assert_eq!(writer.captured_batches().len(), 1);
    }
}
