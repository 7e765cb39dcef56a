//! Warehouse driver contract and per-property driver lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use engine_core::{Field, Result, Row, Schema};

/// A columnar warehouse the session pipeline can write into.
///
/// `create_table` returns `Error::TableAlreadyExists` when the table is
/// present; callers bootstrapping tables treat that as success.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn create_table(&self, table: &str, schema: &Schema) -> Result<()>;

    /// Fields of `schema` the existing table does not have yet.
    async fn missing_columns(&self, table: &str, schema: &Schema) -> Result<Vec<Field>>;

    async fn add_column(&self, table: &str, field: &Field) -> Result<()>;

    async fn write(&self, table: &str, schema: &Schema, rows: &[Row]) -> Result<()>;
}

/// Resolves the driver a property writes to.
pub trait Registry: Send + Sync {
    fn get(&self, property_id: &str) -> Result<Arc<dyn Driver>>;
}

/// Fixed property-to-driver mapping with a fallback.
pub struct StaticRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
    default: Arc<dyn Driver>,
}

impl StaticRegistry {
    pub fn new(drivers: HashMap<String, Arc<dyn Driver>>, default: Arc<dyn Driver>) -> Self {
        Self { drivers, default }
    }

    /// Every property writes to `driver`.
    pub fn single(driver: Arc<dyn Driver>) -> Self {
        Self::new(HashMap::new(), driver)
    }
}

impl Registry for StaticRegistry {
    fn get(&self, property_id: &str) -> Result<Arc<dyn Driver>> {
        Ok(self
            .drivers
            .get(property_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
