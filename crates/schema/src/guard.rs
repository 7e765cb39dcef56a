//! Schema guard: brings warehouse tables in line with a property's columns.

use std::sync::Arc;

use engine_core::{Error, Result};
use telemetry::metrics;
use tracing::info;
use warehouse::Registry as WarehouseRegistry;

use crate::ordering::InterfaceOrdering;
use crate::registry::{ColumnsRegistry, LayoutRegistry};

/// The only component that issues DDL.
pub struct Guard {
    warehouses: Arc<dyn WarehouseRegistry>,
    columns: Arc<dyn ColumnsRegistry>,
    layouts: Arc<dyn LayoutRegistry>,
    ordering: Arc<InterfaceOrdering>,
}

impl Guard {
    pub fn new(
        warehouses: Arc<dyn WarehouseRegistry>,
        columns: Arc<dyn ColumnsRegistry>,
        layouts: Arc<dyn LayoutRegistry>,
        ordering: Arc<InterfaceOrdering>,
    ) -> Self {
        Self {
            warehouses,
            columns,
            layouts,
            ordering,
        }
    }

    /// Creates missing tables and adds missing columns for `property_id`.
    pub async fn ensure_tables(&self, property_id: &str) -> Result<()> {
        let columns = self.ordering.sorted(&self.columns.get(property_id)?);
        let layout = self.layouts.get(property_id)?;
        let driver = self.warehouses.get(property_id)?;

        for table in layout.tables(&columns) {
            match driver.create_table(&table.table, &table.schema).await {
                Ok(()) => {
                    metrics().tables_created.inc();
                    info!(property_id = %property_id, table = %table.table, "Created table");
                }
                Err(Error::TableAlreadyExists(_)) => {
                    info!(property_id = %property_id, table = %table.table, "Table already exists");
                }
                Err(e) => return Err(e),
            }

            let missing = driver.missing_columns(&table.table, &table.schema).await?;
            if !missing.is_empty() {
                info!(
                    table = %table.table,
                    count = missing.len(),
                    "Adding missing columns"
                );
            }
            for field in &missing {
                driver.add_column(&table.table, field).await?;
                metrics().columns_added.inc();
                info!(table = %table.table, column = %field.name, "Added column");
            }
        }
        Ok(())
    }
}
