//! Per-property column and layout registries.

use std::collections::HashMap;
use std::sync::Arc;

use engine_core::Result;

use crate::column::Columns;
use crate::layout::Layout;
use crate::sorter::sort_all_columns;

pub trait ColumnsRegistry: Send + Sync {
    fn get(&self, property_id: &str) -> Result<Columns>;
}

/// Fixed columns per property with a fallback set.
pub struct StaticColumnsRegistry {
    columns: HashMap<String, Columns>,
    default: Columns,
}

impl StaticColumnsRegistry {
    pub fn new(columns: HashMap<String, Columns>, default: Columns) -> Self {
        Self { columns, default }
    }

    /// Every property gets `columns`.
    pub fn single(columns: Columns) -> Self {
        Self::new(HashMap::new(), columns)
    }
}

impl ColumnsRegistry for StaticColumnsRegistry {
    fn get(&self, property_id: &str) -> Result<Columns> {
        Ok(self
            .columns
            .get(property_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Concatenates the columns of several registries and sorts the union.
pub struct ColumnsMerger {
    registries: Vec<Arc<dyn ColumnsRegistry>>,
}

impl ColumnsMerger {
    pub fn new(registries: Vec<Arc<dyn ColumnsRegistry>>) -> Self {
        Self { registries }
    }
}

impl ColumnsRegistry for ColumnsMerger {
    fn get(&self, property_id: &str) -> Result<Columns> {
        let mut all = Columns::default();
        for registry in &self.registries {
            all.extend(registry.get(property_id)?);
        }
        sort_all_columns(&all)
    }
}

pub trait LayoutRegistry: Send + Sync {
    fn get(&self, property_id: &str) -> Result<Arc<dyn Layout>>;
}

pub struct StaticLayoutRegistry {
    layouts: HashMap<String, Arc<dyn Layout>>,
    default: Arc<dyn Layout>,
}

impl StaticLayoutRegistry {
    pub fn new(layouts: HashMap<String, Arc<dyn Layout>>, default: Arc<dyn Layout>) -> Self {
        Self { layouts, default }
    }

    pub fn single(layout: Arc<dyn Layout>) -> Self {
        Self::new(HashMap::new(), layout)
    }
}

impl LayoutRegistry for StaticLayoutRegistry {
    fn get(&self, property_id: &str) -> Result<Arc<dyn Layout>> {
        Ok(self
            .layouts
            .get(property_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
