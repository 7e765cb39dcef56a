//! Warehouse drivers: the write contract, an in-memory driver and ClickHouse.

pub mod clickhouse_driver;
pub mod config;
pub mod driver;
pub mod memory;

pub use clickhouse_driver::ClickHouseDriver;
pub use config::*;
pub use driver::*;
pub use memory::*;

use std::sync::Arc;

/// Builds the default driver described by `config`.
pub fn driver_from_config(config: &WarehouseConfig) -> Arc<dyn Driver> {
    match config.kind {
        WarehouseKind::Memory => Arc::new(MemoryDriver::new()),
        WarehouseKind::Clickhouse => Arc::new(ClickHouseDriver::new(&config.clickhouse)),
    }
}
