//! Warehouse configuration.

use serde::{Deserialize, Serialize};

/// Which driver backs the default warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseKind {
    #[default]
    Memory,
    Clickhouse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub kind: WarehouseKind,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
}

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            username: None,
            password: None,
        }
    }
}
