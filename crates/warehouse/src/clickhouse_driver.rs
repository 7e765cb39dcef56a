//! ClickHouse-backed driver.
//!
//! DDL is issued as plain SQL; rows are sent inline as `JSONEachRow`.

use async_trait::async_trait;
use clickhouse::{Client, Row as ChRow};
use engine_core::{DataType, Error, Field, Result, Row, Schema};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ClickHouseConfig;
use crate::driver::Driver;

#[derive(Debug, ChRow, Deserialize)]
struct ColumnName {
    name: String,
}

pub struct ClickHouseDriver {
    client: Client,
}

impl ClickHouseDriver {
    pub fn new(config: &ClickHouseConfig) -> Self {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);
        if let Some(user) = &config.username {
            client = client.with_user(user);
        }
        if let Some(password) = &config.password {
            client = client.with_password(password);
        }
        info!(url = %config.url, database = %config.database, "Connected ClickHouse driver");
        Self { client }
    }
}

/// ClickHouse type for a field.
pub fn column_type(field: &Field) -> String {
    let base = match field.data_type {
        DataType::String => "String",
        DataType::Int64 => "Int64",
        DataType::Float64 => "Float64",
        DataType::Bool => "Bool",
        DataType::Date32 => "Date32",
        DataType::TimestampSeconds => "DateTime",
    };
    if field.nullable {
        format!("Nullable({})", base)
    } else {
        base.to_string()
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// `?` is the bind placeholder of the client's SQL builder.
fn escape_placeholders(sql: &str) -> String {
    sql.replace('?', "??")
}

pub fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns = schema
        .fields()
        .iter()
        .map(|f| format!("    {} {}", quote_ident(&f.name), column_type(f)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE {} (\n{}\n)\nENGINE = MergeTree()\nORDER BY tuple()",
        quote_ident(table),
        columns
    )
}

pub fn add_column_sql(table: &str, field: &Field) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
        quote_ident(table),
        quote_ident(&field.name),
        column_type(field)
    )
}

/// Builds an inline `JSONEachRow` insert restricted to the schema's fields.
pub fn insert_sql(table: &str, schema: &Schema, rows: &[Row]) -> Result<String> {
    let mut sql = format!("INSERT INTO {} FORMAT JSONEachRow\n", quote_ident(table));
    for row in rows {
        let mut object = serde_json::Map::with_capacity(schema.len());
        for field in schema.fields() {
            let value = row.get(&field.name).map(|v| v.to_json()).unwrap_or_default();
            object.insert(field.name.clone(), value);
        }
        sql.push_str(&serde_json::to_string(&object)?);
        sql.push('\n');
    }
    Ok(escape_placeholders(&sql))
}

#[async_trait]
impl Driver for ClickHouseDriver {
    async fn create_table(&self, table: &str, schema: &Schema) -> Result<()> {
        let sql = create_table_sql(table, schema);
        match self.client.query(&escape_placeholders(&sql)).execute().await {
            Ok(()) => {
                info!(table = %table, columns = schema.len(), "Created table");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already exists") || message.contains("TABLE_ALREADY_EXISTS") {
                    Err(Error::TableAlreadyExists(table.to_string()))
                } else {
                    Err(Error::warehouse(format!("Create table error: {}", message)))
                }
            }
        }
    }

    async fn missing_columns(&self, table: &str, schema: &Schema) -> Result<Vec<Field>> {
        let existing: Vec<ColumnName> = self
            .client
            .query("SELECT name FROM system.columns WHERE database = currentDatabase() AND table = ?")
            .bind(table)
            .fetch_all()
            .await
            .map_err(|e| Error::warehouse(format!("Query error: {}", e)))?;

        if existing.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        Ok(schema
            .fields()
            .iter()
            .filter(|f| !existing.iter().any(|c| c.name == f.name))
            .cloned()
            .collect())
    }

    async fn add_column(&self, table: &str, field: &Field) -> Result<()> {
        self.client
            .query(&escape_placeholders(&add_column_sql(table, field)))
            .execute()
            .await
            .map_err(|e| Error::warehouse(format!("Add column error: {}", e)))?;
        info!(table = %table, column = %field.name, "Added column");
        Ok(())
    }

    async fn write(&self, table: &str, schema: &Schema, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        let sql = insert_sql(table, schema, rows)?;
        self.client
            .query(&sql)
            .execute()
            .await
            .map_err(|e| Error::warehouse(format!("Insert error: {}", e)))?;

        debug!(
            table = %table,
            count = rows.len(),
            latency_ms = %start.elapsed().as_millis(),
            "Inserted rows"
        );
        Ok(())
    }
}
