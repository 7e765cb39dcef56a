//! Session Engine
//!
//! Turns closed protosessions into warehouse rows:
//! - Column evaluation over events and sessions
//! - Traffic filters and session splitting per property
//! - Two-level batching with on-disk spool files
//! - Schema guard that keeps warehouse tables in line with the columns
//!
//! Protosessions arrive as newline-delimited JSON on stdin, one `[Hit, ...]`
//! array per line.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use validator::Validate;

use columns::{default_columns, default_ordering, ColumnDeps};
use engine_core::Hit;
use schema::{
    BrokenFilteringLayout, ColumnsRegistry, EmbeddedSessionColumnsLayout, Guard, Layout,
    LayoutRegistry, StaticColumnsRegistry, StaticLayoutRegistry,
};
use sessions::{
    BatchingConfig, BatchingWriter, CancellationToken, CloserConfig, DirectWriter,
    ProtosessionCloser, SessionWriter, WriterConfig,
};
use splitter::{FilterModifier, FiltersConfig, SettingsSplitterRegistry, SplitSettings};
use telemetry::{init_tracing_from_env, metrics};
use warehouse::{driver_from_config, Registry as WarehouseRegistry, StaticRegistry, WarehouseConfig};

/// Events table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayoutConfig {
    #[serde(default = "default_events_table")]
    table: String,
    /// Prepended to session field names in event rows
    #[serde(default)]
    session_prefix: String,
}

fn default_events_table() -> String {
    "events".to_string()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            table: default_events_table(),
            session_prefix: String::new(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    batching: BatchingConfig,
    #[serde(default)]
    writer: WriterConfig,
    #[serde(default)]
    closer: CloserConfig,

    /// Split policy for properties without an override
    #[serde(default)]
    splitting: SplitSettings,
    /// Per-property split overrides
    #[serde(default)]
    properties: HashMap<String, SplitSettings>,
    /// YAML document with a top-level `filters:` section
    #[serde(default)]
    filters_file: Option<PathBuf>,

    #[serde(default)]
    layout: LayoutConfig,
    #[serde(default)]
    warehouse: WarehouseConfig,

    /// Properties whose tables are checked at startup, besides the
    /// overridden ones
    #[serde(default)]
    bootstrap_properties: Vec<String>,
}

impl Config {
    fn validate_all(&self) -> Result<()> {
        self.batching
            .validate()
            .context("Invalid batching configuration")?;
        self.writer.validate().context("Invalid writer configuration")?;
        self.closer.validate().context("Invalid closer configuration")?;
        Ok(())
    }

    fn guarded_properties(&self) -> BTreeSet<String> {
        self.bootstrap_properties
            .iter()
            .chain(self.properties.keys())
            .cloned()
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Session Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.validate_all()?;
    info!(
        warehouse = ?config.warehouse.kind,
        spool_dir = %config.batching.spool_dir.display(),
        table = %config.layout.table,
        "Loaded configuration"
    );

    let shutdown = CancellationToken::new();
    let warehouses: Arc<dyn WarehouseRegistry> =
        Arc::new(StaticRegistry::single(driver_from_config(&config.warehouse)));
    let Pipeline { closer, batching } =
        build_pipeline(&config, warehouses, shutdown.clone()).await?;

    let signal = shutdown_signal();
    tokio::pin!(signal);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut signal => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    line_number += 1;
                    close_line(&closer, line_number, &line).await;
                }
                Ok(None) => {
                    info!(lines = line_number, "Input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    break;
                }
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    batching.cleanup().await;
    shutdown.cancel();

    match serde_json::to_string(&metrics().snapshot()) {
        Ok(snapshot) => info!(metrics = %snapshot, "Shutdown complete"),
        Err(e) => warn!(error = %e, "Shutdown complete, metrics unavailable"),
    }
    Ok(())
}

/// Closer in front of the batching writer in front of the direct writer.
struct Pipeline {
    closer: ProtosessionCloser,
    batching: Arc<BatchingWriter>,
}

async fn build_pipeline(
    config: &Config,
    warehouses: Arc<dyn WarehouseRegistry>,
    shutdown: CancellationToken,
) -> Result<Pipeline> {
    let deps = ColumnDeps::new().context("Failed to load column dependencies")?;
    let columns: Arc<dyn ColumnsRegistry> = Arc::new(StaticColumnsRegistry::single(
        default_columns(&deps).context("Failed to assemble default columns")?,
    ));
    let layout: Arc<dyn Layout> = Arc::new(BrokenFilteringLayout::new(Arc::new(
        EmbeddedSessionColumnsLayout::new(
            config.layout.table.clone(),
            config.layout.session_prefix.clone(),
        ),
    )));
    let layouts: Arc<dyn LayoutRegistry> = Arc::new(StaticLayoutRegistry::single(layout));
    let ordering = Arc::new(default_ordering());

    // Known properties are checked up front; any other property gets its
    // tables on first write
    let guard = Arc::new(Guard::new(
        warehouses.clone(),
        columns.clone(),
        layouts.clone(),
        ordering.clone(),
    ));
    for property_id in config.guarded_properties() {
        guard
            .ensure_tables(&property_id)
            .await
            .with_context(|| format!("Failed to ensure tables for property {}", property_id))?;
    }

    let mut modifiers = SettingsSplitterRegistry::new(config.splitting.clone())
        .with_overrides(config.properties.clone());
    if let Some(path) = &config.filters_file {
        let filters = FiltersConfig::from_file(path).context("Failed to load filters")?;
        let filter = FilterModifier::new(filters).context("Failed to compile filters")?;
        info!(path = %path.display(), "Loaded traffic filters");
        modifiers = modifiers.with_filter(Arc::new(filter));
    }

    let direct = Arc::new(
        DirectWriter::new(
            shutdown.clone(),
            warehouses,
            columns,
            layouts,
            Arc::new(modifiers),
            &config.writer,
        )
        .with_ordering(ordering)
        .with_guard(guard),
    );
    let batching = Arc::new(
        BatchingWriter::spawn(shutdown, direct, config.batching.clone())
            .await
            .context("Failed to start batching writer")?,
    );
    let closer = ProtosessionCloser::new(batching.clone() as Arc<dyn SessionWriter>, &config.closer);

    Ok(Pipeline { closer, batching })
}

/// Closes the protosession on one input line. Bad lines are logged and
/// skipped.
async fn close_line(closer: &ProtosessionCloser, line_number: u64, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let hits: Vec<Hit> = match serde_json::from_str(line) {
        Ok(hits) => hits,
        Err(e) => {
            warn!(line = line_number, error = %e, "Skipping malformed protosession");
            return;
        }
    };
    if let Err(e) = closer.close(vec![hits]).await {
        error!(line = line_number, error = %e, "Failed to close protosession");
    }
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SESSION_ENGINE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for deployment secrets
    if let Ok(url) = std::env::var("SESSION_ENGINE_CLICKHOUSE_URL") {
        config.warehouse.clickhouse.url = url;
    }
    if let Ok(username) = std::env::var("SESSION_ENGINE_CLICKHOUSE_USERNAME") {
        config.warehouse.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("SESSION_ENGINE_CLICKHOUSE_PASSWORD") {
        config.warehouse.clickhouse.password = Some(password);
    }

    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
