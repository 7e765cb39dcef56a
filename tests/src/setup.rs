//! Common test setup functions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use columns::{default_columns, default_ordering, ColumnDeps};
use engine_core::{Hit, Result, Row};
use schema::{
    BrokenFilteringLayout, ColumnsRegistry, EmbeddedSessionColumnsLayout, Guard, Layout,
    LayoutRegistry, StaticColumnsRegistry, StaticLayoutRegistry,
};
use sessions::{
    BatchingConfig, BatchingWriter, CancellationToken, CloserConfig, DirectWriter,
    ProtosessionCloser, SessionWriter, WriterConfig,
};
use splitter::{FilterModifier, FiltersConfig, SettingsSplitterRegistry, SplitSettings};
use warehouse::{Registry as WarehouseRegistry, StaticRegistry};

use crate::mocks::MockDriver;

pub const EVENTS_TABLE: &str = "events";

/// Session fields already carry distinct names, so rows embed them as is.
pub const SESSION_PREFIX: &str = "";

/// The full session pipeline over a recording in-memory warehouse:
/// closer → direct writer → [`MockDriver`].
///
/// Tables are created by the schema guard, exactly as the binary does: at
/// startup for the listed properties and on first write for the rest.
pub struct TestContext {
    pub driver: MockDriver,
    pub writer: Arc<DirectWriter>,
    pub closer: ProtosessionCloser,
    pub shutdown: CancellationToken,
}

/// Knobs for building a [`TestContext`].
#[derive(Default)]
pub struct PipelineOptions {
    pub split: SplitSettings,
    pub overrides: HashMap<String, SplitSettings>,
    pub filters: Option<FiltersConfig>,
    pub properties: Vec<String>,
    /// Skip the startup guard run; tables appear on first write
    pub lazy_tables: bool,
}

impl PipelineOptions {
    pub fn with_filters_yaml(mut self, yaml: &str) -> Result<Self> {
        self.filters = Some(FiltersConfig::from_yaml_str(yaml)?);
        Ok(self)
    }

    pub fn with_override(mut self, property_id: &str, settings: SplitSettings) -> Self {
        self.overrides.insert(property_id.to_string(), settings);
        self
    }
}

impl TestContext {
    /// Default columns, default split settings, no filters.
    pub async fn new() -> Result<Self> {
        Self::with_options(PipelineOptions::default()).await
    }

    pub async fn with_options(options: PipelineOptions) -> Result<Self> {
        let driver = MockDriver::new();
        let warehouses: Arc<dyn WarehouseRegistry> =
            Arc::new(StaticRegistry::single(Arc::new(driver.clone())));
        let columns: Arc<dyn ColumnsRegistry> = Arc::new(StaticColumnsRegistry::single(
            default_columns(&ColumnDeps::new()?)?,
        ));
        let layout: Arc<dyn Layout> = Arc::new(BrokenFilteringLayout::new(Arc::new(
            EmbeddedSessionColumnsLayout::new(EVENTS_TABLE, SESSION_PREFIX),
        )));
        let layouts: Arc<dyn LayoutRegistry> = Arc::new(StaticLayoutRegistry::single(layout));
        let ordering = Arc::new(default_ordering());

        let guard = Arc::new(Guard::new(
            warehouses.clone(),
            columns.clone(),
            layouts.clone(),
            ordering.clone(),
        ));
        if !options.lazy_tables {
            let mut properties = options.properties.clone();
            if properties.is_empty() {
                properties.push(crate::fixtures::PROPERTY_ID.to_string());
            }
            for property_id in &properties {
                guard.ensure_tables(property_id).await?;
            }
        }

        let mut modifiers =
            SettingsSplitterRegistry::new(options.split).with_overrides(options.overrides);
        if let Some(filters) = options.filters {
            modifiers = modifiers.with_filter(Arc::new(FilterModifier::new(filters)?));
        }

        let shutdown = CancellationToken::new();
        let writer = Arc::new(
            DirectWriter::new(
                shutdown.clone(),
                warehouses,
                columns,
                layouts,
                Arc::new(modifiers),
                &WriterConfig::default(),
            )
            .with_ordering(ordering)
            .with_guard(guard),
        );
        let closer = ProtosessionCloser::new(
            writer.clone(),
            &CloserConfig {
                failure_sleep_ms: 0,
                ..Default::default()
            },
        );

        Ok(Self {
            driver,
            writer,
            closer,
            shutdown,
        })
    }

    /// Close the given protosessions through the whole pipeline.
    pub async fn close(&self, protosessions: Vec<Vec<Hit>>) -> Result<()> {
        self.closer.close(protosessions).await
    }

    /// Rows written to the events table.
    pub fn event_rows(&self) -> Vec<Row> {
        self.driver.rows(EVENTS_TABLE)
    }

    /// Rows grouped by `session_id`, in write order.
    pub fn rows_by_session(&self) -> Vec<Vec<Row>> {
        let mut sessions: Vec<(String, Vec<Row>)> = Vec::new();
        for row in self.event_rows() {
            let id = crate::fixtures::text(&row, "session_id")
                .unwrap_or_default()
                .to_string();
            match sessions.iter_mut().find(|(s, _)| *s == id) {
                Some((_, rows)) => rows.push(row),
                None => sessions.push((id, vec![row])),
            }
        }
        sessions.into_iter().map(|(_, rows)| rows).collect()
    }

    /// Set the warehouse to fail (for error testing).
    pub fn set_warehouse_failure(&self, should_fail: bool) {
        self.driver.set_should_fail(should_fail);
    }
}

/// Batching settings with short timers, suitable for tests.
pub fn fast_batching_config(spool_dir: &Path) -> BatchingConfig {
    BatchingConfig {
        spool_dir: spool_dir.to_path_buf(),
        lvl1_max_age_ms: 20,
        lvl1_sweep_interval_ms: 10,
        lvl2_flush_interval_ms: 100,
        ..Default::default()
    }
}

/// A batching writer in front of `child`.
pub async fn batching_writer(
    child: Arc<dyn SessionWriter>,
    config: BatchingConfig,
) -> Result<(BatchingWriter, CancellationToken)> {
    let parent = CancellationToken::new();
    let writer = BatchingWriter::spawn(parent.clone(), child, config).await?;
    Ok((writer, parent))
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
