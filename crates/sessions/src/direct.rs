//! Writes sessions straight into the property's warehouse.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use engine_core::{Error, Result, Schema, Session};
use schema::{
    BatchingSchemaLayout, Columns, ColumnsRegistry, Guard, InterfaceOrdering, Layout,
    LayoutRegistry, TableRows,
};
use splitter::{SessionModifier, SplitterRegistry};
use telemetry::metrics;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use warehouse::{Driver, Registry as WarehouseRegistry};

use crate::cache::PropertyCache;
use crate::config::WriterConfig;
use crate::writer::SessionWriter;

/// Evaluates columns, runs the property's modifiers and writes one batch of
/// rows per table.
///
/// Every call must carry sessions of a single property. Column evaluation
/// order is: event columns, then the modifier chain, then
/// session-scoped-event columns, then session columns.
///
/// With a [`Guard`] attached, the first write for a property brings its
/// tables up to date; the result is cached like the registry lookups.
pub struct DirectWriter {
    warehouses: Arc<dyn WarehouseRegistry>,
    columns: Arc<dyn ColumnsRegistry>,
    layouts: Arc<dyn LayoutRegistry>,
    modifiers: Arc<dyn SplitterRegistry>,
    ordering: Option<Arc<InterfaceOrdering>>,
    guard: Option<Arc<Guard>>,

    guarded_cache: PropertyCache<()>,
    driver_cache: PropertyCache<Arc<dyn Driver>>,
    columns_cache: PropertyCache<Columns>,
    layout_cache: PropertyCache<Arc<dyn Layout>>,
    modifier_cache: PropertyCache<Arc<dyn SessionModifier>>,

    write_timeout: Duration,
    concurrency: usize,
    layout_batch_size: usize,
    parent: CancellationToken,
}

struct WriteDeps {
    property_id: String,
    driver: Arc<dyn Driver>,
    columns: Columns,
    layout: Arc<dyn Layout>,
    modifier: Arc<dyn SessionModifier>,
}

impl DirectWriter {
    pub fn new(
        parent: CancellationToken,
        warehouses: Arc<dyn WarehouseRegistry>,
        columns: Arc<dyn ColumnsRegistry>,
        layouts: Arc<dyn LayoutRegistry>,
        modifiers: Arc<dyn SplitterRegistry>,
        config: &WriterConfig,
    ) -> Self {
        let ttl = config.cache_ttl();
        Self {
            warehouses,
            columns,
            layouts,
            modifiers,
            ordering: None,
            guard: None,
            guarded_cache: PropertyCache::new(ttl),
            driver_cache: PropertyCache::new(ttl),
            columns_cache: PropertyCache::new(ttl),
            layout_cache: PropertyCache::new(ttl),
            modifier_cache: PropertyCache::new(ttl),
            write_timeout: config.write_timeout(),
            concurrency: config.write_concurrency.max(1),
            layout_batch_size: config.layout_batch_size,
            parent,
        }
    }

    /// Orders table schemas the same way the schema guard does.
    pub fn with_ordering(mut self, ordering: Arc<InterfaceOrdering>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Ensures a property's tables exist before its first write.
    pub fn with_guard(mut self, guard: Arc<Guard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    async fn prepare(&self, sessions: &[Session]) -> Result<WriteDeps> {
        let first = sessions
            .first()
            .ok_or_else(|| Error::internal("no sessions provided"))?;
        let property_id = first.property_id.clone();
        if let Some(other) = sessions.iter().find(|s| s.property_id != property_id) {
            return Err(Error::internal(format!(
                "all sessions must have the same property ID, got {:?} and {:?}",
                property_id, other.property_id
            )));
        }

        if let Some(guard) = &self.guard {
            self.guarded_cache
                .get_or_load_async(&property_id, |id| async move {
                    guard.ensure_tables(&id).await
                })
                .await?;
        }

        let driver = self
            .driver_cache
            .get_or_load(&property_id, |id| self.warehouses.get(id))
            .await?;
        let columns = self
            .columns_cache
            .get_or_load(&property_id, |id| self.columns.get(id))
            .await?;
        let layout = self
            .layout_cache
            .get_or_load(&property_id, |id| self.layouts.get(id))
            .await?;
        let modifier = self
            .modifier_cache
            .get_or_load(&property_id, |id| self.modifiers.modifier(id))
            .await?;

        Ok(WriteDeps {
            property_id,
            driver,
            columns,
            layout,
            modifier,
        })
    }

    fn table_schemas(&self, deps: &WriteDeps) -> HashMap<String, Schema> {
        let tables = match &self.ordering {
            Some(ordering) => deps.layout.tables(&ordering.sorted(&deps.columns)),
            None => deps.layout.tables(&deps.columns),
        };
        tables.into_iter().map(|t| (t.table, t.schema)).collect()
    }

    async fn write_tables(
        &self,
        deps: &WriteDeps,
        per_table: Vec<TableRows>,
    ) -> Result<usize> {
        let schemas = self.table_schemas(deps);
        let group = self.parent.child_token();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for TableRows { table, rows } in per_table {
            if rows.is_empty() {
                continue;
            }
            let schema = schemas
                .get(&table)
                .cloned()
                .ok_or_else(|| Error::TableNotFound(table.clone()))?;
            let driver = deps.driver.clone();
            let permits = permits.clone();
            let group = group.clone();
            let timeout = self.write_timeout;

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| Error::Canceled)?;
                let start = Instant::now();
                let result = tokio::select! {
                    biased;
                    _ = group.cancelled() => Err(Error::Canceled),
                    written = tokio::time::timeout(timeout, driver.write(&table, &schema, &rows)) => {
                        written.unwrap_or(Err(Error::Timeout))
                    }
                };
                metrics().table_write_latency_ms.observe_since(start);
                match result {
                    Ok(()) => {
                        metrics().table_writes.inc();
                        debug!(table = %table, rows = rows.len(), "Wrote table rows");
                        Ok(rows.len())
                    }
                    Err(e) => {
                        metrics().table_write_errors.inc();
                        error!(table = %table, rows = rows.len(), error = %e, "Failed to write table rows");
                        Err(e)
                    }
                }
            });
        }

        let mut written = 0;
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| Error::internal(format!("Table write task failed: {}", e)))
                .and_then(|result| result);
            match outcome {
                Ok(rows) => written += rows,
                Err(e) => {
                    if first_error.is_none() {
                        group.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}

#[async_trait]
impl SessionWriter for DirectWriter {
    async fn write(&self, sessions: Vec<Session>) -> Result<()> {
        let start = Instant::now();
        let deps = self.prepare(&sessions).await?;

        let mut processed = Vec::with_capacity(sessions.len());
        for mut session in sessions {
            write_event_columns(&deps.columns, &mut session)?;
            if session.is_broken() {
                processed.push(session);
                continue;
            }
            for mut successor in deps.modifier.split(session)? {
                write_session_columns(&deps.columns, &mut successor)?;
                processed.push(successor);
            }
        }
        if processed.is_empty() {
            debug!(property_id = %deps.property_id, "Nothing left to write after modifiers");
            return Ok(());
        }

        let session_count = processed.len();
        let per_table = BatchingSchemaLayout::new(deps.layout.clone(), self.layout_batch_size)
            .to_rows(&deps.columns, processed)?;
        let rows = self.write_tables(&deps, per_table).await?;

        metrics().sessions_written.inc_by(session_count as u64);
        metrics().rows_written.inc_by(rows as u64);
        metrics().write_latency_ms.observe_since(start);
        debug!(
            property_id = %deps.property_id,
            sessions = session_count,
            rows,
            "Wrote sessions"
        );
        Ok(())
    }
}

/// Runs every event column over every event. Broken events skip the
/// remaining columns.
fn write_event_columns(columns: &Columns, session: &mut Session) -> Result<()> {
    let mut broken_session = None;
    'columns: for column in &columns.event {
        for event in session.events.iter_mut().filter(|e| !e.is_broken()) {
            match column.write(event) {
                Ok(()) => {}
                Err(Error::BrokenEvent(reason)) => event.mark_broken(reason),
                Err(Error::BrokenSession(reason)) => {
                    broken_session = Some(reason);
                    break 'columns;
                }
                Err(e) => return Err(e),
            }
        }
    }
    if let Some(reason) = broken_session {
        session.mark_broken(reason);
    }
    Ok(())
}

fn write_session_columns(columns: &Columns, session: &mut Session) -> Result<()> {
    for column in &columns.session_scoped_event {
        for index in 0..session.len() {
            if session.events[index].is_broken() {
                continue;
            }
            match column.write(session, index) {
                Ok(()) => {}
                Err(Error::BrokenEvent(reason)) => session.events[index].mark_broken(reason),
                Err(Error::BrokenSession(reason)) => {
                    session.mark_broken(reason);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
    for column in &columns.session {
        match column.write(session) {
            Ok(()) => {}
            Err(Error::BrokenSession(reason)) | Err(Error::BrokenEvent(reason)) => {
                session.mark_broken(reason);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
