//! Two-level batching writer.
//!
//! Level 1 is an in-memory buffer per property, flushed when it holds
//! `lvl1_max_sessions` sessions or its first session is older than
//! `lvl1_max_age`. A flush appends one record to the property's spool file
//! (level 2). Spool files are drained into the child writer on a slower
//! tick; a spool that keeps failing is discarded after
//! `max_consecutive_child_write_failures` attempts.
//!
//! A single actor task owns both levels. Callers and timers reach it only
//! through channels.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use engine_core::{Error, Result, Session};
use telemetry::metrics;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::codec::SessionCodec;
use crate::config::BatchingConfig;
use crate::spool::{self, Spool};
use crate::writer::SessionWriter;

/// Sessions of one property waiting for their spool append.
struct PropertyBuffer {
    sessions: Vec<Session>,
    first_add: Instant,
}

impl PropertyBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            sessions: Vec::with_capacity(capacity),
            first_add: Instant::now(),
        }
    }
}

pub struct BatchingWriter {
    requests: mpsc::Sender<Vec<Session>>,
    stop: CancellationToken,
    parent: CancellationToken,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl BatchingWriter {
    /// Starts the actor. `parent` cancels pending `write` calls; shutdown
    /// goes through [`BatchingWriter::cleanup`].
    pub async fn spawn(
        parent: CancellationToken,
        child: Arc<dyn SessionWriter>,
        config: BatchingConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(format!("Invalid batching config: {}", e)))?;
        let spool = Spool::open(&config.spool_dir).await?;
        let (requests, rx) = mpsc::channel(config.write_chan_buffer);
        let stop = CancellationToken::new();

        let actor = Actor::new(child, spool, config);
        let handle = tokio::spawn(actor.run(rx, stop.clone()));

        Ok(Self {
            requests,
            stop,
            parent,
            actor: Mutex::new(Some(handle)),
        })
    }

    /// Stops the actor and waits until every buffered session is on disk.
    /// Spool files are left for the next start.
    pub async fn cleanup(&self) {
        self.stop.cancel();
        let handle = self.actor.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Batching writer actor panicked");
            }
        }
    }
}

#[async_trait]
impl SessionWriter for BatchingWriter {
    async fn write(&self, sessions: Vec<Session>) -> Result<()> {
        if sessions.is_empty() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Err(Error::Stopped),
            _ = self.parent.cancelled() => Err(Error::Canceled),
            sent = self.requests.send(sessions) => sent.map_err(|_| Error::Stopped),
        }
    }
}

struct Actor {
    child: Arc<dyn SessionWriter>,
    spool: Spool,
    codec: Box<dyn SessionCodec>,
    config: BatchingConfig,
    buffers: HashMap<String, PropertyBuffer>,
    failures: HashMap<PathBuf, u32>,
}

impl Actor {
    fn new(child: Arc<dyn SessionWriter>, spool: Spool, config: BatchingConfig) -> Self {
        Self {
            child,
            spool,
            codec: config.encoding.codec(),
            config,
            buffers: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Vec<Session>>, stop: CancellationToken) {
        let start = tokio::time::Instant::now();
        let mut lvl1 = interval_at(
            start + self.config.lvl1_sweep_interval(),
            self.config.lvl1_sweep_interval(),
        );
        lvl1.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut lvl2 = interval_at(
            start + self.config.lvl2_flush_interval(),
            self.config.lvl2_flush_interval(),
        );
        lvl2.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(spool_dir = %self.spool.dir().display(), "Batching writer started");
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    rx.close();
                    while let Ok(sessions) = rx.try_recv() {
                        self.accept(sessions).await;
                    }
                    self.flush_all().await;
                    break;
                }
                request = rx.recv() => match request {
                    Some(sessions) => self.accept(sessions).await,
                    None => {
                        self.flush_all().await;
                        break;
                    }
                },
                _ = lvl1.tick() => self.sweep().await,
                _ = lvl2.tick() => self.drain().await,
            }
        }
        debug!("Batching writer stopped");
    }

    async fn accept(&mut self, sessions: Vec<Session>) {
        let mut by_property: HashMap<String, Vec<Session>> = HashMap::new();
        for session in sessions {
            if session.property_id.is_empty() {
                warn!("Session has empty property id, skipping");
                continue;
            }
            by_property
                .entry(session.property_id.clone())
                .or_default()
                .push(session);
        }

        for (property_id, sessions) in by_property {
            metrics().sessions_accepted.inc_by(sessions.len() as u64);
            let max = self.config.lvl1_max_sessions;
            let buffer = self
                .buffers
                .entry(property_id.clone())
                .or_insert_with(|| PropertyBuffer::new(max));
            buffer.sessions.extend(sessions);

            if buffer.sessions.len() >= max {
                if let Some(buffer) = self.buffers.remove(&property_id) {
                    self.flush_property(&property_id, buffer).await;
                }
            }
        }
        self.update_buffered_gauge();
    }

    /// Flushes every buffer older than the configured max age.
    async fn sweep(&mut self) {
        let max_age = self.config.lvl1_max_age();
        let aged: Vec<String> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| buffer.first_add.elapsed() >= max_age)
            .map(|(property_id, _)| property_id.clone())
            .collect();
        if aged.is_empty() {
            return;
        }
        for property_id in aged {
            if let Some(buffer) = self.buffers.remove(&property_id) {
                self.flush_property(&property_id, buffer).await;
            }
        }
        self.update_buffered_gauge();
    }

    async fn flush_all(&mut self) {
        let buffers: Vec<(String, PropertyBuffer)> = self.buffers.drain().collect();
        for (property_id, buffer) in buffers {
            self.flush_property(&property_id, buffer).await;
        }
        self.update_buffered_gauge();
    }

    /// Appends the buffer to the property's spool. The buffer is lost if
    /// encoding or the append fails.
    async fn flush_property(&self, property_id: &str, buffer: PropertyBuffer) {
        if buffer.sessions.is_empty() {
            return;
        }
        let count = buffer.sessions.len();
        let payload = match self.codec.encode(&buffer.sessions) {
            Ok(payload) => payload,
            Err(e) => {
                error!(property_id = %property_id, sessions = count, error = %e, "Failed to encode sessions");
                return;
            }
        };
        match self.spool.append(property_id, &payload).await {
            Ok(path) => {
                metrics().spool_appends.inc();
                debug!(
                    property_id = %property_id,
                    sessions = count,
                    bytes = payload.len(),
                    path = %path.display(),
                    "Appended sessions to spool"
                );
            }
            Err(e) => {
                error!(property_id = %property_id, sessions = count, error = %e, "Failed to append to spool");
            }
        }
    }

    /// Hands every spool file to the child writer.
    async fn drain(&mut self) {
        let files = match self.spool.files().await {
            Ok(files) => files,
            Err(e) => {
                error!(spool_dir = %self.spool.dir().display(), error = %e, "Failed to list spool files");
                return;
            }
        };
        metrics().spool_files.set(files.len() as u64);

        for path in files {
            let start = Instant::now();
            let outcome = match self.read_spool(&path).await {
                Ok(sessions) if sessions.is_empty() => {
                    self.remove(&path).await;
                    continue;
                }
                Ok(sessions) => {
                    let count = sessions.len();
                    self.child.write(sessions).await.map(|()| count)
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(count) => {
                    metrics().spool_flushes.inc();
                    metrics().spool_flush_latency_ms.observe_since(start);
                    info!(sessions = count, path = %path.display(), "Wrote spooled sessions to warehouse");
                    self.remove(&path).await;
                }
                Err(e) => self.record_failure(&path, e).await,
            }
        }
    }

    async fn read_spool(&self, path: &Path) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for record in spool::read_records(path).await? {
            sessions.extend(self.codec.decode(&record)?);
        }
        Ok(sessions)
    }

    async fn record_failure(&mut self, path: &Path, e: Error) {
        metrics().spool_flush_errors.inc();
        let limit = self.config.max_consecutive_child_write_failures;
        let failures = self.failures.entry(path.to_path_buf()).or_insert(0);
        *failures += 1;

        if *failures >= limit {
            error!(
                path = %path.display(),
                failures = *failures,
                threshold = limit,
                error = %e,
                "Discarding spool file after consecutive write failures"
            );
            metrics().spool_files_dropped.inc();
            self.remove(path).await;
        } else {
            error!(
                path = %path.display(),
                failures = *failures,
                error = %e,
                "Failed to write spooled sessions, keeping file"
            );
        }
    }

    async fn remove(&mut self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            error!(path = %path.display(), error = %e, "Failed to remove spool file");
        }
        self.failures.remove(path);
    }

    fn update_buffered_gauge(&self) {
        let buffered: usize = self.buffers.values().map(|b| b.sessions.len()).sum();
        metrics().buffered_sessions.set(buffered as u64);
    }
}
