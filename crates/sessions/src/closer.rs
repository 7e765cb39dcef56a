//! Turns protosessions into sessions and hands them to a writer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_core::{Error, Hit, Result, Session};
use telemetry::metrics;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::config::CloserConfig;
use crate::writer::SessionWriter;

/// Builds one session per protosession and writes them grouped by
/// property, so a single `write` call never mixes properties.
///
/// A failed write is followed by a pause of `failure_sleep` before the
/// error is returned, which keeps a caller's retry loop from hammering a
/// struggling warehouse.
pub struct ProtosessionCloser {
    writer: Arc<dyn SessionWriter>,
    failure_sleep: Duration,
    max_concurrent_properties: usize,
}

impl ProtosessionCloser {
    pub fn new(writer: Arc<dyn SessionWriter>, config: &CloserConfig) -> Self {
        Self {
            writer,
            failure_sleep: config.failure_sleep(),
            max_concurrent_properties: config.max_concurrent_properties.max(1),
        }
    }

    pub async fn close(&self, protosessions: Vec<Vec<Hit>>) -> Result<()> {
        let start = Instant::now();
        let mut groups: Vec<(String, Vec<Session>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut hits = 0;

        for protosession in protosessions {
            let Some(first) = protosession.first() else {
                continue;
            };
            if let Some(other) = protosession
                .iter()
                .find(|h| h.property_id != first.property_id)
            {
                return Err(Error::internal(format!(
                    "proto-session contains mixed property IDs: found {:?} and {:?}",
                    first.property_id, other.property_id
                )));
            }
            hits += protosession.len();

            let session = Session::from_hits(protosession);
            let slot = *index
                .entry(session.property_id.clone())
                .or_insert_with(|| {
                    groups.push((session.property_id.clone(), Vec::new()));
                    groups.len() - 1
                });
            groups[slot].1.push(session);
        }
        if groups.is_empty() {
            return Ok(());
        }

        let sessions: usize = groups.iter().map(|(_, s)| s.len()).sum();
        let result = if self.max_concurrent_properties <= 1 {
            self.write_sequential(groups).await
        } else {
            self.write_concurrent(groups).await
        };

        match result {
            Ok(()) => {
                metrics().protosessions_closed.inc_by(sessions as u64);
                metrics().hits_closed.inc_by(hits as u64);
                metrics().close_latency_ms.observe_since(start);
                debug!(sessions, hits, "Closed protosessions");
                Ok(())
            }
            Err(e) => {
                metrics().close_failures.inc();
                Err(e)
            }
        }
    }

    async fn write_sequential(&self, groups: Vec<(String, Vec<Session>)>) -> Result<()> {
        for (property_id, sessions) in groups {
            write_group(&self.writer, self.failure_sleep, &property_id, sessions).await?;
        }
        Ok(())
    }

    async fn write_concurrent(&self, groups: Vec<(String, Vec<Session>)>) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_properties));
        let mut tasks = JoinSet::new();
        for (property_id, sessions) in groups {
            let writer = self.writer.clone();
            let permits = permits.clone();
            let failure_sleep = self.failure_sleep;
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| Error::Canceled)?;
                write_group(&writer, failure_sleep, &property_id, sessions).await
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| Error::internal(format!("Close task failed: {}", e)))
                .and_then(|result| result);
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn write_group(
    writer: &Arc<dyn SessionWriter>,
    failure_sleep: Duration,
    property_id: &str,
    sessions: Vec<Session>,
) -> Result<()> {
    if let Err(e) = writer.write(sessions).await {
        error!(
            property_id = %property_id,
            error = %e,
            sleep_ms = failure_sleep.as_millis() as u64,
            "Failed to write sessions, sleeping before returning"
        );
        tokio::time::sleep(failure_sleep).await;
        return Err(e);
    }
    Ok(())
}
