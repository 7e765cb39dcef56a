//! The session sink contract.

use async_trait::async_trait;
use engine_core::{Result, Session};
use tracing::debug;

/// Accepts closed sessions. Implementations may require every session in
/// one call to belong to the same property.
#[async_trait]
pub trait SessionWriter: Send + Sync {
    async fn write(&self, sessions: Vec<Session>) -> Result<()>;
}

/// Accepts and discards sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWriter;

#[async_trait]
impl SessionWriter for NoopWriter {
    async fn write(&self, sessions: Vec<Session>) -> Result<()> {
        debug!(sessions = sessions.len(), "Discarding sessions");
        Ok(())
    }
}
