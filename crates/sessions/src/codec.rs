//! Spool payload encodings.

use engine_core::{Error, Result, Session};
use serde::{Deserialize, Serialize};

/// Turns a batch of sessions into an opaque payload and back.
pub trait SessionCodec: Send + Sync {
    fn encode(&self, sessions: &[Session]) -> Result<Vec<u8>>;

    fn decode(&self, payload: &[u8]) -> Result<Vec<Session>>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Bincode,
    Json,
}

impl Encoding {
    pub fn codec(self) -> Box<dyn SessionCodec> {
        match self {
            Self::Bincode => Box::new(BincodeCodec),
            Self::Json => Box::new(JsonCodec),
        }
    }
}

/// Compact binary encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl SessionCodec for BincodeCodec {
    fn encode(&self, sessions: &[Session]) -> Result<Vec<u8>> {
        bincode::serialize(sessions)
            .map_err(|e| Error::encoding(format!("Failed to encode sessions: {}", e)))
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<Session>> {
        bincode::deserialize(payload)
            .map_err(|e| Error::encoding(format!("Failed to decode sessions: {}", e)))
    }
}

/// Human-readable encoding, handy when inspecting spool files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn encode(&self, sessions: &[Session]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(sessions)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<Session>> {
        Ok(serde_json::from_slice(payload)?)
    }
}
