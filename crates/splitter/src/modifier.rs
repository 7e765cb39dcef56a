//! The session modifier contract and its sequential composition.

use std::sync::Arc;

use engine_core::{Result, Session};

/// Turns one session into zero or more sessions.
pub trait SessionModifier: Send + Sync {
    fn split(&self, session: Session) -> Result<Vec<Session>>;
}

/// Passes sessions through untouched.
pub struct NoopModifier;

impl SessionModifier for NoopModifier {
    fn split(&self, session: Session) -> Result<Vec<Session>> {
        Ok(vec![session])
    }
}

/// Feeds the output of each modifier into the next.
#[derive(Clone, Default)]
pub struct ModifierChain {
    modifiers: Vec<Arc<dyn SessionModifier>>,
}

impl ModifierChain {
    pub fn new(modifiers: Vec<Arc<dyn SessionModifier>>) -> Self {
        Self { modifiers }
    }

    pub fn push(&mut self, modifier: Arc<dyn SessionModifier>) {
        self.modifiers.push(modifier);
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

impl SessionModifier for ModifierChain {
    fn split(&self, session: Session) -> Result<Vec<Session>> {
        let mut sessions = vec![session];
        for modifier in &self.modifiers {
            let mut next = Vec::with_capacity(sessions.len());
            for session in sessions {
                next.extend(modifier.split(session)?);
            }
            sessions = next;
        }
        Ok(sessions)
    }
}
