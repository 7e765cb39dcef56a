//! Conditional session splitter.

use std::sync::Arc;

use engine_core::{Result, Session, SplitCause, SESSION_SPLIT_CAUSE};
use telemetry::metrics;
use tracing::debug;

use crate::conditions::{SplitCondition, SplitContext};
use crate::modifier::SessionModifier;

/// Cuts a session wherever one of its conditions fires.
///
/// Conditions run in order for every event after the first; the first one
/// that fires decides the cause. The event that starts a new sub-session
/// primes every condition again and carries the cause in its metadata.
#[derive(Clone, Default)]
pub struct Splitter {
    conditions: Vec<Arc<dyn SplitCondition>>,
}

impl Splitter {
    pub fn new(conditions: Vec<Arc<dyn SplitCondition>>) -> Self {
        Self { conditions }
    }

    /// A splitter that never splits.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn prime(&self, ctx: &mut SplitContext<'_>) {
        let first = ctx.first_event;
        for condition in &self.conditions {
            condition.should_split(ctx, first);
        }
    }

    /// Indices where new sub-sessions start, with their causes.
    fn split_points(&self, session: &Session) -> Vec<(usize, SplitCause)> {
        let mut points = Vec::new();
        let Some(first) = session.events.first() else {
            return points;
        };
        let mut ctx = SplitContext::new(first);
        self.prime(&mut ctx);

        for (i, event) in session.events.iter().enumerate().skip(1) {
            let cause = self
                .conditions
                .iter()
                .find_map(|condition| condition.should_split(&mut ctx, event));
            match cause {
                Some(cause) => {
                    points.push((i, cause));
                    ctx = SplitContext::new(event);
                    self.prime(&mut ctx);
                }
                None => ctx.event_count += 1,
            }
        }
        points
    }
}

impl SessionModifier for Splitter {
    fn split(&self, mut session: Session) -> Result<Vec<Session>> {
        let points = self.split_points(&session);
        if points.is_empty() {
            return Ok(vec![session]);
        }

        let mut sessions = Vec::with_capacity(points.len() + 1);
        for &(index, cause) in points.iter().rev() {
            let mut tail = session.events.split_off(index);
            tail[0].metadata.insert(SESSION_SPLIT_CAUSE, cause);
            sessions.push(Session::new(tail));
        }
        sessions.push(Session::new(session.events));
        sessions.reverse();

        metrics().sessions_split.inc_by(points.len() as u64);
        debug!(
            property_id = %session.property_id,
            sessions = sessions.len(),
            "Session split"
        );
        Ok(sessions)
    }
}
