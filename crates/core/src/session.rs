//! Events and sessions as seen by the column pipeline.

use serde::{Deserialize, Serialize};

use crate::hit::Hit;
use crate::metadata::{Metadata, ORIGINAL_PAGE_LOCATION};
use crate::value::{Value, Values};

/// A hit enriched with column values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub hit: Hit,
    pub values: Values,
    pub metadata: Metadata,
    /// Reason the event was marked broken, if it was.
    pub broken: Option<String>,
}

impl Event {
    pub fn new(hit: Hit) -> Self {
        Self {
            hit,
            values: Values::new(),
            metadata: Metadata::new(),
            broken: None,
        }
    }

    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    pub fn mark_broken(&mut self, reason: impl Into<String>) {
        self.broken = Some(reason.into());
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// The value of `field` if it holds a string.
    pub fn str_value(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    /// The page URL before any parameter stripping.
    pub fn original_page_location(&self) -> &str {
        self.metadata
            .text(ORIGINAL_PAGE_LOCATION)
            .unwrap_or(&self.hit.page_url)
    }
}

/// A time-ordered group of events from one client in one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub property_id: String,
    pub events: Vec<Event>,
    pub values: Values,
    pub metadata: Metadata,
    pub broken: Option<String>,
}

impl Session {
    /// Wraps events; the property is taken from the first event.
    pub fn new(events: Vec<Event>) -> Self {
        let property_id = events
            .first()
            .map(|e| e.hit.property_id.clone())
            .unwrap_or_default();
        Self {
            property_id,
            events,
            values: Values::new(),
            metadata: Metadata::new(),
            broken: None,
        }
    }

    /// Builds a session from raw hits, ordered by server receive time.
    pub fn from_hits(mut hits: Vec<Hit>) -> Self {
        hits.sort_by_key(|h| h.server_received_time);
        Self::new(hits.into_iter().map(Event::new).collect())
    }

    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    pub fn mark_broken(&mut self, reason: impl Into<String>) {
        self.broken = Some(reason.into());
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first_event(&self) -> Option<&Event> {
        self.events.first()
    }

    pub fn last_event(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }
}
