//! Column contracts.
//!
//! A column implements one interface (a versioned, named field) and may
//! depend on other interfaces being written first. The three flavors only
//! differ in what they get to write into.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use engine_core::{DataType, Event, Field, Result, Session};
use serde::{Deserialize, Serialize};

/// Semantic version of an interface, `major[.minor[.patch]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Version {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric components with missing parts padded by zero.
    pub fn components(&self) -> Option<[u64; 3]> {
        let mut out = [0u64; 3];
        let trimmed = self.0.trim().trim_start_matches('v');
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        for (slot, part) in out.iter_mut().zip(parts) {
            *slot = part.parse().ok()?;
        }
        Some(out)
    }

    /// Compares two versions; `None` when either does not parse.
    pub fn compare(&self, other: &Version) -> Option<Ordering> {
        Some(self.components()?.cmp(&other.components()?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

/// A virtual column: stable id, version and the field it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub id: String,
    pub version: Version,
    pub field: Field,
}

impl Interface {
    pub fn new(id: impl Into<String>, version: impl Into<Version>, field: Field) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            field,
        }
    }
}

/// Requirement that another interface is written before this column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependsOnEntry {
    pub interface: String,
    pub greater_or_equal_to: Option<Version>,
    pub less_than: Option<Version>,
}

impl DependsOnEntry {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            greater_or_equal_to: None,
            less_than: None,
        }
    }

    /// Depends on `interface` at its current version or newer.
    pub fn on(interface: &Interface) -> Self {
        Self::new(interface.id.clone()).at_least(interface.version.clone())
    }

    pub fn at_least(mut self, version: impl Into<Version>) -> Self {
        self.greater_or_equal_to = Some(version.into());
        self
    }

    pub fn below(mut self, version: impl Into<Version>) -> Self {
        self.less_than = Some(version.into());
        self
    }

    /// Human readable version range, empty when unbounded.
    pub fn range(&self) -> String {
        match (&self.greater_or_equal_to, &self.less_than) {
            (Some(lo), Some(hi)) => format!(">={}, <{}", lo, hi),
            (Some(lo), None) => format!(">={}", lo),
            (None, Some(hi)) => format!("<{}", hi),
            (None, None) => String::new(),
        }
    }
}

/// Column documentation as exposed to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub column_name: String,
    pub display_name: String,
    pub description: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub interface_id: String,
}

impl Documentation {
    pub fn new(interface: &Interface, display_name: &str, description: &str) -> Self {
        Self {
            column_name: interface.field.name.clone(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            data_type: interface.field.data_type,
            nullable: interface.field.nullable,
            interface_id: interface.id.clone(),
        }
    }
}

pub trait Column: Send + Sync {
    fn implements(&self) -> &Interface;

    fn depends_on(&self) -> &[DependsOnEntry];

    fn docs(&self) -> Documentation;

    fn id(&self) -> &str {
        &self.implements().id
    }

    fn field(&self) -> &Field {
        &self.implements().field
    }
}

/// Writes one value into the event's values.
pub trait EventColumn: Column {
    fn write(&self, event: &mut Event) -> Result<()>;
}

/// Writes one value into the session's values.
pub trait SessionColumn: Column {
    fn write(&self, session: &mut Session) -> Result<()>;
}

/// Writes into `session.events[index]` with the whole session readable.
pub trait SessionScopedEventColumn: Column {
    fn write(&self, session: &mut Session, index: usize) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Session,
    Event,
    SessionScopedEvent,
}

/// Kind-independent view of one column in a [`Columns`] set.
#[derive(Clone, Copy)]
pub struct ColumnInfo<'a> {
    pub kind: ColumnKind,
    pub index: usize,
    pub interface: &'a Interface,
    pub depends_on: &'a [DependsOnEntry],
}

/// The column sources for one property.
#[derive(Clone, Default)]
pub struct Columns {
    pub session: Vec<Arc<dyn SessionColumn>>,
    pub event: Vec<Arc<dyn EventColumn>>,
    pub session_scoped_event: Vec<Arc<dyn SessionScopedEventColumn>>,
}

impl Columns {
    pub fn new(
        session: Vec<Arc<dyn SessionColumn>>,
        event: Vec<Arc<dyn EventColumn>>,
        session_scoped_event: Vec<Arc<dyn SessionScopedEventColumn>>,
    ) -> Self {
        Self {
            session,
            event,
            session_scoped_event,
        }
    }

    pub fn len(&self) -> usize {
        self.session.len() + self.event.len() + self.session_scoped_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends every column of `other`, keeping per-kind order.
    pub fn extend(&mut self, other: Columns) {
        self.session.extend(other.session);
        self.event.extend(other.event);
        self.session_scoped_event.extend(other.session_scoped_event);
    }

    /// All columns as session, event, then session-scoped-event.
    pub fn infos(&self) -> Vec<ColumnInfo<'_>> {
        let session = self.session.iter().enumerate().map(|(index, c)| ColumnInfo {
            kind: ColumnKind::Session,
            index,
            interface: c.implements(),
            depends_on: c.depends_on(),
        });
        let event = self.event.iter().enumerate().map(|(index, c)| ColumnInfo {
            kind: ColumnKind::Event,
            index,
            interface: c.implements(),
            depends_on: c.depends_on(),
        });
        let sse = self
            .session_scoped_event
            .iter()
            .enumerate()
            .map(|(index, c)| ColumnInfo {
                kind: ColumnKind::SessionScopedEvent,
                index,
                interface: c.implements(),
                depends_on: c.depends_on(),
            });
        session.chain(event).chain(sse).collect()
    }

    /// Documentation of every column, in the same order as [`Columns::infos`].
    pub fn docs(&self) -> Vec<Documentation> {
        self.session
            .iter()
            .map(|c| c.docs())
            .chain(self.event.iter().map(|c| c.docs()))
            .chain(self.session_scoped_event.iter().map(|c| c.docs()))
            .collect()
    }
}

impl fmt::Debug for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Columns")
            .field("session", &self.session.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field("event", &self.event.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field(
                "session_scoped_event",
                &self.session_scoped_event.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
