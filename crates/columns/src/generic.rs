//! Generic column builders.
//!
//! A simple column is an interface plus a value getter. The getter's output
//! goes through a cast before it is stored. Cast failures of optional
//! columns store null; required columns turn them into broken-event or
//! broken-session errors.

use std::sync::Arc;

use engine_core::{Error, Event, Result, Session, Value};
use schema::{
    Column, DependsOnEntry, Documentation, EventColumn, Interface, SessionColumn,
    SessionScopedEventColumn,
};
use tracing::debug;
use url::Url;

use crate::cast::{self, Cast};
use crate::interfaces::core;

type EventGetter = Arc<dyn Fn(&mut Event) -> Result<Value> + Send + Sync>;
type SessionGetter = Arc<dyn Fn(&mut Session) -> Result<Value> + Send + Sync>;
type ScopedGetter = Arc<dyn Fn(&mut Session, usize) -> Result<Value> + Send + Sync>;

struct ColumnDef {
    interface: Interface,
    depends_on: Vec<DependsOnEntry>,
    display_name: String,
    description: String,
    required: bool,
    cast: Cast,
}

impl ColumnDef {
    fn new(interface: &Interface) -> Self {
        Self {
            interface: interface.clone(),
            depends_on: Vec::new(),
            display_name: interface.field.name.clone(),
            description: String::new(),
            required: !interface.field.nullable,
            cast: cast::identity(),
        }
    }

    fn apply_cast(&self, raw: Value, broken: fn(String) -> Error) -> Result<Value> {
        match (self.cast)(raw) {
            Ok(value) => Ok(value),
            Err(e) if self.required => Err(broken(format!("{}: {}", self.interface.id, e))),
            Err(e) => {
                debug!(column = %self.interface.id, error = %e, "Cast failed, storing null");
                Ok(Value::Null)
            }
        }
    }
}

macro_rules! simple_column {
    ($name:ident) => {
        impl Column for $name {
            fn implements(&self) -> &Interface {
                &self.def.interface
            }

            fn depends_on(&self) -> &[DependsOnEntry] {
                &self.def.depends_on
            }

            fn docs(&self) -> Documentation {
                Documentation::new(
                    &self.def.interface,
                    &self.def.display_name,
                    &self.def.description,
                )
            }
        }

        impl $name {
            pub fn with_depends_on(mut self, entries: impl IntoIterator<Item = DependsOnEntry>) -> Self {
                self.def.depends_on.extend(entries);
                self
            }

            /// Required columns are stored as non-nullable fields.
            pub fn with_required(mut self, required: bool) -> Self {
                self.def.required = required;
                self.def.interface.field.nullable = !required;
                self
            }

            pub fn with_cast(mut self, cast: Cast) -> Self {
                self.def.cast = cast;
                self
            }

            pub fn with_docs(mut self, display_name: &str, description: &str) -> Self {
                self.def.display_name = display_name.to_string();
                self.def.description = description.to_string();
                self
            }
        }
    };
}

pub struct SimpleEventColumn {
    def: ColumnDef,
    get: EventGetter,
}

simple_column!(SimpleEventColumn);

impl SimpleEventColumn {
    pub fn new<F>(interface: &Interface, get: F) -> Self
    where
        F: Fn(&mut Event) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            def: ColumnDef::new(interface),
            get: Arc::new(get),
        }
    }

    pub fn into_arc(self) -> Arc<dyn EventColumn> {
        Arc::new(self)
    }
}

impl EventColumn for SimpleEventColumn {
    fn write(&self, event: &mut Event) -> Result<()> {
        let raw = (self.get)(event)?;
        let value = self.def.apply_cast(raw, |m| Error::broken_event(m))?;
        event.set_value(self.def.interface.field.name.clone(), value);
        Ok(())
    }
}

pub struct SimpleSessionColumn {
    def: ColumnDef,
    get: SessionGetter,
}

simple_column!(SimpleSessionColumn);

impl SimpleSessionColumn {
    pub fn new<F>(interface: &Interface, get: F) -> Self
    where
        F: Fn(&mut Session) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            def: ColumnDef::new(interface),
            get: Arc::new(get),
        }
    }

    pub fn into_arc(self) -> Arc<dyn SessionColumn> {
        Arc::new(self)
    }
}

impl SessionColumn for SimpleSessionColumn {
    fn write(&self, session: &mut Session) -> Result<()> {
        let raw = (self.get)(session)?;
        let value = self.def.apply_cast(raw, |m| Error::broken_session(m))?;
        session.set_value(self.def.interface.field.name.clone(), value);
        Ok(())
    }
}

pub struct SimpleSessionScopedEventColumn {
    def: ColumnDef,
    get: ScopedGetter,
}

simple_column!(SimpleSessionScopedEventColumn);

impl SimpleSessionScopedEventColumn {
    pub fn new<F>(interface: &Interface, get: F) -> Self
    where
        F: Fn(&mut Session, usize) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            def: ColumnDef::new(interface),
            get: Arc::new(get),
        }
    }

    pub fn into_arc(self) -> Arc<dyn SessionScopedEventColumn> {
        Arc::new(self)
    }
}

impl SessionScopedEventColumn for SimpleSessionScopedEventColumn {
    fn write(&self, session: &mut Session, index: usize) -> Result<()> {
        let raw = (self.get)(session, index)?;
        let value = self.def.apply_cast(raw, |m| Error::broken_event(m))?;
        match session.events.get_mut(index) {
            Some(event) => {
                event.set_value(self.def.interface.field.name.clone(), value);
                Ok(())
            }
            None => Err(Error::internal(format!(
                "event index {} out of range for session of {} events",
                index,
                session.len()
            ))),
        }
    }
}

/// Value of a query parameter of the raw hit.
pub fn from_query_param(interface: &Interface, param: &str) -> SimpleEventColumn {
    let param = param.to_string();
    SimpleEventColumn::new(interface, move |event| {
        Ok(Value::from(event.hit.query_params.get(&param)))
    })
}

/// Value of a query parameter of the page URL, read before parameter
/// stripping.
pub fn from_page_url_param(interface: &Interface, param: &str) -> SimpleEventColumn {
    let param = param.to_string();
    SimpleEventColumn::new(interface, move |event| {
        let url = match Url::parse(event.original_page_location()) {
            Ok(url) => url,
            Err(_) => return Ok(Value::Null),
        };
        Ok(Value::from(
            url.query_pairs()
                .find(|(k, _)| *k == param)
                .map(|(_, v)| v.into_owned()),
        ))
    })
    .with_depends_on([DependsOnEntry::on(&core().event_page_location)])
}

/// Derives a value from the stored page location.
pub fn from_page_url<F>(interface: &Interface, extract: F) -> SimpleEventColumn
where
    F: Fn(&Url) -> Value + Send + Sync + 'static,
{
    let page_location = core().event_page_location.field.name.clone();
    SimpleEventColumn::new(interface, move |event| {
        let url = event
            .str_value(&page_location)
            .and_then(|raw| Url::parse(raw).ok());
        Ok(url.map(|u| extract(&u)).unwrap_or(Value::Null))
    })
    .with_required(false)
    .with_depends_on([DependsOnEntry::on(&core().event_page_location)])
}

/// Reserves the schema slot without ever writing a value.
pub fn always_nil(interface: &Interface) -> SimpleEventColumn {
    SimpleEventColumn::new(interface, |_| Ok(Value::Null)).with_required(false)
}

/// `field` of the `n`th event matching `matches`; negative `n` counts from
/// the end.
pub fn nth_event_matching<P>(
    interface: &Interface,
    n: isize,
    field: &str,
    matches: P,
) -> SimpleSessionColumn
where
    P: Fn(&Event) -> bool + Send + Sync + 'static,
{
    let field = field.to_string();
    SimpleSessionColumn::new(interface, move |session| {
        let matching: Vec<&Event> = session.events.iter().filter(|e| matches(e)).collect();
        let index = if n < 0 {
            matching.len() as isize + n
        } else {
            n
        };
        if index < 0 {
            return Ok(Value::Null);
        }
        Ok(matching
            .get(index as usize)
            .and_then(|e| e.value(&field))
            .cloned()
            .unwrap_or(Value::Null))
    })
}

/// Number of events whose name is one of `names`.
pub fn total_events_of_names(interface: &Interface, names: &[&str]) -> SimpleSessionColumn {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let event_name = core().event_name.field.name.clone();
    SimpleSessionColumn::new(interface, move |session| {
        let total = session
            .events
            .iter()
            .filter_map(|e| e.str_value(&event_name))
            .filter(|name| names.iter().any(|n| n == name))
            .count();
        Ok(Value::Int(total as i64))
    })
    .with_depends_on([DependsOnEntry::on(&core().event_name)])
}
