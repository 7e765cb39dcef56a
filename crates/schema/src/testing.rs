//! Minimal columns for exercising the framework.

use std::sync::Arc;

use engine_core::{DataType, Event, Field, Result, Session, Value};

use crate::column::{
    Column, Columns, DependsOnEntry, Documentation, EventColumn, Interface, SessionColumn,
    SessionScopedEventColumn,
};

pub fn iface(id: &str) -> Interface {
    Interface::new(id, "1.0.0", Field::nullable(id, DataType::String))
}

pub struct TestEventColumn {
    interface: Interface,
    deps: Vec<DependsOnEntry>,
}

impl TestEventColumn {
    pub fn new(id: &str) -> Self {
        Self {
            interface: iface(id),
            deps: Vec::new(),
        }
    }

    pub fn with_dep(mut self, dep: DependsOnEntry) -> Self {
        self.deps.push(dep);
        self
    }

    pub fn into_arc(self) -> Arc<dyn EventColumn> {
        Arc::new(self)
    }
}

impl Column for TestEventColumn {
    fn implements(&self) -> &Interface {
        &self.interface
    }

    fn depends_on(&self) -> &[DependsOnEntry] {
        &self.deps
    }

    fn docs(&self) -> Documentation {
        Documentation::new(&self.interface, &self.interface.id, "")
    }
}

impl EventColumn for TestEventColumn {
    fn write(&self, event: &mut Event) -> Result<()> {
        event.set_value(self.interface.field.name.clone(), event.hit.id.clone());
        Ok(())
    }
}

pub struct TestSessionColumn {
    interface: Interface,
    deps: Vec<DependsOnEntry>,
}

impl Column for TestSessionColumn {
    fn implements(&self) -> &Interface {
        &self.interface
    }

    fn depends_on(&self) -> &[DependsOnEntry] {
        &self.deps
    }

    fn docs(&self) -> Documentation {
        Documentation::new(&self.interface, &self.interface.id, "")
    }
}

impl SessionColumn for TestSessionColumn {
    fn write(&self, session: &mut Session) -> Result<()> {
        session.set_value(self.interface.field.name.clone(), session.events.len() as i64);
        Ok(())
    }
}

pub struct TestSseColumn {
    interface: Interface,
    deps: Vec<DependsOnEntry>,
}

impl Column for TestSseColumn {
    fn implements(&self) -> &Interface {
        &self.interface
    }

    fn depends_on(&self) -> &[DependsOnEntry] {
        &self.deps
    }

    fn docs(&self) -> Documentation {
        Documentation::new(&self.interface, &self.interface.id, "")
    }
}

impl SessionScopedEventColumn for TestSseColumn {
    fn write(&self, session: &mut Session, index: usize) -> Result<()> {
        session.events[index].set_value(self.interface.field.name.clone(), Value::from(index as i64));
        Ok(())
    }
}

fn deps(ids: &[&str]) -> Vec<DependsOnEntry> {
    ids.iter().map(|d| DependsOnEntry::new(*d)).collect()
}

pub fn event_col(id: &str, depends: &[&str]) -> Arc<dyn EventColumn> {
    Arc::new(TestEventColumn {
        interface: iface(id),
        deps: deps(depends),
    })
}

pub fn event_col_v(id: &str, version: &str) -> Arc<dyn EventColumn> {
    Arc::new(TestEventColumn {
        interface: Interface::new(id, version, Field::nullable(id, DataType::String)),
        deps: Vec::new(),
    })
}

pub fn session_col(id: &str, depends: &[&str]) -> Arc<dyn SessionColumn> {
    Arc::new(TestSessionColumn {
        interface: iface(id),
        deps: deps(depends),
    })
}

pub fn sse_col(id: &str, depends: &[&str]) -> Arc<dyn SessionScopedEventColumn> {
    Arc::new(TestSseColumn {
        interface: iface(id),
        deps: deps(depends),
    })
}

pub fn columns_of(event: Vec<Arc<dyn EventColumn>>) -> Columns {
    Columns::new(Vec::new(), event, Vec::new())
}
