//! Stable display and storage order of interfaces.

use std::collections::HashMap;
use std::sync::Arc;

use crate::column::{Column, Columns, Interface};

/// Position of each interface in its canonical declaration order.
///
/// The first registration of an id wins; unknown ids sort last.
#[derive(Debug, Clone, Default)]
pub struct InterfaceOrdering {
    order: HashMap<String, usize>,
}

impl InterfaceOrdering {
    pub fn new<'a>(groups: impl IntoIterator<Item = &'a [Interface]>) -> Self {
        let mut ordering = Self::default();
        for group in groups {
            ordering.register(group);
        }
        ordering
    }

    pub fn register(&mut self, interfaces: &[Interface]) {
        for iface in interfaces {
            let next = self.order.len();
            self.order.entry(iface.id.clone()).or_insert(next);
        }
    }

    pub fn position(&self, id: &str) -> usize {
        self.order.get(id).copied().unwrap_or(usize::MAX)
    }

    /// Stable sort of one column list by declaration position.
    pub fn sort<T: Column + ?Sized>(&self, columns: &[Arc<T>]) -> Vec<Arc<T>> {
        let mut sorted = columns.to_vec();
        sorted.sort_by_key(|c| self.position(c.id()));
        sorted
    }

    /// Copy of `columns` with every kind sorted by declaration position.
    pub fn sorted(&self, columns: &Columns) -> Columns {
        Columns {
            session: self.sort(&columns.session),
            event: self.sort(&columns.event),
            session_scoped_event: self.sort(&columns.session_scoped_event),
        }
    }
}
