//! Session-scoped event columns: values of one event that need the whole
//! session to compute.

use std::sync::Arc;

use engine_core::{Value, TRAFFIC_FILTER_NAME};
use schema::{DependsOnEntry, SessionScopedEventColumn};

use crate::generic::SimpleSessionScopedEventColumn;
use crate::interfaces::{core, ext};

/// 1-based position of the event in its session.
pub fn hit_number() -> Arc<dyn SessionScopedEventColumn> {
    SimpleSessionScopedEventColumn::new(&ext().sse_hit_number, |_, index| {
        Ok(Value::Int(index as i64 + 1))
    })
    .with_docs("Session Hit Number", "Position of the event within its session, starting at 1.")
    .into_arc()
}

/// Number of distinct consecutive page locations seen up to this event.
///
/// Events are written in order, so the count resumes from the closest
/// earlier event that already carries one.
pub fn page_number() -> Arc<dyn SessionScopedEventColumn> {
    let page_location = core().event_page_location.field.name.clone();
    let page_number = ext().sse_page_number.field.name.clone();
    SimpleSessionScopedEventColumn::new(&ext().sse_page_number, move |session, index| {
        let events = &session.events;
        if index >= events.len() {
            return Ok(Value::Null);
        }
        let location = |i: usize| events[i].str_value(&page_location).unwrap_or("");

        let (mut pages, start) = (0..index)
            .rev()
            .find_map(|i| {
                events[i]
                    .value(&page_number)
                    .and_then(Value::as_i64)
                    .map(|n| (n, i + 1))
            })
            .unwrap_or((0, 0));
        for i in start..=index {
            if i == 0 || location(i) != location(i - 1) {
                pages += 1;
            }
        }
        Ok(Value::Int(pages))
    })
    .with_depends_on([DependsOnEntry::on(&core().event_page_location)])
    .with_docs(
        "Session Page Number",
        "Page view counter within the session; consecutive events on the same page share a number.",
    )
    .into_arc()
}

pub fn is_entry() -> Arc<dyn SessionScopedEventColumn> {
    SimpleSessionScopedEventColumn::new(&ext().sse_is_entry, |_, index| {
        Ok(Value::Bool(index == 0))
    })
    .into_arc()
}

/// Name of the testing-mode filter that matched the event, if any.
pub fn traffic_filter_name() -> Arc<dyn SessionScopedEventColumn> {
    SimpleSessionScopedEventColumn::new(&ext().sse_traffic_filter_name, |session, index| {
        Ok(Value::from(
            session
                .events
                .get(index)
                .and_then(|e| e.metadata.text(TRAFFIC_FILTER_NAME))
                .map(str::to_string),
        ))
    })
    .into_arc()
}
