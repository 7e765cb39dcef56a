//! Session columns.

use std::sync::Arc;

use attribution::Attributor;
use engine_core::{Error, Session, SourceMediumTerm, Value, SESSION_SOURCE_MEDIUM_TERM};
use schema::{DependsOnEntry, Interface, SessionColumn};

use crate::cast;
use crate::generic::SimpleSessionColumn;
use crate::interfaces::{core, ext};

pub fn session_id() -> Arc<dyn SessionColumn> {
    let event_id = core().event_id.field.name.clone();
    SimpleSessionColumn::new(&core().session_id, move |session| {
        let id = session
            .first_event()
            .and_then(|e| e.value(&event_id))
            .cloned()
            .ok_or_else(|| Error::broken_session("session has no first event id"))?;
        Ok(id)
    })
    .with_cast(cast::str_err_if_empty(&core().session_id.id))
    .with_depends_on([DependsOnEntry::on(&core().event_id)])
    .with_docs("Session ID", "Identifier of the session, the ID of its first event.")
    .into_arc()
}

fn receive_time_column(interface: &Interface, last: bool) -> Arc<dyn SessionColumn> {
    SimpleSessionColumn::new(interface, move |session| {
        let event = if last {
            session.last_event()
        } else {
            session.first_event()
        };
        event
            .map(|e| Value::Int(e.hit.server_received_time.timestamp()))
            .ok_or_else(|| Error::broken_session("session has no events"))
    })
    .into_arc()
}

pub fn first_event_time() -> Arc<dyn SessionColumn> {
    receive_time_column(&core().session_first_event_time, false)
}

pub fn last_event_time() -> Arc<dyn SessionColumn> {
    receive_time_column(&core().session_last_event_time, true)
}

/// Seconds between the first and last event.
pub fn duration() -> Arc<dyn SessionColumn> {
    let first = core().session_first_event_time.field.name.clone();
    let last = core().session_last_event_time.field.name.clone();
    SimpleSessionColumn::new(&core().session_duration, move |session| {
        let first = session.values.get(&first).and_then(Value::as_i64);
        let last = session.values.get(&last).and_then(Value::as_i64);
        match (first, last) {
            (Some(first), Some(last)) if last >= first => Ok(Value::Int(last - first)),
            (Some(first), Some(last)) => Err(Error::broken_session(format!(
                "negative session duration: {} -> {}",
                first, last
            ))),
            _ => Err(Error::broken_session("session time bounds are missing")),
        }
    })
    .with_depends_on([
        DependsOnEntry::on(&core().session_first_event_time),
        DependsOnEntry::on(&core().session_last_event_time),
    ])
    .with_docs("Session Duration", "Seconds between the first and the last event.")
    .into_arc()
}

pub fn total_events() -> Arc<dyn SessionColumn> {
    SimpleSessionColumn::new(&core().session_total_events, |session| {
        Ok(Value::Int(session.len() as i64))
    })
    .into_arc()
}

pub fn referrer() -> Arc<dyn SessionColumn> {
    let page_referrer = core().event_page_referrer.field.name.clone();
    SimpleSessionColumn::new(&ext().session_referrer, move |session| {
        Ok(session
            .first_event()
            .and_then(|e| e.value(&page_referrer))
            .cloned()
            .unwrap_or(Value::Null))
    })
    .with_cast(cast::str_nil_if_error_or_empty(cast::to_string(
        &ext().session_referrer.id,
    )))
    .with_depends_on([DependsOnEntry::on(&core().event_page_referrer)])
    .into_arc()
}

pub fn split_cause() -> Arc<dyn SessionColumn> {
    SimpleSessionColumn::new(&ext().session_split_cause, |session| {
        Ok(Value::from(
            session
                .first_event()
                .and_then(|e| e.metadata.split_cause())
                .map(|cause| cause.as_str()),
        ))
    })
    .with_docs(
        "Session Split Cause",
        "Why the session was cut from its predecessor, null for unsplit sessions.",
    )
    .into_arc()
}

/// Attributes the session from its first event and keeps the result in
/// that event's metadata for the medium and term columns.
pub fn source(attributor: Arc<Attributor>) -> Arc<dyn SessionColumn> {
    SimpleSessionColumn::new(&ext().session_source, move |session| {
        let first = match session.events.first_mut() {
            Some(event) => event,
            None => return Ok(Value::Null),
        };
        let smt = attributor.attribute(first);
        let source = smt.source.clone();
        first.metadata.insert(SESSION_SOURCE_MEDIUM_TERM, smt);
        Ok(Value::from(source))
    })
    .with_depends_on([DependsOnEntry::on(&core().event_page_location)])
    .with_docs("Session Source", "Where the session came from, e.g. 'google'.")
    .into_arc()
}

fn read_back(
    interface: &Interface,
    display_name: &str,
    pick: fn(&SourceMediumTerm) -> &str,
) -> Arc<dyn SessionColumn> {
    SimpleSessionColumn::new(interface, move |session: &mut Session| {
        Ok(Value::from(
            session
                .first_event()
                .and_then(|e| e.metadata.source_medium_term())
                .map(|smt| pick(smt).to_string()),
        ))
    })
    .with_depends_on([DependsOnEntry::on(&ext().session_source)])
    .with_docs(display_name, "Derived by the session source attribution.")
    .into_arc()
}

pub fn medium() -> Arc<dyn SessionColumn> {
    read_back(&ext().session_medium, "Session Medium", |smt| smt.medium.as_str())
}

pub fn term() -> Arc<dyn SessionColumn> {
    read_back(&ext().session_term, "Session Term", |smt| smt.term.as_str())
}
