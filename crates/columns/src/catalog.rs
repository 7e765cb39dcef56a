//! The default column set.

use std::sync::Arc;

use attribution::Attributor;
use engine_core::Result;
use schema::{
    assert_all_dependencies_fulfilled_with_core_columns, sort_all_columns, Columns,
    EventColumn, InterfaceOrdering, SessionColumn, SessionScopedEventColumn,
};
use tracing::debug;

use crate::blacklist::UrlParamsBlacklist;
use crate::device::DeviceDetector;
use crate::interfaces::{core, ext};
use crate::{event, session, sse};

/// Process-wide handles shared by the default columns.
#[derive(Clone)]
pub struct ColumnDeps {
    pub blacklist: Arc<UrlParamsBlacklist>,
    pub devices: Arc<DeviceDetector>,
    pub attributor: Arc<Attributor>,
}

impl ColumnDeps {
    pub fn new() -> Result<Self> {
        Ok(Self {
            blacklist: Arc::new(UrlParamsBlacklist::new()),
            devices: Arc::new(DeviceDetector::new()),
            attributor: Arc::new(Attributor::with_defaults()?),
        })
    }
}

pub fn event_columns(deps: &ColumnDeps) -> Vec<Arc<dyn EventColumn>> {
    let mut columns = vec![
        event::event_id(),
        event::event_name(),
        event::timestamp(),
        event::date(),
        event::page_title(),
        event::page_referrer(),
        event::page_location(deps.blacklist.clone()),
        event::page_path(),
        event::page_hostname(),
        event::client_id(),
        event::user_id(),
        event::property_id(),
        event::tracking_protocol(),
        event::platform(),
        event::ip_address(),
        event::utm_source_medium(),
    ];
    columns.extend(event::tracked_params(&deps.blacklist));
    columns.extend(event::device_columns(&deps.devices));
    columns.extend(event::geo_columns());
    columns
}

pub fn session_columns(deps: &ColumnDeps) -> Vec<Arc<dyn SessionColumn>> {
    vec![
        session::session_id(),
        session::first_event_time(),
        session::last_event_time(),
        session::duration(),
        session::total_events(),
        session::referrer(),
        session::split_cause(),
        session::source(deps.attributor.clone()),
        session::medium(),
        session::term(),
    ]
}

pub fn session_scoped_event_columns() -> Vec<Arc<dyn SessionScopedEventColumn>> {
    vec![
        sse::hit_number(),
        sse::page_number(),
        sse::is_entry(),
        sse::traffic_filter_name(),
    ]
}

/// Every default column, validated and in dependency order.
pub fn default_columns(deps: &ColumnDeps) -> Result<Columns> {
    let columns = Columns::new(
        session_columns(deps),
        event_columns(deps),
        session_scoped_event_columns(),
    );
    assert_all_dependencies_fulfilled_with_core_columns(&columns, &core().all())?;
    let sorted = sort_all_columns(&columns)?;
    debug!(
        columns = sorted.len(),
        stripped_params = deps.blacklist.params().len(),
        "Default columns assembled"
    );
    Ok(sorted)
}

/// Storage order: core interfaces first, then the extended set.
pub fn default_ordering() -> InterfaceOrdering {
    let core = core().all();
    let ext = ext().all();
    InterfaceOrdering::new([core.as_slice(), ext.as_slice()])
}
