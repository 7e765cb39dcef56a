//! Event columns.

use std::sync::Arc;

use engine_core::{DeviceInfo, Error, Value, ORIGINAL_PAGE_LOCATION};
use schema::{DependsOnEntry, EventColumn, Interface};

use crate::blacklist::UrlParamsBlacklist;
use crate::cast;
use crate::device::DeviceDetector;
use crate::generic::{always_nil, from_page_url, from_page_url_param, SimpleEventColumn};
use crate::interfaces::{core, ext};

pub fn event_id() -> Arc<dyn EventColumn> {
    let id = &core().event_id;
    SimpleEventColumn::new(id, |event| Ok(Value::from(event.hit.id.as_str())))
        .with_cast(cast::str_err_if_empty(&id.id))
        .with_docs("Event ID", "Unique identifier of the event.")
        .into_arc()
}

pub fn event_name() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_name, |event| {
        if event.hit.event_name.is_empty() {
            return Err(Error::broken_event("event name is empty"));
        }
        Ok(Value::from(event.hit.event_name.as_str()))
    })
    .with_docs(
        "Event Name",
        "The action the user performed, e.g. 'page_view' or 'purchase'.",
    )
    .into_arc()
}

pub fn timestamp() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_timestamp, |event| {
        Ok(Value::Int(event.hit.timestamp.timestamp()))
    })
    .into_arc()
}

pub fn date() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_date, |event| {
        Ok(Value::from(event.hit.timestamp.format("%Y-%m-%d").to_string()))
    })
    .into_arc()
}

pub fn page_title() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_page_title, |event| {
        Ok(Value::from(event.hit.query_params.get("dt").unwrap_or("")))
    })
    .with_docs("Page Title", "Title of the page where the event occurred.")
    .into_arc()
}

/// The `dr` parameter when the tracker sent one, the `Referer` header
/// otherwise.
pub fn page_referrer() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_page_referrer, |event| {
        let referrer = event
            .hit
            .query_params
            .get("dr")
            .unwrap_or_else(|| event.hit.referer());
        Ok(Value::from(referrer))
    })
    .with_docs(
        "Page Referrer",
        "URL of the page that referred the user, empty for direct traffic.",
    )
    .into_arc()
}

/// Page URL with blacklisted parameters removed.
pub fn page_location(blacklist: Arc<UrlParamsBlacklist>) -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_page_location, move |event| {
        if event.hit.page_url.is_empty() {
            return Ok(Value::from(""));
        }
        let original = event.hit.page_url.clone();
        let cleaned = blacklist.strip(&original);
        event.metadata.insert(ORIGINAL_PAGE_LOCATION, original);
        Ok(Value::from(cleaned))
    })
    .with_docs(
        "Page Location",
        "Full URL of the page. Tracking parameters are removed once extracted into their own columns.",
    )
    .into_arc()
}

pub fn page_path() -> Arc<dyn EventColumn> {
    from_page_url(&core().event_page_path, |url| Value::from(url.path()))
        .with_docs("Page Path", "Path of the page, e.g. '/products/shoes'.")
        .into_arc()
}

pub fn page_hostname() -> Arc<dyn EventColumn> {
    from_page_url(&core().event_page_hostname, |url| {
        Value::from(url.host_str().unwrap_or(""))
    })
    .with_docs("Page Hostname", "Hostname of the page, e.g. 'shop.example.com'.")
    .into_arc()
}

pub fn client_id() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_client_id, |event| {
        Ok(Value::from(event.hit.client_id.as_str()))
    })
    .into_arc()
}

pub fn user_id() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_user_id, |event| {
        Ok(Value::from(event.hit.user_id.clone()))
    })
    .with_cast(cast::str_nil_if_error_or_empty(cast::to_string(&core().event_user_id.id)))
    .into_arc()
}

pub fn property_id() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_property_id, |event| {
        Ok(Value::from(event.hit.property_id.as_str()))
    })
    .with_docs(
        "Property ID",
        "Identifier of the tracked property that sent the event.",
    )
    .into_arc()
}

pub fn tracking_protocol() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_tracking_protocol, |event| {
        Ok(Value::from(event.hit.tracking_protocol.as_str()))
    })
    .into_arc()
}

pub fn platform() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_platform, |event| {
        Ok(Value::from(event.hit.platform.as_str()))
    })
    .with_docs("Platform", "Where the event originated: 'web', 'mobile' or 'server'.")
    .into_arc()
}

pub fn ip_address() -> Arc<dyn EventColumn> {
    SimpleEventColumn::new(&core().event_ip_address, |event| {
        Ok(Value::from(event.hit.ip.as_str()))
    })
    .into_arc()
}

/// Page URL parameter captured into its own column and stripped from
/// `page_location`.
fn tracked_param(
    blacklist: &UrlParamsBlacklist,
    interface: &Interface,
    param: &str,
    display_name: &str,
) -> Arc<dyn EventColumn> {
    blacklist.register(param);
    from_page_url_param(interface, param)
        .with_cast(cast::str_nil_if_error_or_empty(cast::to_string(&interface.id)))
        .with_docs(
            display_name,
            &format!("Value of the '{}' parameter of the page URL.", param),
        )
        .into_arc()
}

/// UTM and click-id columns; registers their parameters for stripping.
pub fn tracked_params(blacklist: &UrlParamsBlacklist) -> Vec<Arc<dyn EventColumn>> {
    let c = core();
    let e = ext();
    [
        (&c.event_gclid, "gclid", "GCLID"),
        (&c.event_dclid, "dclid", "DCLID"),
        (&c.event_srsltid, "srsltid", "SRSLTID"),
        (&c.event_aclid, "aclid", "ACLID"),
        (&c.event_anid, "anid", "ANID"),
        (&e.event_gbraid, "gbraid", "GBRAID"),
        (&e.event_wbraid, "wbraid", "WBRAID"),
        (&e.event_msclkid, "msclkid", "MSCLKID"),
        (&c.event_utm_marketing_tactic, "utm_marketing_tactic", "UTM Marketing Tactic"),
        (&c.event_utm_source_platform, "utm_source_platform", "UTM Source Platform"),
        (&c.event_utm_term, "utm_term", "UTM Term"),
        (&c.event_utm_content, "utm_content", "UTM Content"),
        (&c.event_utm_source, "utm_source", "UTM Source"),
        (&c.event_utm_medium, "utm_medium", "UTM Medium"),
        (&c.event_utm_campaign, "utm_campaign", "UTM Campaign"),
        (&c.event_utm_id, "utm_id", "UTM ID"),
        (&c.event_utm_creative_format, "utm_creative_format", "UTM Creative Format"),
    ]
    .into_iter()
    .map(|(interface, param, name)| tracked_param(blacklist, interface, param, name))
    .collect()
}

/// `source/medium` from the UTM columns, null when either is missing.
pub fn utm_source_medium() -> Arc<dyn EventColumn> {
    let source = core().event_utm_source.field.name.clone();
    let medium = core().event_utm_medium.field.name.clone();
    SimpleEventColumn::new(&ext().event_utm_source_medium, move |event| {
        Ok(match (event.str_value(&source), event.str_value(&medium)) {
            (Some(s), Some(m)) => Value::from(format!("{}/{}", s, m)),
            _ => Value::Null,
        })
    })
    .with_depends_on([
        DependsOnEntry::on(&core().event_utm_source),
        DependsOnEntry::on(&core().event_utm_medium),
    ])
    .with_docs(
        "UTM source / medium",
        "Traffic source and medium in 'source/medium' form, e.g. 'google/cpc'.",
    )
    .into_arc()
}

fn device_column(
    devices: &Arc<DeviceDetector>,
    interface: &Interface,
    display_name: &str,
    pick: fn(&DeviceInfo) -> &str,
) -> Arc<dyn EventColumn> {
    let devices = devices.clone();
    SimpleEventColumn::new(interface, move |event| {
        let info = devices.for_event(event);
        let value = pick(&info);
        Ok(if value.is_empty() {
            Value::Null
        } else {
            Value::from(value)
        })
    })
    .with_docs(display_name, "Derived from the User-Agent header and client hints.")
    .into_arc()
}

pub fn device_columns(devices: &Arc<DeviceDetector>) -> Vec<Arc<dyn EventColumn>> {
    let e = ext();
    vec![
        device_column(devices, &e.device_category, "Device Category", |i| i.category.as_str()),
        device_column(devices, &e.device_mobile_brand_name, "Device Brand (mobile)", |i| i.brand.as_str()),
        device_column(devices, &e.device_mobile_model_name, "Device Model (mobile)", |i| i.model.as_str()),
        device_column(devices, &e.device_operating_system, "Operating System", |i| i.os.as_str()),
        device_column(
            devices,
            &e.device_operating_system_version,
            "Operating System Version",
            |i| i.os_version.as_str(),
        ),
        device_column(devices, &e.device_web_browser, "Web Browser", |i| i.browser.as_str()),
        device_column(
            devices,
            &e.device_web_browser_version,
            "Web Browser Version",
            |i| i.browser_version.as_str(),
        ),
    ]
}

/// Geo slots, empty until a geolocation provider is wired in.
pub fn geo_columns() -> Vec<Arc<dyn EventColumn>> {
    let e = ext();
    [
        &e.geo_continent,
        &e.geo_sub_continent,
        &e.geo_country,
        &e.geo_region,
        &e.geo_city,
        &e.geo_metro,
    ]
    .into_iter()
    .map(|interface| always_nil(interface).into_arc())
    .collect()
}
