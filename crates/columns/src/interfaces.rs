//! Canonical interface declarations.
//!
//! Interface ids never change between releases. The declaration order here
//! is the storage order of the columns.

use std::sync::LazyLock;

use engine_core::{DataType, Field};
use schema::Interface;

fn iface(id: &str, name: &str, data_type: DataType, nullable: bool) -> Interface {
    let field = if nullable {
        Field::nullable(name, data_type)
    } else {
        Field::new(name, data_type)
    };
    Interface::new(id, "1.0.0", field)
}

fn event(name: &str, field: &str, data_type: DataType, nullable: bool) -> Interface {
    iface(&format!("core.d8a.tech/events/{}", name), field, data_type, nullable)
}

fn session(name: &str, field: &str, data_type: DataType, nullable: bool) -> Interface {
    iface(&format!("core.d8a.tech/sessions/{}", name), field, data_type, nullable)
}

/// Interfaces every property must implement.
pub struct CoreInterfaces {
    pub event_id: Interface,
    pub event_name: Interface,
    pub event_timestamp: Interface,
    pub event_date: Interface,
    pub event_page_title: Interface,
    pub event_page_referrer: Interface,
    pub event_page_path: Interface,
    pub event_page_location: Interface,
    pub event_page_hostname: Interface,
    pub event_client_id: Interface,
    pub event_user_id: Interface,
    pub event_property_id: Interface,
    pub event_tracking_protocol: Interface,
    pub event_platform: Interface,
    pub event_ip_address: Interface,
    pub event_gclid: Interface,
    pub event_dclid: Interface,
    pub event_srsltid: Interface,
    pub event_aclid: Interface,
    pub event_anid: Interface,
    pub event_utm_marketing_tactic: Interface,
    pub event_utm_source_platform: Interface,
    pub event_utm_term: Interface,
    pub event_utm_content: Interface,
    pub event_utm_source: Interface,
    pub event_utm_medium: Interface,
    pub event_utm_campaign: Interface,
    pub event_utm_id: Interface,
    pub event_utm_creative_format: Interface,
    pub session_id: Interface,
    pub session_duration: Interface,
    pub session_first_event_time: Interface,
    pub session_last_event_time: Interface,
    pub session_total_events: Interface,
}

impl CoreInterfaces {
    fn new() -> Self {
        use DataType::*;
        Self {
            event_id: event("id", "event_id", String, false),
            event_name: event("name", "event_name", String, false),
            event_timestamp: event("timestamp", "timestamp", TimestampSeconds, false),
            event_date: event("date", "event_date", Date32, false),
            event_page_title: event("page_title", "page_title", String, false),
            event_page_referrer: event("page_referrer", "page_referrer", String, false),
            event_page_path: event("page_path", "page_path", String, false),
            event_page_location: event("page_location", "page_location", String, false),
            event_page_hostname: event("page_hostname", "page_hostname", String, false),
            event_client_id: event("client_id", "client_id", String, false),
            event_user_id: event("user_id", "user_id", String, true),
            event_property_id: event("property_id", "property_id", String, false),
            event_tracking_protocol: event("tracking_protocol", "tracking_protocol", String, false),
            event_platform: event("platform", "platform", String, false),
            event_ip_address: event("ip_address", "ip_address", String, false),
            event_gclid: event("gclid", "params_gclid", String, true),
            event_dclid: event("dclid", "params_dclid", String, true),
            event_srsltid: event("srsltid", "params_srsltid", String, true),
            event_aclid: event("aclid", "params_aclid", String, true),
            event_anid: event("anid", "params_anid", String, true),
            event_utm_marketing_tactic: event("utm_marketing_tactic", "utm_marketing_tactic", String, true),
            event_utm_source_platform: event("utm_source_platform", "utm_source_platform", String, true),
            event_utm_term: event("utm_term", "utm_term", String, true),
            event_utm_content: event("utm_content", "utm_content", String, true),
            event_utm_source: event("utm_source", "utm_source", String, true),
            event_utm_medium: event("utm_medium", "utm_medium", String, true),
            event_utm_campaign: event("utm_campaign", "utm_campaign", String, true),
            event_utm_id: event("utm_id", "utm_id", String, true),
            event_utm_creative_format: event("utm_creative_format", "utm_creative_format", String, true),
            session_id: session("id", "session_id", String, false),
            session_duration: session("duration", "duration", Int64, true),
            session_first_event_time: session("first_event_time", "first_event_time", TimestampSeconds, true),
            session_last_event_time: session("last_event_time", "last_event_time", TimestampSeconds, true),
            session_total_events: session("total_events", "total_events", Int64, true),
        }
    }

    /// Every core interface in declaration order.
    pub fn all(&self) -> Vec<Interface> {
        vec![
            self.event_id.clone(),
            self.event_name.clone(),
            self.event_timestamp.clone(),
            self.event_date.clone(),
            self.event_page_title.clone(),
            self.event_page_referrer.clone(),
            self.event_page_path.clone(),
            self.event_page_location.clone(),
            self.event_page_hostname.clone(),
            self.event_client_id.clone(),
            self.event_user_id.clone(),
            self.event_property_id.clone(),
            self.event_tracking_protocol.clone(),
            self.event_platform.clone(),
            self.event_ip_address.clone(),
            self.event_gclid.clone(),
            self.event_dclid.clone(),
            self.event_srsltid.clone(),
            self.event_aclid.clone(),
            self.event_anid.clone(),
            self.event_utm_marketing_tactic.clone(),
            self.event_utm_source_platform.clone(),
            self.event_utm_term.clone(),
            self.event_utm_content.clone(),
            self.event_utm_source.clone(),
            self.event_utm_medium.clone(),
            self.event_utm_campaign.clone(),
            self.event_utm_id.clone(),
            self.event_utm_creative_format.clone(),
            self.session_id.clone(),
            self.session_duration.clone(),
            self.session_first_event_time.clone(),
            self.session_last_event_time.clone(),
            self.session_total_events.clone(),
        ]
    }
}

/// Optional interfaces shipped with the default column set.
pub struct ExtendedInterfaces {
    pub session_source: Interface,
    pub session_medium: Interface,
    pub session_term: Interface,
    pub session_split_cause: Interface,
    pub session_referrer: Interface,
    pub sse_hit_number: Interface,
    pub sse_page_number: Interface,
    pub sse_is_entry: Interface,
    pub sse_traffic_filter_name: Interface,
    pub event_gbraid: Interface,
    pub event_wbraid: Interface,
    pub event_msclkid: Interface,
    pub event_utm_source_medium: Interface,
    pub device_category: Interface,
    pub device_mobile_brand_name: Interface,
    pub device_mobile_model_name: Interface,
    pub device_operating_system: Interface,
    pub device_operating_system_version: Interface,
    pub device_web_browser: Interface,
    pub device_web_browser_version: Interface,
    pub geo_continent: Interface,
    pub geo_sub_continent: Interface,
    pub geo_country: Interface,
    pub geo_region: Interface,
    pub geo_city: Interface,
    pub geo_metro: Interface,
}

impl ExtendedInterfaces {
    fn new() -> Self {
        use DataType::*;
        Self {
            session_source: session("source", "session_source", String, true),
            session_medium: session("medium", "session_medium", String, true),
            session_term: session("term", "session_term", String, true),
            session_split_cause: session("split_cause", "session_split_cause", String, true),
            session_referrer: session("referrer", "session_referrer", String, true),
            sse_hit_number: event("session_hit_number", "session_hit_number", Int64, true),
            sse_page_number: event("session_page_number", "session_page_number", Int64, true),
            sse_is_entry: event("session_is_entry", "session_is_entry", Bool, true),
            sse_traffic_filter_name: event("traffic_filter_name", "traffic_filter_name", String, true),
            event_gbraid: event("gbraid", "params_gbraid", String, true),
            event_wbraid: event("wbraid", "params_wbraid", String, true),
            event_msclkid: event("msclkid", "params_msclkid", String, true),
            event_utm_source_medium: event("utm_source_medium", "utm_source_medium", String, true),
            device_category: event("device_category", "device_category", String, true),
            device_mobile_brand_name: event("device_mobile_brand_name", "device_mobile_brand_name", String, true),
            device_mobile_model_name: event("device_mobile_model_name", "device_mobile_model_name", String, true),
            device_operating_system: event("device_operating_system", "device_operating_system", String, true),
            device_operating_system_version: event(
                "device_operating_system_version",
                "device_operating_system_version",
                String,
                true,
            ),
            device_web_browser: event("device_web_browser", "device_web_browser", String, true),
            device_web_browser_version: event("device_web_browser_version", "device_web_browser_version", String, true),
            geo_continent: event("geo_continent", "geo_continent", String, true),
            geo_sub_continent: event("geo_sub_continent", "geo_sub_continent", String, true),
            geo_country: event("geo_country", "geo_country", String, true),
            geo_region: event("geo_region", "geo_region", String, true),
            geo_city: event("geo_city", "geo_city", String, true),
            geo_metro: event("geo_metro", "geo_metro", String, true),
        }
    }

    pub fn all(&self) -> Vec<Interface> {
        vec![
            self.session_source.clone(),
            self.session_medium.clone(),
            self.session_term.clone(),
            self.session_split_cause.clone(),
            self.session_referrer.clone(),
            self.sse_hit_number.clone(),
            self.sse_page_number.clone(),
            self.sse_is_entry.clone(),
            self.sse_traffic_filter_name.clone(),
            self.event_gbraid.clone(),
            self.event_wbraid.clone(),
            self.event_msclkid.clone(),
            self.event_utm_source_medium.clone(),
            self.device_category.clone(),
            self.device_mobile_brand_name.clone(),
            self.device_mobile_model_name.clone(),
            self.device_operating_system.clone(),
            self.device_operating_system_version.clone(),
            self.device_web_browser.clone(),
            self.device_web_browser_version.clone(),
            self.geo_continent.clone(),
            self.geo_sub_continent.clone(),
            self.geo_country.clone(),
            self.geo_region.clone(),
            self.geo_city.clone(),
            self.geo_metro.clone(),
        ]
    }
}

static CORE: LazyLock<CoreInterfaces> = LazyLock::new(CoreInterfaces::new);
static EXTENDED: LazyLock<ExtendedInterfaces> = LazyLock::new(ExtendedInterfaces::new);

pub fn core() -> &'static CoreInterfaces {
    &CORE
}

pub fn ext() -> &'static ExtendedInterfaces {
    &EXTENDED
}
