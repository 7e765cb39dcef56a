//! Typed side-channel carried alongside event and session values.
//!
//! Metadata never reaches the warehouse. Columns use it to share derived
//! state (parsed URLs, attribution, split cause) without recomputing it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

pub const ORIGINAL_PAGE_LOCATION: &str = "original_page_location";
pub const DEVICE_DETECTOR_FULL_INFO: &str = "device_detector_full_info";
pub const SESSION_SMT_PARSED_URLS: &str = "session_smt_parsed_urls";
pub const SESSION_SPLIT_CAUSE: &str = "session_split_cause";
pub const TRAFFIC_FILTER_NAME: &str = "traffic_filter_name";
pub const ENGAGED_FILTER_NAME: &str = "engaged_filter_name";
pub const SESSION_SOURCE_MEDIUM_TERM: &str = "session_source_medium_term";

/// Why the splitter cut a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitCause {
    UtmCampaignChanged,
    UserIdChanged,
    MaxEventsReached,
    MaxTimeSinceFirstEventReached,
}

impl SplitCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UtmCampaignChanged => "utm_campaign_changed",
            Self::UserIdChanged => "user_id_changed",
            Self::MaxEventsReached => "max_events_reached",
            Self::MaxTimeSinceFirstEventReached => "max_time_since_first_event_reached",
        }
    }
}

impl fmt::Display for SplitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic attribution result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMediumTerm {
    pub source: String,
    pub medium: String,
    pub term: String,
}

impl SourceMediumTerm {
    pub fn new(source: impl Into<String>, medium: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            medium: medium.into(),
            term: term.into(),
        }
    }
}

/// Device attributes derived from the user agent and client hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub category: String,
    pub brand: String,
    pub model: String,
    pub os: String,
    pub os_version: String,
    pub browser: String,
    pub browser_version: String,
}

/// URLs parsed once per event and shared by the attribution detectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUrls {
    pub page: Option<Url>,
    pub referrer: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Text(String),
    SplitCause(SplitCause),
    SourceMediumTerm(SourceMediumTerm),
    Device(DeviceInfo),
    ParsedUrls(ParsedUrls),
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<SplitCause> for MetaValue {
    fn from(v: SplitCause) -> Self {
        Self::SplitCause(v)
    }
}

impl From<SourceMediumTerm> for MetaValue {
    fn from(v: SourceMediumTerm) -> Self {
        Self::SourceMediumTerm(v)
    }
}

impl From<DeviceInfo> for MetaValue {
    fn from(v: DeviceInfo) -> Self {
        Self::Device(v)
    }
}

impl From<ParsedUrls> for MetaValue {
    fn from(v: ParsedUrls) -> Self {
        Self::ParsedUrls(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata(HashMap<String, MetaValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text stored under `key`, if any.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(MetaValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn split_cause(&self) -> Option<SplitCause> {
        match self.0.get(SESSION_SPLIT_CAUSE) {
            Some(MetaValue::SplitCause(cause)) => Some(*cause),
            _ => None,
        }
    }

    pub fn source_medium_term(&self) -> Option<&SourceMediumTerm> {
        match self.0.get(SESSION_SOURCE_MEDIUM_TERM) {
            Some(MetaValue::SourceMediumTerm(smt)) => Some(smt),
            _ => None,
        }
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        match self.0.get(DEVICE_DETECTOR_FULL_INFO) {
            Some(MetaValue::Device(info)) => Some(info),
            _ => None,
        }
    }

    pub fn parsed_urls(&self) -> Option<&ParsedUrls> {
        match self.0.get(SESSION_SMT_PARSED_URLS) {
            Some(MetaValue::ParsedUrls(urls)) => Some(urls),
            _ => None,
        }
    }
}
