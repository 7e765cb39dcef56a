//! User-agent based device detection.
//!
//! One parse per event: the result is kept in the event metadata and in a
//! process-wide cache keyed by the user agent and the client hints.

use std::time::Duration;

use engine_core::{DeviceInfo, Event, Headers, DEVICE_DETECTOR_FULL_INFO};
use moka::sync::Cache;
use woothee::parser::Parser;

const CACHE_TTL: Duration = Duration::from_secs(30);
const CACHE_MAX_CAPACITY: u64 = 10_000;
const UNKNOWN: &str = "UNKNOWN";

/// Client hint headers that change the detection result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHints {
    pub brands: String,
    pub mobile: bool,
    pub platform: String,
    pub platform_version: String,
    pub model: String,
}

impl ClientHints {
    pub fn from_headers(headers: &Headers) -> Self {
        let unquote = |name: &str| headers.get_or_empty(name).trim().trim_matches('"').to_string();
        Self {
            brands: headers.get_or_empty("Sec-Ch-Ua").to_string(),
            mobile: headers.get_or_empty("Sec-Ch-Ua-Mobile").trim() == "?1",
            platform: unquote("Sec-Ch-Ua-Platform"),
            platform_version: unquote("Sec-Ch-Ua-Platform-Version"),
            model: unquote("Sec-Ch-Ua-Model"),
        }
    }

    fn cache_key(&self, user_agent: &str) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            user_agent,
            self.brands,
            if self.mobile { "1" } else { "0" },
            self.platform,
            self.platform_version,
            self.model
        )
    }
}

pub struct DeviceDetector {
    parser: Parser,
    cache: Cache<String, DeviceInfo>,
}

impl DeviceDetector {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            cache: Cache::builder()
                .max_capacity(CACHE_MAX_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    pub fn detect(&self, user_agent: &str, hints: &ClientHints) -> DeviceInfo {
        let key = hints.cache_key(user_agent);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let info = self.parse(user_agent, hints);
        self.cache.insert(key, info.clone());
        info
    }

    /// Device info of the event, parsed at most once per event.
    pub fn for_event(&self, event: &mut Event) -> DeviceInfo {
        if let Some(info) = event.metadata.device() {
            return info.clone();
        }
        let hints = ClientHints::from_headers(&event.hit.headers);
        let info = self.detect(event.hit.user_agent(), &hints);
        event.metadata.insert(DEVICE_DETECTOR_FULL_INFO, info.clone());
        info
    }

    fn parse(&self, user_agent: &str, hints: &ClientHints) -> DeviceInfo {
        let mut info = DeviceInfo::default();
        if let Some(result) = self.parser.parse(user_agent) {
            info.browser = known(result.name);
            info.browser_version = known(result.version);
            info.os = known(result.os);
            info.os_version = known(&result.os_version.to_string());
            info.category = match result.category {
                "pc" => "desktop",
                "smartphone" | "mobilephone" => "mobile",
                "crawler" => "bot",
                "appliance" => "other",
                _ => "",
            }
            .to_string();
        }

        if info.os.is_empty() && !hints.platform.is_empty() {
            info.os = hints.platform.clone();
        }
        if !hints.platform_version.is_empty() {
            info.os_version = hints.platform_version.clone();
        }
        if hints.mobile && info.category.is_empty() {
            info.category = "mobile".to_string();
        }
        if info.category == "mobile" {
            info.model = hints.model.clone();
            if matches!(info.os.as_str(), "iPhone" | "iPad" | "iOS") {
                info.brand = "Apple".to_string();
            }
        }
        info
    }
}

impl Default for DeviceDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn known(value: &str) -> String {
    if value.is_empty() || value == UNKNOWN {
        String::new()
    } else {
        value.to_string()
    }
}
