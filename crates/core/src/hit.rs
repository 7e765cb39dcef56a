//! Raw tracking hits as delivered by the collector.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request headers with case-canonical names (`sec-ch-ua` -> `Sec-Ch-Ua`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of a header name: each dash-separated word capitalized.
    pub fn canonical(name: &str) -> String {
        name.split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Appends a value to the header.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(Self::canonical(name))
            .or_default()
            .push(value.into());
    }

    /// Replaces all values of the header.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(Self::canonical(name), vec![value.into()]);
    }

    /// First value of the header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&Self::canonical(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of the header, or the empty string.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered query parameters; lookups return the first value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` query string.
    pub fn parse(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single tracking request, the unit a protosession is made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub property_id: String,
    pub client_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub ip: String,
    pub server_received_time: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub query_params: QueryParams,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub tracking_protocol: String,
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String {
    "web".to_string()
}

impl Hit {
    /// Creates a hit with fresh identifiers, received now.
    pub fn new(property_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            property_id: property_id.into(),
            client_id: Uuid::new_v4().to_string(),
            user_id: None,
            event_name: "page_view".to_string(),
            ip: String::new(),
            server_received_time: now,
            timestamp: now,
            headers: Headers::new(),
            query_params: QueryParams::new(),
            page_url: String::new(),
            tracking_protocol: "ga4".to_string(),
            platform: default_platform(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    /// Sets both the receive time and the client timestamp.
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.server_received_time = time;
        self.timestamp = time;
        self
    }

    /// Sets the page URL; its query string also populates `query_params`.
    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        if let Some((_, query)) = self.page_url.split_once('?') {
            let query = query.split('#').next().unwrap_or_default();
            self.query_params = QueryParams::parse(query);
        }
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.append(key, value);
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    /// The `Referer` header, or the empty string.
    pub fn referer(&self) -> &str {
        self.headers.get_or_empty("Referer")
    }

    pub fn user_agent(&self) -> &str {
        self.headers.get_or_empty("User-Agent")
    }
}
