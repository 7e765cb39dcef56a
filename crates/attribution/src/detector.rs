//! Detector contract and the rule-based detectors.

use std::sync::Arc;

use engine_core::{Event, ParsedUrls, SourceMediumTerm, SESSION_SMT_PARSED_URLS};
use url::Url;

/// Classifies one event. `None` means "no opinion", letting the next
/// detector in a composite try.
pub trait Detector: Send + Sync {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm>;
}

/// Parses the original page location and the referrer once and stores
/// them in the event metadata.
pub fn ensure_parsed_urls(event: &mut Event) {
    if event.metadata.parsed_urls().is_some() {
        return;
    }
    let urls = ParsedUrls {
        page: parse_url(event.original_page_location()),
        referrer: parse_url(event.hit.referer()),
    };
    event.metadata.insert(SESSION_SMT_PARSED_URLS, urls);
}

fn parse_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Url::parse(raw).ok()
}

fn clean_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim().to_lowercase().replace(' ', "-");
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Lowercased referrer host from the cached parse.
pub fn referer_host(event: &Event) -> Option<String> {
    event
        .metadata
        .parsed_urls()
        .and_then(|u| u.referrer.as_ref())
        .and_then(clean_host)
}

/// Lowercased page host from the cached parse.
pub fn page_host(event: &Event) -> Option<String> {
    event
        .metadata
        .parsed_urls()
        .and_then(|u| u.page.as_ref())
        .and_then(clean_host)
}

pub fn without_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// First value of a query parameter on the page URL.
pub fn page_param(event: &Event, name: &str) -> Option<String> {
    event
        .metadata
        .parsed_urls()
        .and_then(|u| u.page.as_ref())
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        })
}

/// Tries each detector in order and returns the first result.
#[derive(Default)]
pub struct CompositeDetector {
    detectors: Vec<Arc<dyn Detector>>,
}

impl CompositeDetector {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self { detectors }
    }

    pub fn push(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl Detector for CompositeDetector {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm> {
        self.detectors.iter().find_map(|d| d.detect(event))
    }
}

/// A page URL query rule for paid-traffic click identifiers.
#[derive(Debug, Clone)]
pub enum ClickIdRule {
    HasParam {
        param: String,
        result: SourceMediumTerm,
    },
    ParamEquals {
        param: String,
        value: String,
        result: SourceMediumTerm,
    },
}

impl ClickIdRule {
    pub fn has_param(param: &str, source: &str, medium: &str) -> Self {
        Self::HasParam {
            param: param.to_string(),
            result: SourceMediumTerm::new(source, medium, ""),
        }
    }

    pub fn param_equals(param: &str, value: &str, source: &str, medium: &str) -> Self {
        Self::ParamEquals {
            param: param.to_string(),
            value: value.to_string(),
            result: SourceMediumTerm::new(source, medium, ""),
        }
    }

    fn apply(&self, event: &Event) -> Option<SourceMediumTerm> {
        match self {
            Self::HasParam { param, result } => {
                page_param(event, param).map(|_| result.clone())
            }
            Self::ParamEquals {
                param,
                value,
                result,
            } => page_param(event, param)
                .filter(|v| v == value)
                .map(|_| result.clone()),
        }
    }
}

/// Ordered click-ID rules evaluated against the original page location.
pub struct ClickIdDetector {
    rules: Vec<ClickIdRule>,
}

impl ClickIdDetector {
    pub fn new(rules: Vec<ClickIdRule>) -> Self {
        Self { rules }
    }
}

impl Default for ClickIdDetector {
    fn default() -> Self {
        Self::new(vec![
            ClickIdRule::has_param("gclid", "google", "cpc"),
            ClickIdRule::has_param("gbraid", "google", "cpc"),
            ClickIdRule::has_param("wbraid", "google", "cpc"),
            ClickIdRule::has_param("msclkid", "bing", "cpc"),
            ClickIdRule::has_param("fbclid", "facebook", "cpc"),
            ClickIdRule::has_param("twclid", "twitter", "cpc"),
            ClickIdRule::has_param("li_fat_id", "linkedin", "cpc"),
            ClickIdRule::has_param("ttclid", "tiktok", "cpc"),
            ClickIdRule::has_param("ScCid", "snapchat", "cpc"),
            ClickIdRule::has_param("irclickid", "impact", "affiliate"),
            ClickIdRule::param_equals("gclsrc", "aw.ds", "google", "cpc"),
            ClickIdRule::param_equals("gclsrc", "3p.ds", "google", "display"),
        ])
    }
}

impl Detector for ClickIdDetector {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm> {
        self.rules.iter().find_map(|rule| rule.apply(event))
    }
}

/// Referrers on a `mail.` host are email traffic.
pub struct MailRefererDetector;

impl Detector for MailRefererDetector {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm> {
        let host = referer_host(event)?;
        if !host.contains("mail.") {
            return None;
        }
        Some(SourceMediumTerm::new(without_www(&host), "email", ""))
    }
}

/// Any referrer from a different host than the page.
pub struct ReferralDetector;

impl Detector for ReferralDetector {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm> {
        let referer = referer_host(event)?;
        let page = page_host(event)?;
        let referer = without_www(&referer);
        if referer == without_www(&page) {
            return None;
        }
        Some(SourceMediumTerm::new(referer, "referral", ""))
    }
}

pub struct DirectDetector;

impl Detector for DirectDetector {
    fn detect(&self, _event: &Event) -> Option<SourceMediumTerm> {
        Some(SourceMediumTerm::new("direct", "none", ""))
    }
}
