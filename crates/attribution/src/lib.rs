//! Traffic-source attribution.
//!
//! A fixed chain of detectors classifies the first event of a session into
//! a `(source, medium, term)` tuple. UTM parameters on the page URL then
//! override individual components, and the result is normalized.

pub mod detector;
pub mod hosts;
pub mod normalize;

use std::sync::Arc;

use engine_core::{Event, Result, SourceMediumTerm};
use tracing::debug;

pub use detector::{
    ensure_parsed_urls, page_host, page_param, referer_host, without_www, ClickIdDetector,
    ClickIdRule, CompositeDetector, Detector, DirectDetector, MailRefererDetector,
    ReferralDetector,
};
pub use hosts::{HostListDetector, HostPattern, SearchEngineDetector};
pub use normalize::{normalize, normalize_all};

pub const SEARCH_ENGINES_YAML: &str = include_str!("lists/searchengines.yaml");
pub const SOCIALS_YAML: &str = include_str!("lists/socials.yaml");
pub const AI_YAML: &str = include_str!("lists/ai.yaml");
pub const VIDEO_YAML: &str = include_str!("lists/video.yaml");
pub const EMAILS_YAML: &str = include_str!("lists/emails.yaml");

/// The detector chain in evaluation order.
pub fn default_detector() -> Result<CompositeDetector> {
    Ok(CompositeDetector::new(vec![
        Arc::new(ClickIdDetector::default()),
        Arc::new(HostListDetector::from_yaml("video", VIDEO_YAML)?),
        Arc::new(HostListDetector::from_yaml("email", EMAILS_YAML)?),
        Arc::new(MailRefererDetector),
        Arc::new(HostListDetector::from_yaml("social", SOCIALS_YAML)?),
        Arc::new(HostListDetector::from_yaml("ai", AI_YAML)?),
        Arc::new(SearchEngineDetector::from_yaml(SEARCH_ENGINES_YAML)?),
        Arc::new(ReferralDetector),
        Arc::new(DirectDetector),
    ]))
}

/// Detection plus UTM override and normalization.
pub struct Attributor {
    detector: Arc<dyn Detector>,
}

impl Attributor {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }

    /// Uses the embedded lookup lists.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(Arc::new(default_detector()?)))
    }

    pub fn attribute(&self, event: &mut Event) -> SourceMediumTerm {
        ensure_parsed_urls(event);
        let mut smt = self.detector.detect(event).unwrap_or_default();

        for (param, slot) in [
            ("utm_source", &mut smt.source),
            ("utm_medium", &mut smt.medium),
            ("utm_term", &mut smt.term),
        ] {
            if let Some(value) = page_param(event, param).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }

        let smt = normalize_all(&smt);
        debug!(
            event_id = %event.hit.id,
            source = %smt.source,
            medium = %smt.medium,
            "Attributed event"
        );
        smt
    }
}
