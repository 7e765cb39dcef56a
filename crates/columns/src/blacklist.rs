//! Query parameters removed from stored page locations.
//!
//! Parameters captured into dedicated columns (UTM tags, click ids) are
//! stripped from `page_location`; the untouched URL stays available in the
//! event metadata.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use url::Url;

#[derive(Debug, Default)]
pub struct UrlParamsBlacklist {
    params: RwLock<BTreeSet<String>>,
}

impl UrlParamsBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let blacklist = Self::new();
        for p in params {
            blacklist.register(p);
        }
        blacklist
    }

    /// Idempotent.
    pub fn register(&self, param: impl Into<String>) {
        self.params.write().insert(param.into());
    }

    pub fn is_excluded(&self, param: &str) -> bool {
        self.params.read().contains(param)
    }

    pub fn params(&self) -> Vec<String> {
        self.params.read().iter().cloned().collect()
    }

    /// Removes excluded parameters. Unparseable URLs and URLs without
    /// excluded parameters are returned unchanged.
    pub fn strip(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let mut url = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => return raw.to_string(),
        };

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let params = self.params.read();
        if !pairs.iter().any(|(k, _)| params.contains(k)) {
            return raw.to_string();
        }

        if pairs.iter().all(|(k, _)| params.contains(k)) {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().filter(|(k, _)| !params.contains(k)));
        }
        url.to_string()
    }
}
