//! Host patterns and the YAML-backed host list detectors.

use std::collections::BTreeMap;

use engine_core::{Error, Event, Result, SourceMediumTerm};
use regex::Regex;
use serde::Deserialize;

use crate::detector::{referer_host, Detector};

const WILDCARD: &str = "{}";

/// One host entry from a lookup list. `{}` stands for any run of characters.
#[derive(Debug, Clone)]
pub enum HostPattern {
    Exact(String),
    Suffix(String),
    Prefix(String),
    Pattern(Regex),
}

impl HostPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim().to_lowercase();
        if !raw.contains(WILDCARD) {
            return Ok(Self::Exact(raw));
        }
        if let Some(rest) = raw.strip_prefix(WILDCARD) {
            if !rest.contains(WILDCARD) {
                return Ok(Self::Suffix(rest.to_string()));
            }
        }
        if let Some(rest) = raw.strip_suffix(WILDCARD) {
            if !rest.contains(WILDCARD) {
                return Ok(Self::Prefix(rest.to_string()));
            }
        }
        let escaped = regex::escape(&raw).replace(&regex::escape(WILDCARD), ".*");
        Regex::new(&format!("^{}$", escaped))
            .map(Self::Pattern)
            .map_err(|e| Error::config(format!("Invalid host pattern {}: {}", raw, e)))
    }

    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(h) => host == h,
            Self::Suffix(s) => host.ends_with(s.as_str()),
            Self::Prefix(p) => host.starts_with(p.as_str()),
            Self::Pattern(re) => re.is_match(host),
        }
    }

    /// Matches either the host or the host without a leading `www.`.
    pub fn matches_host(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }
        self.matches(host) || host.strip_prefix("www.").is_some_and(|h| self.matches(h))
    }
}

/// Maps a host to a named source with a fixed medium.
pub struct HostListDetector {
    medium: String,
    entries: Vec<(String, Vec<HostPattern>)>,
}

impl HostListDetector {
    /// Parses a `name -> [host, ...]` YAML document.
    pub fn from_yaml(medium: impl Into<String>, yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid host list: {}", e)))?;
        let mut entries = Vec::with_capacity(raw.len());
        for (name, hosts) in raw {
            let patterns = hosts
                .iter()
                .map(|h| HostPattern::parse(h))
                .collect::<Result<Vec<_>>>()?;
            entries.push((name, patterns));
        }
        Ok(Self {
            medium: medium.into(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, host: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.matches_host(host)))
            .map(|(name, _)| name.as_str())
    }
}

impl Detector for HostListDetector {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm> {
        let host = referer_host(event)?;
        self.lookup(&host)
            .map(|name| SourceMediumTerm::new(name, self.medium.as_str(), ""))
    }
}

#[derive(Debug, Deserialize)]
struct SearchEngineEntry {
    urls: Vec<String>,
    #[serde(default)]
    params: Vec<String>,
}

struct SearchEngine {
    name: String,
    hosts: Vec<HostPattern>,
    params: Vec<String>,
}

/// Organic search detection; the term comes from the referrer's query.
pub struct SearchEngineDetector {
    engines: Vec<SearchEngine>,
}

impl SearchEngineDetector {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<SearchEngineEntry>> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid search engine list: {}", e)))?;
        let mut engines = Vec::new();
        for (name, groups) in raw {
            for group in groups {
                let hosts = group
                    .urls
                    .iter()
                    .map(|u| HostPattern::parse(u))
                    .collect::<Result<Vec<_>>>()?;
                engines.push(SearchEngine {
                    name: name.clone(),
                    hosts,
                    params: group.params,
                });
            }
        }
        Ok(Self { engines })
    }
}

impl Detector for SearchEngineDetector {
    fn detect(&self, event: &Event) -> Option<SourceMediumTerm> {
        let host = referer_host(event)?;
        let engine = self
            .engines
            .iter()
            .find(|e| e.hosts.iter().any(|p| p.matches_host(&host)))?;

        let referrer = event.metadata.parsed_urls().and_then(|u| u.referrer.as_ref());
        let term = referrer
            .and_then(|url| {
                engine.params.iter().find_map(|param| {
                    url.query_pairs()
                        .find(|(k, v)| k == param.as_str() && !v.is_empty())
                        .map(|(_, v)| v.into_owned())
                })
            })
            .unwrap_or_default();
        Some(SourceMediumTerm::new(engine.name.as_str(), "organic", term))
    }
}
