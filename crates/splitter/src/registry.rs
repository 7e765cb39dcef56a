//! Per-property modifier lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engine_core::Result;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::conditions::{
    ElapsedTimeCondition, MaxEventsCondition, SplitCondition, ValueChangedCondition,
};
use crate::filter::FilterModifier;
use crate::modifier::{ModifierChain, SessionModifier};
use crate::splitter::Splitter;

const CACHE_MAX_CAPACITY: u64 = 1_000;
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Split policy of one property. Zero disables the numeric conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSettings {
    #[serde(default = "default_true")]
    pub split_by_campaign: bool,
    #[serde(default = "default_true")]
    pub split_by_user_id: bool,
    #[serde(default = "default_max_events")]
    pub split_by_max_events: usize,
    #[serde(default = "default_time_since_first_event_secs")]
    pub split_by_time_since_first_event_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_events() -> usize {
    1000
}

fn default_time_since_first_event_secs() -> u64 {
    12 * 60 * 60
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            split_by_campaign: default_true(),
            split_by_user_id: default_true(),
            split_by_max_events: default_max_events(),
            split_by_time_since_first_event_secs: default_time_since_first_event_secs(),
        }
    }
}

impl SplitSettings {
    /// Conditions in evaluation order: elapsed time, max events, user id,
    /// campaign.
    pub fn conditions(&self) -> Vec<Arc<dyn SplitCondition>> {
        let mut conditions: Vec<Arc<dyn SplitCondition>> = Vec::new();
        if self.split_by_time_since_first_event_secs > 0 {
            conditions.push(Arc::new(ElapsedTimeCondition::new(Duration::from_secs(
                self.split_by_time_since_first_event_secs,
            ))));
        }
        if self.split_by_max_events > 0 {
            conditions.push(Arc::new(MaxEventsCondition::new(self.split_by_max_events)));
        }
        if self.split_by_user_id {
            conditions.push(Arc::new(ValueChangedCondition::user_id()));
        }
        if self.split_by_campaign {
            conditions.push(Arc::new(ValueChangedCondition::utm_campaign()));
        }
        conditions
    }
}

pub trait SplitterRegistry: Send + Sync {
    fn modifier(&self, property_id: &str) -> Result<Arc<dyn SessionModifier>>;
}

/// The same modifier for every property.
pub struct StaticSplitterRegistry {
    modifier: Arc<dyn SessionModifier>,
}

impl StaticSplitterRegistry {
    pub fn new(modifier: Arc<dyn SessionModifier>) -> Self {
        Self { modifier }
    }
}

impl SplitterRegistry for StaticSplitterRegistry {
    fn modifier(&self, _property_id: &str) -> Result<Arc<dyn SessionModifier>> {
        Ok(self.modifier.clone())
    }
}

/// Builds each property's chain from its split settings: the shared filter
/// runs first, then the splitter.
pub struct SettingsSplitterRegistry {
    default: SplitSettings,
    overrides: HashMap<String, SplitSettings>,
    filter: Option<Arc<FilterModifier>>,
    cache: Cache<String, Arc<dyn SessionModifier>>,
}

impl SettingsSplitterRegistry {
    pub fn new(default: SplitSettings) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            filter: None,
            cache: Cache::builder()
                .max_capacity(CACHE_MAX_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, SplitSettings>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_filter(mut self, filter: Arc<FilterModifier>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn settings(&self, property_id: &str) -> &SplitSettings {
        self.overrides.get(property_id).unwrap_or(&self.default)
    }

    fn build(&self, property_id: &str) -> Arc<dyn SessionModifier> {
        let mut chain = ModifierChain::default();
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            chain.push(filter.clone());
        }
        chain.push(Arc::new(Splitter::new(self.settings(property_id).conditions())));
        Arc::new(chain)
    }
}

impl SplitterRegistry for SettingsSplitterRegistry {
    fn modifier(&self, property_id: &str) -> Result<Arc<dyn SessionModifier>> {
        Ok(self
            .cache
            .get_with(property_id.to_string(), || self.build(property_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FiltersConfig;
    use engine_core::{Event, Hit, Session};

    fn session(n: usize, ip: &str) -> Session {
        Session::new(
            (0..n)
                .map(|_| {
                    let mut e = Event::new(Hit::new("p1"));
                    e.set_value("ip_address", ip);
                    e
                })
                .collect(),
        )
    }

    #[test]
    fn test_settings_condition_order() {
        assert_eq!(SplitSettings::default().conditions().len(), 4);
        let disabled = SplitSettings {
            split_by_campaign: false,
            split_by_user_id: false,
            split_by_max_events: 0,
            split_by_time_since_first_event_secs: 0,
        };
        assert!(disabled.conditions().is_empty());
    }

    #[test]
    fn test_overrides_per_property() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "small".to_string(),
            SplitSettings {
                split_by_max_events: 2,
                ..Default::default()
            },
        );
        let registry = SettingsSplitterRegistry::new(SplitSettings::default()).with_overrides(overrides);

        let small = registry.modifier("small").unwrap();
        assert_eq!(small.split(session(5, "1.1.1.1")).unwrap().len(), 3);
        let other = registry.modifier("other").unwrap();
        assert_eq!(other.split(session(5, "1.1.1.1")).unwrap().len(), 1);
    }

    #[test]
    fn test_filter_runs_before_splitter() {
        let yaml = "filters:\n  fields: [ip_address]\n  conditions:\n    - {name: bots, type: exclude, expression: 'ip_address == \"6.6.6.6\"'}\n";
        let filter = FilterModifier::new(FiltersConfig::from_yaml_str(yaml).unwrap()).unwrap();
        let registry = SettingsSplitterRegistry::new(SplitSettings::default())
            .with_filter(Arc::new(filter));
        let modifier = registry.modifier("p1").unwrap();
        assert!(modifier.split(session(3, "6.6.6.6")).unwrap().is_empty());
        assert_eq!(modifier.split(session(3, "1.1.1.1")).unwrap().len(), 1);
    }

    #[test]
    fn test_static_registry() {
        let registry = StaticSplitterRegistry::new(Arc::new(Splitter::noop()));
        let out = registry.modifier("any").unwrap().split(session(2, "1.1.1.1")).unwrap();
        assert_eq!(out.len(), 1);
    }
}
