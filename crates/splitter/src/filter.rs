//! Expression-based event filters.
//!
//! Configured from the `filters:` section of a YAML document:
//!
//! ```yaml
//! filters:
//!   fields: [ip_address]
//!   conditions:
//!     - name: vpn_only
//!       type: allow
//!       active: true
//!       expression: 'in_cidr(ip_address, "100.64.0.0/10")'
//! ```

use std::path::Path;

use engine_core::{Error, Event, Result, Session, Value, ENGAGED_FILTER_NAME, TRAFFIC_FILTER_NAME};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::expr::{Env, ExprValue, Program};
use crate::modifier::SessionModifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// Drop matching events.
    Exclude,
    /// Keep only matching events.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub name: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Inactive conditions only tag matching events.
    #[serde(default = "default_active")]
    pub active: bool,
    pub expression: String,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Event fields exposed to expressions.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    /// Also tag testing-mode matches under the older metadata key.
    #[serde(default)]
    pub legacy_testing_key: bool,
}

#[derive(Deserialize)]
struct FiltersDocument {
    #[serde(default)]
    filters: FiltersConfig,
}

impl FiltersConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: FiltersDocument = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid filters config: {}", e)))?;
        Ok(document.filters)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read filters config {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }
}

struct CompiledCondition {
    config: FilterCondition,
    program: Program,
}

/// Removes events according to allow and exclude conditions.
pub struct FilterModifier {
    fields: Vec<String>,
    conditions: Vec<CompiledCondition>,
    legacy_testing_key: bool,
}

impl FilterModifier {
    /// Compiles every expression up front; any invalid one fails the build.
    pub fn new(config: FiltersConfig) -> Result<Self> {
        let conditions = config
            .conditions
            .into_iter()
            .map(|condition| {
                let program = Program::compile(&condition.expression).map_err(|e| {
                    Error::config(format!(
                        "Failed to compile filter expression {:?}: {}",
                        condition.name, e
                    ))
                })?;
                Ok(CompiledCondition {
                    config: condition,
                    program,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fields: config.fields,
            conditions,
            legacy_testing_key: config.legacy_testing_key,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn env(&self, event: &Event) -> Env {
        self.fields
            .iter()
            .map(|field| {
                let value = match event.value(field) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                (field.clone(), ExprValue::Str(value))
            })
            .collect()
    }

    fn matches(condition: &CompiledCondition, env: &Env) -> bool {
        match condition.program.run(env) {
            Ok(ExprValue::Bool(matched)) => matched,
            Ok(other) => {
                warn!(
                    filter = %condition.config.name,
                    result = %other,
                    "Filter condition did not return a boolean"
                );
                false
            }
            Err(e) => {
                warn!(filter = %condition.config.name, error = %e, "Filter condition failed");
                false
            }
        }
    }

    /// Whether `event` survives; testing-mode matches are tagged on it.
    fn keep(&self, event: &mut Event, allow_enabled: bool) -> bool {
        let env = self.env(event);
        let mut excluded = false;
        let mut allowed = false;

        for condition in &self.conditions {
            if !Self::matches(condition, &env) {
                continue;
            }
            if !condition.config.active {
                event
                    .metadata
                    .insert(TRAFFIC_FILTER_NAME, condition.config.name.as_str());
                if self.legacy_testing_key {
                    event
                        .metadata
                        .insert(ENGAGED_FILTER_NAME, condition.config.name.as_str());
                }
                continue;
            }
            match condition.config.filter_type {
                FilterType::Exclude => excluded = true,
                FilterType::Allow => allowed = true,
            }
        }
        !excluded && (!allow_enabled || allowed)
    }
}

impl SessionModifier for FilterModifier {
    fn split(&self, mut session: Session) -> Result<Vec<Session>> {
        if session.is_empty() || self.conditions.is_empty() {
            return Ok(vec![session]);
        }
        let allow_enabled = self
            .conditions
            .iter()
            .any(|c| c.config.active && c.config.filter_type == FilterType::Allow);

        let before = session.len();
        let events = std::mem::take(&mut session.events);
        session.events = events
            .into_iter()
            .filter_map(|mut event| self.keep(&mut event, allow_enabled).then_some(event))
            .collect();

        let dropped = before - session.len();
        if dropped > 0 {
            metrics().events_filtered.inc_by(dropped as u64);
            debug!(property_id = %session.property_id, dropped, "Events filtered");
        }
        if session.is_empty() {
            metrics().sessions_filtered.inc();
            return Ok(Vec::new());
        }
        Ok(vec![session])
    }
}
