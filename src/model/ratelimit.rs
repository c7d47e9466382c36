//! Rate-limit policy rules and the descriptors compiled from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The rules block of a rate-limit policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    #[serde(default)]
    pub limits: BTreeMap<String, Limit>,
}

/// A named limit: ordered rates plus the counter variables it is keyed on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    #[serde(default)]
    pub rates: Vec<Rate>,
    #[serde(default)]
    pub counters: Vec<Counter>,
}

impl Limit {
    pub fn counter_names(&self) -> Vec<String> {
        self.counters.iter().map(|c| c.as_str().to_owned()).collect()
    }
}

/// Counter variable, either a bare name or `{expression: name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Counter {
    Name(String),
    Expression { expression: String },
}

impl Counter {
    pub fn as_str(&self) -> &str {
        match self {
            Counter::Name(s) => s,
            Counter::Expression { expression } => expression,
        }
    }
}

/// `count` hits per `duration` `unit`s.
///
/// Values are taken as written; negative counts and durations are clamped at
/// compile time rather than rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    #[serde(alias = "count")]
    pub limit: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub unit: String,
}

impl Rate {
    pub fn new(limit: i64, duration: i64, unit: impl Into<String>) -> Self {
        Self { limit, duration, unit: unit.into() }
    }
}

/// A flat limit record consumed by the external rate-limiting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementDescriptor {
    pub namespace: String,
    #[serde(default)]
    pub identifier: String,
    pub max_value: u64,
    #[serde(rename = "seconds")]
    pub window_seconds: u64,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub name: String,
}
