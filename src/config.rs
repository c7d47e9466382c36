//! Reconciler configuration.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Well-known names the link functions and sync checks match on.
///
/// Every field has a default, so `{}` is a valid configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    /// Name of the Limitador instance owned by the global config.
    pub limitador_name: String,
    /// Name of the Authorino instance owned by the global config.
    pub authorino_name: String,
    /// Label that opts a ServiceMonitor/PodMonitor into the topology.
    pub observability_label: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            limitador_name: "limitador".into(),
            authorino_name: "authorino".into(),
            observability_label: "kuadrant.io/observability".into(),
        }
    }
}

impl ReconcilerConfig {
    pub fn from_json(doc: &str) -> Result<Self> {
        Ok(serde_json::from_str(doc)?)
    }
}
