//! Proxy and record configuration.

use serde::{Deserialize, Serialize};

/// Forward unmatched requests upstream and optionally capture them as mappings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyAndRecordSettings {
    /// Upstream base url
    pub url: String,

    /// Register a mapping for every recorded exchange
    #[serde(default)]
    pub save_mapping: bool,

    /// Also write recorded mappings to the mappings directory
    #[serde(default)]
    pub save_mapping_to_file: bool,

    /// Only record upstream statuses matching this pattern (`*`, `2xx`, `200-299`, `200,404`)
    #[serde(default = "default_status_code_pattern")]
    pub save_mapping_for_status_code_pattern: String,

    /// Request headers left out of recorded mappings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_headers: Vec<String>,

    /// Request cookies left out of recorded mappings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_cookies: Vec<String>,
}

fn default_status_code_pattern() -> String {
    "*".to_string()
}

impl ProxyAndRecordSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            save_mapping: false,
            save_mapping_to_file: false,
            save_mapping_for_status_code_pattern: default_status_code_pattern(),
            excluded_headers: Vec::new(),
            excluded_cookies: Vec::new(),
        }
    }

    pub fn records(&self) -> bool {
        self.save_mapping || self.save_mapping_to_file
    }
}
