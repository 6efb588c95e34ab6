//! Configuration types for the mock server.
//!
//! `ServerSettings` is fixed for the lifetime of a server; `RuntimeSettings` is
//! the subset the admin API can read and change while the server runs.

mod listen;
mod recording;

use crate::error::ConfigError;
use crate::proxy::StatusCodePattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use listen::{Endpoint, Scheme, TlsSettings};
pub use recording::ProxyAndRecordSettings;

/// How to choose between mappings that tie on priority (and score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TieBreak {
    /// The most recently registered mapping wins
    #[default]
    LastRegistered,
    /// The earliest registered mapping wins
    FirstRegistered,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultInjectionSettings {
    /// Global toggle; when false declared faults are ignored
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seed for the fault and weighted-selection RNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for FaultInjectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listen urls, e.g. `http://0.0.0.0:9091`. Takes precedence over `port`.
    pub urls: Vec<String>,
    pub port: Option<u16>,
    pub use_ssl: bool,
    pub host: String,
    /// Bind an ephemeral port when a requested port is taken
    pub dynamic_port_fallback: bool,
    pub tls: Option<TlsSettings>,

    pub start_admin_interface: bool,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,

    pub allow_partial_mapping: bool,
    pub tie_break: TieBreak,

    pub read_static_mappings: bool,
    pub mappings_directory: PathBuf,
    pub files_directory: PathBuf,

    /// Oldest request log entries are evicted beyond this count
    pub max_request_log_count: Option<usize>,
    pub fault_injection: FaultInjectionSettings,
    /// Milliseconds added to every mock response
    pub global_processing_delay: Option<u64>,
    pub disable_json_body_parsing: bool,
    /// Graceful drain budget on stop
    pub shutdown_timeout_ms: u64,

    pub proxy_and_record: Option<ProxyAndRecordSettings>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            port: None,
            use_ssl: false,
            host: "127.0.0.1".to_string(),
            dynamic_port_fallback: false,
            tls: None,
            start_admin_interface: true,
            admin_username: None,
            admin_password: None,
            allow_partial_mapping: false,
            tie_break: TieBreak::default(),
            read_static_mappings: false,
            mappings_directory: PathBuf::from("__admin/mappings"),
            files_directory: PathBuf::from("__admin/__files"),
            max_request_log_count: None,
            fault_injection: FaultInjectionSettings::default(),
            global_processing_delay: None,
            disable_json_body_parsing: false,
            shutdown_timeout_ms: 5000,
            proxy_and_record: None,
        }
    }
}

impl ServerSettings {
    /// Load settings from a YAML or JSON file (by extension) and validate them.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let settings: ServerSettings = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("yaml") | Some("yml") | None => serde_yaml::from_str(&contents)?,
            Some(other) => anyhow::bail!(
                "Unsupported settings file extension '.{other}'. Use .yaml, .yml or .json"
            ),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Endpoints to bind. No urls and no port means one dynamic endpoint.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, ConfigError> {
        if !self.urls.is_empty() {
            return self.urls.iter().map(|url| Endpoint::parse(url)).collect();
        }
        let scheme = if self.use_ssl {
            Scheme::Https
        } else {
            Scheme::Http
        };
        Ok(vec![Endpoint::new(
            scheme,
            self.host.clone(),
            self.port.unwrap_or(0),
        )])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoints = self.endpoints()?;
        if endpoints.iter().any(|e| e.scheme == Scheme::Https) && self.tls.is_none() {
            return Err(ConfigError::InvalidSettings(
                "TLS settings are required for https endpoints. \
                 Please provide 'tls.certPath' and 'tls.keyPath'"
                    .to_string(),
            ));
        }
        if self.admin_username.is_some() != self.admin_password.is_some() {
            return Err(ConfigError::InvalidSettings(
                "adminUsername and adminPassword must be set together".to_string(),
            ));
        }
        self.runtime().validate()
    }

    /// The runtime-mutable subset.
    pub fn runtime(&self) -> RuntimeSettings {
        RuntimeSettings {
            allow_partial_mapping: self.allow_partial_mapping,
            tie_break: self.tie_break,
            max_request_log_count: self.max_request_log_count,
            global_processing_delay: self.global_processing_delay,
            fault_injection_enabled: self.fault_injection.enabled,
            proxy_and_record: self.proxy_and_record.clone(),
        }
    }
}

/// Settings served and changed through `GET/PUT /__admin/settings`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    #[serde(default)]
    pub allow_partial_mapping: bool,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub max_request_log_count: Option<usize>,
    #[serde(default)]
    pub global_processing_delay: Option<u64>,
    #[serde(default = "default_true")]
    pub fault_injection_enabled: bool,
    #[serde(default)]
    pub proxy_and_record: Option<ProxyAndRecordSettings>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        ServerSettings::default().runtime()
    }
}

impl RuntimeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(proxy) = &self.proxy_and_record {
            let uri: hyper::Uri = proxy.url.parse().map_err(|_| {
                ConfigError::InvalidSettings(format!("invalid proxy url '{}'", proxy.url))
            })?;
            if !matches!(uri.scheme_str(), Some("http") | Some("https")) || uri.host().is_none() {
                return Err(ConfigError::InvalidSettings(format!(
                    "proxy url '{}' must be an absolute http(s) url",
                    proxy.url
                )));
            }
            StatusCodePattern::parse(&proxy.save_mapping_for_status_code_pattern)?;
        }
        Ok(())
    }

    /// Apply a partial JSON update: fields present in `patch` replace current
    /// values, `null` clears optional ones.
    pub fn apply_patch(&self, patch: Value) -> Result<Self, ConfigError> {
        let Value::Object(patch) = patch else {
            return Err(ConfigError::InvalidSettings(
                "settings update must be a JSON object".to_string(),
            ));
        };
        let mut current = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut current {
            fields.extend(patch);
        }
        let updated: RuntimeSettings = serde_json::from_value(current)?;
        updated.validate()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_settings_yaml() {
        let yaml = r#"
urls:
  - http://0.0.0.0:9091
allowPartialMapping: true
tieBreak: firstRegistered
maxRequestLogCount: 100
faultInjection:
  seed: 42
proxyAndRecord:
  url: http://upstream.local:8080
  saveMapping: true
  saveMappingForStatusCodePattern: 2xx
"#;
        let settings: ServerSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.endpoints().unwrap()[0].port, 9091);
        assert!(settings.allow_partial_mapping);
        assert_eq!(settings.tie_break, TieBreak::FirstRegistered);
        assert!(settings.fault_injection.enabled);
        assert_eq!(settings.fault_injection.seed, Some(42));
        assert!(settings.start_admin_interface);
        assert_eq!(settings.shutdown_timeout_ms, 5000);
        let proxy = settings.proxy_and_record.as_ref().unwrap();
        assert!(proxy.save_mapping);
        assert!(!proxy.save_mapping_to_file);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_endpoint_is_dynamic() {
        let endpoints = ServerSettings::default().endpoints().unwrap();
        assert_eq!(endpoints, vec![Endpoint::new(Scheme::Http, "127.0.0.1", 0)]);
    }

    #[test]
    fn test_validate_requires_tls_for_https() {
        let settings = ServerSettings {
            use_ssl: true,
            port: Some(8443),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_validate_admin_credentials_pair() {
        let settings = ServerSettings {
            admin_username: Some("admin".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_status_pattern() {
        let mut proxy = ProxyAndRecordSettings::new("http://localhost:1");
        proxy.save_mapping_for_status_code_pattern = "2xz".to_string();
        let settings = ServerSettings {
            proxy_and_record: Some(proxy),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_file_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"port": 9095, "readStaticMappings": true}}"#).unwrap();
        let settings = ServerSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.port, Some(9095));
        assert!(settings.read_static_mappings);
    }

    #[test]
    fn test_runtime_patch() {
        let runtime = RuntimeSettings::default();
        let updated = runtime
            .apply_patch(json!({"allowPartialMapping": true, "globalProcessingDelay": 10}))
            .unwrap();
        assert!(updated.allow_partial_mapping);
        assert_eq!(updated.global_processing_delay, Some(10));
        assert!(updated.fault_injection_enabled);

        let cleared = updated
            .apply_patch(json!({"globalProcessingDelay": null}))
            .unwrap();
        assert_eq!(cleared.global_processing_delay, None);
        assert!(cleared.allow_partial_mapping);

        assert!(runtime.apply_patch(json!([1, 2])).is_err());
        assert!(runtime.apply_patch(json!({"tieBreak": "random"})).is_err());
    }
}
