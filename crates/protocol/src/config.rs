//! Connection configuration loaded from JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::options::OptionMap;

/// Default budget for a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default local endpoint name announced to the peer.
pub const DEFAULT_ENDPOINT_NAME: &str = "management-client";

/// Environment variable overriding [`ProtocolConnectionConfiguration::connect_timeout_ms`].
pub const CONNECT_TIMEOUT_ENV: &str = "REMOTING_CONNECT_TIMEOUT_MS";

/// URI schemes a management connection can be established over.
pub const SUPPORTED_SCHEMES: &[&str] = &["remote", "remote+http", "http-remoting", "remote+https", "https-remoting"];

/// Errors produced while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read configuration {path}: {source}")]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("malformed configuration: {0}")]
	Parse(#[from] serde_json::Error),

	#[error("unsupported uri scheme '{0}'")]
	UnsupportedScheme(String),

	#[error("uri '{0}' has no host")]
	MissingHost(String),

	#[error("connect timeout must be greater than zero")]
	ZeroTimeout,

	#[error("invalid value for {key}: {value}")]
	InvalidOverride { key: &'static str, value: String },
}

/// Everything needed to establish one management connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolConnectionConfiguration {
	pub uri: Url,
	#[serde(default = "default_endpoint_name")]
	pub endpoint_name: String,
	#[serde(default = "default_connect_timeout_ms")]
	pub connect_timeout_ms: u64,
	#[serde(default)]
	pub options: OptionMap,
	/// Caller-supplied SASL properties; these win over negotiated defaults.
	#[serde(default)]
	pub sasl_properties: BTreeMap<String, String>,
}

fn default_endpoint_name() -> String {
	DEFAULT_ENDPOINT_NAME.to_string()
}

fn default_connect_timeout_ms() -> u64 {
	DEFAULT_CONNECT_TIMEOUT_MS
}

impl ProtocolConnectionConfiguration {
	/// Creates a configuration for `uri` with default settings.
	pub fn new(uri: Url) -> Self {
		Self {
			uri,
			endpoint_name: default_endpoint_name(),
			connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
			options: OptionMap::default(),
			sasl_properties: BTreeMap::new(),
		}
	}

	/// Parses and validates a configuration from JSON text.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a configuration file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.display().to_string(),
			source,
		})?;
		Self::from_json_str(&content)
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn with_sasl_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.sasl_properties.insert(key.into(), value.into());
		self
	}

	/// Applies overrides from the process environment.
	pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
		self.with_overrides_from(|key| std::env::var(key).ok())
	}

	/// Applies overrides looked up through `lookup`.
	pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		if let Some(raw) = lookup(CONNECT_TIMEOUT_ENV) {
			self.connect_timeout_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidOverride {
				key: CONNECT_TIMEOUT_ENV,
				value: raw.clone(),
			})?;
		}
		self.validate()?;
		Ok(self)
	}

	/// Checks scheme, host and timeout.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !SUPPORTED_SCHEMES.contains(&self.uri.scheme()) {
			return Err(ConfigError::UnsupportedScheme(self.uri.scheme().to_string()));
		}
		if self.host().is_none() {
			return Err(ConfigError::MissingHost(self.uri.to_string()));
		}
		if self.connect_timeout_ms == 0 {
			return Err(ConfigError::ZeroTimeout);
		}
		Ok(())
	}

	/// Host component of the target URI, without IPv6 brackets.
	pub fn host(&self) -> Option<&str> {
		self.uri
			.host_str()
			.map(|host| host.trim_start_matches('[').trim_end_matches(']'))
			.filter(|host| !host.is_empty())
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}

	/// Whether the scheme itself implies TLS.
	pub fn uses_tls(&self) -> bool {
		self.options.ssl_enabled || matches!(self.uri.scheme(), "remote+https" | "https-remoting")
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn parses_minimal_configuration_with_defaults() {
		let config = ProtocolConnectionConfiguration::from_json_str(r#"{"uri": "remote://127.0.0.1:9999"}"#).unwrap();
		assert_eq!(config.endpoint_name, DEFAULT_ENDPOINT_NAME);
		assert_eq!(config.connect_timeout(), Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS));
		assert_eq!(config.host(), Some("127.0.0.1"));
		assert!(!config.uses_tls());
	}

	#[test]
	fn rejects_unsupported_scheme() {
		let err = ProtocolConnectionConfiguration::from_json_str(r#"{"uri": "ftp://example.com"}"#).unwrap_err();
		assert!(matches!(err, ConfigError::UnsupportedScheme(scheme) if scheme == "ftp"));
	}

	#[test]
	fn rejects_zero_timeout() {
		let err = ProtocolConnectionConfiguration::from_json_str(r#"{"uri": "remote://localhost:9999", "connectTimeoutMs": 0}"#).unwrap_err();
		assert!(matches!(err, ConfigError::ZeroTimeout));
	}

	#[test]
	fn ipv6_host_is_unbracketed() {
		let config = ProtocolConnectionConfiguration::new(Url::parse("remote+https://[::1]:9993").unwrap());
		assert_eq!(config.host(), Some("::1"));
		assert!(config.uses_tls());
	}

	#[test]
	fn timeout_override_is_applied_and_checked() {
		let config = ProtocolConnectionConfiguration::new(Url::parse("remote://localhost:9999").unwrap());

		let overridden = config
			.clone()
			.with_overrides_from(|key| (key == CONNECT_TIMEOUT_ENV).then(|| "250".to_string()))
			.unwrap();
		assert_eq!(overridden.connect_timeout(), Duration::from_millis(250));

		let err = config.with_overrides_from(|_| Some("soon".to_string())).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidOverride { .. }));
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"uri": "remote+http://mgmt.example.com:9990", "saslProperties": {{"realm": "ManagementRealm"}}}}"#
		)
		.unwrap();

		let config = ProtocolConnectionConfiguration::load(file.path()).unwrap();
		assert_eq!(config.host(), Some("mgmt.example.com"));
		assert_eq!(config.sasl_properties["realm"], "ManagementRealm");
	}

	#[test]
	fn load_reports_missing_file() {
		let err = ProtocolConnectionConfiguration::load(Path::new("/nonexistent/remoting.json")).unwrap_err();
		assert!(matches!(err, ConfigError::Read { .. }));
	}
}
