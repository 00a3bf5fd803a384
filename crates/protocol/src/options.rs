//! Transport option map handed to the endpoint on every connect attempt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Options applied to a connect attempt or a channel open.
///
/// Mirrors the handful of options the remoting endpoint actually consults:
/// TLS enablement, SASL policy, disallowed mechanisms and SASL properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionMap {
	#[serde(default)]
	pub ssl_enabled: bool,
	#[serde(default)]
	pub ssl_starttls: bool,
	/// When `true` the ANONYMOUS mechanism is refused.
	#[serde(default)]
	pub sasl_policy_noanonymous: bool,
	#[serde(default)]
	pub sasl_disallowed_mechanisms: Vec<String>,
	#[serde(default)]
	pub sasl_properties: BTreeMap<String, String>,
}

impl OptionMap {
	/// Returns a copy with the given SASL properties and disallowed
	/// mechanisms layered on top of this map.
	///
	/// Properties in `properties` win on key collision. Disallowed mechanisms
	/// are unioned, keeping first-seen order.
	pub fn with_sasl(&self, properties: &BTreeMap<String, String>, disallowed: &[String]) -> Self {
		let mut merged = self.clone();
		merged.sasl_properties.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
		for mechanism in disallowed {
			if !merged.sasl_disallowed_mechanisms.iter().any(|m| m.eq_ignore_ascii_case(mechanism)) {
				merged.sasl_disallowed_mechanisms.push(mechanism.clone());
			}
		}
		merged
	}

	/// Returns `true` when `mechanism` is not excluded by this map.
	pub fn permits_mechanism(&self, mechanism: &str) -> bool {
		if self.sasl_policy_noanonymous && mechanism.eq_ignore_ascii_case("ANONYMOUS") {
			return false;
		}
		!self.sasl_disallowed_mechanisms.iter().any(|m| m.eq_ignore_ascii_case(mechanism))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn with_sasl_prefers_new_properties_and_dedups_mechanisms() {
		let mut base = OptionMap::default();
		base.sasl_properties.insert("a".into(), "base".into());
		base.sasl_disallowed_mechanisms.push("PLAIN".into());

		let overrides = BTreeMap::from([("a".to_string(), "override".to_string()), ("b".to_string(), "new".to_string())]);
		let merged = base.with_sasl(&overrides, &["plain".to_string(), "JBOSS-LOCAL-USER".to_string()]);

		assert_eq!(merged.sasl_properties["a"], "override");
		assert_eq!(merged.sasl_properties["b"], "new");
		assert_eq!(merged.sasl_disallowed_mechanisms, vec!["PLAIN", "JBOSS-LOCAL-USER"]);
		assert_eq!(base.sasl_properties["a"], "base");
	}

	#[test]
	fn noanonymous_policy_blocks_anonymous() {
		let options = OptionMap {
			sasl_policy_noanonymous: true,
			..Default::default()
		};
		assert!(!options.permits_mechanism("ANONYMOUS"));
		assert!(options.permits_mechanism("DIGEST-MD5"));
	}

	#[test]
	fn deserializes_with_defaults() {
		let options: OptionMap = serde_json::from_str(r#"{"sslEnabled": true}"#).unwrap();
		assert!(options.ssl_enabled);
		assert!(options.sasl_disallowed_mechanisms.is_empty());
	}

	#[test]
	fn default_matches_empty_document() {
		let options: OptionMap = serde_json::from_str("{}").unwrap();
		assert_eq!(options, OptionMap::default());
		assert!(!options.ssl_enabled && !options.ssl_starttls && !options.sasl_policy_noanonymous);
		assert!(options.sasl_properties.is_empty());
	}
}
