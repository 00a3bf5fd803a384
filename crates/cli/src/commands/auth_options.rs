use std::collections::BTreeMap;

use anyhow::Result;
use remoting::AuthOptions;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthReport<'a> {
	host: &'a str,
	locality: &'static str,
	allowed_mechanisms: Vec<&'static str>,
	disallowed_mechanisms: &'a [String],
	sasl_properties: &'a BTreeMap<String, String>,
}

pub async fn execute(host: &str, overrides: BTreeMap<String, String>) -> Result<()> {
	info!(target = "remoting", %host, overrides = overrides.len(), "negotiating authentication options");
	let auth = AuthOptions::negotiate(host, &overrides).await;

	super::print_json(&AuthReport {
		host,
		locality: auth.locality.as_str(),
		allowed_mechanisms: auth.allowed_mechanisms(),
		disallowed_mechanisms: &auth.disallowed_mechanisms,
		sasl_properties: &auth.sasl_properties,
	})
}
