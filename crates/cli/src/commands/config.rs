use std::path::Path;

use anyhow::{Context, Result};
use remoting::ProtocolConnectionConfiguration;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EffectiveConfig<'a> {
	#[serde(flatten)]
	config: &'a ProtocolConnectionConfiguration,
	host: &'a str,
	uses_tls: bool,
}

pub fn execute(file: &Path) -> Result<()> {
	let config = ProtocolConnectionConfiguration::load(file)
		.and_then(ProtocolConnectionConfiguration::with_env_overrides)
		.with_context(|| format!("invalid configuration {}", file.display()))?;
	info!(target = "remoting", uri = %config.uri, "configuration valid");

	super::print_json(&EffectiveConfig {
		config: &config,
		host: config.host().unwrap_or_default(),
		uses_tls: config.uses_tls(),
	})
}
