mod auth_options;
mod config;

use anyhow::Result;

use crate::cli::Commands;

pub async fn dispatch(command: Commands) -> Result<()> {
	match command {
		Commands::AuthOptions { host, properties } => auth_options::execute(&host, properties.into_iter().collect()).await,
		Commands::Config { file } => config::execute(&file),
	}
}

/// Writes `value` to stdout as pretty JSON.
fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
