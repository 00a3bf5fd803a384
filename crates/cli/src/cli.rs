use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "remoting")]
#[command(about = "Inspect remoting management connection settings")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Show the authentication options negotiated for a host
	#[command(alias = "auth")]
	AuthOptions {
		host: String,
		/// SASL property override (repeatable)
		#[arg(short = 'p', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
		properties: Vec<(String, String)>,
	},

	/// Validate a connection configuration file and print the effective settings
	Config {
		file: PathBuf,
	},
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
	match raw.split_once('=') {
		Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
		_ => Err(format!("expected KEY=VALUE, got '{raw}'")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn property_splits_on_first_equals() {
		assert_eq!(parse_property("realm=Mgmt=1").unwrap(), ("realm".to_string(), "Mgmt=1".to_string()));
		assert_eq!(parse_property("empty=").unwrap(), ("empty".to_string(), String::new()));
		assert!(parse_property("novalue").is_err());
		assert!(parse_property("=x").is_err());
	}

	#[test]
	fn parses_repeated_properties() {
		let cli = Cli::try_parse_from(["remoting", "-vv", "auth-options", "localhost", "-p", "a=1", "--property", "b=2"]).unwrap();
		assert_eq!(cli.verbose, 2);
		match cli.command {
			Commands::AuthOptions { host, properties } => {
				assert_eq!(host, "localhost");
				assert_eq!(properties.len(), 2);
			}
			other => panic!("unexpected command {other:?}"),
		}
	}
}
