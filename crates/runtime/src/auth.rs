//! SASL mechanism selection based on where the destination lives.
//!
//! The local-user mechanism lets a client on the same host authenticate
//! without credentials, so it is only ever offered when the destination is
//! this machine. Anything that prevents us from proving locality (DNS
//! failure, an address no local interface owns) is treated as remote.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use remoting_protocol::OptionMap;
use remoting_protocol::sasl::{KNOWN_MECHANISMS, LOCAL_USER_MECHANISM, LOCAL_USER_QUIET_AUTH};
use tracing::debug;

/// Where a destination address lives relative to this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
	Loopback,
	/// Bound to one of this host's network interfaces.
	LocalInterface,
	Remote,
	/// Resolution failed; handled as [`Locality::Remote`].
	Unresolved,
}

impl Locality {
	pub fn is_local(self) -> bool {
		matches!(self, Locality::Loopback | Locality::LocalInterface)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Locality::Loopback => "loopback",
			Locality::LocalInterface => "local-interface",
			Locality::Remote => "remote",
			Locality::Unresolved => "unresolved",
		}
	}
}

/// Classifies an already resolved address.
pub fn classify_address(address: IpAddr) -> Locality {
	if address.is_loopback() {
		Locality::Loopback
	} else if is_bound_locally(address) {
		Locality::LocalInterface
	} else {
		Locality::Remote
	}
}

// Binding succeeds only for addresses owned by a local interface.
fn is_bound_locally(address: IpAddr) -> bool {
	if address.is_unspecified() || address.is_multicast() {
		return false;
	}
	UdpSocket::bind(SocketAddr::new(address, 0)).is_ok()
}

/// Resolves `host` and classifies the first address it maps to.
pub async fn resolve_locality(host: &str) -> Locality {
	if let Ok(address) = host.parse::<IpAddr>() {
		return classify_address(address);
	}

	match tokio::net::lookup_host((host, 0)).await {
		Ok(mut addresses) => match addresses.next() {
			Some(address) => classify_address(address.ip()),
			None => Locality::Unresolved,
		},
		Err(err) => {
			debug!(target = "remoting.auth", %host, error = %err, "failed to resolve destination; treating as remote");
			Locality::Unresolved
		}
	}
}

/// Authentication settings derived for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOptions {
	pub locality: Locality,
	pub sasl_properties: BTreeMap<String, String>,
	pub disallowed_mechanisms: Vec<String>,
}

impl AuthOptions {
	/// Builds options for a destination of known locality.
	///
	/// Starts from the quiet local-auth baseline, applies `overrides`
	/// (caller wins), then excludes local-user if the destination is remote.
	pub fn for_locality(locality: Locality, overrides: &BTreeMap<String, String>) -> Self {
		let mut sasl_properties = BTreeMap::from([(LOCAL_USER_QUIET_AUTH.to_string(), "true".to_string())]);
		sasl_properties.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

		let disallowed_mechanisms = if locality.is_local() {
			Vec::new()
		} else {
			vec![LOCAL_USER_MECHANISM.to_string()]
		};

		Self {
			locality,
			sasl_properties,
			disallowed_mechanisms,
		}
	}

	/// Resolves `host` and derives the options for it.
	pub async fn negotiate(host: &str, overrides: &BTreeMap<String, String>) -> Self {
		let locality = resolve_locality(host).await;
		debug!(target = "remoting.auth", %host, locality = locality.as_str(), "negotiated authentication options");
		Self::for_locality(locality, overrides)
	}

	pub fn is_allowed(&self, mechanism: &str) -> bool {
		!self.disallowed_mechanisms.iter().any(|m| m.eq_ignore_ascii_case(mechanism))
	}

	/// Known mechanisms this attempt may use.
	pub fn allowed_mechanisms(&self) -> Vec<&'static str> {
		KNOWN_MECHANISMS.iter().copied().filter(|m| self.is_allowed(m)).collect()
	}

	/// Layers these settings over the configured transport options.
	pub fn apply_to(&self, options: &OptionMap) -> OptionMap {
		options.with_sasl(&self.sasl_properties, &self.disallowed_mechanisms)
	}
}
