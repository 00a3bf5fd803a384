//! Client side of remoting management sessions.
//!
//! [`ManagementClient`] owns a connection manager and opens receive-looping
//! channels over whatever connection the manager currently holds.
//! [`register`] retries connecting within a caller-chosen budget.
//!
//! # Example
//!
//! ```ignore
//! use remoting::{ManagementClient, ProtocolConnectionConfiguration};
//!
//! let config = ProtocolConnectionConfiguration::load(path)?.with_env_overrides()?;
//! let client = ManagementClient::new(config, endpoint);
//! let channel = client.open_channel("management", handler).await?;
//! // ...
//! channel.stop_receiving().await?;
//! client.shutdown();
//! ```

mod client;
mod register;

pub use client::ManagementClient;
pub use register::{ReconnectPolicy, register};
pub use remoting_protocol::{ConfigError, InboundMessage, OptionMap, ProtocolConnectionConfiguration};
pub use remoting_runtime::{
	AuthOptions, CallbackError, CallbackHandler, ConnectTask, ConnectionManager, ConnectionOpenHandler, Credential, Endpoint, Error, Locality,
	MessageHandler, ProtocolChannel, Result, RetryableConnect, TlsContext, TransportError,
};

/// Protocol types, re-exported for callers implementing a transport.
pub mod protocol {
	pub use remoting_protocol::*;
}

/// Transport traits and handles.
pub mod transport {
	pub use remoting_runtime::transport::*;
}
