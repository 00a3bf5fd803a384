use std::sync::Arc;

use remoting_protocol::{OptionMap, ProtocolConnectionConfiguration};
use remoting_runtime::transport::{ConnectionHandle, Endpoint};
use remoting_runtime::{ConnectTask, ConnectionManager, MessageHandler, ProtocolChannel, Result, RetryableConnect};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::register::{ReconnectPolicy, spawn_reconnect};

/// Opens management channels over a managed connection.
///
/// Cloning yields another handle to the same underlying manager.
#[derive(Clone)]
pub struct ManagementClient {
	manager: ConnectionManager,
	channel_options: OptionMap,
}

impl ManagementClient {
	/// A client that reconnects through `endpoint` whenever the connection is gone.
	pub fn new(config: ProtocolConnectionConfiguration, endpoint: Arc<dyn Endpoint>) -> Self {
		Self::from_retryable(RetryableConnect::new(config, endpoint))
	}

	/// Like [`new`](Self::new), keeping the callbacks, TLS context and open handler set on `retry`.
	pub fn from_retryable(retry: RetryableConnect) -> Self {
		let channel_options = retry.config.options.clone();
		Self {
			manager: ConnectionManager::new(ConnectTask::Retryable(retry)),
			channel_options,
		}
	}

	/// A client over an already established connection. Once it closes,
	/// every later channel open fails.
	pub fn with_connection(connection: ConnectionHandle) -> Self {
		Self {
			manager: ConnectionManager::for_connection(connection, None),
			channel_options: OptionMap::default(),
		}
	}

	pub fn manager(&self) -> &ConnectionManager {
		&self.manager
	}

	/// Connects if needed, opens `name` and starts its receive loop.
	///
	/// Nothing is retried here: connect and open failures are returned to
	/// the caller as they occurred.
	pub async fn open_channel<H: MessageHandler>(&self, name: &str, handler: H) -> Result<ProtocolChannel<H>> {
		let connection = self.manager.connect().await?;
		let channel = match connection.open_channel(name, &self.channel_options).await {
			Ok(channel) => channel,
			Err(err) => {
				warn!(target = "remoting.client", channel = name, error = %err, "channel open failed");
				return Err(err.into());
			}
		};
		debug!(target = "remoting.client", channel = name, "channel opened");

		let channel = ProtocolChannel::new(channel, handler);
		channel.start_receiving()?;
		Ok(channel)
	}

	/// Reconnects in the background whenever the connection is lost.
	///
	/// Each loss starts a retry loop driven by `policy` that runs until a
	/// connection is back. The returned task ends on [`shutdown`](Self::shutdown),
	/// when the client is dropped, or when a reconnect fails for good.
	/// Must be called from within a tokio runtime.
	pub fn reconnect_on_close(&self, policy: Arc<dyn ReconnectPolicy>) -> JoinHandle<()> {
		spawn_reconnect(&self.manager, policy)
	}

	pub fn is_connected(&self) -> bool {
		self.manager.is_connected()
	}

	/// Shuts the manager down and closes its connection. Idempotent.
	pub fn shutdown(&self) {
		self.manager.shutdown();
	}
}
