//! Connect strategies: how a connection is obtained and what comes next.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use remoting_protocol::ProtocolConnectionConfiguration;
use tracing::debug;

use crate::callback::CallbackHandler;
use crate::connect::connect_sync;
use crate::error::{Error, HandlerError, Result};
use crate::transport::{ConnectionHandle, Endpoint, TlsContext};

/// Invoked on every freshly established connection before it is published.
///
/// Returning an error rejects the connection: it is closed and the error is
/// returned from the `connect()` call that produced it.
pub trait ConnectionOpenHandler: Send + Sync {
	fn connection_opened<'a>(&'a self, connection: &'a ConnectionHandle) -> BoxFuture<'a, std::result::Result<(), HandlerError>>;
}

/// Stored configuration for a strategy that reconnects on every attempt.
#[derive(Clone)]
pub struct RetryableConnect {
	pub config: Arc<ProtocolConnectionConfiguration>,
	pub endpoint: Arc<dyn Endpoint>,
	pub callbacks: Option<CallbackHandler>,
	pub tls: Option<TlsContext>,
	pub open_handler: Option<Arc<dyn ConnectionOpenHandler>>,
}

impl RetryableConnect {
	pub fn new(config: ProtocolConnectionConfiguration, endpoint: Arc<dyn Endpoint>) -> Self {
		Self {
			config: Arc::new(config),
			endpoint,
			callbacks: None,
			tls: None,
			open_handler: None,
		}
	}

	pub fn with_callbacks(mut self, callbacks: CallbackHandler) -> Self {
		self.callbacks = Some(callbacks);
		self
	}

	pub fn with_tls(mut self, tls: TlsContext) -> Self {
		self.tls = Some(tls);
		self
	}

	pub fn with_open_handler(mut self, handler: Arc<dyn ConnectionOpenHandler>) -> Self {
		self.open_handler = Some(handler);
		self
	}
}

/// One connection-attempt policy.
#[derive(Clone)]
pub enum ConnectTask {
	/// Connects afresh every time and is always willing to try again.
	Retryable(RetryableConnect),
	/// Hands out a pre-established connection exactly once.
	FixedOnce {
		connection: ConnectionHandle,
		open_handler: Option<Arc<dyn ConnectionOpenHandler>>,
	},
	/// Absorbing state: every attempt fails.
	Terminal,
}

impl fmt::Debug for ConnectTask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectTask::Retryable(retry) => f.debug_tuple("Retryable").field(&retry.config.uri.as_str()).finish(),
			ConnectTask::FixedOnce { .. } => f.write_str("FixedOnce"),
			ConnectTask::Terminal => f.write_str("Terminal"),
		}
	}
}

impl ConnectTask {
	pub fn fixed(connection: ConnectionHandle) -> Self {
		ConnectTask::FixedOnce {
			connection,
			open_handler: None,
		}
	}

	/// Obtains a raw connection; `None` means the strategy has none to give.
	pub async fn connect(&self) -> Result<Option<ConnectionHandle>> {
		match self {
			ConnectTask::Retryable(retry) => {
				let connection = connect_sync(&retry.config, retry.endpoint.as_ref(), retry.callbacks.clone(), retry.tls.clone()).await?;
				Ok(Some(connection))
			}
			ConnectTask::FixedOnce { connection, .. } => Ok(Some(Arc::clone(connection))),
			ConnectTask::Terminal => Err(Error::ChannelClosed),
		}
	}

	/// Runs this strategy's open handler, if it has one.
	pub async fn connection_opened(&self, connection: &ConnectionHandle) -> Result<()> {
		let handler = match self {
			ConnectTask::Retryable(retry) => retry.open_handler.as_ref(),
			ConnectTask::FixedOnce { open_handler, .. } => open_handler.as_ref(),
			ConnectTask::Terminal => None,
		};
		match handler {
			Some(handler) => handler.connection_opened(connection).await.map_err(Error::OpenHandler),
			None => Ok(()),
		}
	}

	/// The strategy to use once the connection it produced has closed.
	pub fn connection_closed(&self) -> ConnectTask {
		match self {
			ConnectTask::Retryable(_) => self.clone(),
			ConnectTask::FixedOnce { .. } => ConnectTask::Terminal,
			ConnectTask::Terminal => ConnectTask::Terminal,
		}
	}

	/// Strategy-specific cleanup on manager shutdown.
	pub fn shutdown(&self) {
		debug!(target = "remoting.manager", task = ?self, "connect task shut down");
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, ConnectTask::Terminal)
	}
}
