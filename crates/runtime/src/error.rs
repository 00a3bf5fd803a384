//! Error types for connection and channel lifecycle operations.

use std::time::Duration;

use remoting_protocol::ConfigError;
use thiserror::Error;

use crate::callback::CallbackError;
use crate::transport::TransportError;

/// Boxed error raised by a caller-supplied connection open handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by connect, channel and manager operations.
#[derive(Debug, Error)]
pub enum Error {
	/// The think-time aware wait budget ran out with no result.
	#[error("connect timed out after {}ms", .0.as_millis())]
	ConnectTimeout(Duration),

	/// The transport reported a definite failure.
	#[error("failed to connect to {target}: {source}")]
	ConnectFailed {
		target: String,
		#[source]
		source: TransportError,
	},

	/// The manager or strategy is shut down or terminal.
	#[error("channel closed")]
	ChannelClosed,

	/// A lifecycle method was called out of order.
	#[error("illegal state: {0}")]
	IllegalState(&'static str),

	/// The caller's credential callback failed; returned as-is.
	#[error(transparent)]
	Callback(#[from] CallbackError),

	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The connection open handler rejected a new connection.
	#[error("connection open handler failed: {0}")]
	OpenHandler(#[source] HandlerError),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl Error {
	/// Returns `true` if this is a connect timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::ConnectTimeout(_))
	}

	/// Returns `true` when retrying cannot help.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Error::ChannelClosed | Error::Callback(_) | Error::IllegalState(_) | Error::Config(_))
	}
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure while closing a secondary resource during cleanup.
///
/// Only ever logged by [`crate::close`]; never returned to callers.
#[derive(Debug, Error)]
#[error("failed to close {resource}: {source}")]
pub struct SecondaryCloseError {
	pub resource: String,
	#[source]
	pub source: TransportError,
}
