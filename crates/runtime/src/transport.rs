//! Collaborator interfaces supplied by the surrounding remoting layer.
//!
//! Nothing in this crate frames bytes or runs a handshake. An [`Endpoint`]
//! produces [`Connection`]s, a connection opens named [`Channel`]s, and a
//! channel delivers [`ReceiveEvent`]s to one registered callback at a time.

use std::any::Any;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use remoting_protocol::{InboundMessage, OptionMap};
use thiserror::Error;
use url::Url;

use crate::callback::CallbackHandler;

/// Shared handle to an established connection.
pub type ConnectionHandle = Arc<dyn Connection>;

/// Shared handle to an open channel.
pub type ChannelHandle = Arc<dyn Channel>;

/// Opaque TLS material handed through to the endpoint untouched.
pub type TlsContext = Arc<dyn Any + Send + Sync>;

/// Invoked once when a connection closes, with the error that closed it, if any.
pub type CloseHandler = Box<dyn FnOnce(Option<&TransportError>) + Send>;

/// One-shot receive registration on a channel.
pub type ReceiveCallback = Box<dyn FnOnce(ChannelHandle, ReceiveEvent) + Send>;

/// Failures reported by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("connection closed")]
	Closed,

	#[error("authentication failed: {0}")]
	Authentication(String),

	#[error("{0}")]
	Other(String),
}

/// What a channel delivers to its registered receive callback.
#[derive(Debug)]
pub enum ReceiveEvent {
	Message(InboundMessage),
	/// The peer shut down its sending side, or the channel was closed.
	End,
	Error(TransportError),
}

/// Local endpoint able to open connections to a remote peer.
pub trait Endpoint: Send + Sync {
	/// Starts connecting to `target`, identifying the local side as `endpoint_name`.
	///
	/// The returned future is only ever polled or dropped; nothing cancels
	/// the attempt explicitly. `callbacks` must be invoked for every
	/// credential the authentication exchange needs.
	fn connect(
		&self,
		endpoint_name: &str,
		target: &Url,
		options: &OptionMap,
		callbacks: Option<CallbackHandler>,
		tls: Option<TlsContext>,
	) -> BoxFuture<'static, Result<ConnectionHandle, TransportError>>;
}

/// An established session hosting any number of named channels.
pub trait Connection: Send + Sync {
	/// Registers `handler` to run when this connection closes.
	///
	/// Implementations run the handler immediately if the connection is
	/// already closed.
	fn add_close_handler(&self, handler: CloseHandler);

	fn open_channel(&self, name: &str, options: &OptionMap) -> BoxFuture<'_, Result<ChannelHandle, TransportError>>;

	/// Closes the connection and every channel on it.
	fn close(&self) -> Result<(), TransportError>;
}

/// A named, bidirectional message stream multiplexed over a connection.
pub trait Channel: Send + Sync {
	fn name(&self) -> &str;

	/// Registers `callback` for the next event on this channel.
	fn receive_message(&self, callback: ReceiveCallback);

	/// Tells the peer nothing more will be written.
	fn write_shutdown(&self) -> Result<(), TransportError>;

	fn close(&self) -> Result<(), TransportError>;
}

/// Whether two handles refer to the same underlying connection.
pub fn same_connection(a: &ConnectionHandle, b: &ConnectionHandle) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
