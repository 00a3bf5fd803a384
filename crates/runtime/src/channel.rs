//! Receive loop and graceful shutdown for a single channel.
//!
//! Exactly one receive registration is armed at a time. On every inbound
//! message the next registration is armed *before* the handler runs, so a
//! slow handler never leaves the channel deaf. Once [`ProtocolChannel::stop_receiving`]
//! has been called, the channel is closed after the handler for the
//! message in flight returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use remoting_protocol::InboundMessage;
use tracing::{debug, trace, warn};

use crate::close::{safe_close, safe_close_channel};
use crate::error::{Error, Result};
use crate::transport::{ChannelHandle, ReceiveEvent, TransportError};

/// Consumer of the messages arriving on a [`ProtocolChannel`].
pub trait MessageHandler: Send + Sync + 'static {
	/// Handles one message. The next receive is already armed when this runs.
	fn handle_message(&self, channel: &ChannelHandle, message: InboundMessage) -> std::result::Result<(), TransportError>;

	/// The peer will send nothing more; the channel is closed afterwards.
	fn handle_end(&self, _channel: &ChannelHandle) {}

	/// The transport failed; the channel is closed afterwards.
	fn handle_error(&self, channel: &ChannelHandle, error: &TransportError) {
		warn!(target = "remoting.channel", channel = channel.name(), error = %error, "channel receive failed");
	}

	/// Resolves once outstanding work allows the channel to close.
	///
	/// [`ProtocolChannel::stop_receiving`] waits on this after signalling
	/// shutdown to the peer. The default is immediately closable.
	fn await_closable(&self) -> BoxFuture<'_, ()> {
		Box::pin(async {})
	}
}

struct ChannelInner<H> {
	channel: ChannelHandle,
	handler: H,
	started: AtomicBool,
	stop_requested: AtomicBool,
}

/// A named channel with a self re-arming receive loop.
pub struct ProtocolChannel<H> {
	inner: Arc<ChannelInner<H>>,
}

impl<H> Clone for ProtocolChannel<H> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<H: MessageHandler> ProtocolChannel<H> {
	pub fn new(channel: ChannelHandle, handler: H) -> Self {
		Self {
			inner: Arc::new(ChannelInner {
				channel,
				handler,
				started: AtomicBool::new(false),
				stop_requested: AtomicBool::new(false),
			}),
		}
	}

	pub fn name(&self) -> &str {
		self.inner.channel.name()
	}

	pub fn is_stop_requested(&self) -> bool {
		self.inner.stop_requested.load(Ordering::SeqCst)
	}

	/// Arms the receive loop.
	///
	/// # Errors
	///
	/// [`Error::IllegalState`] if receiving was already started.
	pub fn start_receiving(&self) -> Result<()> {
		if self.inner.started.swap(true, Ordering::SeqCst) {
			return Err(Error::IllegalState("receiving already started"));
		}
		debug!(target = "remoting.channel", channel = self.name(), "receiving");
		ChannelInner::arm(&self.inner);
		Ok(())
	}

	/// Requests shutdown: tells the peer, then waits until the handler
	/// reports the channel closable.
	///
	/// The channel itself is closed after the next message is handled, or
	/// when the peer ends the stream.
	///
	/// # Errors
	///
	/// [`Error::IllegalState`] if a stop was already requested.
	pub async fn stop_receiving(&self) -> Result<()> {
		if self.inner.stop_requested.swap(true, Ordering::SeqCst) {
			return Err(Error::IllegalState("stop already requested"));
		}
		debug!(target = "remoting.channel", channel = self.name(), "stop requested");
		let channel = Arc::clone(&self.inner.channel);
		safe_close(format!("channel '{}' (write side)", channel.name()), || channel.write_shutdown());
		self.inner.handler.await_closable().await;
		Ok(())
	}

	/// Closes the channel, logging any failure.
	pub fn close(&self) {
		safe_close_channel(&self.inner.channel);
	}
}

impl<H: MessageHandler> ChannelInner<H> {
	fn arm(inner: &Arc<Self>) {
		let next = Arc::clone(inner);
		inner.channel.receive_message(Box::new(move |channel, event| next.dispatch(channel, event)));
	}

	fn dispatch(self: Arc<Self>, channel: ChannelHandle, event: ReceiveEvent) {
		match event {
			ReceiveEvent::Message(message) => {
				trace!(target = "remoting.channel", channel = channel.name(), len = message.len(), "message received");
				Self::arm(&self);
				if let Err(err) = self.handler.handle_message(&channel, message) {
					warn!(target = "remoting.channel", channel = channel.name(), error = %err, "message handler failed");
				}
				if self.stop_requested.load(Ordering::SeqCst) {
					safe_close_channel(&channel);
				}
			}
			ReceiveEvent::End => {
				debug!(target = "remoting.channel", channel = channel.name(), "peer ended channel");
				self.handler.handle_end(&channel);
				safe_close_channel(&channel);
			}
			ReceiveEvent::Error(err) => {
				self.handler.handle_error(&channel, &err);
				safe_close_channel(&channel);
			}
		}
	}
}
