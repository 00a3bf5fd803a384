//! In-memory endpoint, connection and channel for exercising the lifecycle
//! without a network.
//!
//! # Example
//!
//! ```ignore
//! let endpoint = FakeEndpoint::new();
//! endpoint.push_behavior(ConnectBehavior::Fail("refused".into()));
//! let manager = ConnectionManager::create(config, Arc::new(endpoint.clone()), None);
//!
//! assert!(manager.connect().await.is_err());
//! let connection = manager.connect().await?;
//! endpoint.connections()[0].fire_close(None);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use remoting_protocol::{InboundMessage, OptionMap};
use url::Url;

use crate::callback::{CallbackHandler, Credential};
use crate::transport::{
	Channel, ChannelHandle, CloseHandler, Connection, ConnectionHandle, Endpoint, ReceiveCallback, ReceiveEvent, TlsContext, TransportError,
};

/// Scripted outcome of one connect attempt.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
	Succeed,
	/// Succeeds with a connection that is already closed.
	SucceedClosed,
	Fail(String),
	/// Never completes.
	Hang,
	/// Asks the credential callback for a username and password on a
	/// blocking thread; fails if the callback fails, otherwise succeeds or
	/// hangs.
	Prompt { then_succeed: bool },
}

#[derive(Default)]
struct EndpointState {
	behaviors: Mutex<VecDeque<ConnectBehavior>>,
	delay: Mutex<Option<Duration>>,
	connections: Mutex<Vec<Arc<FakeConnection>>>,
	last_options: Mutex<Option<OptionMap>>,
	last_endpoint_name: Mutex<Option<String>>,
	connects: AtomicUsize,
}

/// Endpoint whose connect outcomes are scripted by the test.
#[derive(Clone, Default)]
pub struct FakeEndpoint {
	state: Arc<EndpointState>,
}

impl FakeEndpoint {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues the outcome of a future attempt; unscripted attempts succeed.
	pub fn push_behavior(&self, behavior: ConnectBehavior) {
		self.state.behaviors.lock().push_back(behavior);
	}

	/// Delays every attempt by `delay` before its outcome applies.
	pub fn set_connect_delay(&self, delay: Duration) {
		*self.state.delay.lock() = Some(delay);
	}

	pub fn connect_count(&self) -> usize {
		self.state.connects.load(Ordering::SeqCst)
	}

	/// Options passed to the most recent attempt.
	pub fn last_options(&self) -> Option<OptionMap> {
		self.state.last_options.lock().clone()
	}

	/// Local endpoint name passed to the most recent attempt.
	pub fn last_endpoint_name(&self) -> Option<String> {
		self.state.last_endpoint_name.lock().clone()
	}

	/// Every connection handed out so far, oldest first.
	pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
		self.state.connections.lock().clone()
	}
}

impl Endpoint for FakeEndpoint {
	fn connect(
		&self,
		endpoint_name: &str,
		_target: &Url,
		options: &OptionMap,
		callbacks: Option<CallbackHandler>,
		_tls: Option<TlsContext>,
	) -> BoxFuture<'static, Result<ConnectionHandle, TransportError>> {
		self.state.connects.fetch_add(1, Ordering::SeqCst);
		*self.state.last_options.lock() = Some(options.clone());
		*self.state.last_endpoint_name.lock() = Some(endpoint_name.to_string());
		let behavior = self.state.behaviors.lock().pop_front().unwrap_or(ConnectBehavior::Succeed);
		let delay = *self.state.delay.lock();
		let state = Arc::clone(&self.state);

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			let connection = match behavior {
				ConnectBehavior::Succeed => FakeConnection::new(),
				ConnectBehavior::SucceedClosed => {
					let connection = FakeConnection::new();
					connection.fire_close(None);
					connection
				}
				ConnectBehavior::Fail(message) => return Err(TransportError::Other(message)),
				ConnectBehavior::Hang => std::future::pending().await,
				ConnectBehavior::Prompt { then_succeed } => {
					let handler = callbacks.ok_or_else(|| TransportError::Authentication("no callback handler".to_string()))?;
					let answered = tokio::task::spawn_blocking(move || {
						let mut credentials = vec![
							Credential::Name {
								prompt: "Username".to_string(),
								default: None,
								value: None,
							},
							Credential::Password {
								prompt: "Password".to_string(),
								value: None,
							},
						];
						handler(&mut credentials)
					})
					.await
					.map_err(|e| TransportError::Other(e.to_string()))?;

					answered.map_err(|e| TransportError::Authentication(e.to_string()))?;
					if !then_succeed {
						std::future::pending::<()>().await;
					}
					FakeConnection::new()
				}
			};

			state.connections.lock().push(Arc::clone(&connection));
			Ok(connection as ConnectionHandle)
		})
	}
}

/// Connection that records what the lifecycle did to it.
#[derive(Default)]
pub struct FakeConnection {
	close_handlers: Mutex<Vec<CloseHandler>>,
	closed: AtomicBool,
	close_calls: AtomicUsize,
	channels: Mutex<Vec<Arc<FakeChannel>>>,
	open_failure: Mutex<Option<String>>,
}

impl FakeConnection {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Simulates the peer (or the network) closing the connection.
	pub fn fire_close(&self, error: Option<TransportError>) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		let handlers = std::mem::take(&mut *self.close_handlers.lock());
		for handler in handlers {
			handler(error.as_ref());
		}
	}

	/// Makes every later `open_channel` fail with `message`.
	pub fn fail_channel_open(&self, message: impl Into<String>) {
		*self.open_failure.lock() = Some(message.into());
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Number of local `close()` calls.
	pub fn close_count(&self) -> usize {
		self.close_calls.load(Ordering::SeqCst)
	}

	/// Close handlers still waiting to run.
	pub fn close_handler_count(&self) -> usize {
		self.close_handlers.lock().len()
	}

	pub fn channels(&self) -> Vec<Arc<FakeChannel>> {
		self.channels.lock().clone()
	}
}

impl Connection for FakeConnection {
	fn add_close_handler(&self, handler: CloseHandler) {
		if self.is_closed() {
			handler(None);
			return;
		}
		self.close_handlers.lock().push(handler);
	}

	fn open_channel(&self, name: &str, _options: &OptionMap) -> BoxFuture<'_, Result<ChannelHandle, TransportError>> {
		let name = name.to_string();
		Box::pin(async move {
			if self.is_closed() {
				return Err(TransportError::Closed);
			}
			if let Some(message) = self.open_failure.lock().clone() {
				return Err(TransportError::Other(message));
			}
			let channel = FakeChannel::new(name);
			self.channels.lock().push(Arc::clone(&channel));
			Ok(channel as ChannelHandle)
		})
	}

	fn close(&self) -> Result<(), TransportError> {
		self.close_calls.fetch_add(1, Ordering::SeqCst);
		self.fire_close(None);
		Ok(())
	}
}

/// Channel holding at most one pending receive registration.
pub struct FakeChannel {
	name: String,
	me: Weak<FakeChannel>,
	pending: Mutex<Option<ReceiveCallback>>,
	registrations: AtomicUsize,
	shutdown_written: AtomicBool,
	closed: AtomicBool,
	close_calls: AtomicUsize,
	fail_close: AtomicBool,
}

impl FakeChannel {
	pub fn new(name: impl Into<String>) -> Arc<Self> {
		let name = name.into();
		Arc::new_cyclic(|me| Self {
			name,
			me: me.clone(),
			pending: Mutex::new(None),
			registrations: AtomicUsize::new(0),
			shutdown_written: AtomicBool::new(false),
			closed: AtomicBool::new(false),
			close_calls: AtomicUsize::new(0),
			fail_close: AtomicBool::new(false),
		})
	}

	fn handle(&self) -> Option<ChannelHandle> {
		self.me.upgrade().map(|channel| channel as ChannelHandle)
	}

	fn deliver_event(&self, event: ReceiveEvent) -> bool {
		let Some(callback) = self.pending.lock().take() else {
			return false;
		};
		let Some(handle) = self.handle() else {
			return false;
		};
		callback(handle, event);
		true
	}

	/// Hands `message` to the pending registration; `false` if none is armed.
	pub fn deliver(&self, message: impl Into<InboundMessage>) -> bool {
		self.deliver_event(ReceiveEvent::Message(message.into()))
	}

	/// Signals that the peer stopped sending.
	pub fn deliver_end(&self) -> bool {
		self.deliver_event(ReceiveEvent::End)
	}

	pub fn deliver_error(&self, error: TransportError) -> bool {
		self.deliver_event(ReceiveEvent::Error(error))
	}

	/// Makes `close()` report a failure (the channel still ends up closed).
	pub fn fail_close(&self) {
		self.fail_close.store(true, Ordering::SeqCst);
	}

	pub fn has_pending_receiver(&self) -> bool {
		self.pending.lock().is_some()
	}

	pub fn registration_count(&self) -> usize {
		self.registrations.load(Ordering::SeqCst)
	}

	pub fn is_shutdown_written(&self) -> bool {
		self.shutdown_written.load(Ordering::SeqCst)
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	pub fn close_count(&self) -> usize {
		self.close_calls.load(Ordering::SeqCst)
	}
}

impl Channel for FakeChannel {
	fn name(&self) -> &str {
		&self.name
	}

	fn receive_message(&self, callback: ReceiveCallback) {
		self.registrations.fetch_add(1, Ordering::SeqCst);
		if self.is_closed() {
			if let Some(handle) = self.handle() {
				callback(handle, ReceiveEvent::End);
			}
			return;
		}
		*self.pending.lock() = Some(callback);
	}

	fn write_shutdown(&self) -> Result<(), TransportError> {
		if self.is_closed() {
			return Err(TransportError::Closed);
		}
		self.shutdown_written.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn close(&self) -> Result<(), TransportError> {
		self.close_calls.fetch_add(1, Ordering::SeqCst);
		if !self.closed.swap(true, Ordering::SeqCst) {
			self.deliver_end();
		}
		if self.fail_close.load(Ordering::SeqCst) {
			return Err(TransportError::Other("close failed".to_string()));
		}
		Ok(())
	}
}
