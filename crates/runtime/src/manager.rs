//! Connection manager: at most one live connection, replaced on demand.
//!
//! State machine:
//!
//! ```text
//! DISCONNECTED --connect ok--> CONNECTED --closed--> DISCONNECTED (task advanced)
//!       \                          |
//!        +------ shutdown() -------+-----> SHUTDOWN (absorbing, connect fails)
//! ```
//!
//! Two locks are involved. `connect_lock` is held across the whole connect
//! sequence so only one raw attempt is ever in flight. `state` guards the
//! cached connection, the task and the shutdown flag; it is never held
//! across an `.await`, so the close hook can take it from any thread.
//!
//! A raw connection is owned by the `connect()` call that produced it until
//! it is published. If that call fails, loses to a shutdown, or is dropped
//! mid-way (for example by an outer timeout), the connection is closed.

use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use remoting_protocol::ProtocolConnectionConfiguration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::close::safe_close_connection;
use crate::error::{Error, Result};
use crate::strategy::{ConnectTask, ConnectionOpenHandler, RetryableConnect};
use crate::transport::{CloseHandler, Connection, ConnectionHandle, Endpoint, TransportError, same_connection};

struct State {
	connection: Option<ConnectionHandle>,
	task: ConnectTask,
	shutdown: bool,
	/// Bumped by close and shutdown; attempts started under an older epoch are discarded.
	epoch: u64,
}

struct Inner {
	state: Mutex<State>,
	connect_lock: tokio::sync::Mutex<()>,
	/// Counts accepted closes and shutdown.
	closes: watch::Sender<u64>,
}

/// A connection produced by an attempt but not yet published.
struct Unpublished {
	connection: ConnectionHandle,
	armed: bool,
}

impl Unpublished {
	fn new(connection: ConnectionHandle) -> Self {
		Self { connection, armed: true }
	}

	fn publish(mut self) -> ConnectionHandle {
		self.armed = false;
		Arc::clone(&self.connection)
	}
}

impl Drop for Unpublished {
	fn drop(&mut self) {
		if self.armed {
			debug!(target = "remoting.manager", "closing unpublished connection");
			safe_close_connection(&self.connection);
		}
	}
}

/// Owns at most one connection and delegates connecting to a [`ConnectTask`].
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct ConnectionManager {
	inner: Arc<Inner>,
}

impl ConnectionManager {
	pub fn new(task: ConnectTask) -> Self {
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					connection: None,
					task,
					shutdown: false,
					epoch: 0,
				}),
				connect_lock: tokio::sync::Mutex::new(()),
				closes: watch::channel(0).0,
			}),
		}
	}

	/// A manager that reconnects through `endpoint` whenever needed.
	pub fn create(config: ProtocolConnectionConfiguration, endpoint: Arc<dyn Endpoint>, open_handler: Option<Arc<dyn ConnectionOpenHandler>>) -> Self {
		let mut retry = RetryableConnect::new(config, endpoint);
		retry.open_handler = open_handler;
		Self::new(ConnectTask::Retryable(retry))
	}

	/// A manager over an existing connection; once it closes the manager is done.
	pub fn for_connection(connection: ConnectionHandle, open_handler: Option<Arc<dyn ConnectionOpenHandler>>) -> Self {
		Self::new(ConnectTask::FixedOnce { connection, open_handler })
	}

	pub fn is_connected(&self) -> bool {
		let state = self.inner.state.lock();
		state.connection.is_some() && !state.shutdown
	}

	pub fn is_shutdown(&self) -> bool {
		self.inner.state.lock().shutdown
	}

	/// Returns the cached connection, establishing one if there is none.
	///
	/// # Errors
	///
	/// * [`Error::ChannelClosed`] after [`shutdown`](Self::shutdown), or
	///   when the task is terminal or produced no connection.
	/// * Whatever the task or the open handler failed with; in that case
	///   nothing is cached and the raw connection, if any, is closed.
	pub async fn connect(&self) -> Result<ConnectionHandle> {
		if let Some(connection) = self.cached()? {
			return Ok(connection);
		}

		let _attempt = self.inner.connect_lock.lock().await;
		let (task, epoch) = {
			let state = self.inner.state.lock();
			if state.shutdown {
				return Err(Error::ChannelClosed);
			}
			if let Some(connection) = &state.connection {
				return Ok(Arc::clone(connection));
			}
			(state.task.clone(), state.epoch)
		};

		let Some(connection) = task.connect().await? else {
			return Err(Error::ChannelClosed);
		};
		let pending = Unpublished::new(connection);

		if let Err(err) = task.connection_opened(&pending.connection).await {
			debug!(target = "remoting.manager", error = %err, "open handler rejected connection");
			return Err(err);
		}

		let connection = {
			let mut state = self.inner.state.lock();
			if state.shutdown || state.epoch != epoch {
				drop(state);
				debug!(target = "remoting.manager", "discarding connection from a stale attempt");
				return Err(Error::ChannelClosed);
			}
			let connection = pending.publish();
			state.connection = Some(Arc::clone(&connection));
			connection
		};

		// Registered outside the state lock: transports may run it inline.
		connection.add_close_handler(self.close_hook(&connection));
		info!(target = "remoting.manager", "connection established");
		Ok(connection)
	}

	/// Clears `closed` if it is still the cached connection and advances the task.
	pub fn on_connection_close(&self, closed: &ConnectionHandle) {
		self.inner.on_connection_close(closed);
	}

	/// Stops the manager; every later `connect()` fails with [`Error::ChannelClosed`].
	///
	/// Idempotent. The cached connection is closed after the lock is released.
	pub fn shutdown(&self) {
		let (task, connection) = {
			let mut state = self.inner.state.lock();
			if state.shutdown {
				return;
			}
			state.shutdown = true;
			state.epoch += 1;
			let task = mem::replace(&mut state.task, ConnectTask::Terminal);
			(task, state.connection.take())
		};

		info!(target = "remoting.manager", "shutting down");
		task.shutdown();
		if let Some(connection) = connection {
			safe_close_connection(&connection);
		}
		self.inner.closes.send_modify(|count| *count += 1);
	}

	/// A receiver that changes whenever the cached connection is lost or
	/// the manager shuts down.
	pub fn subscribe_closes(&self) -> watch::Receiver<u64> {
		self.inner.closes.subscribe()
	}

	/// A handle that does not keep the manager alive.
	pub fn downgrade(&self) -> WeakConnectionManager {
		WeakConnectionManager {
			inner: Arc::downgrade(&self.inner),
		}
	}

	fn cached(&self) -> Result<Option<ConnectionHandle>> {
		let state = self.inner.state.lock();
		if state.shutdown {
			return Err(Error::ChannelClosed);
		}
		Ok(state.connection.clone())
	}

	fn close_hook(&self, connection: &ConnectionHandle) -> CloseHandler {
		let manager: Weak<Inner> = Arc::downgrade(&self.inner);
		let closed: Weak<dyn Connection> = Arc::downgrade(connection);
		Box::new(move |error: Option<&TransportError>| {
			if let Some(err) = error {
				debug!(target = "remoting.manager", error = %err, "connection closed with error");
			}
			if let (Some(manager), Some(closed)) = (manager.upgrade(), closed.upgrade()) {
				manager.on_connection_close(&closed);
			}
		})
	}
}

/// Weak counterpart of [`ConnectionManager`].
#[derive(Clone)]
pub struct WeakConnectionManager {
	inner: Weak<Inner>,
}

impl WeakConnectionManager {
	pub fn upgrade(&self) -> Option<ConnectionManager> {
		self.inner.upgrade().map(|inner| ConnectionManager { inner })
	}
}

impl Inner {
	fn on_connection_close(&self, closed: &ConnectionHandle) {
		let mut state = self.state.lock();
		match &state.connection {
			Some(current) if same_connection(current, closed) => {}
			_ => return,
		}

		state.connection = None;
		state.epoch += 1;
		state.task = if state.shutdown {
			ConnectTask::Terminal
		} else {
			state.task.connection_closed()
		};
		debug!(target = "remoting.manager", next = ?state.task, "connection closed");
		drop(state);
		self.closes.send_modify(|count| *count += 1);
	}
}
