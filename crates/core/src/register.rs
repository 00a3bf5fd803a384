use std::sync::Arc;
use std::time::Duration;

use remoting_runtime::transport::ConnectionHandle;
use remoting_runtime::{ConnectionManager, Error, Result, WeakConnectionManager};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

/// Decides how long to wait before the next connect attempt.
pub trait ReconnectPolicy: Send + Sync {
	/// Delay before attempt `attempt + 1`, given that `attempt` attempts
	/// (counting from 1) have failed. `None` gives up.
	fn delay(&self, attempt: u32) -> Option<Duration>;
}

impl<F> ReconnectPolicy for F
where
	F: Fn(u32) -> Option<Duration> + Send + Sync,
{
	fn delay(&self, attempt: u32) -> Option<Duration> {
		self(attempt)
	}
}

/// Connects through `manager`, retrying failed attempts until `budget` is spent.
///
/// Stops early on a shutdown manager or a failed credential callback; both
/// are returned immediately. When the policy gives up, the last failure is
/// returned.
///
/// # Errors
///
/// [`Error::ConnectTimeout`] carrying `budget` once the budget runs out,
/// either during an attempt or because the next delay would overrun it.
pub async fn register(manager: &ConnectionManager, policy: &dyn ReconnectPolicy, budget: Duration) -> Result<ConnectionHandle> {
	retry_connect(manager, policy, Some((Instant::now() + budget, budget))).await
}

async fn retry_connect(manager: &ConnectionManager, policy: &dyn ReconnectPolicy, deadline: Option<(Instant, Duration)>) -> Result<ConnectionHandle> {
	let mut attempt: u32 = 0;

	loop {
		attempt = attempt.saturating_add(1);
		let outcome = match deadline {
			Some((at, budget)) => timeout_at(at, manager.connect()).await.map_err(|_| Error::ConnectTimeout(budget))?,
			None => manager.connect().await,
		};
		let err = match outcome {
			Ok(connection) => {
				debug!(target = "remoting.register", attempt, "registered");
				return Ok(connection);
			}
			Err(err) => err,
		};

		if err.is_terminal() {
			return Err(err);
		}
		let Some(delay) = policy.delay(attempt) else {
			return Err(err);
		};
		if let Some((at, budget)) = deadline {
			if Instant::now() + delay >= at {
				return Err(Error::ConnectTimeout(budget));
			}
		}

		info!(target = "remoting.register", attempt, error = %err, retry_in_ms = delay.as_millis() as u64, "connect failed, retrying");
		sleep(delay).await;
	}
}

/// Spawns a task that reconnects through `manager` every time its
/// connection is lost, retrying with `policy` until connected again.
///
/// The task ends when the manager shuts down or is dropped, or when a
/// reconnect fails for good (policy gave up, credential callback failed).
pub(crate) fn spawn_reconnect(manager: &ConnectionManager, policy: Arc<dyn ReconnectPolicy>) -> JoinHandle<()> {
	let mut closes = manager.subscribe_closes();
	let weak = manager.downgrade();

	tokio::spawn(async move {
		while closes.changed().await.is_ok() {
			let Some(manager) = live(&weak) else {
				break;
			};
			debug!(target = "remoting.register", "connection lost, reconnecting");
			if let Err(err) = retry_connect(&manager, policy.as_ref(), None).await {
				if !manager.is_shutdown() {
					warn!(target = "remoting.register", error = %err, "giving up reconnecting");
				}
				break;
			}
		}
		debug!(target = "remoting.register", "reconnect task finished");
	})
}

fn live(weak: &WeakConnectionManager) -> Option<ConnectionManager> {
	weak.upgrade().filter(|manager| !manager.is_shutdown())
}
