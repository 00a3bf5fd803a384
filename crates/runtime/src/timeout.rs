//! Connect-timeout accounting that discounts credential "think time".
//!
//! A fixed timeout would fail connections that are only waiting on a human
//! typing a password. Instead, whenever the budget runs out the handler
//! looks at the [`CallbackTracker`]:
//!
//! 1. a callback is executing right now: wait another full budget;
//! 2. a callback finished `d` ago with `d < budget`: wait `budget - d`;
//! 3. otherwise: the attempt has expired.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::callback::CallbackTracker;

/// The wait budget ran out with no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;

/// What to do once the current wait window has run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDecision {
	/// Keep waiting for this much longer.
	Extend(Duration),
	Expired,
}

/// Decides whether a pending connect deserves more time.
///
/// `start` is when the attempt began; only callback completions after it count.
pub fn next_wait(timeout: Duration, start: Instant, now: Instant, executing: bool, last_finished: Option<Instant>) -> WaitDecision {
	if executing {
		return WaitDecision::Extend(timeout);
	}

	match last_finished.filter(|finished| *finished >= start) {
		Some(finished) => {
			let since = now.saturating_duration_since(finished);
			if since < timeout {
				WaitDecision::Extend(timeout - since)
			} else {
				WaitDecision::Expired
			}
		}
		None => WaitDecision::Expired,
	}
}

/// Waits on a connect future with a think-time aware budget.
#[derive(Clone)]
pub struct ConnectTimeoutHandler {
	timeout: Duration,
	tracker: CallbackTracker,
}

impl ConnectTimeoutHandler {
	pub fn new(timeout: Duration, tracker: CallbackTracker) -> Self {
		Self { timeout, tracker }
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Polls `operation` until it completes or the budget is judged expired.
	///
	/// On expiry the future is dropped, not driven further.
	pub async fn await_completion<F>(&self, operation: F) -> Result<F::Output, Expired>
	where
		F: Future,
	{
		let start = Instant::now();
		let mut deadline = start + self.timeout;
		tokio::pin!(operation);

		loop {
			if let Ok(output) = tokio::time::timeout_at(deadline, operation.as_mut()).await {
				return Ok(output);
			}

			let now = Instant::now();
			match next_wait(self.timeout, start, now, self.tracker.is_executing(), self.tracker.last_finished()) {
				WaitDecision::Extend(extra) => {
					trace!(target = "remoting.timeout", extra_ms = extra.as_millis() as u64, "credential callback activity; extending connect wait");
					deadline = now + extra;
				}
				WaitDecision::Expired => return Err(Expired),
			}
		}
	}
}
