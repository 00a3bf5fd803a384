//! Credential callbacks and the think-time tracking wrapped around them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

/// A credential the authentication exchange asks the caller for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
	Name {
		prompt: String,
		default: Option<String>,
		value: Option<String>,
	},
	Password {
		prompt: String,
		value: Option<String>,
	},
	Realm {
		prompt: String,
		choices: Vec<String>,
		value: Option<String>,
	},
}

/// Failure raised by a caller's credential callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackError {
	#[error("unsupported credential: {0}")]
	Unsupported(String),

	#[error("credential entry cancelled")]
	Cancelled,

	#[error("{0}")]
	Failed(String),
}

/// Caller-supplied credential callback; may be invoked several times per attempt.
pub type CallbackHandler = Arc<dyn Fn(&mut [Credential]) -> Result<(), CallbackError> + Send + Sync>;

#[derive(Default)]
struct TrackerState {
	executing: AtomicUsize,
	last_finished: Mutex<Option<Instant>>,
	failure: Mutex<Option<CallbackError>>,
}

/// Observes when a credential callback is running and when it last finished.
///
/// The tracker never changes what the wrapped handler does; it only records
/// timestamps and the first error the handler returned.
#[derive(Clone, Default)]
pub struct CallbackTracker {
	state: Arc<TrackerState>,
}

/// Marks a callback as executing until dropped.
pub struct ExecutionGuard {
	state: Arc<TrackerState>,
}

impl Drop for ExecutionGuard {
	fn drop(&mut self) {
		*self.state.last_finished.lock() = Some(Instant::now());
		self.state.executing.fetch_sub(1, Ordering::SeqCst);
	}
}

impl CallbackTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records the start of a callback execution.
	pub fn enter(&self) -> ExecutionGuard {
		self.state.executing.fetch_add(1, Ordering::SeqCst);
		ExecutionGuard {
			state: Arc::clone(&self.state),
		}
	}

	pub fn is_executing(&self) -> bool {
		self.state.executing.load(Ordering::SeqCst) > 0
	}

	/// When the most recent callback execution returned.
	pub fn last_finished(&self) -> Option<Instant> {
		*self.state.last_finished.lock()
	}

	/// Takes the first error returned by the wrapped handler, if any.
	pub fn take_failure(&self) -> Option<CallbackError> {
		self.state.failure.lock().take()
	}

	/// Wraps `handler` so its executions are observed by this tracker.
	pub fn wrap(&self, handler: CallbackHandler) -> CallbackHandler {
		let tracker = self.clone();
		Arc::new(move |credentials: &mut [Credential]| {
			let _guard = tracker.enter();
			let result = handler(credentials);
			if let Err(err) = &result {
				tracker.state.failure.lock().get_or_insert_with(|| err.clone());
			}
			result
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn wrapped_handler_is_tracked_and_unchanged() {
		let tracker = CallbackTracker::new();
		let observed = tracker.clone();
		let handler: CallbackHandler = Arc::new(move |credentials: &mut [Credential]| {
			assert!(observed.is_executing());
			for credential in credentials.iter_mut() {
				if let Credential::Name { value, .. } = credential {
					*value = Some("admin".to_string());
				}
			}
			Ok(())
		});

		let wrapped = tracker.wrap(handler);
		assert!(tracker.last_finished().is_none());

		let mut credentials = vec![Credential::Name {
			prompt: "Username".into(),
			default: None,
			value: None,
		}];
		wrapped(&mut credentials).unwrap();

		assert!(!tracker.is_executing());
		assert!(tracker.last_finished().is_some());
		assert!(matches!(&credentials[0], Credential::Name { value: Some(v), .. } if v == "admin"));
		assert!(tracker.take_failure().is_none());
	}

	#[tokio::test]
	async fn first_failure_is_recorded() {
		let tracker = CallbackTracker::new();
		let wrapped = tracker.wrap(Arc::new(|credentials: &mut [Credential]| {
			if credentials.is_empty() {
				Err(CallbackError::Cancelled)
			} else {
				Err(CallbackError::Failed("second".into()))
			}
		}));

		let mut none: Vec<Credential> = Vec::new();
		assert!(wrapped(&mut none).is_err());
		let mut one = vec![Credential::Password {
			prompt: "Password".into(),
			value: None,
		}];
		assert!(wrapped(&mut one).is_err());

		assert_eq!(tracker.take_failure(), Some(CallbackError::Cancelled));
		assert_eq!(tracker.take_failure(), None);
		assert!(!tracker.is_executing());
	}
}
