//! Safe-close helpers: cleanup failures are logged, never propagated.

use tracing::{debug, warn};

use crate::error::SecondaryCloseError;
use crate::transport::{ChannelHandle, ConnectionHandle, TransportError};

/// Runs `close`, logging instead of returning any failure.
///
/// Returns `true` when the close succeeded.
pub fn safe_close(resource: impl Into<String>, close: impl FnOnce() -> Result<(), TransportError>) -> bool {
	let resource = resource.into();
	match close() {
		Ok(()) => {
			debug!(target = "remoting.close", %resource, "closed");
			true
		}
		Err(source) => {
			let err = SecondaryCloseError { resource, source };
			warn!(target = "remoting.close", error = %err, "ignoring close failure");
			false
		}
	}
}

pub fn safe_close_connection(connection: &ConnectionHandle) -> bool {
	safe_close("connection", || connection.close())
}

pub fn safe_close_channel(channel: &ChannelHandle) -> bool {
	safe_close(format!("channel '{}'", channel.name()), || channel.close())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failures_are_swallowed() {
		assert!(!safe_close("thing", || Err(TransportError::Other("boom".into()))));
		assert!(safe_close("thing", || Ok(())));
	}

	#[test]
	fn one_failure_does_not_stop_the_next_close() {
		let mut closed = Vec::new();
		for name in ["first", "second", "third"] {
			safe_close(name, || {
				closed.push(name);
				if name == "first" { Err(TransportError::Closed) } else { Ok(()) }
			});
		}
		assert_eq!(closed, vec!["first", "second", "third"]);
	}
}
