//! Timeout-aware synchronous connect.

use remoting_protocol::ProtocolConnectionConfiguration;
use tracing::{debug, warn};

use crate::auth::AuthOptions;
use crate::callback::{CallbackHandler, CallbackTracker};
use crate::error::{Error, Result};
use crate::timeout::ConnectTimeoutHandler;
use crate::transport::{ConnectionHandle, Endpoint, TlsContext};

/// Connects to the configured target and waits for the outcome.
///
/// Authentication options are negotiated from the destination host on
/// every call. The wait discounts time spent inside `callbacks` (see
/// [`crate::timeout`]). If the wait expires, the in-flight attempt is
/// dropped and [`Error::ConnectTimeout`] is returned.
///
/// # Errors
///
/// * [`Error::Callback`] if the credential callback failed, unchanged.
/// * [`Error::ConnectFailed`] for any other transport failure.
/// * [`Error::ConnectTimeout`] when the budget is exhausted.
pub async fn connect_sync(
	config: &ProtocolConnectionConfiguration,
	endpoint: &dyn Endpoint,
	callbacks: Option<CallbackHandler>,
	tls: Option<TlsContext>,
) -> Result<ConnectionHandle> {
	config.validate()?;
	let host = config.host().unwrap_or_default();
	let auth = AuthOptions::negotiate(host, &config.sasl_properties).await;
	let options = auth.apply_to(&config.options);

	let tracker = CallbackTracker::new();
	let callbacks = callbacks.map(|handler| tracker.wrap(handler));
	let waiter = ConnectTimeoutHandler::new(config.connect_timeout(), tracker.clone());

	debug!(
		target = "remoting.connect",
		uri = %config.uri,
		endpoint = %config.endpoint_name,
		timeout_ms = config.connect_timeout_ms,
		locality = auth.locality.as_str(),
		"connecting"
	);

	let attempt = endpoint.connect(&config.endpoint_name, &config.uri, &options, callbacks, tls);
	match waiter.await_completion(attempt).await {
		Ok(Ok(connection)) => {
			debug!(target = "remoting.connect", uri = %config.uri, "connected");
			Ok(connection)
		}
		Ok(Err(source)) => {
			if let Some(failure) = tracker.take_failure() {
				return Err(Error::Callback(failure));
			}
			warn!(target = "remoting.connect", uri = %config.uri, error = %source, "connect failed");
			Err(Error::ConnectFailed {
				target: config.uri.to_string(),
				source,
			})
		}
		Err(_) => {
			warn!(target = "remoting.connect", uri = %config.uri, timeout_ms = config.connect_timeout_ms, "connect timed out");
			Err(Error::ConnectTimeout(waiter.timeout()))
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use futures_util::future::BoxFuture;
	use remoting_protocol::OptionMap;
	use remoting_protocol::sasl::{LOCAL_USER_MECHANISM, LOCAL_USER_QUIET_AUTH};
	use tokio::time::Instant;
	use url::Url;

	use super::*;
	use crate::callback::{CallbackError, Credential};
	use crate::testing::{ConnectBehavior, FakeEndpoint};
	use crate::transport::TransportError;

	fn config(uri: &str, timeout_ms: u64) -> ProtocolConnectionConfiguration {
		ProtocolConnectionConfiguration::new(Url::parse(uri).unwrap()).with_connect_timeout(Duration::from_millis(timeout_ms))
	}

	#[tokio::test]
	async fn success_passes_negotiated_options() {
		let endpoint = FakeEndpoint::new();
		let config = config("remote://127.0.0.1:9999", 1000).with_sasl_property("realm", "ManagementRealm");

		connect_sync(&config, &endpoint, None, None).await.unwrap();

		let options = endpoint.last_options().unwrap();
		assert!(options.permits_mechanism(LOCAL_USER_MECHANISM));
		assert_eq!(options.sasl_properties[LOCAL_USER_QUIET_AUTH], "true");
		assert_eq!(options.sasl_properties["realm"], "ManagementRealm");
		assert_eq!(endpoint.last_endpoint_name().as_deref(), Some("management-client"));
		assert_eq!(endpoint.connect_count(), 1);
	}

	#[tokio::test]
	async fn remote_destination_disallows_local_user() {
		let endpoint = FakeEndpoint::new();
		connect_sync(&config("remote://192.0.2.10:9999", 1000), &endpoint, None, None).await.unwrap();
		assert!(!endpoint.last_options().unwrap().permits_mechanism(LOCAL_USER_MECHANISM));
	}

	#[tokio::test]
	async fn transport_failure_is_wrapped() {
		let endpoint = FakeEndpoint::new();
		endpoint.push_behavior(ConnectBehavior::Fail("refused".into()));

		let err = connect_sync(&config("remote://127.0.0.1:9999", 1000), &endpoint, None, None).await.err().unwrap();
		match err {
			Error::ConnectFailed { target, source } => {
				assert_eq!(target, "remote://127.0.0.1:9999");
				assert_eq!(source.to_string(), "refused");
			}
			other => panic!("expected ConnectFailed, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn callback_failure_propagates_unwrapped() {
		let endpoint = FakeEndpoint::new();
		endpoint.push_behavior(ConnectBehavior::Prompt { then_succeed: true });
		let handler: CallbackHandler = Arc::new(|_: &mut [Credential]| Err(CallbackError::Cancelled));

		let err = connect_sync(&config("remote://127.0.0.1:9999", 1000), &endpoint, Some(handler), None).await.err().unwrap();
		assert!(matches!(err, Error::Callback(CallbackError::Cancelled)), "got {err:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn hang_times_out() {
		let endpoint = FakeEndpoint::new();
		endpoint.push_behavior(ConnectBehavior::Hang);

		let err = connect_sync(&config("remote://127.0.0.1:9999", 1000), &endpoint, None, None).await.err().unwrap();
		assert!(err.is_timeout());
	}

	/// Calls the credential callback inline after `answer_after`, then never completes.
	struct LatePrompt {
		answer_after: Duration,
	}

	impl Endpoint for LatePrompt {
		fn connect(
			&self,
			_endpoint_name: &str,
			_target: &Url,
			_options: &OptionMap,
			callbacks: Option<CallbackHandler>,
			_tls: Option<TlsContext>,
		) -> BoxFuture<'static, std::result::Result<ConnectionHandle, TransportError>> {
			let answer_after = self.answer_after;
			Box::pin(async move {
				tokio::time::sleep(answer_after).await;
				if let Some(handler) = callbacks {
					let mut credentials = vec![Credential::Password {
						prompt: "Password".to_string(),
						value: None,
					}];
					handler(&mut credentials).map_err(|e| TransportError::Authentication(e.to_string()))?;
				}
				std::future::pending().await
			})
		}
	}

	#[tokio::test(start_paused = true)]
	async fn late_callback_extends_the_budget() {
		let endpoint = LatePrompt {
			answer_after: Duration::from_millis(80),
		};
		let handler: CallbackHandler = Arc::new(|_: &mut [Credential]| Ok(()));

		let started = Instant::now();
		let err = connect_sync(&config("remote://127.0.0.1:9999", 100), &endpoint, Some(handler), None).await.err().unwrap();
		let elapsed = started.elapsed();

		// Answered at 80ms: the 100ms budget is extended to 80 + 100.
		assert!(err.is_timeout(), "got {err:?}");
		assert!(elapsed >= Duration::from_millis(180), "gave up after {elapsed:?}");
		assert!(elapsed < Duration::from_millis(190), "gave up after {elapsed:?}");
	}
}
