use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use remoting::transport::ConnectionHandle;
use remoting::{
	CallbackError, CallbackHandler, ConnectionManager, ConnectionOpenHandler, Credential, Error, ProtocolConnectionConfiguration, RetryableConnect, register,
};
use remoting_runtime::ConnectTask;
use remoting_runtime::error::HandlerError;
use remoting_runtime::testing::{ConnectBehavior, FakeEndpoint};
use url::Url;

fn config() -> ProtocolConnectionConfiguration {
	ProtocolConnectionConfiguration::new(Url::parse("remote://127.0.0.1:9990").unwrap())
}

fn manager(endpoint: &FakeEndpoint) -> ConnectionManager {
	ConnectionManager::create(config(), Arc::new(endpoint.clone()), None)
}

fn every_100ms(_attempt: u32) -> Option<Duration> {
	Some(Duration::from_millis(100))
}

#[tokio::test(start_paused = true)]
async fn retries_until_connected() {
	let endpoint = FakeEndpoint::new();
	endpoint.push_behavior(ConnectBehavior::Fail("refused".into()));
	endpoint.push_behavior(ConnectBehavior::Fail("refused".into()));
	let manager = manager(&endpoint);

	register(&manager, &every_100ms, Duration::from_secs(5)).await.unwrap();

	assert_eq!(endpoint.connect_count(), 3);
	assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn hanging_attempt_exhausts_budget() {
	let endpoint = FakeEndpoint::new();
	endpoint.push_behavior(ConnectBehavior::Hang);
	let manager = manager(&endpoint);

	let err = register(&manager, &every_100ms, Duration::from_secs(1)).await.err().unwrap();

	assert!(matches!(err, Error::ConnectTimeout(budget) if budget == Duration::from_secs(1)), "got {err:?}");
	assert_eq!(endpoint.connect_count(), 1);
	assert!(!manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn delay_past_the_budget_gives_up() {
	let endpoint = FakeEndpoint::new();
	endpoint.push_behavior(ConnectBehavior::Fail("refused".into()));
	let manager = manager(&endpoint);
	let slow = |_: u32| Some(Duration::from_secs(10));

	let err = register(&manager, &slow, Duration::from_secs(1)).await.err().unwrap();

	assert!(err.is_timeout(), "got {err:?}");
	assert_eq!(endpoint.connect_count(), 1);
}

#[tokio::test]
async fn policy_giving_up_returns_last_failure() {
	let endpoint = FakeEndpoint::new();
	endpoint.push_behavior(ConnectBehavior::Fail("refused".into()));
	let manager = manager(&endpoint);
	let never = |_: u32| -> Option<Duration> { None };

	let err = register(&manager, &never, Duration::from_secs(5)).await.err().unwrap();

	assert!(matches!(err, Error::ConnectFailed { .. }), "got {err:?}");
}

#[tokio::test]
async fn shutdown_manager_is_not_retried() {
	let endpoint = FakeEndpoint::new();
	let manager = manager(&endpoint);
	manager.shutdown();

	let err = register(&manager, &every_100ms, Duration::from_secs(5)).await.err().unwrap();

	assert!(matches!(err, Error::ChannelClosed));
	assert_eq!(endpoint.connect_count(), 0);
}

#[tokio::test]
async fn callback_failure_is_not_retried() {
	let endpoint = FakeEndpoint::new();
	endpoint.push_behavior(ConnectBehavior::Prompt { then_succeed: true });
	let handler: CallbackHandler = Arc::new(|_: &mut [Credential]| Err(CallbackError::Unsupported("realm".into())));
	let retry = RetryableConnect::new(config(), Arc::new(endpoint.clone())).with_callbacks(handler);
	let manager = ConnectionManager::new(ConnectTask::Retryable(retry));

	let err = register(&manager, &every_100ms, Duration::from_secs(5)).await.err().unwrap();

	assert!(matches!(err, Error::Callback(CallbackError::Unsupported(_))), "got {err:?}");
	assert_eq!(endpoint.connect_count(), 1);
}

/// Accepts every connection, but only after ten seconds.
struct SlowOpen;

impl ConnectionOpenHandler for SlowOpen {
	fn connection_opened<'a>(&'a self, _connection: &'a ConnectionHandle) -> BoxFuture<'a, Result<(), HandlerError>> {
		Box::pin(async {
			tokio::time::sleep(Duration::from_secs(10)).await;
			Ok(())
		})
	}
}

#[tokio::test(start_paused = true)]
async fn budget_expiry_closes_connection_awaiting_open_handler() {
	let endpoint = FakeEndpoint::new();
	let manager = ConnectionManager::create(config(), Arc::new(endpoint.clone()), Some(Arc::new(SlowOpen)));

	let err = register(&manager, &every_100ms, Duration::from_secs(1)).await.err().unwrap();

	assert!(matches!(err, Error::ConnectTimeout(_)), "got {err:?}");
	assert_eq!(endpoint.connections().len(), 1);
	assert!(endpoint.connections()[0].is_closed());
	assert!(!manager.is_connected());
}
