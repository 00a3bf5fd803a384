//! Connection and channel lifecycle for remoting management sessions.
//!
//! The pieces, leaves first:
//!
//! * [`timeout`]: waits on an in-flight connect while discounting the time
//!   spent inside credential callbacks.
//! * [`auth`]: decides which SASL mechanisms are allowed for a destination.
//! * [`connect`]: the timeout-aware synchronous connect built on both.
//! * [`strategy`]: how a connection is obtained and what to try after it closes.
//! * [`manager`]: owns at most one live connection and serializes
//!   connect, close notification and shutdown.
//! * [`channel`]: the self re-arming receive loop and graceful shutdown of
//!   a named channel.
//!
//! The wire transport is consumed only through the traits in [`transport`].

pub mod auth;
pub mod callback;
pub mod channel;
pub mod close;
pub mod connect;
pub mod error;
pub mod manager;
pub mod strategy;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod timeout;
pub mod transport;

pub use auth::{AuthOptions, Locality};
pub use callback::{CallbackError, CallbackHandler, CallbackTracker, Credential};
pub use channel::{MessageHandler, ProtocolChannel};
pub use connect::connect_sync;
pub use error::{Error, Result, SecondaryCloseError};
pub use manager::{ConnectionManager, WeakConnectionManager};
pub use strategy::{ConnectTask, ConnectionOpenHandler, RetryableConnect};
pub use timeout::ConnectTimeoutHandler;
pub use transport::{Channel, ChannelHandle, CloseHandler, Connection, ConnectionHandle, Endpoint, ReceiveEvent, TlsContext, TransportError};
