//! SASL mechanism names and property keys understood by the remoting layer.

/// Trust-shortcut mechanism that authenticates a user on the same host.
pub const LOCAL_USER_MECHANISM: &str = "JBOSS-LOCAL-USER";

/// Property that silences the local-user challenge when it succeeds.
pub const LOCAL_USER_QUIET_AUTH: &str = "jboss.sasl.local-user.quiet-auth";

/// Mechanisms the client is able to offer, in preference order.
pub const KNOWN_MECHANISMS: &[&str] = &[LOCAL_USER_MECHANISM, "DIGEST-MD5", "SCRAM-SHA-256", "PLAIN", "ANONYMOUS"];
