//! Inbound channel payloads.

/// One complete message received on a channel.
///
/// The payload is opaque to this layer; framing and marshalling belong to
/// the transport and to whatever handler consumes the message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundMessage {
	payload: Vec<u8>,
}

impl InboundMessage {
	pub fn new(payload: impl Into<Vec<u8>>) -> Self {
		Self { payload: payload.into() }
	}

	pub fn payload(&self) -> &[u8] {
		&self.payload
	}

	pub fn len(&self) -> usize {
		self.payload.len()
	}

	pub fn is_empty(&self) -> bool {
		self.payload.is_empty()
	}

	pub fn into_payload(self) -> Vec<u8> {
		self.payload
	}
}

impl From<Vec<u8>> for InboundMessage {
	fn from(payload: Vec<u8>) -> Self {
		Self { payload }
	}
}

impl From<&str> for InboundMessage {
	fn from(payload: &str) -> Self {
		Self::new(payload.as_bytes())
	}
}
