//! Tick wire format: message shapes, codec and request-id derivation.

pub mod codec;
pub mod messages;
pub mod request_id;

pub use codec::{CodecError, WireCodec, WireShape};
pub use messages::{CompactMessage, LegacyMessage};
pub use request_id::{RequestIdDeriver, RequestIdWidth};
