//! Hash-derived request ids.
//!
//! The `rid` carried on every record identifies the subscription that
//! produced it. It is derived deterministically from the subscription's
//! identity so that live and stored records agree on it without
//! coordination. The id width is configurable: 31 bits fits consumers
//! that store it as a signed 32-bit integer, 63 bits makes collisions
//! between subscriptions far less likely.
//!
//! Collectors call [`RequestIdDeriver::derive`] when they stamp records for
//! storage or streaming. Decoding never derives an id; the codec carries the
//! stamped `rid` through unchanged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of derived request ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestIdWidth {
    /// Non-negative 32-bit signed range.
    Bits31,
    /// Non-negative 64-bit signed range.
    #[default]
    Bits63,
}

impl RequestIdWidth {
    const fn mask(self) -> u64 {
        match self {
            Self::Bits31 => 0x7FFF_FFFF,
            Self::Bits63 => 0x7FFF_FFFF_FFFF_FFFF,
        }
    }
}

/// Derives request ids from `(instrument, tick type, session)`.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdDeriver {
    namespace: Uuid,
    width: RequestIdWidth,
}

impl Default for RequestIdDeriver {
    fn default() -> Self {
        Self::new(RequestIdWidth::default())
    }
}

impl RequestIdDeriver {
    /// Deriver using the OID namespace.
    #[must_use]
    pub const fn new(width: RequestIdWidth) -> Self {
        Self {
            namespace: Uuid::NAMESPACE_OID,
            width,
        }
    }

    /// Deriver with a private namespace.
    #[must_use]
    pub const fn with_namespace(namespace: Uuid, width: RequestIdWidth) -> Self {
        Self { namespace, width }
    }

    /// Request id for one subscription. Always non-negative.
    #[must_use]
    pub fn derive(&self, instrument_id: i64, tick_type: &str, session: &str) -> i64 {
        let name = format!("{instrument_id}:{tick_type}:{session}");
        let uuid = Uuid::new_v5(&self.namespace, name.as_bytes());
        let (high, _) = uuid.as_u64_pair();
        // Masked to at most 63 bits, so the conversion cannot fail.
        i64::try_from(high & self.width.mask()).unwrap_or(i64::MAX)
    }

    /// Configured width.
    #[must_use]
    pub const fn width(&self) -> RequestIdWidth {
        self.width
    }
}
