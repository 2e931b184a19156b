//! Typed identifiers for the orchestrator's entities.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Identifies a `Job` row. Opaque, UUIDv7 so IDs sort roughly by creation
/// order without leaking a sequential counter.
uuid_id!(JobId);

/// Identifies an `Attempt` row.
uuid_id!(AttemptId);

/// Identifies an `InboundEvent` row.
uuid_id!(EventId);

/// Identifies a rendered bundle directory. Must be a valid UUID per the
/// preview server's contract (spec's external interface for published
/// bundles).
uuid_id!(BundleId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_roundtrip_through_strings() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);

        let parsed = JobId::parse(&a.to_string()).unwrap();
        assert_eq!(a, parsed);
    }
}
