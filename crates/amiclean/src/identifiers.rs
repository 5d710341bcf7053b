//! Newtype domain identifiers.
//!
//! EC2 hands out every identifier as a plain string. Wrapping them in distinct
//! newtypes prevents accidentally passing an [`ImageId`] where a
//! [`SnapshotId`] is expected, which matters a great deal in a tool whose job
//! is deleting things.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — EC2-assigned
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies an Amazon Machine Image (e.g. `"ami-0abcdef1234567890"`).
    ImageId
}

string_id! {
    /// Identifies an EBS snapshot backing one of an image's block devices
    /// (e.g. `"snap-0123456789abcdef0"`).
    SnapshotId
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single cleanup run (one invocation of the CLI).
///
/// Generated fresh for every invocation; attached to the root span and to the
/// run report so all activity from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleanupRunId(Uuid);

impl CleanupRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`CleanupRunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CleanupRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(ImageId::new("").is_none());
        assert!(SnapshotId::new(String::new()).is_none());
    }

    #[test]
    fn identifiers_display_their_raw_value() {
        let id = ImageId::new("ami-123").unwrap();
        assert_eq!(id.as_str(), "ami-123");
        assert_eq!(id.to_string(), "ami-123");
    }

    #[test]
    fn identifiers_serialize_as_plain_strings() {
        let id = SnapshotId::new("snap-9").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"snap-9\"");
    }

    #[test]
    fn run_ids_round_trip_through_uuid() {
        let run = CleanupRunId::new_random();
        assert_eq!(CleanupRunId::from_uuid(run.as_uuid()), run);
    }
}
