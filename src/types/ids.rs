//! Prefixed TypeID identifiers.
//!
//! Each identifier wraps a `MagicTypeId` with a fixed prefix, so a task ID
//! can never be mistaken for a run ID in logs or events.
//! Format: `task_01h455vb4pex5vsknk084sn02q`, `run_01h455vb4pex5vsknk084sn02q`.

use mti::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string is not a valid identifier of the expected kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidId {
    /// TypeID parsing failed
    Parse(String),
    /// Wrong prefix
    WrongPrefix {
        /// The expected prefix
        expected: &'static str,
        /// The actual prefix found
        actual: String,
    },
}

impl fmt::Display for InvalidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "invalid identifier: {e}"),
            Self::WrongPrefix { expected, actual } => {
                write!(f, "expected prefix '{expected}', got '{actual}'")
            }
        }
    }
}

impl std::error::Error for InvalidId {}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(MagicTypeId);

        impl $name {
            /// The TypeID prefix for this identifier.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a fresh identifier backed by a UUIDv7 (time-sortable).
            #[must_use]
            pub fn new() -> Self {
                Self(Self::PREFIX.create_type_id::<V7>())
            }

            /// Parses an identifier, validating its prefix.
            ///
            /// # Errors
            ///
            /// Returns `InvalidId::Parse` for malformed input and
            /// `InvalidId::WrongPrefix` for a TypeID of another kind.
            pub fn parse(s: &str) -> Result<Self, InvalidId> {
                let id = MagicTypeId::from_str(s).map_err(|e| InvalidId::Parse(e.to_string()))?;
                let prefix = id.prefix().as_str();
                if prefix != Self::PREFIX {
                    return Err(InvalidId::WrongPrefix {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }
                Ok(Self(id))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.0.to_string().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

typed_id!(
    /// Identifies one task: a bounded iteration over a single workspace.
    TaskId,
    "task"
);

typed_id!(
    /// Identifies one agent loop run within a task.
    RunId,
    "run"
);
