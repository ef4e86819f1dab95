//! Execution and creature identity

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an identifier received from a caller
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether this id can name a file or directory under a store root.
            ///
            /// Ids come back from callers, so anything that could escape the
            /// root is treated as a key that simply does not exist.
            pub fn is_safe_key(&self) -> bool {
                !self.0.is_empty()
                    && self.0 != "."
                    && self.0 != ".."
                    && self
                        .0
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
                    && !self.0.contains("..")
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_newtype!(
    /// Opaque token correlating one submitted result with its fetch and side effects
    ExecutionId
);
id_newtype!(
    /// Identity of a creature registered from an MCP result
    CreatureId
);
