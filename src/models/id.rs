use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for users, accounts and other stored entities.
///
/// Provider ids are kept verbatim; [`Id::file_stem`] gives a name that is safe
/// to use as a single path segment in the file-backed stores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Namespace for hashing ids that cannot be used as file names.
    const NAMESPACE: Uuid = Uuid::from_u128(0x3f0c_5a1e_8d2b_4c79_9e61_27b4_d5a8_0c13);

    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this id: the id itself when it is a plain segment,
    /// otherwise a deterministic UUIDv5 of it.
    pub fn file_stem(&self) -> String {
        if is_plain_segment(&self.0) {
            self.0.clone()
        } else {
            Uuid::new_v5(&Self::NAMESPACE, self.0.as_bytes()).to_string()
        }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

fn is_plain_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
