use derive_new::new;
use serde::{Deserialize, Serialize};

/// Country code of clicks that could not be attributed, or whose visitor opted out.
pub const UNKNOWN_CODE: &str = "XX";

/// Display name paired with [UNKNOWN_CODE].
pub const UNKNOWN_NAME: &str = "Atlantis";

/// The country a click is counted towards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
pub struct Attribution {
    pub code: String,
    pub name: String,
}

impl Attribution {
    /// The sentinel attribution used for anonymous and unresolved visitors.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_CODE.to_owned(), UNKNOWN_NAME.to_owned())
    }
}

impl Default for Attribution {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for Attribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
