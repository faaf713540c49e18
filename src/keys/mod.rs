//! Secret keys known to the backend.
//!
//! The registry owns the current list of secret keys and the user's selected
//! key. The list is always replaced wholesale from a fresh backend listing,
//! never patched in place.
//!
//! # Module Structure
//!
//! - `listing`: parser for the backend's colon-delimited key listing
//! - `registry`: key list, selection, and the create/import/export/delete operations

pub mod listing;
pub mod registry;

pub use self::listing::parse_secret_key_listing;
pub use self::registry::KeyRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One secret key known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRecord {
    /// Stable unique identifier of the key pair
    pub fingerprint: String,
    /// Human-readable user id, usually `Name <email>`
    pub identity: String,
}

impl KeyRecord {
    pub fn new(fingerprint: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            identity: identity.into(),
        }
    }
}

impl fmt::Display for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identity, self.fingerprint)
    }
}

/// A reference to a key by fingerprint, with the identity last seen for it.
///
/// This does not own the key. The registry re-resolves it against every new
/// listing and drops it when the key disappears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedKey {
    pub fingerprint: String,
    pub identity: String,
}

impl From<&KeyRecord> for SelectedKey {
    fn from(record: &KeyRecord) -> Self {
        Self {
            fingerprint: record.fingerprint.clone(),
            identity: record.identity.clone(),
        }
    }
}

/// The user id string the backend stores for a generated key.
///
/// ```
/// use gpgpad::keys::format_identity;
///
/// assert_eq!(
///     format_identity("Test User", "test@example.com"),
///     "Test User <test@example.com>"
/// );
/// ```
pub fn format_identity(name: &str, email: &str) -> String {
    format!("{} <{}>", name, email)
}
