//! Owner identity.

use crate::NamespacedKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identity of a property owner (a connected session or player).
///
/// Hosts usually already have a UUID for the owner and convert it with
/// `From<Uuid>`. The manager only uses the id as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Creates a fresh id for an owner the host has no UUID for.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Addresses `key` for this owner inside a container shared by many
    /// owners: `namespace:<uuid>/key`.
    pub fn scoped_key(&self, namespace: &str, key: &str) -> crate::Result<NamespacedKey> {
        NamespacedKey::new(namespace, format!("{}/{key}", self.0.hyphenated()))
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OwnerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
