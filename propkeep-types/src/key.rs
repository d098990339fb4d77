//! Namespaced keys.
//!
//! A key is addressed inside a container as `namespace:key`. The namespace
//! keeps this layer's entries apart from unrelated data stored in the same
//! container.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated `(namespace, key)` pair.
///
/// Both parts are non-empty and limited to `[a-z0-9._-]`; the key part may
/// additionally contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacedKey {
    namespace: String,
    key: String,
}

impl NamespacedKey {
    /// Creates a key after validating both parts.
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> crate::Result<Self> {
        let namespace = namespace.into();
        let key = key.into();
        validate(&namespace, false)?;
        validate(&key, true)?;
        Ok(Self { namespace, key })
    }

    /// Parses the `namespace:key` rendering.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let (namespace, key) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidKey(format!("missing ':' separator in '{s}'")))?;
        Self::new(namespace, key)
    }

    /// Returns the namespace part.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the key part.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn validate(part: &str, allow_slash: bool) -> crate::Result<()> {
    if part.is_empty() {
        return Err(Error::InvalidKey("empty key component".into()));
    }
    let ok = part.chars().all(|c| {
        c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || matches!(c, '.' | '_' | '-')
            || (allow_slash && c == '/')
    });
    if !ok {
        return Err(Error::InvalidKey(format!(
            "'{part}' contains characters outside [a-z0-9._-{}]",
            if allow_slash { "/" } else { "" }
        )));
    }
    Ok(())
}

impl fmt::Display for NamespacedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.key)
    }
}

impl FromStr for NamespacedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NamespacedKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<NamespacedKey> for String {
    fn from(key: NamespacedKey) -> Self {
        key.to_string()
    }
}
