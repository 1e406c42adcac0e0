//! Common data types for Huddle components.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a participant for the lifetime of a room session.
///
/// Backends hand identities out in different shapes (a participant field on
/// one, JSON connection metadata on the other); adapters normalise them into
/// this type before anything else sees them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from any string-like value.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Borrow the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An identity with no characters is never a valid participant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for Identity {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Identity {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Unique identifier for a track within a room session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Wrap an adapter-derived id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id with the given prefix.
    ///
    /// The random suffix guarantees an id is never handed out twice in one
    /// session, even when the same role is re-acquired.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4().simple()))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_serializes_as_plain_string() {
        let identity = Identity::from("alice");
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(json, "\"alice\"");

        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, "alice");
    }

    #[test]
    fn test_generated_track_ids_are_unique() {
        let a = TrackId::generate("local-camera");
        let b = TrackId::generate("local-camera");

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("local-camera-"));
    }

    #[test]
    fn test_empty_identity() {
        assert!(Identity::new("").is_empty());
        assert!(!Identity::new("bob").is_empty());
    }
}
