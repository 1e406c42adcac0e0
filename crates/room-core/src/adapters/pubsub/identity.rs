//! Identity resolution from connection metadata.
//!
//! The backend exposes no participant identity of its own. The token issuer
//! attaches `{"identity":"…"}` as connection data, and every identity lookup
//! (local participant, remote streams, signal routing) goes through
//! [`resolve_identity`].

use common::types::Identity;
use serde::Deserialize;

#[derive(Deserialize)]
struct ConnectionData {
    identity: Option<String>,
}

/// Parse the identity out of a connection's metadata.
///
/// Returns `None` when the data is not JSON, has no `identity` field, or the
/// identity is empty.
#[must_use]
pub fn resolve_identity(connection_data: &str) -> Option<Identity> {
    let data: ConnectionData = serde_json::from_str(connection_data).ok()?;
    data.identity
        .filter(|identity| !identity.is_empty())
        .map(Identity::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_identity() {
        assert_eq!(
            resolve_identity(r#"{"identity":"alice"}"#),
            Some(Identity::from("alice"))
        );
    }

    #[test]
    fn test_ignores_extra_fields() {
        assert_eq!(
            resolve_identity(r#"{"role":"host","identity":"bob","joinedAt":1700000000}"#),
            Some(Identity::from("bob"))
        );
    }

    #[test]
    fn test_unresolvable_metadata() {
        assert_eq!(resolve_identity(""), None);
        assert_eq!(resolve_identity("identity=alice"), None);
        assert_eq!(resolve_identity("{}"), None);
        assert_eq!(resolve_identity(r#"{"identity":""}"#), None);
        assert_eq!(resolve_identity(r#"{"identity":null}"#), None);
        assert_eq!(resolve_identity(r#"{"identity":42}"#), None);
    }
}
