//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Room tokens are
//! bearer credentials issued by the conferencing backend, so they are carried as
//! [`SecretString`] from the moment configuration is read until the adapter
//! hands them to the backend's connect primitive.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct JoinRequest {
//!     room_name: String,
//!     room_token: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let req = JoinRequest {
//!     room_name: "standup".to_string(),
//!     room_token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! println!("{:?}", req);
//!
//! // Access is always explicit
//! let token: &str = req.room_token.expose_secret();
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
