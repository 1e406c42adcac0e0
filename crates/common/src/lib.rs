//! Common utilities and types shared across Huddle components.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for logging initialisation
pub mod observability;
