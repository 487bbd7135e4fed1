//! Common utilities and types shared across the meeting reconciler crates.

#![warn(clippy::pedantic)]

/// Module for Go-style duration strings ("5s", "1m30s")
pub mod duration;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for common data types
pub mod types;
