//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types
//! for every sensitive configuration value: the push gateway API key and the
//! document store password.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` that holds a secret is safe to log with `{:?}` or through tracing.
//! Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct PushCredentials {
//!     sender: String,
//!     api_key: SecretString,
//! }
//!
//! let creds = PushCredentials {
//!     sender: "reconciler".to_string(),
//!     api_key: SecretString::from("AIza-example"),
//! };
//!
//! // Safe: the key is redacted
//! println!("{:?}", creds);
//!
//! // Reading the value is always explicit
//! let header = format!("key={}", creds.api_key.expose_secret());
//! # assert_eq!(header, "key=AIza-example");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
