//! Common data types for the meeting reconciler.
//!
//! Identifiers are opaque to the reconciliation core. The store layer keeps
//! them as 24-character hex strings (the textual form of a document
//! ObjectId) and converts at the driver boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a meeting
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(pub String);

impl MeetingId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a user (meeting participant, owner)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_id_display_is_raw_value() {
        let id = MeetingId::new("5f1d7a0c9b1e8a3d4c2b1a00");
        assert_eq!(id.to_string(), "5f1d7a0c9b1e8a3d4c2b1a00");
        assert_eq!(id.as_str(), "5f1d7a0c9b1e8a3d4c2b1a00");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = UserId::new("abc");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"abc\"");
    }
}
