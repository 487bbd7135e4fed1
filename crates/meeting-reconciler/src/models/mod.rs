//! Meeting Reconciler models.
//!
//! Domain types shared by the store gateway, the transition pipeline and the
//! notifier. They carry no driver types; the repository layer converts to and
//! from stored documents.

use chrono::{DateTime, Utc};
use common::types::{MeetingId, UserId};
use std::fmt;

/// Meeting status enumeration.
///
/// Ordinals are fixed for storage compatibility with existing documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeetingStatus {
    /// Meeting is scheduled but not yet active.
    Scheduled = 1,

    /// Meeting has started.
    Active = 2,

    /// Meeting has ended normally.
    Complete = 3,

    /// Meeting was canceled.
    Canceled = 4,

    /// Meeting never ended cleanly.
    Zombie = 5,
}

impl MeetingStatus {
    /// Stored ordinal value.
    #[must_use]
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Active => "active",
            MeetingStatus::Complete => "complete",
            MeetingStatus::Canceled => "canceled",
            MeetingStatus::Zombie => "zombie",
        }
    }
}

impl TryFrom<i64> for MeetingStatus {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MeetingStatus::Scheduled),
            2 => Ok(MeetingStatus::Active),
            3 => Ok(MeetingStatus::Complete),
            4 => Ok(MeetingStatus::Canceled),
            5 => Ok(MeetingStatus::Zombie),
            other => Err(other),
        }
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled meeting as read from the `meetings` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    /// Unique meeting identifier.
    pub id: MeetingId,

    /// What the meeting is for; sent to devices in the notification payload.
    pub goal: String,

    /// Participant user ids, resolved by lookup in the `users` collection.
    pub participants: Vec<UserId>,

    pub owner: Option<UserId>,
    pub company: Option<String>,
    pub room: Option<String>,

    /// Scheduled start; the meeting is due once this is in the past.
    pub start_time: DateTime<Utc>,

    pub end_time: Option<DateTime<Utc>>,

    /// Current lifecycle status.
    pub status: MeetingStatus,
}

impl fmt::Display for Meeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]@[{}]", self.id, self.goal)
    }
}

/// A registered mobile device embedded in a user record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Device {
    /// Push registration token.
    pub token: String,
    pub name: String,
    pub platform: String,
}

/// A user as read from the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub devices: Vec<Device>,
}
