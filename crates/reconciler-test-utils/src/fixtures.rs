//! Pre-configured test data fixtures.
//!
//! Ids are derived from small integers and rendered as 24-character hex so
//! they look like stored ids: `TestMeeting::new(1)` has id
//! `000000000000000000000001`.

use chrono::{DateTime, Duration, Utc};
use common::types::{MeetingId, UserId};
use meeting_reconciler::models::{Device, Meeting, MeetingStatus, User};

/// Hex id for fixture number `n`.
#[must_use]
pub fn hex_id(n: u64) -> String {
    format!("{:024x}", n)
}

/// Meeting id for fixture number `n`.
#[must_use]
pub fn meeting_id(n: u64) -> MeetingId {
    MeetingId(hex_id(n))
}

/// User id for fixture number `n` (disjoint from meeting ids).
#[must_use]
pub fn user_id(n: u64) -> UserId {
    UserId(hex_id(0x00ff_0000_0000 + n))
}

/// Test meeting builder.
#[derive(Debug, Clone)]
pub struct TestMeeting {
    meeting: Meeting,
}

impl TestMeeting {
    /// A SCHEDULED meeting that started one minute ago, with no participants.
    #[must_use]
    pub fn new(n: u64) -> Self {
        Self {
            meeting: Meeting {
                id: meeting_id(n),
                goal: format!("Test meeting {}", n),
                participants: Vec::new(),
                owner: None,
                company: None,
                room: None,
                start_time: Utc::now() - Duration::minutes(1),
                end_time: None,
                status: MeetingStatus::Scheduled,
            },
        }
    }

    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.meeting.goal = goal.into();
        self
    }

    #[must_use]
    pub fn with_participant(mut self, user: &UserId) -> Self {
        self.meeting.participants.push(user.clone());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: MeetingStatus) -> Self {
        self.meeting.status = status;
        self
    }

    #[must_use]
    pub fn starting_at(mut self, start_time: DateTime<Utc>) -> Self {
        self.meeting.start_time = start_time;
        self
    }

    #[must_use]
    pub fn started_minutes_ago(self, minutes: i64) -> Self {
        self.starting_at(Utc::now() - Duration::minutes(minutes))
    }

    #[must_use]
    pub fn starting_in_minutes(self, minutes: i64) -> Self {
        self.starting_at(Utc::now() + Duration::minutes(minutes))
    }

    #[must_use]
    pub fn build(self) -> Meeting {
        self.meeting
    }
}

/// Test user builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    user: User,
}

impl TestUser {
    /// A user with no devices.
    #[must_use]
    pub fn new(n: u64) -> Self {
        Self {
            user: User {
                id: user_id(n),
                first_name: "Test".to_string(),
                last_name: format!("User{}", n),
                devices: Vec::new(),
            },
        }
    }

    /// Add a device with the given push token.
    #[must_use]
    pub fn with_device(mut self, token: impl Into<String>) -> Self {
        let index = self.user.devices.len();
        self.user.devices.push(Device {
            token: token.into(),
            name: format!("device-{}", index),
            platform: "android".to_string(),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> User {
        self.user
    }
}
