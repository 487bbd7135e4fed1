//! Store gateway for the Meeting Reconciler.
//!
//! Typed read/update access to the `meetings` and `users` collections. No
//! business logic lives here: the due-set definition, the status guard and the
//! missing-user policy are decided by callers and expressed as arguments.
//!
//! # Components
//!
//! - `client` - Store connection setup and per-operation timeouts
//! - `meetings` - Due-set queries and status-guarded updates
//! - `users` - User lookup with embedded devices
//!
//! The traits are the seam used by the transition pipeline; tests substitute
//! in-memory implementations.

pub mod client;
pub mod meetings;
pub mod users;

use crate::errors::ReconcilerError;
use crate::models::{Meeting, MeetingStatus, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{MeetingId, UserId};

pub use client::{connect, StoreHandle};
pub use meetings::MongoMeetingsRepository;
pub use users::MongoUsersRepository;

/// Read/update access to the `meetings` collection.
#[async_trait]
pub trait MeetingsRepository: Send + Sync {
    /// Fetch meetings with `status` whose start time is at or before `now`,
    /// oldest first, at most `limit` of them.
    async fn find_due(
        &self,
        status: MeetingStatus,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Meeting>, ReconcilerError>;

    /// Set the status of meeting `id` to `to`, but only while it is still
    /// `from`.
    ///
    /// Returns `true` when the update applied and `false` when no document
    /// matched (the meeting was already moved by someone else).
    async fn update_status(
        &self,
        id: &MeetingId,
        from: MeetingStatus,
        to: MeetingStatus,
    ) -> Result<bool, ReconcilerError>;
}

/// Read access to the `users` collection.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Look up a user by id. `Ok(None)` when no such user exists.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, ReconcilerError>;
}
