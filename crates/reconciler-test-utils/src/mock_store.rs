//! In-memory store mock.
//!
//! Implements both repository traits over shared state, with the same
//! semantics as the real store: the due-set query filters on status and start
//! time, sorts oldest first and honors the limit; the status update is atomic
//! and applies only while the stored status still matches.
//!
//! # Example
//!
//! ```rust,ignore
//! use reconciler_test_utils::*;
//!
//! let store = MockStore::new()
//!     .with_meeting(TestMeeting::new(1).build())
//!     .failing_queries(1);
//!
//! // First find_due fails, the next one succeeds
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{MeetingId, UserId};
use meeting_reconciler::errors::ReconcilerError;
use meeting_reconciler::models::{Meeting, MeetingStatus, User};
use meeting_reconciler::repositories::{MeetingsRepository, UsersRepository};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory meetings and users.
///
/// Cloning shares state, so a test can keep a handle for assertions while
/// the pipeline holds another.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    meetings: HashMap<MeetingId, Meeting>,
    users: HashMap<UserId, User>,
    /// Number of upcoming `find_due` calls that fail.
    failing_queries: usize,
    failing_updates: HashSet<MeetingId>,
    failing_lookups: HashSet<UserId>,
    update_delay: Option<Duration>,
    query_count: usize,
    update_attempts: usize,
    /// Updates that matched the guard, in order.
    applied_updates: Vec<(MeetingId, MeetingStatus)>,
}

impl MockStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a meeting.
    #[must_use]
    pub fn with_meeting(self, meeting: Meeting) -> Self {
        self.inner
            .lock()
            .unwrap()
            .meetings
            .insert(meeting.id.clone(), meeting);
        self
    }

    /// Add a user.
    #[must_use]
    pub fn with_user(self, user: User) -> Self {
        self.inner.lock().unwrap().users.insert(user.id.clone(), user);
        self
    }

    /// Make the next `count` due-set queries fail with a store error.
    #[must_use]
    pub fn failing_queries(self, count: usize) -> Self {
        self.inner.lock().unwrap().failing_queries = count;
        self
    }

    /// Make every status update for `id` fail with a store error.
    #[must_use]
    pub fn failing_update_for(self, id: &MeetingId) -> Self {
        self.inner.lock().unwrap().failing_updates.insert(id.clone());
        self
    }

    /// Make every lookup of `id` fail with a timeout.
    #[must_use]
    pub fn failing_lookup_for(self, id: &UserId) -> Self {
        self.inner.lock().unwrap().failing_lookups.insert(id.clone());
        self
    }

    /// Delay every status update, to widen race windows.
    #[must_use]
    pub fn with_update_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().update_delay = Some(delay);
        self
    }

    /// Stop failing status updates for `id`.
    pub fn heal_update_for(&self, id: &MeetingId) {
        self.inner.lock().unwrap().failing_updates.remove(id);
    }

    /// Current status of a meeting.
    pub fn meeting_status(&self, id: &MeetingId) -> Option<MeetingStatus> {
        self.inner.lock().unwrap().meetings.get(id).map(|m| m.status)
    }

    /// Number of `find_due` calls, including failed ones.
    pub fn query_count(&self) -> usize {
        self.inner.lock().unwrap().query_count
    }

    /// Number of `update_status` calls, including failed and skipped ones.
    pub fn update_attempts(&self) -> usize {
        self.inner.lock().unwrap().update_attempts
    }

    /// Updates that applied, in order.
    pub fn applied_updates(&self) -> Vec<(MeetingId, MeetingStatus)> {
        self.inner.lock().unwrap().applied_updates.clone()
    }

    /// Number of applied updates for one meeting.
    pub fn applied_updates_for(&self, id: &MeetingId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .applied_updates
            .iter()
            .filter(|(m, _)| m == id)
            .count()
    }
}

#[async_trait]
impl MeetingsRepository for MockStore {
    async fn find_due(
        &self,
        status: MeetingStatus,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Meeting>, ReconcilerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.query_count += 1;

        if inner.failing_queries > 0 {
            inner.failing_queries -= 1;
            return Err(ReconcilerError::Store("mock query failure".to_string()));
        }

        let mut due: Vec<Meeting> = inner
            .meetings
            .values()
            .filter(|m| m.status == status && m.start_time <= now)
            .cloned()
            .collect();
        due.sort_by_key(|m| m.start_time);
        due.truncate(usize::try_from(limit).unwrap());

        Ok(due)
    }

    async fn update_status(
        &self,
        id: &MeetingId,
        from: MeetingStatus,
        to: MeetingStatus,
    ) -> Result<bool, ReconcilerError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.update_attempts += 1;
            inner.update_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.failing_updates.contains(id) {
            return Err(ReconcilerError::Store("mock update failure".to_string()));
        }

        let applied = match inner.meetings.get_mut(id) {
            Some(meeting) if meeting.status == from => {
                meeting.status = to;
                true
            }
            _ => false,
        };
        if applied {
            inner.applied_updates.push((id.clone(), to));
        }

        Ok(applied)
    }
}

#[async_trait]
impl UsersRepository for MockStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, ReconcilerError> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_lookups.contains(id) {
            return Err(ReconcilerError::Timeout("mock user lookup".to_string()));
        }
        Ok(inner.users.get(id).cloned())
    }
}
