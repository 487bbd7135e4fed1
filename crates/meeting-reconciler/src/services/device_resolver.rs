//! Device token resolution.
//!
//! Turns a meeting's participant ids into the push tokens of every registered
//! device. Participants are looked up one at a time, in order, so the output
//! keeps participant-then-device order.

use crate::models::Meeting;
use crate::repositories::UsersRepository;
use common::types::UserId;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Tokens found for a meeting, plus the participants that contributed none
/// because they could not be looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceResolution {
    /// Push tokens, participant-then-device order, not de-duplicated.
    pub tokens: Vec<String>,

    /// Participants that were missing or whose lookup failed.
    pub unresolved: Vec<UserId>,
}

/// Resolves participants to device tokens.
#[derive(Clone)]
pub struct DeviceResolver {
    users: Arc<dyn UsersRepository>,
}

impl DeviceResolver {
    pub fn new(users: Arc<dyn UsersRepository>) -> Self {
        Self { users }
    }

    /// Resolve the push tokens for every participant of `meeting`.
    ///
    /// Never fails as a whole: a missing user or a failed lookup is recorded
    /// in `unresolved` and resolution continues with the next participant.
    #[instrument(skip_all, fields(meeting_id = %meeting.id, participants = meeting.participants.len()))]
    pub async fn resolve(&self, meeting: &Meeting) -> DeviceResolution {
        let mut resolution = DeviceResolution::default();

        for participant in &meeting.participants {
            match self.users.find_by_id(participant).await {
                Ok(Some(user)) => {
                    resolution.tokens.extend(
                        user.devices
                            .into_iter()
                            .map(|d| d.token)
                            .filter(|t| !t.is_empty()),
                    );
                }
                Ok(None) => {
                    warn!(
                        target: "reconciler.notifier",
                        meeting_id = %meeting.id,
                        user_id = %participant,
                        "Participant not found, skipping"
                    );
                    resolution.unresolved.push(participant.clone());
                }
                Err(e) => {
                    warn!(
                        target: "reconciler.notifier",
                        meeting_id = %meeting.id,
                        user_id = %participant,
                        error = %e,
                        "Participant lookup failed, skipping"
                    );
                    resolution.unresolved.push(participant.clone());
                }
            }
        }

        resolution
    }
}
