//! Meeting status transitions.
//!
//! One transition is one status-guarded update followed, only if that update
//! applied, by one notification attempt. The update always completes before
//! the notification starts.

use crate::errors::ReconcilerError;
use crate::models::{Meeting, MeetingStatus};
use crate::observability::metrics;
use crate::repositories::MeetingsRepository;
use crate::services::notifier::{Notifier, NotifyOutcome};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a transition attempt whose store update did not fail.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The status was changed; `notification` is the result of notifying
    /// participants. A notification error here is final.
    Transitioned {
        notification: Result<NotifyOutcome, ReconcilerError>,
    },

    /// No document matched the guard: another worker already moved it.
    AlreadyTransitioned,
}

/// Applies status transitions and triggers notifications.
#[derive(Clone)]
pub struct Transitioner {
    meetings: Arc<dyn MeetingsRepository>,
    notifier: Notifier,
}

impl Transitioner {
    pub fn new(meetings: Arc<dyn MeetingsRepository>, notifier: Notifier) -> Self {
        Self { meetings, notifier }
    }

    /// Move `meeting` from its current status to `to`, then notify.
    ///
    /// # Errors
    ///
    /// Returns the store error if the update itself failed. The meeting keeps
    /// its old status and will be picked up again by a later cycle.
    #[instrument(skip_all, name = "reconciler.transition", fields(meeting_id = %meeting.id, from = %meeting.status, to = %to))]
    pub async fn transition(
        &self,
        meeting: &Meeting,
        to: MeetingStatus,
    ) -> Result<TransitionOutcome, ReconcilerError> {
        let applied = match self
            .meetings
            .update_status(&meeting.id, meeting.status, to)
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                warn!(
                    target: "reconciler.transition",
                    meeting = %meeting,
                    error = %e,
                    "Failed to update meeting status"
                );
                metrics::record_transition(e.kind());
                return Err(e);
            }
        };

        if !applied {
            debug!(
                target: "reconciler.transition",
                meeting = %meeting,
                "Meeting already transitioned, skipping notification"
            );
            metrics::record_transition("already_transitioned");
            return Ok(TransitionOutcome::AlreadyTransitioned);
        }

        info!(
            target: "reconciler.transition",
            meeting = %meeting,
            from = %meeting.status,
            to = %to,
            "Meeting status updated"
        );
        metrics::record_transition("transitioned");

        let mut updated = meeting.clone();
        updated.status = to;
        let notification = self.notifier.notify(&updated, to).await;

        Ok(TransitionOutcome::Transitioned { notification })
    }
}
