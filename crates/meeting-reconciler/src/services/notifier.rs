//! Meeting-started notifications.

use crate::errors::ReconcilerError;
use crate::models::{Meeting, MeetingStatus};
use crate::observability::metrics;
use crate::services::device_resolver::DeviceResolver;
use crate::services::push_client::{PushGateway, PushMessage, PushPayload};
use common::types::UserId;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Action carried in every notification payload.
pub const MEETING_STARTED_ACTION: &str = "meeting_started";

/// Result of a notification attempt that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The message was handed to the push gateway.
    Sent {
        recipients: usize,
        delivered: usize,
        failed: usize,
        unresolved: Vec<UserId>,
    },

    /// No participant had a device; the gateway was not called.
    NoRecipients { unresolved: Vec<UserId> },
}

impl NotifyOutcome {
    fn label(&self) -> &'static str {
        match self {
            NotifyOutcome::Sent { .. } => "sent",
            NotifyOutcome::NoRecipients { .. } => "no_recipients",
        }
    }
}

/// Builds the payload for a meeting.
pub fn meeting_started_payload(meeting: &Meeting) -> PushPayload {
    PushPayload {
        action: MEETING_STARTED_ACTION.to_string(),
        meeting_id: meeting.id.to_string(),
        meeting_goal: meeting.goal.clone(),
    }
}

/// Sends one multicast push per transitioned meeting.
#[derive(Clone)]
pub struct Notifier {
    resolver: DeviceResolver,
    gateway: Arc<dyn PushGateway>,
    retries: u32,
}

impl Notifier {
    pub fn new(resolver: DeviceResolver, gateway: Arc<dyn PushGateway>, retries: u32) -> Self {
        Self {
            resolver,
            gateway,
            retries,
        }
    }

    /// Notify every participant device that `meeting` is now `status`.
    ///
    /// # Errors
    ///
    /// Returns the push gateway error if the send failed after retries. The
    /// caller decides what to do with it; nothing here is retried later.
    #[instrument(skip_all, fields(meeting_id = %meeting.id, status = %status))]
    pub async fn notify(
        &self,
        meeting: &Meeting,
        status: MeetingStatus,
    ) -> Result<NotifyOutcome, ReconcilerError> {
        let resolution = self.resolver.resolve(meeting).await;

        if resolution.tokens.is_empty() {
            info!(
                target: "reconciler.notifier",
                meeting = %meeting,
                unresolved = resolution.unresolved.len(),
                "No recipients for meeting, skipping notification"
            );
            let outcome = NotifyOutcome::NoRecipients {
                unresolved: resolution.unresolved,
            };
            metrics::record_notification(outcome.label());
            return Ok(outcome);
        }

        let recipients = resolution.tokens.len();
        metrics::record_notification_recipients(recipients);

        let message = PushMessage {
            tokens: resolution.tokens,
            payload: meeting_started_payload(meeting),
        };

        match self.gateway.send(&message, self.retries).await {
            Ok(report) => {
                info!(
                    target: "reconciler.notifier",
                    meeting = %meeting,
                    status = %status,
                    recipients = recipients,
                    delivered = report.success,
                    failed = report.failure,
                    "Sent meeting notification"
                );
                let outcome = NotifyOutcome::Sent {
                    recipients,
                    delivered: report.success,
                    failed: report.failure,
                    unresolved: resolution.unresolved,
                };
                metrics::record_notification(outcome.label());
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    target: "reconciler.notifier",
                    meeting = %meeting,
                    recipients = recipients,
                    error = %e,
                    "Failed to send meeting notification"
                );
                metrics::record_notification(e.kind());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{Device, User};
    use crate::repositories::UsersRepository;
    use crate::services::push_client::PushReport;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::types::MeetingId;
    use std::sync::Mutex;

    struct OneUser(User);

    #[async_trait]
    impl UsersRepository for OneUser {
        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, ReconcilerError> {
            Ok((self.0.id == *id).then(|| self.0.clone()))
        }
    }

    /// Records every message; fails when `fail` is set.
    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(PushMessage, u32)>>,
        fail: bool,
    }

    #[async_trait]
    impl PushGateway for RecordingGateway {
        async fn send(
            &self,
            message: &PushMessage,
            retries: u32,
        ) -> Result<PushReport, ReconcilerError> {
            self.sent.lock().unwrap().push((message.clone(), retries));
            if self.fail {
                return Err(ReconcilerError::PushGateway("503".to_string()));
            }
            Ok(PushReport {
                success: message.tokens.len(),
                failure: 0,
            })
        }
    }

    fn meeting(participants: &[&str]) -> Meeting {
        Meeting {
            id: MeetingId::new("64b7f0c2a1b2c3d4e5f60718"),
            goal: "Launch review".to_string(),
            participants: participants.iter().map(|p| UserId::new(*p)).collect(),
            owner: None,
            company: None,
            room: None,
            start_time: Utc::now(),
            end_time: None,
            status: MeetingStatus::Active,
        }
    }

    fn notifier(gateway: Arc<RecordingGateway>) -> Notifier {
        let user = User {
            id: UserId::new("u1"),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            devices: vec![Device {
                token: "T1".to_string(),
                ..Device::default()
            }],
        };
        Notifier::new(DeviceResolver::new(Arc::new(OneUser(user))), gateway, 3)
    }

    #[test]
    fn test_payload_carries_meeting_id_and_goal() {
        let payload = meeting_started_payload(&meeting(&[]));
        assert_eq!(payload.action, "meeting_started");
        assert_eq!(payload.meeting_id, "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(payload.meeting_goal, "Launch review");
    }

    #[tokio::test]
    async fn test_sends_one_message_with_configured_retries() {
        let gateway = Arc::new(RecordingGateway::default());
        let notifier = notifier(gateway.clone());

        let outcome = notifier
            .notify(&meeting(&["u1", "missing"]), MeetingStatus::Active)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotifyOutcome::Sent {
                recipients: 1,
                delivered: 1,
                failed: 0,
                unresolved: vec![UserId::new("missing")],
            }
        );

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (message, retries) = &sent[0];
        assert_eq!(message.tokens, vec!["T1"]);
        assert_eq!(message.payload.meeting_id, "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(*retries, 3);
    }

    #[tokio::test]
    async fn test_no_recipients_skips_gateway() {
        let gateway = Arc::new(RecordingGateway::default());
        let notifier = notifier(gateway.clone());

        let outcome = notifier
            .notify(&meeting(&["nobody"]), MeetingStatus::Active)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotifyOutcome::NoRecipients {
                unresolved: vec![UserId::new("nobody")]
            }
        );
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_returned() {
        let gateway = Arc::new(RecordingGateway {
            fail: true,
            ..RecordingGateway::default()
        });
        let notifier = notifier(gateway.clone());

        let result = notifier
            .notify(&meeting(&["u1"]), MeetingStatus::Active)
            .await;

        assert!(matches!(result, Err(ReconcilerError::PushGateway(_))));
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    }
}
