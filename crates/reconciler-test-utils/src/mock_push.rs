//! Recording push gateway mock.

use async_trait::async_trait;
use meeting_reconciler::errors::ReconcilerError;
use meeting_reconciler::services::{PushGateway, PushMessage, PushReport};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A message the mock received, with the retry budget it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
    pub message: PushMessage,
    pub retries: u32,
}

/// Push gateway that records every send.
///
/// Sends are recorded even when the mock is configured to fail them, so a
/// test can assert that exactly one attempt was made.
#[derive(Debug, Clone, Default)]
pub struct MockPushGateway {
    inner: Arc<Mutex<MockPushInner>>,
}

#[derive(Debug, Default)]
struct MockPushInner {
    sent: Vec<RecordedPush>,
    failing_meetings: HashSet<String>,
}

impl MockPushGateway {
    /// Create a mock that delivers to every token.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Fail sends whose payload carries `meeting_id`.
    #[must_use]
    pub fn failing_for(self, meeting_id: impl Into<String>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_meetings
            .insert(meeting_id.into());
        self
    }

    /// Get the number of sends made.
    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().sent.len()
    }

    /// All recorded sends, in order.
    pub fn sent(&self) -> Vec<RecordedPush> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Recorded sends for one meeting.
    pub fn sent_for(&self, meeting_id: &str) -> Vec<RecordedPush> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|r| r.message.payload.meeting_id == meeting_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PushGateway for MockPushGateway {
    async fn send(
        &self,
        message: &PushMessage,
        retries: u32,
    ) -> Result<PushReport, ReconcilerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(RecordedPush {
            message: message.clone(),
            retries,
        });

        if inner
            .failing_meetings
            .contains(&message.payload.meeting_id)
        {
            return Err(ReconcilerError::PushGateway(
                "mock push gateway failure".to_string(),
            ));
        }

        Ok(PushReport {
            success: message.tokens.len(),
            failure: 0,
        })
    }
}
