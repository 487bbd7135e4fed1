//! Push gateway HTTP client.
//!
//! Speaks the legacy multicast protocol: one `POST` per batch of up to 1000
//! registration tokens, authenticated with `Authorization: key=<api key>`.
//!
//! # Retries
//!
//! - Transport errors, 5xx and 429 responses are retried with exponential
//!   backoff, up to `retries` extra attempts per batch
//! - On 200, tokens whose per-token result is `Unavailable` or
//!   `InternalServerError` are retried on their own within the same budget
//! - 400 and 401 are never retried

use crate::errors::ReconcilerError;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Maximum registration tokens the gateway accepts per request.
pub const MAX_TOKENS_PER_REQUEST: usize = 1000;

/// First retry delay; doubles on each attempt.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on a single retry delay.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Per-token errors that are worth retrying.
const RETRYABLE_TOKEN_ERRORS: [&str; 2] = ["Unavailable", "InternalServerError"];

/// Data payload delivered to devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    pub action: String,
    pub meeting_id: String,
    pub meeting_goal: String,
}

/// A multicast message: one payload, many recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub tokens: Vec<String>,
    pub payload: PushPayload,
}

/// Delivery counts across all batches of one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Tokens the gateway accepted.
    pub success: usize,

    /// Tokens that failed permanently or ran out of retries.
    pub failure: usize,
}

impl PushReport {
    fn merge(&mut self, other: PushReport) {
        self.success += other.success;
        self.failure += other.failure;
    }
}

/// Trait for push gateway operations (enables mocking).
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send `message` to every token, retrying transient failures up to
    /// `retries` extra times.
    ///
    /// # Errors
    ///
    /// - `ReconcilerError::PushGateway` - gateway unreachable after all retries
    /// - `ReconcilerError::PushRejected` - request refused (bad key or payload)
    async fn send(&self, message: &PushMessage, retries: u32)
        -> Result<PushReport, ReconcilerError>;
}

#[derive(Serialize)]
struct MulticastRequest<'a> {
    registration_ids: &'a [String],
    data: &'a PushPayload,
}

#[derive(Debug, Deserialize)]
struct MulticastResponse {
    #[serde(default)]
    success: usize,
    #[serde(default)]
    failure: usize,
    #[serde(default)]
    results: Vec<TokenResult>,
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP push gateway client.
#[derive(Clone)]
pub struct FcmClient {
    /// HTTP client with configured timeouts.
    client: Client,

    endpoint: String,

    /// Server API key (protected by SecretString).
    api_key: SecretString,

    initial_backoff: Duration,
    max_backoff: Duration,
}

impl std::fmt::Debug for FcmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FcmClient {
    /// Create a new push client.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Multicast send URL
    /// * `api_key` - Server API key
    /// * `timeout` - Upper bound for each HTTP request
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::Internal` if the HTTP client cannot be built.
    pub fn new(
        endpoint: String,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ReconcilerError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(target: "reconciler.push", error = %e, "Failed to build HTTP client");
                ReconcilerError::Internal(format!("failed to build push HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        })
    }

    /// Override the retry backoff bounds.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Send one batch, retrying as described in the module docs.
    async fn send_batch(
        &self,
        tokens: &[String],
        payload: &PushPayload,
        retries: u32,
    ) -> Result<PushReport, ReconcilerError> {
        let mut report = PushReport::default();
        let mut pending: Vec<String> = tokens.to_vec();
        let mut backoff = self.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            match self.post(&pending, payload).await {
                Ok(response) => {
                    let retry = apply_results(&pending, &response, &mut report);
                    if retry.is_empty() {
                        return Ok(report);
                    }
                    if attempt >= retries {
                        warn!(
                            target: "reconciler.push",
                            tokens = retry.len(),
                            "Giving up on tokens after retries"
                        );
                        report.failure += retry.len();
                        return Ok(report);
                    }
                    debug!(
                        target: "reconciler.push",
                        tokens = retry.len(),
                        attempt = attempt + 1,
                        "Retrying unavailable tokens"
                    );
                    pending = retry;
                }
                Err(e) if is_retryable(&e) && attempt < retries => {
                    warn!(
                        target: "reconciler.push",
                        error = %e,
                        attempt = attempt + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "Push request failed, retrying"
                    );
                }
                Err(e) => {
                    // Tokens already settled on an earlier attempt stay counted.
                    if report.success + report.failure > 0 {
                        report.failure += pending.len();
                        return Ok(report);
                    }
                    return Err(e);
                }
            }

            attempt += 1;
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }

    async fn post(
        &self,
        tokens: &[String],
        payload: &PushPayload,
    ) -> Result<MulticastResponse, ReconcilerError> {
        let request = MulticastRequest {
            registration_ids: tokens,
            data: payload,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                "Authorization",
                format!("key={}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "reconciler.push", error = %e, "Push gateway request failed");
                ReconcilerError::PushGateway(format!("request failed: {}", e))
            })?;

        self.handle_response(response).await
    }

    /// Map gateway status codes to errors.
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<MulticastResponse, ReconcilerError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                error!(target: "reconciler.push", error = %e, "Failed to parse push gateway response");
                ReconcilerError::PushGateway(format!("unparseable response: {}", e))
            })
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(target: "reconciler.push", status = %status, "Push gateway unavailable");
            Err(ReconcilerError::PushGateway(format!(
                "gateway returned {}",
                status
            )))
        } else if status == StatusCode::UNAUTHORIZED {
            error!(target: "reconciler.push", "Push API key rejected by gateway");
            Err(ReconcilerError::PushRejected(
                "API key rejected".to_string(),
            ))
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "reconciler.push", status = %status, body = %body, "Push gateway rejected request");
            Err(ReconcilerError::PushRejected(format!(
                "gateway returned {}",
                status
            )))
        }
    }
}

/// Tally per-token results into `report` and return the tokens to retry.
///
/// If the gateway did not return one result per token, its aggregate counts
/// are trusted instead and nothing is retried.
fn apply_results(
    tokens: &[String],
    response: &MulticastResponse,
    report: &mut PushReport,
) -> Vec<String> {
    if response.results.len() != tokens.len() {
        report.success += response.success;
        report.failure += response.failure;
        return Vec::new();
    }

    let mut retry = Vec::new();
    for (token, result) in tokens.iter().zip(&response.results) {
        match result.error.as_deref() {
            None => report.success += 1,
            Some(e) if RETRYABLE_TOKEN_ERRORS.contains(&e) => retry.push(token.clone()),
            Some(_) => report.failure += 1,
        }
    }
    retry
}

fn is_retryable(error: &ReconcilerError) -> bool {
    matches!(error, ReconcilerError::PushGateway(_))
}

#[async_trait]
impl PushGateway for FcmClient {
    #[instrument(skip_all, fields(meeting_id = %message.payload.meeting_id, recipients = message.tokens.len()))]
    async fn send(
        &self,
        message: &PushMessage,
        retries: u32,
    ) -> Result<PushReport, ReconcilerError> {
        let mut report = PushReport::default();
        let mut last_error = None;

        for batch in message.tokens.chunks(MAX_TOKENS_PER_REQUEST) {
            match self.send_batch(batch, &message.payload, retries).await {
                Ok(batch_report) => report.merge(batch_report),
                Err(e) => {
                    report.failure += batch.len();
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if report.success == 0 => Err(e),
            _ => Ok(report),
        }
    }
}
