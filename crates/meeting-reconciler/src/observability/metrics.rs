//! Metrics definitions for the Meeting Reconciler.
//!
//! All metrics follow Prometheus naming conventions:
//! - `reconciler_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: success, error (cycles); ok, invalid (listener)
//! - `outcome`: bounded by the outcome enums and `ReconcilerError::kind()`
//!
//! Meeting ids never appear as labels; they belong in logs.

use metrics::{counter, histogram};

// ============================================================================
// Reconciler Cycle Metrics
// ============================================================================

/// Record a reconciliation cycle.
///
/// Metric: `reconciler_cycles_total`
/// Labels: `status`
pub fn record_cycle(status: &'static str) {
    counter!("reconciler_cycles_total", "status" => status).increment(1);
}

/// Record the size of a due-set that was successfully queried.
///
/// Metric: `reconciler_due_meetings`
pub fn record_due_meetings(due: usize) {
    #[allow(clippy::cast_precision_loss)]
    let due = due as f64;
    histogram!("reconciler_due_meetings").record(due);
}

// ============================================================================
// Transition Metrics
// ============================================================================

/// Record the outcome of one transition attempt.
///
/// Metric: `reconciler_transitions_total`
/// Labels: `outcome` (transitioned, already_transitioned, or an error kind)
pub fn record_transition(outcome: &'static str) {
    counter!("reconciler_transitions_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Notification Metrics
// ============================================================================

/// Record the outcome of one notification attempt.
///
/// Metric: `reconciler_notifications_total`
/// Labels: `outcome` (sent, no_recipients, or an error kind)
pub fn record_notification(outcome: &'static str) {
    counter!("reconciler_notifications_total", "outcome" => outcome).increment(1);
}

/// Record how many device tokens a notification was addressed to.
///
/// Metric: `reconciler_notification_recipients`
pub fn record_notification_recipients(recipients: usize) {
    #[allow(clippy::cast_precision_loss)]
    let recipients = recipients as f64;
    histogram!("reconciler_notification_recipients").record(recipients);
}

// ============================================================================
// Listener Metrics
// ============================================================================

/// Record a handled listener connection.
///
/// Metric: `reconciler_listener_commands_total`
/// Labels: `status` (ok, invalid)
pub fn record_listener_command(status: &'static str) {
    counter!("reconciler_listener_commands_total", "status" => status).increment(1);
}
