//! Observability for the Meeting Reconciler.
//!
//! Metrics are emitted through the `metrics` facade only; no exporter is
//! installed by this crate. A deployment that wants them installs a recorder
//! before the tasks start.

pub mod metrics;
