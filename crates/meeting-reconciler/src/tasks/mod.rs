//! Background tasks for the Meeting Reconciler.
//!
//! # Tasks
//!
//! - `reconciler` - Periodic SCHEDULED to ACTIVE reconciliation

pub mod reconciler;

pub use reconciler::{start_reconciler, CycleReport, Reconciler, ReconcilerConfig};
