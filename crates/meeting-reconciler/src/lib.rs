//! Meeting Reconciler Library
//!
//! Keeps meeting status in the document store in line with wall-clock time:
//! meetings still SCHEDULED after their start time are moved to ACTIVE and
//! every participant's registered devices receive a push notification.
//!
//! # Architecture
//!
//! ```text
//! tasks/reconciler.rs -> services/transitioner.rs -> services/notifier.rs
//!         |                      |                          |
//!   repositories (query)   repositories (update)   device_resolver + push_client
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Runtime error types
//! - `listener` - Command socket (log and acknowledge only)
//! - `models` - Domain types
//! - `observability` - Metrics facade helpers
//! - `repositories` - Store gateway traits and MongoDB implementation
//! - `services` - Device resolution, push delivery, notification, transition
//! - `tasks` - The reconciliation loop

pub mod config;
pub mod errors;
pub mod listener;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod tasks;
