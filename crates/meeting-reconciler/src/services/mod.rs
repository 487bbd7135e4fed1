//! Services for the Meeting Reconciler.
//!
//! # Components
//!
//! - `device_resolver` - Participant ids to push tokens
//! - `push_client` - Push gateway trait and HTTP client
//! - `notifier` - Meeting-started multicast notifications
//! - `transitioner` - Status-guarded update followed by notification

pub mod device_resolver;
pub mod notifier;
pub mod push_client;
pub mod transitioner;

pub use device_resolver::{DeviceResolution, DeviceResolver};
pub use notifier::{Notifier, NotifyOutcome, MEETING_STARTED_ACTION};
pub use push_client::{FcmClient, PushGateway, PushMessage, PushPayload, PushReport};
pub use transitioner::{TransitionOutcome, Transitioner};
