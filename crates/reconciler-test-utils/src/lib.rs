//! # Reconciler Test Utilities
//!
//! Shared test utilities for the Meeting Reconciler.
//!
//! This crate provides in-memory implementations of the store and push
//! gateway seams, so the reconciliation pipeline can be exercised end to end
//! without a database or network.
//!
//! ## Modules
//!
//! - `mock_store` - In-memory meetings/users store with fault injection
//! - `mock_push` - Recording push gateway
//! - `fixtures` - Meeting and user builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reconciler_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let user = TestUser::new(1).with_device("T1").build();
//!     let meeting = TestMeeting::new(1)
//!         .started_minutes_ago(5)
//!         .with_participant(&user.id)
//!         .build();
//!
//!     let store = MockStore::new().with_user(user).with_meeting(meeting);
//!     let gateway = MockPushGateway::accepting();
//!
//!     // Wire a Reconciler with Arc::new(store.clone()) and run a cycle...
//! }
//! ```

pub mod fixtures;
pub mod mock_push;
pub mod mock_store;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_push::*;
pub use mock_store::*;
