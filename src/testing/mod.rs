//! Testing utilities
//!
//! [`MockApi`] stands in for the platform in unit and integration tests:
//!
//! ```rust
//! use igrelay::testing::MockApi;
//! use igrelay::instagram::ApiError;
//!
//! let api = MockApi::new();
//! api.push_threads(Err(ApiError::Validation("clips_metadata".into())));
//! assert_eq!(api.calls().list_recent_threads, 0);
//! ```

pub mod mock_api;

pub use mock_api::{CallCounts, MockApi};
