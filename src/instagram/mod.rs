//! Instagram platform access.
//!
//! [`PlatformApi`] is the seam the rest of the crate is written against;
//! [`HttpApi`] implements it over the private HTTP API. Raw media payloads are
//! repaired ([`repair`]) and read through the lenient [`RawMedia`] view.

pub mod api;
pub mod client;
pub mod error;
pub mod raw;
pub mod repair;
pub mod shortcode;
pub mod types;

pub use api::PlatformApi;
pub use client::HttpApi;
pub use error::{ApiError, FailureClass, LoginError};
pub use raw::{MediaKind, RawMedia};
pub use repair::repair;
pub use types::{Credentials, LinkAttachment, Message, Session, ShareHandle, Thread, TransportSettings};
