//! From "something shared in a message" to a post identifier.

pub mod detect;
pub mod resolver;
pub mod url;

pub use detect::detect_references;
pub use resolver::{PostIdentifier, PostReference, ShortcodeResolver};
pub use self::url::{normalize, NormalizedUrl};
