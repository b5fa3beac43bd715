//! Inbox monitoring: the poll loop plus its dedup store, backoff and sinks.
//!
//! The watcher knows nothing about stdout or any other consumer; records leave
//! through a [`RecordSink`].

pub mod backoff;
pub mod dedup;
pub mod scheduler;
pub mod sink;

pub use backoff::{BackoffPolicy, PollState};
pub use dedup::DedupStore;
pub use scheduler::{CycleOutcome, DmWatcher};
pub use sink::{ChannelSink, RecordSink, StdoutSink};
