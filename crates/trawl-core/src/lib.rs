//! Trawl Core - resumable bulk extraction from a paginated search backend
//!
//! This crate provides the long-search pipeline: a cursor pager over a
//! search backend, a restartable batch generator with durable cursor
//! checkpointing, and a sink that drains batches to numbered part files.

pub mod backend;
pub mod error;
pub mod logging;
pub mod pager;
pub mod progress;
pub mod retry;
pub mod scroll;
pub mod shutdown;
pub mod sink;
pub mod store;

// Re-exports for convenience
pub use backend::{Batch, Document, Page, SearchBackend, SearchRequest};
pub use error::{BackendError, ConfigError, ScrollError, SinkError};
pub use logging::{IndicatifLogger, init_logging};
pub use pager::CursorPager;
pub use progress::{ProgressContext, SharedProgress};
pub use scroll::{Batches, LongSearch, ScrollState};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
pub use sink::{PART_PLACEHOLDER, drain};
pub use store::{Checkpoint, FsStore, StateStore};
