//! Contracts between the ingestion pipeline and its backends: the
//! distributed filesystem, the message feed, and their error types.

mod error;
mod feed;
mod fs;
mod memory;

pub use error::{FeedError, FsError, FsErrorKind};
pub use feed::{FeedMessage, MessageFeed, VecFeed};
pub use fs::{parent_dir, DistributedFs, FileKind, FileStatus};
pub use memory::{FaultOp, FsOp, MemoryFs};
