//! Filesystem Usage Collector
//!
//! Computes the raw figures behind every exported volume series:
//!
//! - [`total_size`] - apparent bytes used under a directory tree
//! - [`capacity_stats`] - mount-level total and available bytes
//! - [`inode_stats`] - mount-level inode counts as reported by `df`
//!
//! Nothing here caches; every call hits the filesystem.

mod dirsize;
mod inode;
mod statfs;

pub use dirsize::{round, size_in_megabytes, total_size, SIZE_QUEUE_CAPACITY};
pub use inode::{inode_stats, parse_inode_stats, InodeStats};
pub use statfs::{capacity_stats, CapacityStats};
