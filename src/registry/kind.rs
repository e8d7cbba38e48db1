//! Metric kinds exported per volume and the value functions behind them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;

use crate::collector::{capacity_stats, inode_stats, total_size};
use crate::error::Result;

/// Prefix shared by every exported volume series.
pub const METRIC_NAMESPACE: &str = "kubelet_volume_stats";

/// Lazily evaluated value of one series.
pub type ValueFn = Arc<dyn Fn() -> Result<f64> + Send + Sync>;

/// The six figures exported for each volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    CapacityBytes,
    AvailableBytes,
    UsedBytes,
    Inodes,
    InodesUsed,
    InodesFree,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::CapacityBytes,
        MetricKind::AvailableBytes,
        MetricKind::UsedBytes,
        MetricKind::Inodes,
        MetricKind::InodesUsed,
        MetricKind::InodesFree,
    ];

    /// Metric name without the namespace prefix.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::CapacityBytes => "capacity_bytes",
            MetricKind::AvailableBytes => "available_bytes",
            MetricKind::UsedBytes => "used_bytes",
            MetricKind::Inodes => "inodes",
            MetricKind::InodesUsed => "inodes_used",
            MetricKind::InodesFree => "inodes_free",
        }
    }

    /// Fully qualified metric name, e.g. `kubelet_volume_stats_used_bytes`.
    pub fn fq_name(&self) -> String {
        format!("{}_{}", METRIC_NAMESPACE, self.name())
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricKind::CapacityBytes => "Capacity in bytes of the filesystem backing the volume.",
            MetricKind::AvailableBytes => "Number of available bytes on the filesystem backing the volume.",
            MetricKind::UsedBytes => "Apparent size in bytes of the files stored in the volume.",
            MetricKind::Inodes => "Maximum number of inodes on the filesystem backing the volume.",
            MetricKind::InodesUsed => "Number of used inodes on the filesystem backing the volume.",
            MetricKind::InodesFree => "Number of free inodes on the filesystem backing the volume.",
        }
    }

    /// Inode kinds report `-1` when their statistics are unavailable.
    pub fn is_inode_based(&self) -> bool {
        matches!(
            self,
            MetricKind::Inodes | MetricKind::InodesUsed | MetricKind::InodesFree
        )
    }

    /// Value function reading this kind for the volume stored at `path`.
    ///
    /// The path is moved into the closure; it never changes afterwards.
    pub fn value_fn(self, path: PathBuf) -> ValueFn {
        Arc::new(move || {
            trace!(kind = %self, path = %path.display(), "Evaluating series");
            match self {
                MetricKind::CapacityBytes => Ok(capacity_stats(&path)?.total_bytes as f64),
                MetricKind::AvailableBytes => Ok(capacity_stats(&path)?.available_bytes as f64),
                MetricKind::UsedBytes => Ok(total_size(&path) as f64),
                MetricKind::Inodes => Ok(inode_stats(&path)?.total as f64),
                MetricKind::InodesUsed => Ok(inode_stats(&path)?.used as f64),
                MetricKind::InodesFree => Ok(inode_stats(&path)?.available as f64),
            }
        })
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
