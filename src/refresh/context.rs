//! Explicit state shared by the refresh loop.

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::VolumeInventory;
use crate::registry::MetricRegistry;

/// Everything a refresh cycle needs, built once at startup.
#[derive(Clone)]
pub struct ExporterContext {
    /// Source of volume descriptors
    pub inventory: Arc<dyn VolumeInventory>,
    /// Identity of this host as used in volume affinity
    pub hostname: String,
    /// Prefix under which host paths are visible to this process
    pub rootfs: PathBuf,
    /// Live series map
    pub registry: Arc<MetricRegistry>,
}

impl ExporterContext {
    pub fn new(
        inventory: Arc<dyn VolumeInventory>,
        hostname: impl Into<String>,
        rootfs: impl Into<PathBuf>,
        registry: Arc<MetricRegistry>,
    ) -> Self {
        Self {
            inventory,
            hostname: hostname.into(),
            rootfs: rootfs.into(),
            registry,
        }
    }
}

impl std::fmt::Debug for ExporterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterContext")
            .field("hostname", &self.hostname)
            .field("rootfs", &self.rootfs)
            .field("registry", &self.registry)
            .finish()
    }
}
