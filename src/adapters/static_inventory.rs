//! In-memory inventory.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{VolumeDescriptor, VolumeInventory};
use crate::error::Result;

/// Inventory whose contents are set directly by the caller.
#[derive(Debug, Default)]
pub struct StaticInventory {
    volumes: RwLock<Vec<VolumeDescriptor>>,
}

impl StaticInventory {
    pub fn new(volumes: Vec<VolumeDescriptor>) -> Self {
        Self {
            volumes: RwLock::new(volumes),
        }
    }

    /// Replace the whole inventory.
    pub fn set_volumes(&self, volumes: Vec<VolumeDescriptor>) {
        *self.volumes.write() = volumes;
    }

    pub fn len(&self) -> usize {
        self.volumes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.read().is_empty()
    }
}

#[async_trait]
impl VolumeInventory for StaticInventory {
    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>> {
        Ok(self.volumes.read().clone())
    }
}
