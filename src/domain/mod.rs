//! Domain Layer
//!
//! Volume value objects and the inventory port.
//!
//! # Usage
//!
//! ```ignore
//! use pv_exporter::domain::{VolumeInventory, VolumeDescriptor};
//!
//! async fn count<I: VolumeInventory>(inventory: &I) -> Result<usize> {
//!     Ok(inventory.list_volumes().await?.len())
//! }
//! ```

pub mod ports;

pub use ports::{
    ClaimRef, HostAffinity, MatchExpression, ResolvedVolume, SelectorTerm, VolumeDescriptor,
    VolumeId, VolumeInventory,
};
