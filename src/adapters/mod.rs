//! Infrastructure Adapters
//!
//! Implementations of the [`VolumeInventory`](crate::domain::VolumeInventory)
//! port, following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │                 VolumeInventory (port trait)                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │           KubernetesInventory │ StaticInventory                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pv_exporter::adapters::KubernetesInventory;
//! use pv_exporter::domain::VolumeInventory;
//!
//! let inventory = KubernetesInventory::new(client);
//! let volumes = inventory.list_volumes().await?;
//! ```

mod kubernetes;
mod static_inventory;

pub use kubernetes::KubernetesInventory;
pub use static_inventory::StaticInventory;
