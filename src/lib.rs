//! PV Exporter - Filesystem usage of node-local PersistentVolumes
//!
//! Runs on every node, discovers the PersistentVolumes whose affinity pins
//! them to that node, and exposes their capacity, usage and inode counts as
//! Prometheus gauges.
//!
//! # Architecture
//!
//! ```text
//! VolumeInventory ──▶ Refresher ──▶ MetricRegistry ──▶ /metrics
//!   (adapters)        (select_local)   (value fns)     (server)
//! ```
//!
//! Series values are computed when scraped, never cached.
//!
//! # Modules
//!
//! - [`adapters`] - Inventory adapters implementing domain ports
//! - [`collector`] - Filesystem usage measurements
//! - [`domain`] - Volume descriptors and the inventory port
//! - [`error`] - Error types
//! - [`inventory`] - Host-affinity filtering and path resolution
//! - [`refresh`] - Periodic inventory reconciliation
//! - [`registry`] - Series registry and text exposition
//! - [`server`] - HTTP endpoint

pub mod adapters;
pub mod collector;
pub mod domain;
pub mod error;
pub mod inventory;
pub mod refresh;
pub mod registry;
pub mod server;

// Re-export commonly used types
pub use domain::{VolumeDescriptor, VolumeInventory};
pub use error::{Error, Result};
pub use refresh::{ExporterContext, Refresher};
pub use registry::{EvictionPolicy, Exposition, MetricKind, MetricRegistry};
