//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! Value objects describing storage volumes and the inventory port the
//! refresh loop depends on. Infrastructure adapters implement
//! [`VolumeInventory`] to supply descriptors from a concrete source.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │   VolumeDescriptor │ ResolvedVolume │ VolumeInventory (port) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │        KubernetesInventory │ StaticInventory                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Volume identifier (value object).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The claim a volume is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimRef {
    pub name: String,
    pub namespace: String,
}

impl ClaimRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// One requirement inside a selector term (`key <operator> values`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchExpression {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

/// A selector term; its expressions are ANDed by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorTerm {
    pub match_expressions: Vec<MatchExpression>,
}

/// Host affinity of a volume: the required selector terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAffinity {
    pub required_terms: Vec<SelectorTerm>,
}

impl HostAffinity {
    /// Affinity pinning a volume to a single host via `key In [host]`.
    pub fn pinned_to(key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            required_terms: vec![SelectorTerm {
                match_expressions: vec![MatchExpression {
                    key: key.into(),
                    operator: "In".to_string(),
                    values: vec![host.into()],
                }],
            }],
        }
    }
}

/// A storage volume as read from the inventory.
///
/// Immutable for the duration of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeDescriptor {
    /// Volume name
    pub name: VolumeId,
    /// Bound claim, if any
    pub claim: Option<ClaimRef>,
    /// Host affinity constraint, if any
    pub affinity: Option<HostAffinity>,
    /// Path of the volume's data on its host
    pub host_path: Option<String>,
}

/// A descriptor confirmed to live on this host, rebased under the local root.
///
/// Built fresh every cycle and dropped at the end of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVolume {
    pub name: VolumeId,
    pub claim: ClaimRef,
    /// Locally accessible path of the volume's data
    pub path: PathBuf,
}

// =============================================================================
// Inventory Port
// =============================================================================

/// Port for listing the volumes known to the cluster.
///
/// # Example
///
/// ```ignore
/// struct MyInventory { /* ... */ }
///
/// #[async_trait]
/// impl VolumeInventory for MyInventory {
///     async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>> {
///         // Fetch descriptors from the backing store
///     }
/// }
/// ```
#[async_trait]
pub trait VolumeInventory: Send + Sync {
    /// List every volume descriptor currently known to the source.
    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>>;
}
