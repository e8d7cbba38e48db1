//! Kubernetes Inventory Adapter
//!
//! Implements the `VolumeInventory` port by listing cluster-scoped
//! PersistentVolume objects.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{NodeSelectorTerm, PersistentVolume, VolumeNodeAffinity};
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{debug, instrument};

use crate::domain::{
    ClaimRef, HostAffinity, MatchExpression, SelectorTerm, VolumeDescriptor, VolumeId,
    VolumeInventory,
};
use crate::error::Result;

/// PersistentVolume-backed inventory.
#[derive(Clone)]
pub struct KubernetesInventory {
    client: Client,
}

impl KubernetesInventory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get the Kubernetes API for PersistentVolumes.
    fn volumes_api(&self) -> Api<PersistentVolume> {
        Api::all(self.client.clone())
    }

    /// Convert a PersistentVolume into a domain descriptor.
    ///
    /// Absent claim fields become empty strings.
    pub fn to_descriptor(pv: &PersistentVolume) -> VolumeDescriptor {
        let spec = pv.spec.as_ref();

        VolumeDescriptor {
            name: VolumeId::new(pv.metadata.name.clone().unwrap_or_default()),
            claim: spec.and_then(|s| s.claim_ref.as_ref()).map(|r| ClaimRef {
                name: r.name.clone().unwrap_or_default(),
                namespace: r.namespace.clone().unwrap_or_default(),
            }),
            affinity: spec
                .and_then(|s| s.node_affinity.as_ref())
                .map(Self::to_affinity),
            host_path: spec
                .and_then(|s| s.host_path.as_ref())
                .map(|h| h.path.clone()),
        }
    }

    fn to_affinity(affinity: &VolumeNodeAffinity) -> HostAffinity {
        HostAffinity {
            required_terms: affinity
                .required
                .as_ref()
                .map(|selector| selector.node_selector_terms.iter().map(Self::to_term).collect())
                .unwrap_or_default(),
        }
    }

    fn to_term(term: &NodeSelectorTerm) -> SelectorTerm {
        SelectorTerm {
            match_expressions: term
                .match_expressions
                .iter()
                .flatten()
                .map(|req| MatchExpression {
                    key: req.key.clone(),
                    operator: req.operator.clone(),
                    values: req.values.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for KubernetesInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesInventory").finish_non_exhaustive()
    }
}

#[async_trait]
impl VolumeInventory for KubernetesInventory {
    #[instrument(skip(self))]
    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>> {
        let list = self.volumes_api().list(&ListParams::default()).await?;
        debug!(count = list.items.len(), "Listed PersistentVolumes");

        Ok(list.items.iter().map(Self::to_descriptor).collect())
    }
}
