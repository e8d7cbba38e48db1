//! Inventory Filter
//!
//! Selects the volumes from a cluster-wide inventory that are pinned to
//! this host and rebases their paths under the local root filesystem.
//!
//! A volume is host-local when it has a host path and its host affinity
//! names this host. Only the first selector term, its first expression
//! and that expression's first value are consulted; see
//! [`first_match_only`].

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::domain::{HostAffinity, ResolvedVolume, VolumeDescriptor};

/// Well-known node label carrying the node's hostname.
pub const HOSTNAME_LABEL_KEY: &str = "kubernetes.io/hostname";

/// Why a descriptor was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoHostPath,
    NoAffinity,
    NoSelectorTerms,
    NoMatchExpressions,
    NotHostnameKey,
    NoValues,
    OtherHost,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NoHostPath => "no host path",
            SkipReason::NoAffinity => "no node affinity",
            SkipReason::NoSelectorTerms => "no required selector terms",
            SkipReason::NoMatchExpressions => "first term has no match expressions",
            SkipReason::NotHostnameKey => "first expression is not keyed on hostname",
            SkipReason::NoValues => "first expression has no values",
            SkipReason::OtherHost => "pinned to another host",
        };
        f.write_str(reason)
    }
}

/// The host a volume's affinity pins it to, reading only the first
/// term, first match expression and first value.
///
/// Multi-term selectors, `NotIn` operators and additional values are not
/// evaluated. Widening this to full selector semantics only needs to
/// change this function.
pub fn first_match_only(affinity: &HostAffinity) -> Result<&str, SkipReason> {
    let term = affinity
        .required_terms
        .first()
        .ok_or(SkipReason::NoSelectorTerms)?;
    let expr = term
        .match_expressions
        .first()
        .ok_or(SkipReason::NoMatchExpressions)?;

    if expr.key != HOSTNAME_LABEL_KEY {
        return Err(SkipReason::NotHostnameKey);
    }

    expr.values
        .first()
        .map(String::as_str)
        .ok_or(SkipReason::NoValues)
}

/// Decide whether `volume` belongs to `hostname`, returning its host path.
pub fn check_local<'a>(volume: &'a VolumeDescriptor, hostname: &str) -> Result<&'a str, SkipReason> {
    let host_path = volume
        .host_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(SkipReason::NoHostPath)?;
    let affinity = volume.affinity.as_ref().ok_or(SkipReason::NoAffinity)?;

    if first_match_only(affinity)? != hostname {
        return Err(SkipReason::OtherHost);
    }

    Ok(host_path)
}

/// Place a host path under `root`.
///
/// An empty root leaves the path untouched; otherwise the host path is
/// appended to the root even when it is absolute.
pub fn rebase(root: &Path, host_path: &str) -> PathBuf {
    if root.as_os_str().is_empty() {
        return PathBuf::from(host_path);
    }
    root.join(host_path.trim_start_matches('/'))
}

/// Return the descriptors bound to `hostname`, rebased under `root`.
pub fn select_local(volumes: &[VolumeDescriptor], hostname: &str, root: &Path) -> Vec<ResolvedVolume> {
    volumes
        .iter()
        .filter_map(|volume| match check_local(volume, hostname) {
            Ok(host_path) => {
                trace!(pv = %volume.name, "Selected local volume");
                Some(ResolvedVolume {
                    name: volume.name.clone(),
                    claim: volume.claim.clone().unwrap_or_default(),
                    path: rebase(root, host_path),
                })
            }
            Err(reason) => {
                trace!(pv = %volume.name, %reason, "Skipping volume");
                None
            }
        })
        .collect()
}
