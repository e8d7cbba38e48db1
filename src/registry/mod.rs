//! Metric Registry
//!
//! Owns the live set of exported volume series, keyed by
//! `(volume, metric kind)`. Registration is insert-if-absent: the first
//! value function registered for a key wins and later upserts for the same
//! key leave it untouched.
//!
//! Values are computed on read. A failing value function never fails the
//! scrape: inode kinds report `-1`, byte kinds log the error and report
//! zero.
//!
//! Series are kept until an [`EvictionPolicy`] removes them. The default,
//! [`EvictionPolicy::Never`], keeps every series for the life of the
//! process, so volumes that leave the inventory keep being scraped.

mod collector;
mod exposition;
mod kind;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error, trace};

use crate::domain::{ClaimRef, VolumeId};

pub use collector::VolumeStatsCollector;
pub use exposition::{Exposition, ExporterMetrics};
pub use kind::{MetricKind, ValueFn, METRIC_NAMESPACE};

/// Label carrying the volume name.
pub const LABEL_VOLUME: &str = "persistentvolume";
/// Label carrying the bound claim's name.
pub const LABEL_CLAIM: &str = "persistentvolumeclaim";
/// Label carrying the bound claim's namespace.
pub const LABEL_NAMESPACE: &str = "namespace";

/// Sentinel reported by inode kinds whose statistics are unavailable.
pub const INODE_UNKNOWN: f64 = -1.0;

// =============================================================================
// Series
// =============================================================================

/// Constant labels attached to every series of a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesLabels {
    pub volume: String,
    pub claim: String,
    pub namespace: String,
}

impl SeriesLabels {
    pub fn new(volume: &VolumeId, claim: &ClaimRef) -> Self {
        Self {
            volume: volume.to_string(),
            claim: claim.name.clone(),
            namespace: claim.namespace.clone(),
        }
    }

    /// Label values ordered as namespace, volume, claim.
    pub fn values(&self) -> [&str; 3] {
        [
            self.namespace.as_str(),
            self.volume.as_str(),
            self.claim.as_str(),
        ]
    }
}

/// Map key of a series; orders by kind, then volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub kind: MetricKind,
    pub volume: VolumeId,
}

impl SeriesKey {
    pub fn new(volume: VolumeId, kind: MetricKind) -> Self {
        Self { volume, kind }
    }
}

pub(crate) struct Series {
    labels: SeriesLabels,
    value_fn: ValueFn,
    last_seen: AtomicU64,
}

impl Series {
    fn evaluate(&self, key: &SeriesKey) -> f64 {
        match (self.value_fn)() {
            Ok(value) => value,
            Err(e) if key.kind.is_inode_based() => {
                debug!(pv = %key.volume, kind = %key.kind, error = %e, "Inode statistics unavailable");
                INODE_UNKNOWN
            }
            Err(e) => {
                error!(pv = %key.volume, kind = %key.kind, error = %e, "Failed to read volume statistics");
                0.0
            }
        }
    }
}

// =============================================================================
// Eviction
// =============================================================================

/// What happens to series whose volume stops appearing in the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Keep every series for the life of the process.
    #[default]
    Never,
    /// Drop series not refreshed during the last `n` cycles.
    StaleAfter(u64),
}

impl EvictionPolicy {
    /// `0` means never evict.
    pub fn from_cycles(cycles: u64) -> Self {
        if cycles == 0 {
            EvictionPolicy::Never
        } else {
            EvictionPolicy::StaleAfter(cycles)
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrent map of live volume series.
///
/// Reads may run on any thread concurrently with upserts; the map's
/// per-shard locking is the only synchronization.
pub struct MetricRegistry {
    series: DashMap<SeriesKey, Arc<Series>>,
    eviction: EvictionPolicy,
    cycle: AtomicU64,
}

impl MetricRegistry {
    pub fn new(eviction: EvictionPolicy) -> Self {
        Self {
            series: DashMap::new(),
            eviction,
            cycle: AtomicU64::new(0),
        }
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Register a series unless one already exists for `(volume, kind)`.
    ///
    /// Returns `true` when a new series was inserted. An existing series
    /// keeps its labels and value function; it is only marked as seen in
    /// the current cycle.
    pub fn upsert(
        &self,
        volume: &VolumeId,
        kind: MetricKind,
        labels: SeriesLabels,
        value_fn: ValueFn,
    ) -> bool {
        let cycle = self.cycle.load(Ordering::Acquire);

        match self.series.entry(SeriesKey::new(volume.clone(), kind)) {
            Entry::Occupied(entry) => {
                entry.get().last_seen.store(cycle, Ordering::Release);
                trace!(pv = %volume, %kind, "Already registered");
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Series {
                    labels,
                    value_fn,
                    last_seen: AtomicU64::new(cycle),
                }));
                debug!(pv = %volume, %kind, "Registered series");
                true
            }
        }
    }

    /// Evaluate the series for `(volume, kind)`, if registered.
    pub fn read(&self, volume: &VolumeId, kind: MetricKind) -> Option<f64> {
        let key = SeriesKey::new(volume.clone(), kind);
        // Clone out of the map so the shard lock is not held during evaluation.
        let series = self.series.get(&key).map(|s| Arc::clone(s.value()))?;
        Some(series.evaluate(&key))
    }

    pub fn contains(&self, volume: &VolumeId, kind: MetricKind) -> bool {
        self.series.contains_key(&SeriesKey::new(volume.clone(), kind))
    }

    /// Number of registered series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of registered series for one volume.
    pub fn series_for(&self, volume: &VolumeId) -> usize {
        self.series.iter().filter(|e| &e.key().volume == volume).count()
    }

    /// Sorted keys of all registered series.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<_> = self.series.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Start a new refresh cycle and return its number.
    pub fn begin_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Apply the eviction policy after the current cycle's upserts.
    ///
    /// Returns the number of series removed.
    pub fn evict_stale(&self) -> usize {
        let EvictionPolicy::StaleAfter(max_age) = self.eviction else {
            return 0;
        };

        let current = self.cycle.load(Ordering::Acquire);
        let before = self.series.len();
        self.series.retain(|key, series| {
            let age = current.saturating_sub(series.last_seen.load(Ordering::Acquire));
            let keep = age < max_age;
            if !keep {
                debug!(pv = %key.volume, kind = %key.kind, age, "Evicting stale series");
            }
            keep
        });
        before.saturating_sub(self.series.len())
    }

    /// Evaluate every series, sorted by key.
    pub(crate) fn snapshot(&self) -> Vec<(SeriesKey, SeriesLabels, f64)> {
        let mut entries: Vec<(SeriesKey, Arc<Series>)> = self
            .series
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        entries
            .into_iter()
            .map(|(key, series)| {
                let value = series.evaluate(&key);
                (key, series.labels.clone(), value)
            })
            .collect()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("series", &self.series.len())
            .field("eviction", &self.eviction)
            .field("cycle", &self.cycle.load(Ordering::Relaxed))
            .finish()
    }
}
