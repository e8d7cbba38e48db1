//! Refresh Loop
//!
//! Periodically lists the inventory, keeps the volumes pinned to this host
//! and makes sure each of them has its six series registered.
//!
//! ```text
//!          tick
//!   Idle ────────▶ Reconciling
//!    ▲                 │ list → select_local → upsert × 6 → evict
//!    └─────────────────┘
//! ```
//!
//! A failed inventory fetch is logged and treated as an empty inventory
//! for that tick; existing series are left alone.

mod context;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::domain::ResolvedVolume;
use crate::inventory::select_local;
use crate::registry::{ExporterMetrics, MetricKind, MetricRegistry, SeriesLabels};

pub use context::ExporterContext;

/// Default time between two refresh cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Phase of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Reconciling,
}

impl RefreshState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RefreshState::Reconciling,
            _ => RefreshState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RefreshState::Idle => 0,
            RefreshState::Reconciling => 1,
        }
    }
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "idle"),
            RefreshState::Reconciling => write!(f, "reconciling"),
        }
    }
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Descriptors returned by the inventory
    pub listed: usize,
    /// Descriptors pinned to this host
    pub selected: usize,
    /// Series newly registered this cycle
    pub registered: usize,
    /// Series removed by the eviction policy
    pub evicted: usize,
    pub fetch_failed: bool,
}

/// Upsert all six series of `volume`. Returns how many were new.
///
/// Each value function owns its own copy of the volume's path.
pub fn register_volume(registry: &MetricRegistry, volume: &ResolvedVolume) -> usize {
    let labels = SeriesLabels::new(&volume.name, &volume.claim);
    let mut inserted = 0;

    for kind in MetricKind::ALL {
        let value_fn = kind.value_fn(volume.path.clone());
        if registry.upsert(&volume.name, kind, labels.clone(), value_fn) {
            inserted += 1;
        }
    }
    inserted
}

/// Drives refresh cycles against an [`ExporterContext`].
pub struct Refresher {
    ctx: ExporterContext,
    interval: Duration,
    metrics: Option<ExporterMetrics>,
    state: AtomicU8,
    completed: AtomicU64,
}

impl Refresher {
    pub fn new(ctx: ExporterContext, interval: Duration) -> Self {
        Self {
            ctx,
            interval,
            metrics: None,
            state: AtomicU8::new(RefreshState::Idle.as_u8()),
            completed: AtomicU64::new(0),
        }
    }

    /// Record cycle outcomes in the exporter's self-metrics.
    pub fn with_metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn context(&self) -> &ExporterContext {
        &self.ctx
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Ready once the first cycle has finished.
    pub fn is_ready(&self) -> bool {
        self.completed_cycles() > 0
    }

    fn set_state(&self, state: RefreshState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Run a single cycle.
    #[instrument(skip(self), fields(hostname = %self.ctx.hostname))]
    pub async fn reconcile_once(&self) -> CycleReport {
        self.set_state(RefreshState::Reconciling);
        let registry = &self.ctx.registry;
        let cycle = registry.begin_cycle();

        let (descriptors, fetch_failed) = match self.ctx.inventory.list_volumes().await {
            Ok(descriptors) => (descriptors, false),
            Err(e) => {
                error!(error = %e, "Failed to list volumes");
                if let Some(metrics) = &self.metrics {
                    metrics.inventory_errors.inc();
                }
                (Vec::new(), true)
            }
        };

        let local = select_local(&descriptors, &self.ctx.hostname, &self.ctx.rootfs);
        let registered = local.iter().map(|v| register_volume(registry, v)).sum();

        // An unreachable inventory says nothing about which volumes are gone.
        let evicted = if fetch_failed {
            0
        } else {
            registry.evict_stale()
        };

        let report = CycleReport {
            cycle,
            listed: descriptors.len(),
            selected: local.len(),
            registered,
            evicted,
            fetch_failed,
        };

        if let Some(metrics) = &self.metrics {
            metrics.refresh_cycles.inc();
            metrics.registered_series.set(registry.len() as i64);
            if !fetch_failed {
                metrics.local_volumes.set(local.len() as i64);
            }
        }

        debug!(
            cycle,
            listed = report.listed,
            selected = report.selected,
            registered = report.registered,
            evicted = report.evicted,
            "Refresh cycle complete"
        );

        self.completed.fetch_add(1, Ordering::AcqRel);
        self.set_state(RefreshState::Idle);
        report
    }

    /// Run cycles forever on a fixed tick.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval = ?self.interval,
            hostname = %self.ctx.hostname,
            rootfs = %self.ctx.rootfs.display(),
            eviction = ?self.ctx.registry.eviction_policy(),
            "Starting refresh loop"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            self.reconcile_once().await;
        }
    }
}

impl std::fmt::Debug for Refresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refresher")
            .field("ctx", &self.ctx)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("completed", &self.completed_cycles())
            .finish()
    }
}
