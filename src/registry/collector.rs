//! Prometheus collector over the volume registry.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use tracing::error;

use super::kind::MetricKind;
use super::{MetricRegistry, LABEL_CLAIM, LABEL_NAMESPACE, LABEL_VOLUME};
use crate::error::Result;

/// Matches the order of [`SeriesLabels::values`](super::SeriesLabels::values).
const LABEL_NAMES: [&str; 3] = [LABEL_NAMESPACE, LABEL_VOLUME, LABEL_CLAIM];

/// Exposes every registered volume series as a gauge family per kind.
///
/// Values are evaluated on each `collect`, i.e. on each scrape.
pub struct VolumeStatsCollector {
    registry: Arc<MetricRegistry>,
    descs: Vec<Desc>,
}

impl VolumeStatsCollector {
    pub fn new(registry: Arc<MetricRegistry>) -> Result<Self> {
        let descs = MetricKind::ALL
            .iter()
            .map(|kind| {
                Desc::new(
                    kind.fq_name(),
                    kind.help().to_string(),
                    LABEL_NAMES.iter().map(|l| l.to_string()).collect(),
                    HashMap::new(),
                )
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { registry, descs })
    }
}

impl Collector for VolumeStatsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = Vec::new();
        let mut current: Option<(MetricKind, GaugeVec)> = None;

        // The snapshot is sorted by kind, so each family is contiguous.
        for (key, labels, value) in self.registry.snapshot() {
            let switch = current.as_ref().map(|(kind, _)| *kind) != Some(key.kind);
            if switch {
                if let Some((_, gauges)) = current.take() {
                    families.extend(gauges.collect());
                }
                match family_gauges(key.kind) {
                    Ok(gauges) => current = Some((key.kind, gauges)),
                    Err(e) => {
                        error!(kind = %key.kind, error = %e, "Failed to build gauge family");
                        continue;
                    }
                }
            }

            if let Some((_, gauges)) = current.as_ref() {
                gauges.with_label_values(&labels.values()).set(value);
            }
        }

        if let Some((_, gauges)) = current {
            families.extend(gauges.collect());
        }
        families
    }
}

fn family_gauges(kind: MetricKind) -> Result<GaugeVec> {
    let opts = Opts::new(kind.fq_name(), kind.help());
    Ok(GaugeVec::new(opts, &LABEL_NAMES)?)
}
