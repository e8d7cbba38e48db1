//! Text exposition of volume series and exporter self-metrics.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use super::collector::VolumeStatsCollector;
use super::MetricRegistry;
use crate::error::Result;

/// Counters describing the exporter's own refresh activity.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub refresh_cycles: IntCounter,
    pub inventory_errors: IntCounter,
    pub registered_series: IntGauge,
    pub local_volumes: IntGauge,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            refresh_cycles: IntCounter::new(
                "pv_exporter_refresh_cycles_total",
                "Total number of completed inventory refresh cycles",
            )?,
            inventory_errors: IntCounter::new(
                "pv_exporter_inventory_errors_total",
                "Total number of failed inventory fetches",
            )?,
            registered_series: IntGauge::new(
                "pv_exporter_registered_series",
                "Number of volume series currently registered",
            )?,
            local_volumes: IntGauge::new(
                "pv_exporter_local_volumes",
                "Number of volumes selected for this host in the last cycle",
            )?,
        })
    }

    fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.refresh_cycles.clone()))?;
        registry.register(Box::new(self.inventory_errors.clone()))?;
        registry.register(Box::new(self.registered_series.clone()))?;
        registry.register(Box::new(self.local_volumes.clone()))?;
        Ok(())
    }
}

/// Everything served on the metrics endpoint.
#[derive(Clone)]
pub struct Exposition {
    registry: Registry,
    metrics: ExporterMetrics,
}

impl Exposition {
    pub fn new(volumes: Arc<MetricRegistry>) -> Result<Self> {
        let registry = Registry::new();
        registry.register(Box::new(VolumeStatsCollector::new(volumes)?))?;

        let metrics = ExporterMetrics::new()?;
        metrics.register(&registry)?;

        Ok(Self { registry, metrics })
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Content type of [`encode`](Self::encode) output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Evaluate every series and render the text exposition format.
    ///
    /// Blocks for as long as the slowest value function; call it off the
    /// async runtime.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for Exposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exposition").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimRef, VolumeId};
    use crate::error::Error;
    use crate::registry::{MetricKind, SeriesLabels};

    #[test]
    fn test_encode_includes_self_metrics() {
        let exposition = Exposition::new(Arc::new(MetricRegistry::default())).unwrap();
        exposition.metrics().refresh_cycles.inc();

        let text = String::from_utf8(exposition.encode().unwrap()).unwrap();
        assert!(text.contains("pv_exporter_refresh_cycles_total 1"));
        assert!(text.contains("pv_exporter_registered_series 0"));
        assert!(!text.contains("kubelet_volume_stats"));
    }

    #[test]
    fn test_encode_renders_volume_lines() {
        let volumes = Arc::new(MetricRegistry::default());
        let pv = VolumeId::from("pv-1");
        let labels = SeriesLabels::new(&pv, &ClaimRef::new("www", "web"));
        volumes.upsert(&pv, MetricKind::CapacityBytes, labels.clone(), Arc::new(|| Ok(2048.0)));
        volumes.upsert(
            &pv,
            MetricKind::InodesFree,
            labels,
            Arc::new(|| Err(Error::InodeParse("unavailable".to_string()))),
        );

        let exposition = Exposition::new(Arc::clone(&volumes)).unwrap();
        let text = String::from_utf8(exposition.encode().unwrap()).unwrap();

        assert!(text.contains(
            "kubelet_volume_stats_capacity_bytes{namespace=\"web\",persistentvolume=\"pv-1\",persistentvolumeclaim=\"www\"} 2048"
        ));
        assert!(text.contains(
            "kubelet_volume_stats_inodes_free{namespace=\"web\",persistentvolume=\"pv-1\",persistentvolumeclaim=\"www\"} -1"
        ));
        assert!(text.contains("# TYPE kubelet_volume_stats_capacity_bytes gauge"));
    }

    #[test]
    fn test_content_type_is_text_format() {
        let exposition = Exposition::new(Arc::new(MetricRegistry::default())).unwrap();
        assert!(exposition.content_type().starts_with("text/plain"));
    }
}
