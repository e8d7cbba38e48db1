//! PV Exporter Integration Tests
//!
//! Drives the exporter end to end against an in-memory inventory and real
//! directories:
//! - Refresh selects only volumes pinned to this host
//! - Exposition renders one line per series with the claim labels
//! - HTTP endpoint serves metrics and probes over a real socket

use std::sync::Arc;
use std::time::Duration;

use pv_exporter::adapters::StaticInventory;
use pv_exporter::domain::{ClaimRef, HostAffinity, VolumeDescriptor, VolumeId};
use pv_exporter::inventory::HOSTNAME_LABEL_KEY;
use pv_exporter::refresh::{ExporterContext, Refresher};
use pv_exporter::registry::{Exposition, MetricKind, MetricRegistry};

fn descriptor(name: &str, host: &str, path: &str) -> VolumeDescriptor {
    VolumeDescriptor {
        name: VolumeId::from(name),
        claim: Some(ClaimRef::new(format!("{}-claim", name), "storage")),
        affinity: Some(HostAffinity::pinned_to(HOSTNAME_LABEL_KEY, host)),
        host_path: Some(path.to_string()),
    }
}

struct Harness {
    inventory: Arc<StaticInventory>,
    registry: Arc<MetricRegistry>,
    exposition: Exposition,
    refresher: Arc<Refresher>,
}

fn harness(volumes: Vec<VolumeDescriptor>, rootfs: &str) -> Harness {
    let inventory = Arc::new(StaticInventory::new(volumes));
    let registry = Arc::new(MetricRegistry::default());
    let exposition = Exposition::new(Arc::clone(&registry)).unwrap();
    let ctx = ExporterContext::new(inventory.clone(), "node-a", rootfs, Arc::clone(&registry));
    let refresher = Arc::new(
        Refresher::new(ctx, Duration::from_millis(10)).with_metrics(exposition.metrics().clone()),
    );

    Harness {
        inventory,
        registry,
        exposition,
        refresher,
    }
}

// =============================================================================
// Refresh
// =============================================================================

mod refresh_tests {
    use super::*;

    #[tokio::test]
    async fn test_only_local_volume_is_exported() {
        let h = harness(
            vec![
                descriptor("pv-local", "node-a", "/data/local"),
                descriptor("pv-remote", "node-b", "/data/remote"),
            ],
            "",
        );

        let report = h.refresher.reconcile_once().await;

        assert_eq!(report.selected, 1);
        assert_eq!(h.registry.series_for(&VolumeId::from("pv-local")), 6);
        assert_eq!(h.registry.series_for(&VolumeId::from("pv-remote")), 0);
    }

    #[tokio::test]
    async fn test_volume_added_later_is_picked_up() {
        let h = harness(vec![], "");
        h.refresher.reconcile_once().await;
        assert!(h.registry.is_empty());

        h.inventory
            .set_volumes(vec![descriptor("pv-late", "node-a", "/data/late")]);
        h.refresher.reconcile_once().await;

        assert_eq!(h.registry.len(), 6);
        for kind in MetricKind::ALL {
            assert!(h.registry.contains(&VolumeId::from("pv-late"), kind));
        }
    }

    #[tokio::test]
    async fn test_volume_without_host_path_is_skipped() {
        let mut bare = descriptor("pv-bare", "node-a", "");
        bare.host_path = None;
        let h = harness(vec![bare], "");

        let report = h.refresher.reconcile_once().await;
        assert_eq!(report.selected, 0);
        assert!(h.registry.is_empty());
    }
}

// =============================================================================
// Exposition
// =============================================================================

mod exposition_tests {
    use super::*;

    #[tokio::test]
    async fn test_used_bytes_follow_directory_contents() {
        let root = tempfile::tempdir().unwrap();
        let volume_dir = root.path().join("mnt/disks/pv-1");
        std::fs::create_dir_all(volume_dir.join("nested")).unwrap();
        std::fs::write(volume_dir.join("a.bin"), vec![0u8; 1000]).unwrap();
        std::fs::write(volume_dir.join("nested/b.bin"), vec![0u8; 24]).unwrap();

        let h = harness(
            vec![descriptor("pv-1", "node-a", "/mnt/disks/pv-1")],
            root.path().to_str().unwrap(),
        );
        h.refresher.reconcile_once().await;

        let labels = "{namespace=\"storage\",persistentvolume=\"pv-1\",persistentvolumeclaim=\"pv-1-claim\"}";
        let text = String::from_utf8(h.exposition.encode().unwrap()).unwrap();
        assert!(text.contains(&format!("kubelet_volume_stats_used_bytes{} 1024", labels)));

        // Values are read at scrape time.
        std::fs::write(volume_dir.join("c.bin"), vec![0u8; 1000]).unwrap();
        let text = String::from_utf8(h.exposition.encode().unwrap()).unwrap();
        assert!(text.contains(&format!("kubelet_volume_stats_used_bytes{} 2024", labels)));
    }

    #[tokio::test]
    async fn test_every_kind_is_exposed() {
        let root = tempfile::tempdir().unwrap();
        let h = harness(
            vec![descriptor("pv-1", "node-a", root.path().to_str().unwrap())],
            "",
        );
        h.refresher.reconcile_once().await;

        let text = String::from_utf8(h.exposition.encode().unwrap()).unwrap();
        for kind in MetricKind::ALL {
            assert!(
                text.contains(&format!("{}{{namespace=\"storage\"", kind.fq_name())),
                "missing {}",
                kind.fq_name()
            );
        }
        assert!(text.contains("pv_exporter_local_volumes 1"));
    }

    #[tokio::test]
    async fn test_missing_directory_does_not_fail_scrape() {
        let h = harness(
            vec![descriptor("pv-gone", "node-a", "/definitely/not/here")],
            "",
        );
        h.refresher.reconcile_once().await;

        let text = String::from_utf8(h.exposition.encode().unwrap()).unwrap();
        assert!(text.contains("kubelet_volume_stats_used_bytes{namespace=\"storage\",persistentvolume=\"pv-gone\",persistentvolumeclaim=\"pv-gone-claim\"} 0"));
        assert!(text.contains("kubelet_volume_stats_inodes{namespace=\"storage\",persistentvolume=\"pv-gone\",persistentvolumeclaim=\"pv-gone-claim\"} -1"));
    }
}

// =============================================================================
// HTTP Endpoint
// =============================================================================

mod server_tests {
    use super::*;
    use pv_exporter::server::{serve, ServerState};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_metrics_and_probes() {
        let h = harness(vec![descriptor("pv-1", "node-a", "/data/pv-1")], "");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = ServerState::new(h.exposition.clone(), Arc::clone(&h.refresher));
        let server = tokio::spawn(serve(listener, state));

        let response = http_get(addr, "/readyz").await;
        assert!(response.starts_with("HTTP/1.1 503"));

        let refresh = tokio::spawn(Arc::clone(&h.refresher).run());
        tokio::time::timeout(Duration::from_secs(5), async {
            while !h.refresher.is_ready() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let response = http_get(addr, "/readyz").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        let response = http_get(addr, "/healthz").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        let response = http_get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("kubelet_volume_stats_capacity_bytes{"));
        assert!(response.contains("persistentvolume=\"pv-1\""));

        let response = http_get(addr, "/other").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        refresh.abort();
        server.abort();
    }
}
