//! Node CPU topology collector

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{run_collector_loop, Collector, CollectorContext};
use crate::metriccache::{MetricCache, MetricValue, NODE_CPU_INFO_KEY};
use crate::util::cpuinfo::read_cpu_info;

pub const COLLECTOR_NAME: &str = "node_info";

/// Samples host CPU topology into the metric cache each cycle: gather,
/// transform, one atomic cache write, then mark started. Nothing is written
/// on a failed cycle.
pub struct NodeInfoCollector {
    collect_interval: Duration,
    cpuinfo_path: PathBuf,
    cache: Arc<MetricCache>,
    started: AtomicBool,
}

impl NodeInfoCollector {
    pub fn new(collect_interval: Duration, cache: Arc<MetricCache>) -> Self {
        Self::with_cpuinfo_path(collect_interval, cache, "/proc/cpuinfo")
    }

    /// Custom cpuinfo path, for tests.
    pub fn with_cpuinfo_path(
        collect_interval: Duration,
        cache: Arc<MetricCache>,
        cpuinfo_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            collect_interval,
            cpuinfo_path: cpuinfo_path.into(),
            cache,
            started: AtomicBool::new(false),
        }
    }

    async fn collect_node_info(&self) {
        match read_cpu_info(&self.cpuinfo_path).await {
            Ok(info) => {
                debug!(
                    cpus = info.total.cpu_count,
                    cores = info.total.core_count,
                    "collected node cpu info"
                );
                self.cache
                    .set(NODE_CPU_INFO_KEY, MetricValue::NodeCpuInfo(info));
                self.started.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                warn!(error = %err, "failed to collect node cpu info");
            }
        }
    }
}

#[async_trait]
impl Collector for NodeInfoCollector {
    fn name(&self) -> &'static str {
        COLLECTOR_NAME
    }

    fn enabled(&self) -> bool {
        true
    }

    fn setup(&self, _ctx: &CollectorContext) {}

    async fn run(&self, cancel: CancellationToken) {
        run_collector_loop(COLLECTOR_NAME, self.collect_interval, cancel, || {
            self.collect_node_info()
        })
        .await;
    }

    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "processor\t: 0\nphysical id\t: 0\ncore id\t: 0\ncpu MHz\t: 2000.0\n";

    #[tokio::test]
    async fn test_collect_writes_cache_and_marks_started() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpuinfo");
        std::fs::write(&path, SAMPLE).unwrap();

        let cache = Arc::new(MetricCache::new());
        let collector =
            NodeInfoCollector::with_cpuinfo_path(Duration::from_secs(60), cache.clone(), &path);
        assert!(!collector.started());

        collector.collect_node_info().await;
        assert!(collector.started());
        assert_eq!(cache.node_cpu_info().unwrap().total.cpu_count, 1);
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_cache_untouched() {
        let cache = Arc::new(MetricCache::new());
        let collector = NodeInfoCollector::with_cpuinfo_path(
            Duration::from_secs(60),
            cache.clone(),
            "/nonexistent/cpuinfo",
        );

        collector.collect_node_info().await;
        assert!(!collector.started());
        assert!(cache.node_cpu_info().is_none());
    }

    #[tokio::test]
    async fn test_run_collects_on_schedule_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpuinfo");
        std::fs::write(&path, SAMPLE).unwrap();

        let cache = Arc::new(MetricCache::new());
        let collector = Arc::new(NodeInfoCollector::with_cpuinfo_path(
            Duration::from_millis(10),
            cache.clone(),
            &path,
        ));

        let cancel = CancellationToken::new();
        let handle = {
            let collector = collector.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { collector.run(cancel).await })
        };

        for _ in 0..100 {
            if collector.started() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(collector.started());

        cancel.cancel();
        handle.await.unwrap();
    }
}
