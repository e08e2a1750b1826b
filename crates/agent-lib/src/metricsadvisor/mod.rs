//! Periodic metric-collection pipeline
//!
//! Runs independent collector plugins on their own schedules into the shared
//! metric cache. Collectors are mutually independent and may interleave
//! arbitrarily; within one collector, cycle N+1 never starts before cycle N
//! returns. A failed cycle is logged and skipped, never escalated.

mod nodeinfo;
mod podthrottle;


pub use nodeinfo::NodeInfoCollector;
pub use podthrottle::PodThrottleCollector;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cgroup::{CgroupPathResolver, CgroupVersion};
use crate::models::PodMeta;
use crate::statesinformer::StatesInformer;

/// Below this interval the whole pipeline is considered disabled.
const MIN_COLLECT_INTERVAL: Duration = Duration::from_secs(1);

/// Collection pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base interval for resource-usage collectors; values under one second
    /// switch the pipeline off entirely.
    pub collect_res_used_interval: Duration,
    /// Interval for the node CPU topology collector.
    pub collect_node_cpu_info_interval: Duration,
    /// Gate for the per-pod throttle collector.
    pub enable_pod_throttle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collect_res_used_interval: Duration::from_secs(10),
            collect_node_cpu_info_interval: Duration::from_secs(60),
            enable_pod_throttle: true,
        }
    }
}

/// Source of the pod view collectors iterate; implemented by the states
/// informer and by test stubs.
pub trait PodSource: Send + Sync {
    fn all_pods(&self) -> Vec<PodMeta>;
}

impl PodSource for StatesInformer {
    fn all_pods(&self) -> Vec<PodMeta> {
        self.get_all_pods()
    }
}

/// Shared state handed to collectors at setup time.
pub struct CollectorContext {
    pub pod_source: Arc<dyn PodSource>,
    pub cgroup_resolver: Arc<CgroupPathResolver>,
    pub cgroup_version: CgroupVersion,
}

/// One metric collector plugin.
///
/// Disabled collectors are skipped for both setup and run and never count
/// toward readiness. `started` flips true on the first fully successful
/// collection cycle and stays true.
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;
    fn enabled(&self) -> bool;
    fn setup(&self, ctx: &CollectorContext);
    async fn run(&self, cancel: CancellationToken);
    fn started(&self) -> bool;
}

/// Fixed name-to-collector table, built once at construction.
pub struct CollectorRegistry {
    collectors: HashMap<&'static str, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self {
            collectors: collectors.into_iter().map(|c| (c.name(), c)).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Collector>)> {
        self.collectors.iter().map(|(name, c)| (*name, c))
    }
}

/// The metric-collection pipeline.
pub struct MetricAdvisor {
    config: Config,
    context: CollectorContext,
    registry: CollectorRegistry,
}

impl MetricAdvisor {
    pub fn new(config: Config, context: CollectorContext, registry: CollectorRegistry) -> Self {
        Self {
            config,
            context,
            registry,
        }
    }

    /// Set up and start every enabled collector, then hold until
    /// cancellation. An unusably small interval is a feature-off path, not
    /// an error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.config.collect_res_used_interval < MIN_COLLECT_INTERVAL {
            info!(
                interval_ms = self.config.collect_res_used_interval.as_millis() as u64,
                "collection interval below minimum, metric advisor is disabled"
            );
            return Ok(());
        }

        for (name, collector) in self.registry.iter() {
            if !collector.enabled() {
                debug!(collector = name, "collector disabled, skipping setup");
                continue;
            }
            collector.setup(&self.context);
            debug!(collector = name, "collector set up");
        }

        for (name, collector) in self.registry.iter() {
            if !collector.enabled() {
                continue;
            }
            debug!(collector = name, "starting collector");
            let collector = collector.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { collector.run(cancel).await });
        }

        info!("metric advisor started");
        cancel.cancelled().await;
        info!("shutting down metric advisor");
        Ok(())
    }

    /// True iff every enabled collector has completed a successful cycle.
    pub fn has_synced(&self) -> bool {
        self.registry
            .iter()
            .filter(|(_, c)| c.enabled())
            .all(|(_, c)| c.started())
    }
}

/// Drift-tolerant fixed-period scheduling shared by all collectors: the
/// collection future is awaited in the loop body, so a slow cycle delays the
/// next tick instead of overlapping it.
pub(crate) async fn run_collector_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    collect: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(collector = name, "collector stopping");
                return;
            }
            _ = ticker.tick() => collect().await,
        }
    }
}
