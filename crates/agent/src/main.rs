//! CFS burst agent
//!
//! Runs as a DaemonSet on each Kubernetes node. Brings up the states
//! informer first, waits for its caches to sync, then starts the metric
//! advisor; the quota-burst decision logic consumes both.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use burst_agent_lib::cgroup::{self, CgroupPathResolver};
use burst_agent_lib::metriccache::MetricCache;
use burst_agent_lib::metricsadvisor::{
    Collector, CollectorContext, CollectorRegistry, MetricAdvisor, NodeInfoCollector, PodSource,
    PodThrottleCollector,
};
use burst_agent_lib::statesinformer::{
    self, wait_for_cache_sync, CmInformer, InformerPlugins, NodeInformer, PodsInformer,
    StatesInformer,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod watch;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("starting burst-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        cgroup_driver = %config.cgroup_driver,
        "agent configured"
    );

    let cancel = CancellationToken::new();

    let cgroup_version = cgroup::detect_cgroup_version(Path::new(&config.cgroup_root)).await;
    info!(version = ?cgroup_version, "detected cgroup hierarchy");
    let resolver = Arc::new(CgroupPathResolver::new(
        config.cgroup_root.clone(),
        config.formatter()?,
    ));
    let cache = Arc::new(MetricCache::new());

    let client = kube::Client::try_default()
        .await
        .context("failed to build kubernetes client")?;
    let channels = watch::spawn_watchers(client, &config, &cancel);

    let informer = Arc::new(StatesInformer::new(
        Arc::new(statesinformer::Config {
            node_name: config.node_name.clone(),
        }),
        resolver.clone(),
        InformerPlugins {
            node: Arc::new(NodeInformer::new(channels.node)),
            configmap: Arc::new(CmInformer::new(channels.configmap)),
            pods: Arc::new(PodsInformer::new(channels.pods)),
        },
    ));

    let informer_task = {
        let informer = informer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { informer.run(cancel).await })
    };

    // Collectors must not start against an unsynced world view.
    if !wait_for_cache_sync(&cancel, || informer.started()).await {
        bail!("states informer never synced");
    }

    let registry = CollectorRegistry::new(vec![
        Arc::new(NodeInfoCollector::new(
            Duration::from_secs(config.collect_node_cpu_info_interval_secs),
            cache.clone(),
        )) as Arc<dyn Collector>,
        Arc::new(PodThrottleCollector::new(
            Duration::from_secs(config.collect_res_used_interval_secs),
            config.enable_pod_throttle,
            cache.clone(),
        )) as Arc<dyn Collector>,
    ]);
    let advisor = MetricAdvisor::new(
        config.advisor_config(),
        CollectorContext {
            pod_source: informer.clone() as Arc<dyn PodSource>,
            cgroup_resolver: resolver.clone(),
            cgroup_version,
        },
        registry,
    );
    let advisor_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { advisor.run(cancel).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    cancel.cancel();

    for (name, task) in [("states informer", informer_task), ("metric advisor", advisor_task)] {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(task = name, error = %err, "task exited with error"),
            Err(err) => warn!(task = name, error = %err, "task panicked"),
        }
    }

    info!("burst-agent stopped");
    Ok(())
}
