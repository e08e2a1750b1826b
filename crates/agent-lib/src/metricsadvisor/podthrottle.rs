//! Per-pod CFS throttle collector
//!
//! Each cycle walks the synced pod view, resolves every running pod's
//! pod-level `cpu.stat` through the cgroup path resolver and caches the
//! parsed bandwidth counters. A pod whose file is unreadable (already gone,
//! permissions) is skipped for that cycle; the entry it had keeps its last
//! value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{run_collector_loop, Collector, CollectorContext, PodSource};
use crate::cgroup::{CgroupPathResolver, CgroupVersion, ResourceType};
use crate::metriccache::{pod_cpu_stat_key, MetricCache, MetricValue};
use crate::models::PodCpuStat;

pub const COLLECTOR_NAME: &str = "pod_throttle";

struct Deps {
    pod_source: Arc<dyn PodSource>,
    resolver: Arc<CgroupPathResolver>,
    version: CgroupVersion,
}

pub struct PodThrottleCollector {
    collect_interval: Duration,
    enabled: bool,
    cache: Arc<MetricCache>,
    deps: OnceLock<Deps>,
    started: AtomicBool,
}

impl PodThrottleCollector {
    pub fn new(collect_interval: Duration, enabled: bool, cache: Arc<MetricCache>) -> Self {
        Self {
            collect_interval,
            enabled,
            cache,
            deps: OnceLock::new(),
            started: AtomicBool::new(false),
        }
    }

    async fn collect_pod_throttle(&self) {
        let Some(deps) = self.deps.get() else {
            warn!("pod throttle collector has not been set up");
            return;
        };

        let collected_at = chrono::Utc::now().timestamp();
        for meta in deps.pod_source.all_pods() {
            if !meta.is_running_or_pending() || meta.cgroup_dir.is_empty() {
                continue;
            }
            let key = meta.key();

            let path = match deps.resolver.pod_control_file(
                &meta.cgroup_dir,
                ResourceType::CpuStat,
                deps.version,
            ) {
                Ok(path) => path,
                Err(err) => {
                    warn!(pod = %key, error = %err, "cannot resolve pod cpu.stat path");
                    continue;
                }
            };

            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    debug!(pod = %key, path = %path.display(), error = %err,
                        "skipping pod, cpu.stat unreadable");
                    continue;
                }
            };

            let stat = parse_cpu_stat(&content, collected_at);
            self.cache
                .set(pod_cpu_stat_key(&key), MetricValue::PodCpuStat(stat));
        }

        self.started.store(true, Ordering::SeqCst);
    }
}

/// Parse CFS bandwidth counters out of a `cpu.stat` file.
///
/// Handles both hierarchies: v2 reports `throttled_usec`, v1 reports
/// `throttled_time` in nanoseconds.
pub fn parse_cpu_stat(content: &str, collected_at: i64) -> PodCpuStat {
    let mut stat = PodCpuStat {
        nr_periods: 0,
        nr_throttled: 0,
        throttled_usec: 0,
        collected_at,
    };

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(field), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match field {
            "nr_periods" => stat.nr_periods = value.parse().unwrap_or(0),
            "nr_throttled" => stat.nr_throttled = value.parse().unwrap_or(0),
            "throttled_usec" => stat.throttled_usec = value.parse().unwrap_or(0),
            "throttled_time" => {
                stat.throttled_usec = value.parse::<u64>().unwrap_or(0) / 1_000;
            }
            _ => {}
        }
    }

    stat
}

#[async_trait]
impl Collector for PodThrottleCollector {
    fn name(&self) -> &'static str {
        COLLECTOR_NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn setup(&self, ctx: &CollectorContext) {
        let _ = self.deps.set(Deps {
            pod_source: ctx.pod_source.clone(),
            resolver: ctx.cgroup_resolver.clone(),
            version: ctx.cgroup_version,
        });
    }

    async fn run(&self, cancel: CancellationToken) {
        run_collector_loop(COLLECTOR_NAME, self.collect_interval, cancel, || {
            self.collect_pod_throttle()
        })
        .await;
    }

    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
