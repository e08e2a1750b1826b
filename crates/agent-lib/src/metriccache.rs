//! Shared keyed metric cache
//!
//! Holds the most recently collected snapshot per metric key. Writes are
//! last-write-wins with no history; entries appear on the first successful
//! collection and are never deleted by this layer. Safe for concurrent
//! readers and writers across all collectors and the quota-decision
//! consumer.

use dashmap::DashMap;

use crate::models::{NodeCpuInfo, PodCpuStat};

/// Cache key for the per-node CPU topology snapshot.
pub const NODE_CPU_INFO_KEY: &str = "node_cpu_info";

/// Cache key for one pod's CFS bandwidth snapshot.
pub fn pod_cpu_stat_key(pod_key: &str) -> String {
    format!("pod_cpu_stat/{}", pod_key)
}

/// Most-recent value for one metric kind.
#[derive(Debug, Clone)]
pub enum MetricValue {
    NodeCpuInfo(NodeCpuInfo),
    PodCpuStat(PodCpuStat),
}

/// Concurrent keyed store of most-recent metric snapshots.
#[derive(Default)]
pub struct MetricCache {
    entries: DashMap<String, MetricValue>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `key`; the previous value, if any, is gone.
    pub fn set(&self, key: impl Into<String>, value: MetricValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<MetricValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Typed read of the node CPU topology snapshot.
    pub fn node_cpu_info(&self) -> Option<NodeCpuInfo> {
        match self.get(NODE_CPU_INFO_KEY) {
            Some(MetricValue::NodeCpuInfo(info)) => Some(info),
            _ => None,
        }
    }

    /// Typed read of one pod's CFS bandwidth snapshot.
    pub fn pod_cpu_stat(&self, pod_key: &str) -> Option<PodCpuStat> {
        match self.get(&pod_cpu_stat_key(pod_key)) {
            Some(MetricValue::PodCpuStat(stat)) => Some(stat),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
