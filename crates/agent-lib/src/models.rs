//! Core data models for the burst agent

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

/// One pod's identity plus its resolved cgroup location.
///
/// Built wholesale by the pods informer on every observed change event and
/// never mutated afterward; `clone()` yields an independent deep copy of the
/// pod snapshot.
#[derive(Debug, Clone, Default)]
pub struct PodMeta {
    /// Current pod spec/status snapshot, absent when the watch has not
    /// delivered one.
    pub pod: Option<Pod>,
    /// Pod-level cgroup parent path relative to the hierarchy root,
    /// e.g. `kubepods-burstable.slice/kubepods-burstable-pod<uid>.slice/`.
    pub cgroup_dir: String,
}

impl PodMeta {
    pub fn new(pod: Pod, cgroup_dir: String) -> Self {
        Self {
            pod: Some(pod),
            cgroup_dir,
        }
    }

    /// Deterministic `namespace/name` identifier.
    ///
    /// Returns the empty string when the pod reference is absent; this is a
    /// defined sentinel, not an error.
    pub fn key(&self) -> String {
        let Some(pod) = &self.pod else {
            return String::new();
        };
        pod_key(pod)
    }

    /// Whether the pod phase is `Running` or `Pending`; an absent pod or
    /// phase is neither.
    pub fn is_running_or_pending(&self) -> bool {
        let phase = self
            .pod
            .as_ref()
            .and_then(|p| p.status.as_ref())
            .and_then(|s| s.phase.as_deref());
        matches!(phase, Some("Running") | Some("Pending"))
    }
}

/// `namespace/name` key for a pod; missing metadata fields default to empty.
pub fn pod_key(pod: &Pod) -> String {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("");
    let name = pod.metadata.name.as_deref().unwrap_or("");
    format!("{}/{}", namespace, name)
}

/// One logical processor as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorInfo {
    pub processor: u32,
    pub core_id: u32,
    pub socket_id: u32,
    pub mhz: f64,
}

/// Aggregate CPU topology counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTotalInfo {
    pub cpu_count: u32,
    pub core_count: u32,
    pub socket_count: u32,
}

/// Per-node CPU topology snapshot written by the node info collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCpuInfo {
    pub cpus: Vec<ProcessorInfo>,
    pub total: CpuTotalInfo,
    /// Unix timestamp of the collection cycle that produced this snapshot.
    pub collected_at: i64,
}

/// Per-pod CFS bandwidth snapshot parsed from the pod-level `cpu.stat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodCpuStat {
    pub nr_periods: u64,
    pub nr_throttled: u64,
    pub throttled_usec: u64,
    pub collected_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(namespace: &str, name: &str, phase: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: phase.map(|p| PodStatus {
                phase: Some(p.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_meta_key() {
        let meta = PodMeta::new(pod("default", "nginx", None), String::new());
        assert_eq!(meta.key(), "default/nginx");
    }

    #[test]
    fn test_pod_meta_key_absent_pod() {
        let meta = PodMeta::default();
        assert_eq!(meta.key(), "");
    }

    #[test]
    fn test_pod_meta_key_ignores_status() {
        let a = PodMeta::new(pod("ns", "p", Some("Running")), String::new());
        let b = PodMeta::new(pod("ns", "p", Some("Failed")), "somewhere/".to_string());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_is_running_or_pending() {
        for (phase, want) in [
            (Some("Running"), true),
            (Some("Pending"), true),
            (Some("Succeeded"), false),
            (Some("Failed"), false),
            (None, false),
        ] {
            let meta = PodMeta::new(pod("ns", "p", phase), String::new());
            assert_eq!(meta.is_running_or_pending(), want, "phase {:?}", phase);
        }
        assert!(!PodMeta::default().is_running_or_pending());
    }

    #[test]
    fn test_pod_meta_clone_is_independent() {
        let meta = PodMeta::new(pod("ns", "p", Some("Running")), "dir/".to_string());
        let mut copy = meta.clone();
        copy.pod.as_mut().unwrap().metadata.name = Some("other".to_string());
        assert_eq!(meta.key(), "ns/p");
        assert_eq!(copy.key(), "ns/other");
    }
}
