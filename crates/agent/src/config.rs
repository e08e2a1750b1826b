//! Agent configuration

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use burst_agent_lib::cgroup::{CgroupFormatter, CgroupfsFormatter, SystemdFormatter};
use burst_agent_lib::metricsadvisor;
use serde::Deserialize;

/// Agent configuration, loaded from `AGENT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from the Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Cgroup filesystem mount point
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: String,

    /// Cgroup driver convention: "systemd" or "cgroupfs"
    #[serde(default = "default_cgroup_driver")]
    pub cgroup_driver: String,

    /// Scope prefix used by the container runtime under the systemd driver
    #[serde(default = "default_runtime_prefix")]
    pub container_runtime_prefix: String,

    /// Namespace of the burst-config ConfigMap
    #[serde(default = "default_cfs_cm_namespace")]
    pub cfs_configmap_namespace: String,

    /// Name of the burst-config ConfigMap
    #[serde(default = "default_cfs_cm_name")]
    pub cfs_configmap_name: String,

    /// Resource-usage collection interval in seconds; values under one
    /// second disable the metric advisor
    #[serde(default = "default_collect_interval")]
    pub collect_res_used_interval_secs: u64,

    /// Node CPU topology collection interval in seconds
    #[serde(default = "default_node_cpu_info_interval")]
    pub collect_node_cpu_info_interval_secs: u64,

    /// Gate for the per-pod throttle collector
    #[serde(default = "default_enable_pod_throttle")]
    pub enable_pod_throttle: bool,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_cgroup_root() -> String {
    "/sys/fs/cgroup".to_string()
}

fn default_cgroup_driver() -> String {
    "systemd".to_string()
}

fn default_runtime_prefix() -> String {
    "docker".to_string()
}

fn default_cfs_cm_namespace() -> String {
    "kube-system".to_string()
}

fn default_cfs_cm_name() -> String {
    "cfs-burst-config".to_string()
}

fn default_collect_interval() -> u64 {
    10
}

fn default_node_cpu_info_interval() -> u64 {
    60
}

fn default_enable_pod_throttle() -> bool {
    true
}

impl AgentConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| AgentConfig {
            node_name: default_node_name(),
            cgroup_root: default_cgroup_root(),
            cgroup_driver: default_cgroup_driver(),
            container_runtime_prefix: default_runtime_prefix(),
            cfs_configmap_namespace: default_cfs_cm_namespace(),
            cfs_configmap_name: default_cfs_cm_name(),
            collect_res_used_interval_secs: default_collect_interval(),
            collect_node_cpu_info_interval_secs: default_node_cpu_info_interval(),
            enable_pod_throttle: default_enable_pod_throttle(),
        }))
    }

    /// Formatter for the configured cgroup driver.
    pub fn formatter(&self) -> Result<Arc<dyn CgroupFormatter>> {
        match self.cgroup_driver.as_str() {
            "systemd" => Ok(Arc::new(SystemdFormatter::new(
                self.container_runtime_prefix.clone(),
            ))),
            "cgroupfs" => Ok(Arc::new(CgroupfsFormatter)),
            other => bail!("unsupported cgroup driver {:?}", other),
        }
    }

    pub fn advisor_config(&self) -> metricsadvisor::Config {
        metricsadvisor::Config {
            collect_res_used_interval: Duration::from_secs(self.collect_res_used_interval_secs),
            collect_node_cpu_info_interval: Duration::from_secs(
                self.collect_node_cpu_info_interval_secs,
            ),
            enable_pod_throttle: self.enable_pod_throttle,
        }
    }
}
