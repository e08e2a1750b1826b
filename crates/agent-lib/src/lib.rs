//! Agent library for CFS quota bursting
//!
//! This crate provides the shared infrastructure core of the burst agent:
//! - State synchronization over node, pod and burst-config views
//! - Periodic metric collection into a shared keyed cache
//! - Cgroup control-file path resolution across v1/v2 and cgroup drivers
//!
//! The quota-burst decision logic consumes the accessors exposed here; it
//! does not live in this crate.

pub mod cgroup;
pub mod metriccache;
pub mod metricsadvisor;
pub mod models;
pub mod statesinformer;
pub mod util;

pub use metriccache::{MetricCache, MetricValue};
pub use models::{NodeCpuInfo, PodCpuStat, PodMeta};
