//! Cgroup resource descriptors
//!
//! Static mapping from a resource type to the on-disk control file that
//! backs it. cgroup v1 places each file under a subsystem directory; the
//! v2 unified hierarchy has no subsystem level.

use thiserror::Error;

/// Errors from the cgroup path-resolution layer.
#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("unknown cgroup resource {kind:?} under {version:?}")]
    UnknownResource {
        kind: ResourceType,
        version: CgroupVersion,
    },
    #[error("malformed container cgroup name {0:?}")]
    MalformedIdentity(String),
    #[error("malformed pid entry {0:?}")]
    MalformedPid(String),
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which cgroup hierarchy model the host mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    V1,
    V2,
}

/// Resource kinds the agent reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Process membership list (`cgroup.procs`).
    CpuProcs,
    /// CFS bandwidth quota (`cpu.cfs_quota_us`, v1 only).
    CfsQuota,
    /// CFS bandwidth period (`cpu.cfs_period_us`, v1 only).
    CfsPeriod,
    /// Combined quota/period file (`cpu.max`, v2 only).
    CpuMax,
    /// CFS bandwidth statistics (`cpu.stat`).
    CpuStat,
}

/// On-disk location of one resource: subsystem directory (v1 only) plus
/// filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CgroupResource {
    pub subsystem: Option<&'static str>,
    pub filename: &'static str,
}

/// Look up the control-file descriptor for `kind` under `version`.
///
/// A combination with no on-disk representation is a hard error, never a
/// fallback path.
pub fn resource(kind: ResourceType, version: CgroupVersion) -> Result<CgroupResource, CgroupError> {
    let descriptor = match (version, kind) {
        (CgroupVersion::V1, ResourceType::CpuProcs) => CgroupResource {
            subsystem: Some("cpu"),
            filename: "cgroup.procs",
        },
        (CgroupVersion::V1, ResourceType::CfsQuota) => CgroupResource {
            subsystem: Some("cpu"),
            filename: "cpu.cfs_quota_us",
        },
        (CgroupVersion::V1, ResourceType::CfsPeriod) => CgroupResource {
            subsystem: Some("cpu"),
            filename: "cpu.cfs_period_us",
        },
        (CgroupVersion::V1, ResourceType::CpuStat) => CgroupResource {
            subsystem: Some("cpu"),
            filename: "cpu.stat",
        },
        (CgroupVersion::V2, ResourceType::CpuProcs) => CgroupResource {
            subsystem: None,
            filename: "cgroup.procs",
        },
        (CgroupVersion::V2, ResourceType::CpuMax) => CgroupResource {
            subsystem: None,
            filename: "cpu.max",
        },
        (CgroupVersion::V2, ResourceType::CpuStat) => CgroupResource {
            subsystem: None,
            filename: "cpu.stat",
        },
        (version, kind) => return Err(CgroupError::UnknownResource { kind, version }),
    };
    Ok(descriptor)
}
