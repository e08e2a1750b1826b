//! Cgroup path resolution
//!
//! Deterministic mapping from a pod/container identity to the control-file
//! paths backing it, across cgroup v1 and v2 hierarchies and across
//! cgroup-driver naming conventions, plus parsing of the kernel's
//! process-list format. Side-effect free apart from the explicit read
//! helpers.

mod formatter;
mod resolver;
mod resource;

pub use formatter::{
    is_container_cgroup_dir, CgroupFormatter, CgroupfsFormatter, QosClass, SystemdFormatter,
};
pub use resolver::{parse_cgroup_procs, read_pids, CgroupPathResolver};
pub use resource::{resource, CgroupError, CgroupResource, CgroupVersion, ResourceType};

use std::path::Path;
use tokio::fs;

/// Detect which cgroup hierarchy the host mounts at `root`.
///
/// The unified hierarchy exposes `cgroup.controllers` at its root; anything
/// else is treated as a v1 mount.
pub async fn detect_cgroup_version(root: &Path) -> CgroupVersion {
    if fs::metadata(root.join("cgroup.controllers")).await.is_ok() {
        CgroupVersion::V2
    } else {
        CgroupVersion::V1
    }
}
