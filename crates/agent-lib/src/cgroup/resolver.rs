//! Control-file path composition and process-list reading
//!
//! Pure request/response mapping from a pod/container identity to the
//! absolute control-file path under the configured cgroup mount point.
//! Nothing here keeps state between calls; identical inputs always compose
//! identical paths.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use super::formatter::{CgroupFormatter, QosClass};
use super::resource::{resource, CgroupError, CgroupVersion, ResourceType};

/// Resolves cgroup control-file paths for pods and containers.
pub struct CgroupPathResolver {
    root: PathBuf,
    formatter: Arc<dyn CgroupFormatter>,
}

impl CgroupPathResolver {
    pub fn new(root: impl Into<PathBuf>, formatter: Arc<dyn CgroupFormatter>) -> Self {
        Self {
            root: root.into(),
            formatter,
        }
    }

    pub fn formatter(&self) -> &dyn CgroupFormatter {
        self.formatter.as_ref()
    }

    /// Absolute path of `kind`'s control file for one container.
    ///
    /// Composes `{root}/{subsystem if v1}/{parent}/{pod_parent_dir}/
    /// {container_dir}/{filename}`; the subsystem segment is omitted under
    /// v2 because the unified hierarchy has none.
    pub fn container_control_file(
        &self,
        pod_parent_dir: &str,
        container_id: &str,
        kind: ResourceType,
        version: CgroupVersion,
    ) -> Result<PathBuf, CgroupError> {
        let res = resource(kind, version)?;
        let mut path = self.root.clone();
        if let Some(subsystem) = res.subsystem {
            path.push(subsystem);
        }
        path.push(self.formatter.parent_dir().trim_matches('/'));
        path.push(pod_parent_dir.trim_matches('/'));
        path.push(self.formatter.container_dir(container_id));
        path.push(res.filename);
        Ok(path)
    }

    /// Absolute path of `kind`'s control file at the pod level.
    pub fn pod_control_file(
        &self,
        pod_parent_dir: &str,
        kind: ResourceType,
        version: CgroupVersion,
    ) -> Result<PathBuf, CgroupError> {
        let res = resource(kind, version)?;
        let mut path = self.root.clone();
        if let Some(subsystem) = res.subsystem {
            path.push(subsystem);
        }
        path.push(self.formatter.parent_dir().trim_matches('/'));
        path.push(pod_parent_dir.trim_matches('/'));
        path.push(res.filename);
        Ok(path)
    }

    /// Derived pod-level cgroup parent dir for a pod, relative to the
    /// hierarchy root. This is the `CgroupDir` the pods informer stamps on
    /// each [`PodMeta`](crate::models::PodMeta).
    pub fn pod_cgroup_dir(&self, pod: &Pod) -> String {
        let qos = QosClass::from_pod(pod);
        let uid = pod.metadata.uid.as_deref().unwrap_or("");
        self.formatter.pod_dir(qos, uid)
    }

    /// PIDs of every process in one container's cgroup.
    pub fn container_pids(
        &self,
        pod_parent_dir: &str,
        container_id: &str,
        version: CgroupVersion,
    ) -> Result<BTreeSet<u32>, CgroupError> {
        let path =
            self.container_control_file(pod_parent_dir, container_id, ResourceType::CpuProcs, version)?;
        read_pids(&path)
    }
}

/// Read and parse a `cgroup.procs` file.
pub fn read_pids(path: &Path) -> Result<BTreeSet<u32>, CgroupError> {
    let content = std::fs::read_to_string(path).map_err(|source| CgroupError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_cgroup_procs(&content)
}

/// Parse the kernel's process-list format: one decimal PID per non-empty
/// line. Any line that fails to parse aborts the whole read with no partial
/// result.
pub fn parse_cgroup_procs(content: &str) -> Result<BTreeSet<u32>, CgroupError> {
    let mut pids = BTreeSet::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let pid = line
            .parse::<u32>()
            .map_err(|_| CgroupError::MalformedPid(line.to_string()))?;
        pids.insert(pid);
    }
    Ok(pids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::formatter::{CgroupfsFormatter, SystemdFormatter};

    fn systemd_resolver() -> CgroupPathResolver {
        CgroupPathResolver::new("/sys/fs/cgroup", Arc::new(SystemdFormatter::default()))
    }

    const POD_PARENT: &str = "kubepods-burstable.slice/kubepods-pod7712555c.slice/";

    #[test]
    fn test_v1_cpu_procs_path() {
        let path = systemd_resolver()
            .container_control_file(POD_PARENT, "7712555c", ResourceType::CpuProcs, CgroupVersion::V1)
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from(
                "/sys/fs/cgroup/cpu/kubepods.slice/kubepods-burstable.slice/\
                 kubepods-pod7712555c.slice/docker-7712555c.scope/cgroup.procs"
            )
        );
    }

    #[test]
    fn test_v2_path_omits_subsystem() {
        let resolver = systemd_resolver();
        let v1 = resolver
            .container_control_file(POD_PARENT, "7712555c", ResourceType::CpuStat, CgroupVersion::V1)
            .unwrap();
        let v2 = resolver
            .container_control_file(POD_PARENT, "7712555c", ResourceType::CpuStat, CgroupVersion::V2)
            .unwrap();
        assert!(v1.starts_with("/sys/fs/cgroup/cpu/"));
        assert!(v2.starts_with("/sys/fs/cgroup/kubepods.slice/"));
        // Identical apart from the subsystem segment.
        assert_eq!(
            v1.strip_prefix("/sys/fs/cgroup/cpu").unwrap(),
            v2.strip_prefix("/sys/fs/cgroup").unwrap()
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = systemd_resolver();
        let first = resolver
            .container_control_file(POD_PARENT, "7712555c", ResourceType::CfsQuota, CgroupVersion::V1)
            .unwrap();
        let second = resolver
            .container_control_file(POD_PARENT, "7712555c", ResourceType::CfsQuota, CgroupVersion::V1)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_resource_never_yields_a_path() {
        let err = systemd_resolver()
            .container_control_file(POD_PARENT, "7712555c", ResourceType::CpuMax, CgroupVersion::V1)
            .unwrap_err();
        assert!(matches!(err, CgroupError::UnknownResource { .. }));
    }

    #[test]
    fn test_cgroupfs_pod_control_file() {
        let resolver = CgroupPathResolver::new("/sys/fs/cgroup", Arc::new(CgroupfsFormatter));
        let path = resolver
            .pod_control_file("burstable/pod7712555c/", ResourceType::CpuMax, CgroupVersion::V2)
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/sys/fs/cgroup/kubepods/burstable/pod7712555c/cpu.max")
        );
    }

    #[test]
    fn test_parse_cgroup_procs() {
        let pids = parse_cgroup_procs("123\n456\n789\n").unwrap();
        assert_eq!(pids, BTreeSet::from([123, 456, 789]));
    }

    #[test]
    fn test_parse_cgroup_procs_empty() {
        assert!(parse_cgroup_procs("").unwrap().is_empty());
        // A trailing blank line is part of the format.
        assert_eq!(parse_cgroup_procs("42\n\n").unwrap(), BTreeSet::from([42]));
    }

    #[test]
    fn test_parse_cgroup_procs_malformed_line_aborts() {
        let err = parse_cgroup_procs("123\nnot-a-pid\n789\n").unwrap_err();
        assert!(matches!(err, CgroupError::MalformedPid(_)));
    }

    #[test]
    fn test_read_pids_missing_file() {
        let err = read_pids(Path::new("/nonexistent/cgroup.procs")).unwrap_err();
        assert!(matches!(err, CgroupError::Io { .. }));
    }

    #[test]
    fn test_read_pids_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cgroup.procs");
        std::fs::write(&path, "1\n17\n4242\n").unwrap();
        assert_eq!(read_pids(&path).unwrap(), BTreeSet::from([1, 17, 4242]));
    }
}
