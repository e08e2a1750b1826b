//! Cgroup-driver naming conventions
//!
//! Maps pod/container identities to hierarchy path segments and back. The
//! systemd driver names everything as slices and scopes; the cgroupfs driver
//! uses plain directories. Format and parse live on the same implementation
//! so the pair round-trips by construction.

use k8s_openapi::api::core::v1::Pod;

use super::resource::CgroupError;

/// Pod QoS class as assigned by the kubelet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosClass {
    Guaranteed,
    Burstable,
    BestEffort,
}

impl QosClass {
    /// QoS class from the pod status; an absent or unrecognized value is
    /// treated as BestEffort.
    pub fn from_pod(pod: &Pod) -> Self {
        match pod
            .status
            .as_ref()
            .and_then(|s| s.qos_class.as_deref())
        {
            Some("Guaranteed") => QosClass::Guaranteed,
            Some("Burstable") => QosClass::Burstable,
            _ => QosClass::BestEffort,
        }
    }
}

/// Naming convention for one cgroup-driver family.
///
/// Implementations are selected at configuration time and injected into the
/// path resolver; adding a runtime family means adding an implementation,
/// not editing call sites.
pub trait CgroupFormatter: Send + Sync {
    /// Hierarchy segment that roots all pod cgroups, with trailing slash.
    fn parent_dir(&self) -> &'static str;

    /// Pod-level segment relative to `parent_dir`, QoS slice included,
    /// with trailing slash.
    fn pod_dir(&self, qos: QosClass, pod_uid: &str) -> String;

    /// Container-level directory basename for a container identity.
    fn container_dir(&self, container_id: &str) -> String;

    /// Inverse of [`container_dir`](Self::container_dir). A parse failure
    /// means "not a container cgroup dir" and is filterable by the caller.
    fn parse_container_id(&self, basename: &str) -> Result<String, CgroupError>;
}

/// Whether `basename` names a container cgroup under this convention.
pub fn is_container_cgroup_dir(formatter: &dyn CgroupFormatter, basename: &str) -> bool {
    formatter.parse_container_id(basename).is_ok()
}

/// Systemd-driver convention: `kubepods.slice` hierarchy, pod slices with
/// underscored uids, scope-suffixed container directories such as
/// `docker-<id>.scope`.
pub struct SystemdFormatter {
    runtime_prefix: String,
}

impl SystemdFormatter {
    pub fn new(runtime_prefix: impl Into<String>) -> Self {
        Self {
            runtime_prefix: runtime_prefix.into(),
        }
    }
}

impl Default for SystemdFormatter {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl CgroupFormatter for SystemdFormatter {
    fn parent_dir(&self) -> &'static str {
        "kubepods.slice/"
    }

    fn pod_dir(&self, qos: QosClass, pod_uid: &str) -> String {
        // Systemd slice names use underscores where the uid has dashes.
        let uid = pod_uid.replace('-', "_");
        match qos {
            QosClass::Guaranteed => format!("kubepods-pod{}.slice/", uid),
            QosClass::Burstable => format!(
                "kubepods-burstable.slice/kubepods-burstable-pod{}.slice/",
                uid
            ),
            QosClass::BestEffort => format!(
                "kubepods-besteffort.slice/kubepods-besteffort-pod{}.slice/",
                uid
            ),
        }
    }

    fn container_dir(&self, container_id: &str) -> String {
        format!("{}-{}.scope", self.runtime_prefix, container_id)
    }

    fn parse_container_id(&self, basename: &str) -> Result<String, CgroupError> {
        let stripped = basename
            .strip_suffix(".scope")
            .ok_or_else(|| CgroupError::MalformedIdentity(basename.to_string()))?;
        // Runtime prefixes may themselves contain dashes (cri-containerd-),
        // so the id is everything after the last one.
        let id = stripped
            .rsplit('-')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CgroupError::MalformedIdentity(basename.to_string()))?;
        Ok(id.to_string())
    }
}

/// Cgroupfs-driver convention: plain `kubepods` directories, container
/// directories named by the bare container id.
#[derive(Debug, Default)]
pub struct CgroupfsFormatter;

impl CgroupFormatter for CgroupfsFormatter {
    fn parent_dir(&self) -> &'static str {
        "kubepods/"
    }

    fn pod_dir(&self, qos: QosClass, pod_uid: &str) -> String {
        match qos {
            QosClass::Guaranteed => format!("pod{}/", pod_uid),
            QosClass::Burstable => format!("burstable/pod{}/", pod_uid),
            QosClass::BestEffort => format!("besteffort/pod{}/", pod_uid),
        }
    }

    fn container_dir(&self, container_id: &str) -> String {
        container_id.to_string()
    }

    fn parse_container_id(&self, basename: &str) -> Result<String, CgroupError> {
        if basename.is_empty() || !basename.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CgroupError::MalformedIdentity(basename.to_string()));
        }
        Ok(basename.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;

    #[test]
    fn test_systemd_container_dir() {
        let f = SystemdFormatter::default();
        assert_eq!(f.container_dir("7712555c"), "docker-7712555c.scope");

        let f = SystemdFormatter::new("cri-containerd");
        assert_eq!(f.container_dir("abc123"), "cri-containerd-abc123.scope");
    }

    #[test]
    fn test_systemd_round_trip() {
        for prefix in ["docker", "crio", "cri-containerd"] {
            let f = SystemdFormatter::new(prefix);
            for id in ["7712555c", "7712555c_ce62_454a_9e18_9ff0217b8941"] {
                assert_eq!(f.parse_container_id(&f.container_dir(id)).unwrap(), id);
            }
        }
    }

    #[test]
    fn test_systemd_parse_rejects_non_scope() {
        let f = SystemdFormatter::default();
        assert!(f.parse_container_id("kubepods-burstable.slice").is_err());
        assert!(f.parse_container_id("docker-.scope").is_err());
        assert!(f.parse_container_id("").is_err());
    }

    #[test]
    fn test_systemd_pod_dir_underscores_uid() {
        let f = SystemdFormatter::default();
        assert_eq!(
            f.pod_dir(QosClass::Burstable, "7712555c-ce62-454a-9e18-9ff0217b8941"),
            "kubepods-burstable.slice/kubepods-burstable-pod7712555c_ce62_454a_9e18_9ff0217b8941.slice/"
        );
        assert_eq!(
            f.pod_dir(QosClass::Guaranteed, "7712555c"),
            "kubepods-pod7712555c.slice/"
        );
    }

    #[test]
    fn test_cgroupfs_round_trip() {
        let f = CgroupfsFormatter;
        let id = "abc123def456";
        assert_eq!(f.parse_container_id(&f.container_dir(id)).unwrap(), id);
    }

    #[test]
    fn test_cgroupfs_parse_rejects_non_hex() {
        let f = CgroupfsFormatter;
        assert!(f.parse_container_id("").is_err());
        assert!(f.parse_container_id("pod7712555c-ce62").is_err());
        assert!(is_container_cgroup_dir(&f, "deadbeef"));
        assert!(!is_container_cgroup_dir(&f, "besteffort"));
    }

    #[test]
    fn test_cgroupfs_pod_dir() {
        let f = CgroupfsFormatter;
        assert_eq!(
            f.pod_dir(QosClass::BestEffort, "7712555c-ce62"),
            "besteffort/pod7712555c-ce62/"
        );
    }

    #[test]
    fn test_qos_class_from_pod() {
        let mut pod = Pod::default();
        assert_eq!(QosClass::from_pod(&pod), QosClass::BestEffort);
        pod.status = Some(PodStatus {
            qos_class: Some("Burstable".to_string()),
            ..Default::default()
        });
        assert_eq!(QosClass::from_pod(&pod), QosClass::Burstable);
    }
}
