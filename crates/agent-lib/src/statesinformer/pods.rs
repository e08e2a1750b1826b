//! Pods informer plugin
//!
//! Tracks every pod scheduled on this node, stamping each entry with its
//! derived cgroup parent directory so downstream consumers never re-derive
//! paths from raw pod fields.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{InformerPlugin, InformerPlugins, PluginOption, WatchEvent};
use crate::cgroup::CgroupPathResolver;
use crate::models::{pod_key, PodMeta};

/// Tracks the node's pod set keyed by `namespace/name`.
pub struct PodsInformer {
    pods: RwLock<HashMap<String, PodMeta>>,
    synced: AtomicBool,
    resolver: OnceLock<Arc<CgroupPathResolver>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<WatchEvent<Pod>>>>,
}

impl PodsInformer {
    pub fn new(events: mpsc::UnboundedReceiver<WatchEvent<Pod>>) -> Self {
        Self {
            pods: RwLock::new(HashMap::new()),
            synced: AtomicBool::new(false),
            resolver: OnceLock::new(),
            events: Mutex::new(Some(events)),
        }
    }

    /// Independent snapshot of every tracked pod.
    pub fn get_all_pods(&self) -> Vec<PodMeta> {
        self.pods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn meta_for(&self, pod: Pod) -> PodMeta {
        let cgroup_dir = self
            .resolver
            .get()
            .map(|resolver| resolver.pod_cgroup_dir(&pod))
            .unwrap_or_default();
        PodMeta::new(pod, cgroup_dir)
    }

    fn apply(&self, event: WatchEvent<Pod>) {
        match event {
            WatchEvent::Applied(pod) => {
                let meta = self.meta_for(pod);
                let key = meta.key();
                if key.is_empty() {
                    warn!("dropping pod event without namespace/name");
                    return;
                }
                debug!(pod = %key, cgroup_dir = %meta.cgroup_dir, "pod applied");
                self.pods
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(key, meta);
            }
            WatchEvent::Deleted(pod) => {
                let key = pod_key(&pod);
                debug!(pod = %key, "pod deleted");
                self.pods
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&key);
            }
            WatchEvent::Restarted(pods) => {
                let rebuilt: HashMap<String, PodMeta> = pods
                    .into_iter()
                    .map(|pod| self.meta_for(pod))
                    .filter(|meta| !meta.key().is_empty())
                    .map(|meta| (meta.key(), meta))
                    .collect();
                debug!(count = rebuilt.len(), "pod view rebuilt from relist");
                *self.pods.write().unwrap_or_else(|e| e.into_inner()) = rebuilt;
                self.synced.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl InformerPlugin for PodsInformer {
    fn setup(&self, opt: &PluginOption, _plugins: &InformerPlugins) {
        // The resolver carries the node-level cgroup-driver convention; it
        // is how each pod entry gets its cgroup dir annotation.
        let _ = self.resolver.set(opt.cgroup_resolver.clone());
    }

    async fn start(&self, cancel: CancellationToken) {
        let receiver = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut events) = receiver else {
            warn!("pods informer started without an event stream");
            return;
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("pods informer stopping");
                    return;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.apply(event),
                        None => {
                            warn!("pod watch stream closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::SystemdFormatter;
    use crate::statesinformer::Config;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: &str, uid: &str, qos: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some(name.to_string()),
                uid: Some(uid.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                qos_class: Some(qos.to_string()),
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn set_up(informer: &PodsInformer) {
        let opt = PluginOption {
            config: Arc::new(Config {
                node_name: "node-1".to_string(),
            }),
            cgroup_resolver: Arc::new(CgroupPathResolver::new(
                "/sys/fs/cgroup",
                Arc::new(SystemdFormatter::default()),
            )),
        };
        let (_, node_rx) = mpsc::unbounded_channel();
        let (_, cm_rx) = mpsc::unbounded_channel();
        let (_, pods_rx) = mpsc::unbounded_channel();
        let plugins = InformerPlugins {
            node: Arc::new(crate::statesinformer::NodeInformer::new(node_rx)),
            configmap: Arc::new(crate::statesinformer::CmInformer::new(cm_rx)),
            pods: Arc::new(PodsInformer::new(pods_rx)),
        };
        informer.setup(&opt, &plugins);
    }

    #[test]
    fn test_restart_builds_annotated_view() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let informer = PodsInformer::new(rx);
        set_up(&informer);

        informer.apply(WatchEvent::Restarted(vec![
            pod("a", "7712555c-ce62-454a-9e18-9ff0217b8941", "Burstable"),
            pod("b", "0badc0de-0000-4444-8888-121212121212", "Guaranteed"),
        ]));

        assert!(informer.has_synced());
        let pods = informer.get_all_pods();
        assert_eq!(pods.len(), 2);
        let a = pods.iter().find(|m| m.key() == "default/a").unwrap();
        assert_eq!(
            a.cgroup_dir,
            "kubepods-burstable.slice/kubepods-burstable-pod7712555c_ce62_454a_9e18_9ff0217b8941.slice/"
        );
        let b = pods.iter().find(|m| m.key() == "default/b").unwrap();
        assert_eq!(
            b.cgroup_dir,
            "kubepods-pod0badc0de_0000_4444_8888_121212121212.slice/"
        );
    }

    #[test]
    fn test_applied_and_deleted_update_view() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let informer = PodsInformer::new(rx);
        set_up(&informer);

        informer.apply(WatchEvent::Restarted(vec![]));
        informer.apply(WatchEvent::Applied(pod("a", "uid-a", "BestEffort")));
        assert_eq!(informer.get_all_pods().len(), 1);

        informer.apply(WatchEvent::Deleted(pod("a", "uid-a", "BestEffort")));
        assert!(informer.get_all_pods().is_empty());
        // Sync is monotonic; a shrinking view does not revert it.
        assert!(informer.has_synced());
    }

    #[test]
    fn test_applied_before_restart_does_not_sync() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let informer = PodsInformer::new(rx);
        set_up(&informer);

        informer.apply(WatchEvent::Applied(pod("a", "uid-a", "Burstable")));
        assert!(!informer.has_synced());
        assert_eq!(informer.get_all_pods().len(), 1);
    }

    #[test]
    fn test_without_setup_cgroup_dir_is_empty() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let informer = PodsInformer::new(rx);
        informer.apply(WatchEvent::Restarted(vec![pod("a", "uid-a", "Burstable")]));
        assert_eq!(informer.get_all_pods()[0].cgroup_dir, "");
    }
}
