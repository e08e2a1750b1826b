//! State synchronization layer
//!
//! Maintains the agent's view of node, burst-config and pod state via
//! independent informer plugins, each fed by a typed change-event stream
//! from the external list-watch collaborator. The orchestrator must wait on
//! the synchronization barrier before any enforcement work starts; acting on
//! a stale world view silently targets the wrong containers.

mod configmap;
mod node;
mod pods;

pub use configmap::CmInformer;
pub use node::NodeInformer;
pub use pods::PodsInformer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cgroup::CgroupPathResolver;
use crate::models::PodMeta;

/// Typed change event delivered by the watch collaborator.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    /// Object created or updated.
    Applied(T),
    /// Object removed.
    Deleted(T),
    /// Full relist; replaces the entire cached view.
    Restarted(Vec<T>),
}

/// Shared informer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the node this agent governs.
    pub node_name: String,
}

/// Handles passed to every plugin at setup time.
pub struct PluginOption {
    pub config: Arc<Config>,
    pub cgroup_resolver: Arc<CgroupPathResolver>,
}

/// One sub-informer tracking a single Kubernetes object kind.
///
/// Lifecycle: `setup` once with the shared option and the full registry (so
/// plugins may cross-reference each other), then `start` as a standing task
/// for the process lifetime. `has_synced` is monotonic once true. Internal
/// errors such as a closed watch stream are the plugin's own concern and
/// never fatal to the orchestrator.
#[async_trait]
pub trait InformerPlugin: Send + Sync {
    fn setup(&self, opt: &PluginOption, plugins: &InformerPlugins);
    async fn start(&self, cancel: CancellationToken);
    fn has_synced(&self) -> bool;
}

/// The fixed informer registry, one named field per plugin.
///
/// Keeping concrete types here gives compile-time-checked accessors; there
/// is no homogeneous plugin map to downcast out of.
pub struct InformerPlugins {
    pub node: Arc<NodeInformer>,
    pub configmap: Arc<CmInformer>,
    pub pods: Arc<PodsInformer>,
}

impl InformerPlugins {
    fn entries(&self) -> Vec<(&'static str, Arc<dyn InformerPlugin>)> {
        vec![
            ("node", self.node.clone() as Arc<dyn InformerPlugin>),
            ("configmap", self.configmap.clone() as Arc<dyn InformerPlugin>),
            ("pods", self.pods.clone() as Arc<dyn InformerPlugin>),
        ]
    }
}

/// Aggregate over the informer plugins plus typed accessors for their views.
pub struct StatesInformer {
    option: PluginOption,
    plugins: InformerPlugins,
    started: AtomicBool,
}

impl StatesInformer {
    pub fn new(
        config: Arc<Config>,
        cgroup_resolver: Arc<CgroupPathResolver>,
        plugins: InformerPlugins,
    ) -> Self {
        Self {
            option: PluginOption {
                config,
                cgroup_resolver,
            },
            plugins,
            started: AtomicBool::new(false),
        }
    }

    /// Set up and start every plugin, block on the synchronization barrier,
    /// then hold until cancellation.
    ///
    /// Failing to sync before the cancellation signal fires is the one
    /// startup-fatal condition in this layer; the agent must not enforce
    /// quotas against an unknown world state.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        for (name, plugin) in self.plugins.entries() {
            plugin.setup(&self.option, &self.plugins);
            debug!(plugin = name, "informer plugin set up");
        }

        for (name, plugin) in self.plugins.entries() {
            debug!(plugin = name, "starting informer plugin");
            let cancel = cancel.clone();
            tokio::spawn(async move { plugin.start(cancel).await });
        }

        debug!("waiting for informer caches to sync");
        if !wait_for_cache_sync(&cancel, || self.has_synced()).await {
            bail!("timed out waiting for states informer caches to sync");
        }

        info!("states informer started");
        self.started.store(true, Ordering::SeqCst);

        cancel.cancelled().await;
        info!("shutting down states informer");
        Ok(())
    }

    /// True iff every registered plugin reports synced.
    pub fn has_synced(&self) -> bool {
        self.plugins
            .entries()
            .iter()
            .all(|(_, plugin)| plugin.has_synced())
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Current view of this node's Node object.
    pub fn get_node(&self) -> Option<Node> {
        self.plugins.node.get_node()
    }

    /// Current view of the burst-config ConfigMap.
    pub fn get_cfs_cm(&self) -> Option<ConfigMap> {
        self.plugins.configmap.get_cm()
    }

    /// Snapshot of every tracked pod with its resolved cgroup dir.
    pub fn get_all_pods(&self) -> Vec<PodMeta> {
        self.plugins.pods.get_all_pods()
    }
}

/// Block until `synced` reports true, re-checking periodically, bounded by
/// the cancellation token. Returns false iff cancelled first.
pub async fn wait_for_cache_sync<F>(cancel: &CancellationToken, synced: F) -> bool
where
    F: Fn() -> bool,
{
    let mut ticker = interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return synced(),
            _ = ticker.tick() => {
                if synced() {
                    return true;
                }
            }
        }
    }
}

/// Test helper wiring: unbounded event channels for each informer.
#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use tokio::sync::mpsc;

    pub struct Senders {
        pub node: mpsc::UnboundedSender<WatchEvent<Node>>,
        pub configmap: mpsc::UnboundedSender<WatchEvent<ConfigMap>>,
        pub pods: mpsc::UnboundedSender<WatchEvent<Pod>>,
    }

    pub fn wired_plugins() -> (InformerPlugins, Senders) {
        let (node_tx, node_rx) = mpsc::unbounded_channel();
        let (cm_tx, cm_rx) = mpsc::unbounded_channel();
        let (pods_tx, pods_rx) = mpsc::unbounded_channel();
        let plugins = InformerPlugins {
            node: Arc::new(NodeInformer::new(node_rx)),
            configmap: Arc::new(CmInformer::new(cm_rx)),
            pods: Arc::new(PodsInformer::new(pods_rx)),
        };
        let senders = Senders {
            node: node_tx,
            configmap: cm_tx,
            pods: pods_tx,
        };
        (plugins, senders)
    }

    pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
