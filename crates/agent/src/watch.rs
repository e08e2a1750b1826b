//! Kubernetes list-watch wiring
//!
//! Translates kube watcher streams into the typed change events the
//! informer plugins consume. Watch errors are logged and the underlying
//! watcher re-establishes itself; they never propagate as fatal.

use burst_agent_lib::statesinformer::WatchEvent;
use futures::{pin_mut, Stream, TryStreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Node, Pod};
use kube::api::Api;
use kube::runtime::watcher;
use kube::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::AgentConfig;

/// Receiving ends of the informer event streams.
pub struct WatchChannels {
    pub node: mpsc::UnboundedReceiver<WatchEvent<Node>>,
    pub configmap: mpsc::UnboundedReceiver<WatchEvent<ConfigMap>>,
    pub pods: mpsc::UnboundedReceiver<WatchEvent<Pod>>,
}

/// Spawn one watcher task per tracked object kind, scoped to this node.
pub fn spawn_watchers(
    client: Client,
    config: &AgentConfig,
    cancel: &CancellationToken,
) -> WatchChannels {
    let (node_tx, node_rx) = mpsc::unbounded_channel();
    let (cm_tx, cm_rx) = mpsc::unbounded_channel();
    let (pods_tx, pods_rx) = mpsc::unbounded_channel();

    let nodes: Api<Node> = Api::all(client.clone());
    let node_cfg =
        watcher::Config::default().fields(&format!("metadata.name={}", config.node_name));
    spawn_forwarder("node", watcher(nodes, node_cfg), node_tx, cancel.clone());

    let pods: Api<Pod> = Api::all(client.clone());
    let pod_cfg =
        watcher::Config::default().fields(&format!("spec.nodeName={}", config.node_name));
    spawn_forwarder("pods", watcher(pods, pod_cfg), pods_tx, cancel.clone());

    let cms: Api<ConfigMap> = Api::namespaced(client, &config.cfs_configmap_namespace);
    let cm_cfg =
        watcher::Config::default().fields(&format!("metadata.name={}", config.cfs_configmap_name));
    spawn_forwarder("configmap", watcher(cms, cm_cfg), cm_tx, cancel.clone());

    WatchChannels {
        node: node_rx,
        configmap: cm_rx,
        pods: pods_rx,
    }
}

fn spawn_forwarder<K, S>(
    name: &'static str,
    stream: S,
    tx: mpsc::UnboundedSender<WatchEvent<K>>,
    cancel: CancellationToken,
) where
    K: Send + 'static,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        pin_mut!(stream);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(watch = name, "watch forwarder stopping");
                    return;
                }
                item = stream.try_next() => match item {
                    Ok(Some(event)) => {
                        if tx.send(translate(event)).is_err() {
                            debug!(watch = name, "informer dropped its event stream");
                            return;
                        }
                    }
                    Ok(None) => {
                        warn!(watch = name, "watch stream ended");
                        return;
                    }
                    Err(err) => {
                        warn!(watch = name, error = %err, "watch error, stream will re-establish");
                    }
                }
            }
        }
    });
}

fn translate<K>(event: watcher::Event<K>) -> WatchEvent<K> {
    match event {
        watcher::Event::Applied(obj) => WatchEvent::Applied(obj),
        watcher::Event::Deleted(obj) => WatchEvent::Deleted(obj),
        watcher::Event::Restarted(objs) => WatchEvent::Restarted(objs),
    }
}
