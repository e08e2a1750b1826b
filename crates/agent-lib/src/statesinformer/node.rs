//! Node informer plugin

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{InformerPlugin, InformerPlugins, PluginOption, WatchEvent};

/// Tracks the Node object this agent runs on.
pub struct NodeInformer {
    node: RwLock<Option<Node>>,
    synced: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedReceiver<WatchEvent<Node>>>>,
}

impl NodeInformer {
    pub fn new(events: mpsc::UnboundedReceiver<WatchEvent<Node>>) -> Self {
        Self {
            node: RwLock::new(None),
            synced: AtomicBool::new(false),
            events: Mutex::new(Some(events)),
        }
    }

    pub fn get_node(&self) -> Option<Node> {
        self.node
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn apply(&self, event: WatchEvent<Node>) {
        let mut view = self.node.write().unwrap_or_else(|e| e.into_inner());
        match event {
            WatchEvent::Applied(node) => {
                *view = Some(node);
                self.synced.store(true, Ordering::SeqCst);
            }
            WatchEvent::Deleted(_) => {
                warn!("node object deleted from the cluster view");
                *view = None;
            }
            WatchEvent::Restarted(mut nodes) => {
                *view = nodes.pop();
                self.synced.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl InformerPlugin for NodeInformer {
    fn setup(&self, _opt: &PluginOption, _plugins: &InformerPlugins) {}

    async fn start(&self, cancel: CancellationToken) {
        let receiver = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut events) = receiver else {
            warn!("node informer started without an event stream");
            return;
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("node informer stopping");
                    return;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.apply(event),
                        None => {
                            warn!("node watch stream closed");
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
