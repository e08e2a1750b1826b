//! Burst-config ConfigMap informer plugin

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{InformerPlugin, InformerPlugins, PluginOption, WatchEvent};

/// Tracks the ConfigMap carrying the CFS burst configuration.
///
/// An absent view after sync means "no burst config"; consumers fall back to
/// their defaults rather than treating it as an error.
pub struct CmInformer {
    cm: RwLock<Option<ConfigMap>>,
    synced: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedReceiver<WatchEvent<ConfigMap>>>>,
}

impl CmInformer {
    pub fn new(events: mpsc::UnboundedReceiver<WatchEvent<ConfigMap>>) -> Self {
        Self {
            cm: RwLock::new(None),
            synced: AtomicBool::new(false),
            events: Mutex::new(Some(events)),
        }
    }

    pub fn get_cm(&self) -> Option<ConfigMap> {
        self.cm.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn apply(&self, event: WatchEvent<ConfigMap>) {
        let mut view = self.cm.write().unwrap_or_else(|e| e.into_inner());
        match event {
            WatchEvent::Applied(cm) => {
                *view = Some(cm);
                self.synced.store(true, Ordering::SeqCst);
            }
            WatchEvent::Deleted(_) => {
                debug!("burst configmap deleted, clearing cached view");
                *view = None;
            }
            WatchEvent::Restarted(mut cms) => {
                *view = cms.pop();
                self.synced.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl InformerPlugin for CmInformer {
    fn setup(&self, _opt: &PluginOption, _plugins: &InformerPlugins) {}

    async fn start(&self, cancel: CancellationToken) {
        let receiver = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut events) = receiver else {
            warn!("configmap informer started without an event stream");
            return;
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("configmap informer stopping");
                    return;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.apply(event),
                        None => {
                            warn!("configmap watch stream closed");
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
