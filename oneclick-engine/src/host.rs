//! Registration with the form lifecycle host

use async_trait::async_trait;
use oneclick_core::{FormEvent, FormEventArgs};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Receiver of form lifecycle notifications
#[async_trait]
pub trait FormEventListener: Send + Sync {
    async fn on_form_event(&self, event: FormEvent, args: FormEventArgs);
}

/// Registry of lifecycle listeners keyed by contribution id
#[derive(Default)]
pub struct EventHost {
    listeners: RwLock<HashMap<String, Arc<dyn FormEventListener>>>,
}

impl EventHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, replacing any listener under the same id
    pub fn register(&self, contribution_id: &str, listener: Arc<dyn FormEventListener>) {
        tracing::debug!(contribution_id, "Registering form listener");
        self.listeners
            .write()
            .insert(contribution_id.to_string(), listener);
    }

    pub fn unregister(&self, contribution_id: &str) {
        tracing::debug!(contribution_id, "Unregistering form listener");
        self.listeners.write().remove(contribution_id);
    }

    pub fn is_registered(&self, contribution_id: &str) -> bool {
        self.listeners.read().contains_key(contribution_id)
    }

    /// Deliver an event to every registered listener, one at a time
    pub async fn notify(&self, event: FormEvent, args: FormEventArgs) {
        let listeners: Vec<Arc<dyn FormEventListener>> =
            self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener.on_form_event(event, args.clone()).await;
        }
    }
}

/// Unregisters its listener when dropped
pub struct HostRegistration {
    host: Weak<EventHost>,
    contribution_id: String,
}

impl HostRegistration {
    pub fn new(host: &Arc<EventHost>, contribution_id: &str) -> Self {
        Self {
            host: Arc::downgrade(host),
            contribution_id: contribution_id.to_string(),
        }
    }

    pub fn contribution_id(&self) -> &str {
        &self.contribution_id
    }
}

impl Drop for HostRegistration {
    fn drop(&mut self) {
        if let Some(host) = self.host.upgrade() {
            host.unregister(&self.contribution_id);
        }
    }
}
