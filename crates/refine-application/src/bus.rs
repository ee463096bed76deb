//! Point-to-point message delivery between endpoints.
//!
//! Stands in for the host's cross-document messaging primitive. Every post
//! names one target endpoint and the origin that target must have; nothing is
//! broadcast, so other listeners on the page never see the message.

use refine_core::protocol::{EndpointId, Envelope, Message};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct Registration {
    origin: String,
    inbox: mpsc::UnboundedSender<Envelope>,
}

/// Shared registry of live endpoints.
#[derive(Clone, Default)]
pub struct MessageBus {
    endpoints: Arc<Mutex<HashMap<EndpointId, Registration>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an endpoint living at `origin` and returns its inbox.
    pub fn register(
        &self,
        origin: impl Into<String>,
    ) -> (EndpointId, mpsc::UnboundedReceiver<Envelope>) {
        let id = EndpointId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.insert(
                id,
                Registration {
                    origin: origin.into(),
                    inbox: tx,
                },
            );
        }
        (id, rx)
    }

    /// Removes an endpoint. Its inbox closes once drained.
    pub fn unregister(&self, id: EndpointId) -> bool {
        self.endpoints
            .lock()
            .map(|mut endpoints| endpoints.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub fn is_registered(&self, id: EndpointId) -> bool {
        self.endpoints
            .lock()
            .map(|endpoints| endpoints.contains_key(&id))
            .unwrap_or(false)
    }

    /// Sends `message` from `from` to `to`.
    ///
    /// Returns `false` without delivering when either endpoint is gone or the
    /// target does not live at `target_origin`.
    pub fn post(
        &self,
        from: EndpointId,
        to: EndpointId,
        target_origin: &str,
        message: &Message,
    ) -> bool {
        match serde_json::to_value(message) {
            Ok(data) => self.post_value(from, to, target_origin, data),
            Err(err) => {
                tracing::error!("[Bus] Failed to encode {}: {}", message.kind(), err);
                false
            }
        }
    }

    /// Like [`post`](Self::post) with an already-encoded payload.
    pub fn post_value(
        &self,
        from: EndpointId,
        to: EndpointId,
        target_origin: &str,
        data: serde_json::Value,
    ) -> bool {
        let Ok(endpoints) = self.endpoints.lock() else {
            return false;
        };
        let Some(sender) = endpoints.get(&from) else {
            return false;
        };
        let Some(target) = endpoints.get(&to) else {
            return false;
        };
        if target.origin != target_origin {
            tracing::debug!("[Bus] Target origin mismatch, message dropped");
            return false;
        }

        let envelope = Envelope {
            source: from,
            origin: sender.origin.clone(),
            data,
        };
        target.inbox.send(envelope).is_ok()
    }
}
