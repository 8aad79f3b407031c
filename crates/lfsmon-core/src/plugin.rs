//! Relay of storage plugin messages between the server and host agents.
//!
//! Agents piggyback plugin traffic on their scan updates: responses travel
//! agent → server, queued requests travel server → agent. This module only
//! moves payloads; it never looks inside them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Responses kept per (plugin, host) until a consumer drains them.
pub const MAX_QUEUED_RESPONSES: usize = 256;

/// A response an agent returned for an earlier plugin request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Id the server assigned to the original request.
    pub request_id: String,
    /// Opaque plugin body.
    pub payload: Value,
}

/// Outbound and inbound plugin message queues keyed by (plugin, host).
pub trait PluginTransport: Send + Sync {
    /// Hands a response from `fqdn` to whoever is waiting on `plugin`.
    fn send_response(&self, plugin: &str, fqdn: &str, request_id: &str, payload: Value);

    /// Drains every request queued for `plugin` on `fqdn`.
    fn receive_all(&self, plugin: &str, fqdn: &str) -> Vec<Value>;
}

type QueueKey = (String, String);

fn key(plugin: &str, fqdn: &str) -> QueueKey {
    (plugin.to_string(), fqdn.to_string())
}

/// In-process queues backing [`PluginTransport`].
#[derive(Debug, Default)]
pub struct PluginQueues {
    requests: Mutex<HashMap<QueueKey, VecDeque<Value>>>,
    responses: Mutex<HashMap<QueueKey, VecDeque<PluginResponse>>>,
}

impl PluginQueues {
    /// Empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a request for delivery on the host's next scan update.
    pub fn enqueue_request(&self, plugin: &str, fqdn: &str, payload: Value) {
        self.requests
            .lock()
            .entry(key(plugin, fqdn))
            .or_default()
            .push_back(payload);
    }

    /// Drains responses relayed from agents for `plugin` on `fqdn`.
    pub fn take_responses(&self, plugin: &str, fqdn: &str) -> Vec<PluginResponse> {
        self.responses
            .lock()
            .remove(&key(plugin, fqdn))
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Requests still waiting for `fqdn` to check in.
    pub fn pending_requests(&self, plugin: &str, fqdn: &str) -> usize {
        self.requests
            .lock()
            .get(&key(plugin, fqdn))
            .map_or(0, VecDeque::len)
    }
}

impl PluginTransport for PluginQueues {
    fn send_response(&self, plugin: &str, fqdn: &str, request_id: &str, payload: Value) {
        let mut responses = self.responses.lock();
        let queue = responses.entry(key(plugin, fqdn)).or_default();
        if queue.len() >= MAX_QUEUED_RESPONSES {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    "Dropping unclaimed {} response {} from {}",
                    plugin, dropped.request_id, fqdn
                );
            }
        }
        queue.push_back(PluginResponse {
            request_id: request_id.to_string(),
            payload,
        });
    }

    fn receive_all(&self, plugin: &str, fqdn: &str) -> Vec<Value> {
        self.requests
            .lock()
            .remove(&key(plugin, fqdn))
            .map(Vec::from)
            .unwrap_or_default()
    }
}
