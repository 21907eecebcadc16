pub mod mqtt;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub use mqtt::MqttBus;

/// Invoked with the raw payload of every message delivered on a topic.
pub type Handler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Pub/sub plus request/response middleware between the dashboard and the
/// flight controller bridge.
pub trait Bus: Send + Sync {
    /// Registers `handler` for every future message on `topic`.
    fn subscribe(&self, topic: &str, handler: Handler) -> impl Future<Output = Result<()>> + Send;

    /// Sends `request` to `service` and waits for its response.
    fn call(&self, service: &str, request: Value) -> impl Future<Output = Result<Value>> + Send;
}

/// Topic and service names, all under one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    pub state: String,
    pub battery: String,
    pub set_mode: String,
    pub arming: String,
    pub takeoff: String,
    pub land: String,
}

impl Names {
    pub fn new(namespace: &str) -> Self {
        let ns = namespace.trim_end_matches('/');
        Self {
            state: format!("{}/mavros/state", ns),
            battery: format!("{}/mavros/battery", ns),
            set_mode: format!("{}/mavros/set_mode", ns),
            arming: format!("{}/mavros/cmd/arming", ns),
            takeoff: format!("{}/mavros/cmd/takeoff", ns),
            land: format!("{}/mavros/cmd/land", ns),
        }
    }
}

impl Default for Names {
    fn default() -> Self {
        Self::new("")
    }
}
