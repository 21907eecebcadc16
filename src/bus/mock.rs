//! In-memory `Bus` for tests: delivers published messages synchronously and
//! answers calls from a scripted queue.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{Bus, Handler};

#[derive(Default)]
pub struct MockBus {
    handlers: Mutex<HashMap<String, Handler>>,
    replies: Mutex<VecDeque<Result<Value>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next `call`.
    pub fn reply(&self, reply: Result<Value>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Delivers `payload` to the handler subscribed on `topic`, if any.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> bool {
        let handler = self.handlers.lock().unwrap().get(topic).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.lock().unwrap().keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl Bus for MockBus {
    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<()> {
        self.handlers
            .lock()
            .unwrap()
            .insert(topic.to_string(), handler);
        Ok(())
    }

    async fn call(&self, service: &str, request: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((service.to_string(), request));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted reply for {}", service)))
    }
}
