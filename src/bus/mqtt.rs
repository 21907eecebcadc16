use anyhow::{anyhow, bail, Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Bus, Handler};
use crate::config::BrokerConfig;

const REQUEST_SUFFIX: &str = "/request";
const RESPONSE_SUFFIX: &str = "/response";

type Routes = Arc<RwLock<HashMap<String, Handler>>>;
type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Value>>>>;
type ResponseTopics = Arc<Mutex<HashSet<String>>>;

#[derive(Debug, Serialize)]
struct RequestEnvelope<'a> {
    id: Uuid,
    request: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    id: Uuid,
    response: Value,
}

/// `Bus` over an MQTT broker.
///
/// Topics map 1:1 to MQTT topics. A service call publishes
/// `{"id", "request"}` on `<service>/request` and waits for the
/// `{"id", "response"}` carrying the same id on `<service>/response`.
pub struct MqttBus {
    client: AsyncClient,
    routes: Routes,
    pending: Pending,
    response_topics: ResponseTopics,
    call_timeout: Option<Duration>,
    event_loop: JoinHandle<()>,
}

impl MqttBus {
    /// Connects and waits for the broker's CONNACK.
    pub async fn connect(broker: &BrokerConfig, call_timeout: Option<Duration>) -> Result<Self> {
        let client_id = session_id(&broker.client_id);
        info!(
            "Connecting to MQTT broker at {}:{} as {}",
            broker.host, broker.port, client_id
        );
        let mut mqtt_options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        mqtt_options
            .set_keep_alive(Duration::from_secs(broker.keep_alive_secs))
            .set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(mqtt_options, 32);
        let routes: Routes = Arc::new(RwLock::new(HashMap::new()));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let response_topics: ResponseTopics = Arc::new(Mutex::new(HashSet::new()));
        let (connected_tx, mut connected_rx) = watch::channel(false);

        let event_loop = tokio::spawn(Self::event_loop(
            eventloop,
            client.clone(),
            routes.clone(),
            pending.clone(),
            response_topics.clone(),
            connected_tx,
        ));

        let wait_connected = async {
            while !*connected_rx.borrow_and_update() {
                connected_rx.changed().await?;
            }
            Ok::<(), anyhow::Error>(())
        };

        let limit = Duration::from_secs(broker.connect_timeout_secs);
        match timeout(limit, wait_connected).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                event_loop.abort();
                return Err(e).context("MQTT event loop stopped before connecting");
            }
            Err(_) => {
                event_loop.abort();
                bail!(
                    "Failed to connect to broker at {}:{} within {:?}",
                    broker.host,
                    broker.port,
                    limit
                );
            }
        }

        info!("Connected to MQTT broker");
        Ok(Self {
            client,
            routes,
            pending,
            response_topics,
            call_timeout,
            event_loop,
        })
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self
            .client
            .disconnect()
            .await
            .context("Failed to disconnect from broker")
        {
            error!("{:#}", e);
        }
        self.event_loop.abort();
    }

    async fn event_loop(
        mut eventloop: EventLoop,
        client: AsyncClient,
        routes: Routes,
        pending: Pending,
        response_topics: ResponseTopics,
        connected: watch::Sender<bool>,
    ) {
        info!("Starting broker connection event loop");
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!("Connected to broker: {:?}", ack);
                    if !ack.session_present {
                        restore_subscriptions(&client, &routes, &response_topics);
                    }
                    connected.send_replace(true);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("Subscription confirmed: {:?}", ack);
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    route_message(&routes, &pending, &p.topic, &p.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Broker connection error: {:?}", e);
                    connected.send_replace(false);
                    fail_pending(&pending);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn ensure_response_route(&self, topic: &str) -> Result<()> {
        let known = self
            .response_topics
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?
            .contains(topic);
        if !known {
            self.client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .with_context(|| format!("Failed to subscribe to {}", topic))?;
            debug!("Listening for responses on {}", topic);
            self.response_topics
                .lock()
                .map_err(|e| anyhow!("Lock error: {}", e))?
                .insert(topic.to_string());
        }
        Ok(())
    }

    fn forget(&self, id: &Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(id);
        }
    }
}

impl Bus for MqttBus {
    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<()> {
        self.routes
            .write()
            .map_err(|e| anyhow!("Lock error: {}", e))?
            .insert(topic.to_string(), handler);
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .with_context(|| format!("Failed to subscribe to {}", topic))?;
        info!("Subscribed to {}", topic);
        Ok(())
    }

    async fn call(&self, service: &str, request: Value) -> Result<Value> {
        self.ensure_response_route(&format!("{}{}", service, RESPONSE_SUFFIX))
            .await?;

        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?
            .insert(id, tx);

        let payload = serde_json::to_vec(&RequestEnvelope {
            id,
            request: &request,
        })?;
        debug!("Calling {} id={} request={}", service, id, request);

        if let Err(e) = self
            .client
            .publish(
                format!("{}{}", service, REQUEST_SUFFIX),
                QoS::AtLeastOnce,
                false,
                payload,
            )
            .await
        {
            self.forget(&id);
            return Err(e).with_context(|| format!("Failed to send request to {}", service));
        }

        let response = match self.call_timeout {
            Some(limit) => match timeout(limit, rx).await {
                Ok(response) => response,
                Err(_) => {
                    self.forget(&id);
                    bail!("No response from {} within {:?}", service, limit);
                }
            },
            None => rx.await,
        };
        response.map_err(|_| anyhow!("Connection lost while waiting for {}", service))
    }
}

/// Client id for one connection. The broker drops an older session that
/// shares an id, so every dashboard instance gets its own suffix.
fn session_id(base: &str) -> String {
    format!("{}_{}", base, Uuid::new_v4())
}

/// Every topic this client listens on, sorted.
fn session_topics(routes: &Routes, response_topics: &ResponseTopics) -> Vec<String> {
    let mut topics: Vec<String> = routes
        .read()
        .map(|routes| routes.keys().cloned().collect())
        .unwrap_or_default();
    if let Ok(responses) = response_topics.lock() {
        topics.extend(responses.iter().cloned());
    }
    topics.sort();
    topics
}

/// A clean session starts with no subscriptions on the broker side, so a
/// reconnect has to ask for all of them again.
fn restore_subscriptions(
    client: &AsyncClient,
    routes: &Routes,
    response_topics: &ResponseTopics,
) {
    let topics = session_topics(routes, response_topics);
    if topics.is_empty() {
        return;
    }
    info!("Restoring {} subscription(s) after reconnect", topics.len());
    for topic in topics {
        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            error!("Failed to resubscribe to {}: {:?}", topic, e);
        }
    }
}

/// Hands a message to its topic handler, or resolves the pending call its
/// response envelope belongs to.
fn route_message(routes: &Routes, pending: &Pending, topic: &str, payload: &[u8]) {
    let handler = routes
        .read()
        .ok()
        .and_then(|routes| routes.get(topic).cloned());
    if let Some(handler) = handler {
        handler(payload);
        return;
    }

    if !topic.ends_with(RESPONSE_SUFFIX) {
        debug!("No handler for message on {}", topic);
        return;
    }

    let envelope: ResponseEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed response on {}: {}", topic, e);
            return;
        }
    };
    let waiter = pending
        .lock()
        .ok()
        .and_then(|mut pending| pending.remove(&envelope.id));
    match waiter {
        Some(tx) => {
            let _ = tx.send(envelope.response);
        }
        None => debug!("Dropping response {} on {}: no pending call", envelope.id, topic),
    }
}

/// Dropping the senders wakes every waiting caller with an error.
fn fail_pending(pending: &Pending) {
    if let Ok(mut pending) = pending.lock() {
        if !pending.is_empty() {
            warn!("Failing {} pending call(s) after connection error", pending.len());
        }
        pending.clear();
    }
}

#[cfg(test)]
mod tests;
