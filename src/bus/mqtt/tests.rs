use super::{
    fail_pending, route_message, session_id, session_topics, Pending, ResponseTopics, Routes,
};
use crate::bus::Handler;
use anyhow::Result;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::oneshot;
use uuid::Uuid;

fn empty() -> (Routes, Pending) {
    (
        Arc::new(RwLock::new(HashMap::new())),
        Arc::new(Mutex::new(HashMap::new())),
    )
}

#[test]
fn test_message_reaches_topic_handler() {
    let (routes, pending) = empty();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = seen.clone();
    let handler: Handler = Arc::new(move |payload: &[u8]| {
        sink.lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).to_string());
    });
    routes
        .write()
        .unwrap()
        .insert("/mavros/state".to_string(), handler);

    route_message(&routes, &pending, "/mavros/state", br#"{"mode":"HOLD"}"#);
    route_message(&routes, &pending, "/mavros/battery", b"{}");

    assert_eq!(*seen.lock().unwrap(), vec![r#"{"mode":"HOLD"}"#.to_string()]);
}

#[tokio::test]
async fn test_response_resolves_matching_call() -> Result<()> {
    let (routes, pending) = empty();
    let id = Uuid::new_v4();
    let (tx, rx) = oneshot::channel();
    pending.lock().unwrap().insert(id, tx);

    let payload = serde_json::to_vec(&json!({"id": id, "response": {"mode_sent": true}}))?;
    route_message(&routes, &pending, "/mavros/set_mode/response", &payload);

    assert_eq!(rx.await?, json!({"mode_sent": true}));
    assert!(pending.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_response_for_unknown_call_is_dropped() -> Result<()> {
    let (routes, pending) = empty();
    let id = Uuid::new_v4();
    let (tx, mut rx) = oneshot::channel();
    pending.lock().unwrap().insert(id, tx);

    let stray = serde_json::to_vec(&json!({"id": Uuid::new_v4(), "response": {"success": true}}))?;
    route_message(&routes, &pending, "/mavros/cmd/arming/response", &stray);
    route_message(&routes, &pending, "/mavros/cmd/arming/response", b"not json");

    assert!(rx.try_recv().is_err());
    assert_eq!(pending.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_connection_error_fails_waiting_calls() {
    let (_, pending) = empty();
    let (tx, rx) = oneshot::channel();
    pending.lock().unwrap().insert(Uuid::new_v4(), tx);

    fail_pending(&pending);

    assert!(rx.await.is_err());
}

#[test]
fn test_each_connection_gets_its_own_client_id() {
    let first = session_id("mav-tools");
    let second = session_id("mav-tools");

    assert_ne!(first, second);
    for id in [&first, &second] {
        let suffix = id.strip_prefix("mav-tools_").unwrap();
        assert!(Uuid::parse_str(suffix).is_ok(), "{}", id);
    }
}

#[test]
fn test_reconnect_covers_topics_and_response_routes() {
    let (routes, _) = empty();
    let response_topics: ResponseTopics = Arc::new(Mutex::new(HashSet::new()));
    assert!(session_topics(&routes, &response_topics).is_empty());

    let handler: Handler = Arc::new(|_: &[u8]| {});
    for topic in ["/uav1/mavros/state", "/uav1/mavros/battery"] {
        routes.write().unwrap().insert(topic.to_string(), handler.clone());
    }
    response_topics
        .lock()
        .unwrap()
        .insert("/uav1/mavros/cmd/land/response".to_string());

    assert_eq!(
        session_topics(&routes, &response_topics),
        vec![
            "/uav1/mavros/battery".to_string(),
            "/uav1/mavros/cmd/land/response".to_string(),
            "/uav1/mavros/state".to_string(),
        ]
    );
}
