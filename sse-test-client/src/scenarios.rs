use crate::api_client::ApiClient;
use crate::sse_client::Connection;
use anyhow::Result;
use colored::*;
use serde_json::json;
use std::time::Duration;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(750);

pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

impl TestResult {
    fn passed(name: &str, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            details,
        }
    }

    fn failed(name: &str, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            details,
        }
    }
}

/// The stream opened and announced a usable session identity.
pub async fn test_connection(connection: &Connection) -> Result<TestResult> {
    println!("{} Running connection test...", "→".blue());

    if connection.session_id.is_empty() {
        return Ok(TestResult::failed(
            "connection",
            "Stream opened without a session identity comment".to_string(),
        ));
    }

    Ok(TestResult::passed(
        "connection",
        format!("Session identity: {}", connection.session_id),
    ))
}

/// Untyped events are delivered regardless of subscription state.
pub async fn test_untyped_event(
    api: &ApiClient,
    connection: &mut Connection,
) -> Result<TestResult> {
    println!("{} Running untyped event test...", "→".blue());

    let payload = json!({ "message": "hello" });
    api.send_event(&connection.session_id, payload.clone(), None, None)
        .await?;

    // Untyped records carry the protocol default type
    let (_, data) = connection.wait_for_event("message", EVENT_TIMEOUT).await?;

    if data == payload {
        Ok(TestResult::passed(
            "untyped-event",
            "Payload round-tripped through the stream".to_string(),
        ))
    } else {
        Ok(TestResult::failed(
            "untyped-event",
            format!("Payload mismatch: {}", data),
        ))
    }
}

/// Typed events reach the stream only while subscribed to their type.
pub async fn test_subscription_filtering(
    api: &ApiClient,
    connection: &mut Connection,
) -> Result<TestResult> {
    println!("{} Running subscription filtering test...", "→".blue());

    let session_id = connection.session_id.clone();
    let payload = json!({ "status": "busy" });

    // Not subscribed yet: the typed event must be dropped
    api.send_event(&session_id, payload.clone(), Some("status"), None)
        .await?;
    if let Err(e) = connection.expect_silence(SILENCE_WINDOW).await {
        return Ok(TestResult::failed("subscription-filtering", e.to_string()));
    }

    // Subscribed: the typed event must arrive with its type
    api.subscribe(&session_id, "status").await?;
    api.send_event(&session_id, payload.clone(), Some("status"), None)
        .await?;
    let (event_type, data) = connection.wait_for_event("status", EVENT_TIMEOUT).await?;
    if event_type != "status" || data != payload {
        return Ok(TestResult::failed(
            "subscription-filtering",
            format!("Unexpected delivery: {} {}", event_type, data),
        ));
    }

    // Unsubscribed again: back to dropping
    api.unsubscribe(&session_id, "status").await?;
    api.send_event(&session_id, payload, Some("status"), None)
        .await?;
    if let Err(e) = connection.expect_silence(SILENCE_WINDOW).await {
        return Ok(TestResult::failed("subscription-filtering", e.to_string()));
    }

    Ok(TestResult::passed(
        "subscription-filtering",
        "Typed events delivered only while subscribed".to_string(),
    ))
}

/// An event sent with an event_id is acknowledged at send time.
pub async fn test_acknowledgement(
    api: &ApiClient,
    connection: &mut Connection,
) -> Result<TestResult> {
    println!("{} Running acknowledgement test...", "→".blue());

    let session_id = connection.session_id.clone();

    // An id the server never saw is not acknowledged
    if api.acknowledge(&session_id, "never-sent").await? {
        return Ok(TestResult::failed(
            "acknowledgement",
            "Unknown event id reported as acknowledged".to_string(),
        ));
    }

    api.send_event(&session_id, json!({ "n": 1 }), None, Some("e1"))
        .await?;
    connection.wait_for_event("message", EVENT_TIMEOUT).await?;

    if api.acknowledge(&session_id, "e1").await? {
        Ok(TestResult::passed(
            "acknowledgement",
            "Sent event id reported as acknowledged".to_string(),
        ))
    } else {
        Ok(TestResult::failed(
            "acknowledgement",
            "Sent event id missing from the acknowledgement table".to_string(),
        ))
    }
}
