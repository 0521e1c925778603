//! Integration tests for the `/serial/*` endpoints and the device read path.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, eventually, TestApp, DEVICE_PORT};
use integrisense_device::ConnectionStatus;
use integrisense_events::{LiveEvent, Outbound, Subscription};
use serde_json::json;

async fn next_event(sub: &mut Subscription, name: &str) -> LiveEvent {
    let wait = async {
        loop {
            match sub.receiver.recv().await {
                Some(Outbound::Event(text)) => {
                    let event: LiveEvent = serde_json::from_str(&text).unwrap();
                    if event.event == name {
                        return event;
                    }
                }
                Some(_) => {}
                None => panic!("subscription closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .unwrap_or_else(|_| panic!("no {name} event"))
}

// ---------------------------------------------------------------------------
// Test: status reports state, ports and platform
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_connection_and_ports() {
    let app = TestApp::start_with_device().await;
    let device = app.services.state.device.clone();
    assert!(eventually(|| device.state().status == ConnectionStatus::Listening).await);

    let response = app.get("/serial/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "listening");
    assert_eq!(json["connected"], true);
    assert_eq!(json["port"], DEVICE_PORT);
    assert_eq!(json["reconnect_attempts"], 0);
    assert_eq!(json["baud_rate"], 115200);
    assert_eq!(json["available_ports"][0]["name"], DEVICE_PORT);
    assert_eq!(json["platform"], std::env::consts::OS);

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a missing device ends in Failed after the configured attempts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nonexistent_port_reports_failed_after_max_attempts() {
    let app = TestApp::start().await;
    let device = app.services.state.device.clone();

    assert!(eventually(|| device.state().status == ConnectionStatus::Failed).await);

    let json = body_json(app.get("/serial/status").await).await;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["reconnect_attempts"], 3);
    assert!(json["last_error"].is_string());

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: device lines are classified and streamed to subscribers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn device_lines_reach_live_subscribers() {
    let app = TestApp::start_with_device().await;
    let device = app.services.state.device.clone();
    assert!(eventually(|| device.state().status == ConnectionStatus::Listening).await);

    let mut sub = app.services.state.hub.subscribe().await;
    let link = app.link.clone().unwrap();

    link.push_line("not,a,reading");
    link.push_line("1.0,34.0,2.0,0.0,0.0,0.0");

    let event = next_event(&mut sub, "stream").await;
    assert_eq!(event.data["prediction"], "Calm");
    assert_eq!(event.data["source"], "device");
    assert_eq!(event.data["eda"], 2.0);

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: device transitions are relayed as serial_status / esp32_status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn device_transitions_are_relayed() {
    let app = TestApp::start_with_device().await;
    let device = app.services.state.device.clone();
    assert!(eventually(|| device.state().status == ConnectionStatus::Listening).await);

    let mut sub = app.services.state.hub.subscribe().await;
    app.link.as_ref().unwrap().break_link();

    let presence = next_event(&mut sub, "esp32_status").await;
    assert_eq!(presence.data["connected"], false);
    assert_eq!(presence.data["port"], DEVICE_PORT);

    let state = next_event(&mut sub, "serial_status").await;
    assert!(state.data["status"].is_string());

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: send forwards a command line, or reports why it cannot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_writes_command_to_device() {
    let app = TestApp::start_with_device().await;
    let device = app.services.state.device.clone();
    assert!(eventually(|| device.is_connected()).await);

    let response = app
        .post_json("/serial/send", json!({ "message": "LED ON" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["command"], "LED ON");
    assert_eq!(app.link.as_ref().unwrap().written(), "LED ON\n");

    app.shutdown().await;
}

#[tokio::test]
async fn send_without_message_is_400() {
    let app = TestApp::start_with_device().await;

    let response = app.post_json("/serial/send", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Message is required");

    app.shutdown().await;
}

#[tokio::test]
async fn send_without_device_is_500() {
    let app = TestApp::start().await;

    let response = app
        .post_json("/serial/send", json!({ "message": "LED ON" }))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"], "An internal error occurred");

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: configure validates, applies and restarts when needed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn configure_rejects_invalid_values() {
    let app = TestApp::start().await;

    let response = app
        .post_json("/serial/configure", json!({ "rate": 0 }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    app.shutdown().await;
}

#[tokio::test]
async fn configure_to_new_port_restarts_and_connects() {
    let app = TestApp::start().await;
    let device = app.services.state.device.clone();
    assert!(eventually(|| device.state().status == ConnectionStatus::Failed).await);

    app.factory.add_port("/dev/ttyMOCK1", "CH340 serial");
    let response = app
        .post_json("/serial/configure", json!({ "port": "/dev/ttyMOCK1", "auto_detect": false }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["restarted"], true);
    assert_eq!(json["status"]["port"], "/dev/ttyMOCK1");
    assert!(eventually(|| device.is_connected()).await);

    app.shutdown().await;
}

#[tokio::test]
async fn configure_timeout_only_does_not_restart() {
    let app = TestApp::start_with_device().await;
    let device = app.services.state.device.clone();
    assert!(eventually(|| device.is_connected()).await);

    let response = app
        .post_json("/api/serial/configure", json!({ "timeout_ms": 250 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["restarted"], false);
    assert_eq!(json["status"]["timeout_ms"], 250);

    app.shutdown().await;
}
