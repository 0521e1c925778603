#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use integrisense_core::guard::GuardPolicy;
use integrisense_core::normalize::DelimitedLayout;
use integrisense_device::transport::mock::{MockLink, MockTransportFactory};
use integrisense_device::DeviceConfig;
use tempfile::TempDir;
use tower::ServiceExt;

use integrisense_api::config::ServerConfig;
use integrisense_api::router::build_app_router;
use integrisense_api::services::Services;

/// Port name the mock device is plugged in on.
pub const DEVICE_PORT: &str = "/dev/ttyMOCK0";

/// Build a test `ServerConfig` rooted in `dir`.
///
/// The device points at [`DEVICE_PORT`] with discovery off and millisecond
/// delays; retraining is off so no background cycle races the tests.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        device: DeviceConfig {
            port: DEVICE_PORT.to_string(),
            auto_detect: false,
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(5),
            poll_interval: Duration::from_millis(2),
            restart_delay: Duration::from_millis(1),
            ..DeviceConfig::default()
        },
        guard: GuardPolicy::default(),
        line_layout: DelimitedLayout::default(),
        model_path: dir.path().join("model.json"),
        retrain_interval_secs: 0,
        training_inbox_path: dir.path().join("inbox.jsonl"),
        record_store_path: Some(dir.path().join("records.jsonl")),
        subscriber_buffer: 64,
    }
}

/// A running application over the mock transport.
pub struct TestApp {
    pub services: Services,
    pub factory: Arc<MockTransportFactory>,
    /// Present when the device port was plugged in before startup.
    pub link: Option<MockLink>,
    pub dir: TempDir,
    config: ServerConfig,
}

impl TestApp {
    /// Start with no device attached.
    pub async fn start() -> Self {
        Self::start_with(false, |_| {}).await
    }

    /// Start with the mock device plugged in on [`DEVICE_PORT`].
    pub async fn start_with_device() -> Self {
        Self::start_with(true, |_| {}).await
    }

    pub async fn start_with(plug_device: bool, customize: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        customize(&mut config);

        let factory = Arc::new(MockTransportFactory::new());
        let link = plug_device.then(|| factory.add_port(DEVICE_PORT, "CP2102 USB to UART"));

        let services = Services::start(config.clone(), factory.clone()).await;

        Self {
            services,
            factory,
            link,
            dir,
            config,
        }
    }

    /// The full application router with all middleware layers.
    pub fn router(&self) -> Router {
        build_app_router(self.services.state.clone(), &self.config)
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.router(), uri).await
    }

    pub async fn post_json(&self, uri: &str, json: serde_json::Value) -> Response<Body> {
        post_json(self.router(), uri, json).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn shutdown(self) {
        self.services.shutdown().await;
    }
}

/// Send a GET request to the given URI.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    check()
}
