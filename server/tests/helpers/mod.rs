//! Reusable helpers for end-to-end pipeline tests.
//!
//! [`TestApp`] wires the full stack the way `main` does, against a fake
//! protocol sidecar and throwaway webhook receivers bound to `127.0.0.1:0`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use hookline_server::api::{create_router, AppState};
use hookline_server::config::Config;
use hookline_server::payload::{LinkPreviewFetcher, MediaResolver, PayloadBuilder};
use hookline_server::pipeline::Pipeline;
use hookline_server::polls::PollStore;
use hookline_server::protocol::HttpBridge;
use hookline_server::receipts::ReceiptGate;
use hookline_server::router::EventRouter;
use hookline_server::webhooks::WebhookDispatcher;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// One delivery captured by a [`Receiver`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub headers: HeaderMap,
    pub raw: Vec<u8>,
    pub body: Value,
}

/// Webhook destination that records every request.
#[derive(Clone, Default)]
pub struct Receiver {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl Receiver {
    /// Start a receiver; `/hook` accepts, `/broken` answers 503.
    pub async fn spawn() -> (String, Self) {
        let receiver = Self::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(r): State<Receiver>, headers: HeaderMap, raw: Bytes| async move {
                        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);
                        r.deliveries.lock().unwrap().push(Delivery {
                            headers,
                            raw: raw.to_vec(),
                            body,
                        });
                        StatusCode::OK
                    },
                ),
            )
            .route("/broken", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .with_state(receiver.clone());
        (serve(app).await, receiver)
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

/// Fake protocol sidecar that maps alias identifiers to phone numbers.
///
/// Every other lookup answers 404, and library vote decryption is
/// unavailable, so votes go through the local fallback.
pub async fn spawn_sidecar(lids: &[(&str, &str)]) -> String {
    let lids: Arc<HashMap<String, String>> = Arc::new(
        lids.iter()
            .map(|(lid, pn)| ((*lid).to_string(), (*pn).to_string()))
            .collect(),
    );
    let app = Router::new()
        .route(
            "/lids/{lid}/pn",
            get(
                |State(lids): State<Arc<HashMap<String, String>>>, Path(lid): Path<String>| async move {
                    match lids.get(&lid) {
                        Some(pn) => (StatusCode::OK, Json(json!({ "jid": pn }))),
                        None => (StatusCode::NOT_FOUND, Json(Value::Null)),
                    }
                },
            ),
        )
        .route(
            "/polls/decrypt",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "no session for poll") }),
        )
        .with_state(lids);
    serve(app).await
}

/// Full application over a fake sidecar.
pub struct TestApp {
    pub router: Router,
    pub pipeline: Pipeline,
    pub polls: Arc<PollStore>,
    pub config: Config,
    _storage: TempDir,
}

impl TestApp {
    pub async fn new(sidecar_url: &str, webhook_urls: Vec<String>, secret: Option<&str>) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let config = Config {
            device_id: "device-e2e".into(),
            webhook_urls,
            webhook_secret: secret.map(str::to_string),
            webhook_timeout: Duration::from_secs(2),
            storage_path: storage.path().join("storages"),
            media_path: storage.path().join("media"),
            protocol_api_url: Some(sidecar_url.to_string()),
            ..Config::default_for_test()
        };

        let polls = Arc::new(PollStore::open(config.poll_store_path()).await);
        let bridge = Arc::new(HttpBridge::new(sidecar_url).unwrap());
        let media = MediaResolver::new(bridge.clone(), config.auto_download_media, config.media_path.clone());
        let previews = Some(LinkPreviewFetcher::new(config.link_preview_timeout));
        let builder = PayloadBuilder::new(bridge.clone(), bridge, polls.clone(), media, previews);
        let router = EventRouter::new(
            builder,
            Arc::new(ReceiptGate::new(config.read_receipt_cooldown)),
            config.device_id.clone(),
        );
        let dispatcher = WebhookDispatcher::new(
            config.webhook_urls.clone(),
            config.webhook_secret.clone(),
            config.webhook_timeout,
        )
        .unwrap();
        let pipeline = Pipeline::new(router, dispatcher);

        Self {
            router: create_router(AppState::new(pipeline.clone(), polls.clone())),
            pipeline,
            polls,
            config,
            _storage: storage,
        }
    }

    /// Send a JSON request through the full router.
    pub async fn send(&self, method: Method, uri: &str, body: &Value) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    /// Post a raw event to the ingest endpoint.
    pub async fn post_event(&self, event: &Value) -> StatusCode {
        self.send(Method::POST, "/events", event).await
    }

    /// Wait for every accepted event to be delivered.
    pub async fn drain(&self) {
        self.pipeline.shutdown().await;
    }
}
