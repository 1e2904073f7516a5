//! HTTP Integration Tests
//!
//! These tests exercise the real web server end-to-end:
//! - JSON API -> route table and registry
//! - Error mapping to status codes
//! - WebSocket route activity and web client channels
//!
//! They do not depend on external services; the broker is replaced by a
//! recording transport and messages are injected through the dispatcher.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use spacebrew_bridge::{WebConfig, WebServer};
use spacebrew_router::{Dispatcher, Router};
use spacebrew_test_utils::{
    wait_for, wait_for_publishes, RecordingTransport, TempRoutes, DEFAULT_CHECK_INTERVAL,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

/// Test environment that manages the web server lifecycle
struct TestEnv {
    _routes: TempRoutes,
    router: Router,
    transport: Arc<RecordingTransport>,
    dispatcher: Dispatcher,
    base_url: String,
    ws_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    http: reqwest::Client,
}

impl TestEnv {
    async fn start() -> Self {
        Self::start_with("VirtualButton1/button,VirtualButton2/bgcolor\n").await
    }

    async fn start_with(contents: &str) -> Self {
        let routes = TempRoutes::with_contents(contents);
        let router = routes.router();
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = router.dispatcher(transport.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = WebServer::new(
            WebConfig {
                bind: addr.to_string(),
                cors: true,
            },
            router.control(transport.clone()),
            router.events().clone(),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            server
                .serve_on(listener, async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            _routes: routes,
            router,
            transport,
            dispatcher,
            base_url: format!("http://{}", addr),
            ws_url: format!("ws://{}", addr),
            shutdown_tx: Some(shutdown_tx),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn wait_for_observers(&self, n: usize) -> bool {
        let events = self.router.events().clone();
        wait_for(
            || {
                let events = events.clone();
                async move { events.receiver_count() >= n }
            },
            DEFAULT_CHECK_INTERVAL,
            Duration::from_secs(5),
        )
        .await
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_health() {
    let env = TestEnv::start().await;

    let resp = env.http.get(env.url("/api/health")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_status() {
    let env = TestEnv::start().await;

    let body: serde_json::Value = env
        .http
        .get(env.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["connected"], true);
    assert_eq!(body["broker"], "test-broker:1883");
}

#[tokio::test]
async fn test_routes_crud() {
    let env = TestEnv::start().await;

    let resp = env
        .http
        .post(env.url("/api/routes"))
        .json(&serde_json::json!({"pub": "sensors/temp", "sub": "display/text"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Route added: sensors/temp -> display/text");

    let routes: serde_json::Value = env
        .http
        .get(env.url("/api/routes"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        routes,
        serde_json::json!({
            "VirtualButton1/button": "VirtualButton2/bgcolor",
            "sensors/temp": "display/text"
        })
    );

    let resp = env
        .http
        .delete(env.url("/api/routes?pub=sensors/temp"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(env.router.routes().lookup("sensors/temp").is_none());
}

#[tokio::test]
async fn test_route_errors() {
    let env = TestEnv::start().await;

    let resp = env
        .http
        .delete(env.url("/api/routes?pub=ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("ghost"));

    let resp = env
        .http
        .post(env.url("/api/routes"))
        .json(&serde_json::json!({"pub": "VirtualButton1/button", "sub": "VirtualButton2/bgcolor"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = env
        .http
        .post(env.url("/api/routes"))
        .json(&serde_json::json!({"pub": "a,b", "sub": "c"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_publish() {
    let env = TestEnv::start().await;

    let resp = env
        .http
        .post(env.url("/api/publish"))
        .json(&serde_json::json!({"topic": "VirtualButton1/button", "message": "1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let sent = env.transport.published_to("VirtualButton1/button");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text(), "1");

    env.transport.set_connected(false);
    let resp = env
        .http
        .post(env.url("/api/publish"))
        .json(&serde_json::json!({"topic": "t", "message": "m"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn test_clients_and_save() {
    let env = TestEnv::start().await;
    env.dispatcher.dispatch(
        "YuxiSpace",
        Bytes::from_static(b"Lamp, desk lamp, pubs(), subs(on:boolean)"),
    );

    let clients: serde_json::Value = env
        .http
        .get(env.url("/api/clients"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(clients[0]["name"], "Lamp");
    assert_eq!(clients[0]["subscribers"][0]["type"], "boolean");

    let resp = env.http.post(env.url("/api/save")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_testclient_not_configured() {
    let env = TestEnv::start().await;

    let resp = env.http.post(env.url("/api/testclient")).send().await.unwrap();

    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn test_route_activity_websocket() {
    let env = TestEnv::start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("{}/ws", env.ws_url))
        .await
        .unwrap();
    assert!(env.wait_for_observers(1).await);

    env.dispatcher
        .dispatch("VirtualButton1/button", Bytes::from_static(b"true"));

    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"pub": "VirtualButton1/button", "sub": "VirtualButton2/bgcolor"})
    );
}

#[tokio::test]
async fn test_web_client_websocket() {
    let env = TestEnv::start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("{}/ws/client", env.ws_url))
        .await
        .unwrap();
    assert!(env.wait_for_observers(1).await);

    ws.send(Message::Text(
        r#"{"cmd":"subscribe","topic":"WebLamp/on"}"#.to_string(),
    ))
    .await
    .unwrap();
    ws.send(Message::Text(
        r#"{"cmd":"register","message":"WebLamp, browser, pubs(), subs(on:boolean)"}"#.to_string(),
    ))
    .await
    .unwrap();
    ws.send(Message::Text(
        r#"{"cmd":"publish","topic":"WebLamp/status","message":"ready"}"#.to_string(),
    ))
    .await
    .unwrap();

    // commands are handled in order, so the subscription is in place once
    // the publish has gone out
    assert!(wait_for_publishes(&env.transport, 2, Duration::from_secs(5)).await);
    assert_eq!(
        env.transport.published_to("YuxiSpace")[0].text(),
        "WebLamp, browser, pubs(), subs(on:boolean)"
    );

    env.dispatcher.dispatch("Other/topic", Bytes::from_static(b"ignored"));
    env.dispatcher.dispatch("WebLamp/on", Bytes::from_static(b"true"));

    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({"topic": "WebLamp/on", "message": "true"}));
}
