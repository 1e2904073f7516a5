//! HTTP/WebSocket API for the Spacebrew router
//!
//! JSON endpoints mirror the interactive shell. Two WebSocket channels
//! carry live updates:
//! - `/ws` pushes `{"pub": .., "sub": ..}` whenever a route fires
//! - `/ws/client` lets a browser act as a client: it can register, publish
//!   and subscribe to topics, and receives `{"topic": .., "message": ..}`
//!   for every topic it subscribed to

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use spacebrew_router::{ControlSurface, EventBus, RouterError, RouterEvent};
use std::collections::HashSet;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{BridgeError, Result};

/// Web server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address, e.g. "0.0.0.0:8088"
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allow requests from any origin
    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8088".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors: true,
        }
    }
}

#[derive(Clone)]
struct AppState {
    control: ControlSurface,
    events: EventBus,
}

/// HTTP API server
pub struct WebServer {
    config: WebConfig,
    state: AppState,
}

impl WebServer {
    pub fn new(config: WebConfig, control: ControlSurface, events: EventBus) -> Self {
        Self {
            config,
            state: AppState { control, events },
        }
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/api/health", get(health_check))
            .route("/api/status", get(get_status))
            .route("/api/clients", get(list_clients))
            .route(
                "/api/routes",
                get(list_routes).post(add_route).delete(delete_route),
            )
            .route("/api/publish", post(publish))
            .route("/api/save", post(save_routes))
            .route("/api/testclient", post(spawn_test_client))
            .route("/ws", get(route_activity_ws))
            .route("/ws/client", get(web_client_ws))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        if self.config.cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: self.config.bind.clone(),
                source,
            })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Web interface listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Web interface stopped");
        Ok(())
    }
}

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
struct RouteBody {
    #[serde(rename = "pub")]
    publisher: String,
    #[serde(rename = "sub")]
    subscriber: String,
}

#[derive(Debug, Deserialize)]
struct DeleteRouteQuery {
    #[serde(rename = "pub")]
    publisher: String,
}

#[derive(Debug, Deserialize)]
struct PublishBody {
    topic: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

fn ok_message(message: String) -> Json<MessageBody> {
    Json(MessageBody { message })
}

/// Command sent by a browser client over `/ws/client`
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum ClientCommand {
    Register { message: String },
    Publish { topic: String, message: String },
    Subscribe { topic: String },
}

#[derive(Debug, Serialize)]
struct RouteActivity<'a> {
    #[serde(rename = "pub")]
    publisher: &'a str,
    #[serde(rename = "sub")]
    subscriber: &'a str,
}

#[derive(Debug, Serialize)]
struct TopicMessage<'a> {
    topic: &'a str,
    message: &'a str,
}

/// `RouterError` as an HTTP response with a `{"detail": ..}` body
#[derive(Debug)]
struct ApiError(RouterError);

impl From<RouterError> for ApiError {
    fn from(e: RouterError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            RouterError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            RouterError::RouteExists { .. } | RouterError::DuplicateName(_) => {
                StatusCode::CONFLICT
            }
            RouterError::InvalidTopic { .. }
            | RouterError::InvalidArgument(_)
            | RouterError::Parse(_) => StatusCode::BAD_REQUEST,
            RouterError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            RouterError::Persistence { .. } | RouterError::Spawn(_) | RouterError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("API request failed: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({ "detail": self.0.to_string() })),
        )
            .into_response()
    }
}

type ApiResult = std::result::Result<Json<MessageBody>, ApiError>;

/// Run route table work on the blocking pool; it writes the route file
/// while holding the table lock.
async fn off_runtime<T, F>(work: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> spacebrew_router::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError(RouterError::Io(std::io::Error::other(e))))?
        .map_err(ApiError)
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.control.connection_status())
}

async fn list_clients(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.control.list_clients())
}

async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.control.list_routes())
}

async fn add_route(State(state): State<AppState>, Json(body): Json<RouteBody>) -> ApiResult {
    let control = state.control.clone();
    let message = off_runtime(move || control.add_route(&body.publisher, &body.subscriber)).await?;
    Ok(ok_message(message))
}

async fn delete_route(
    State(state): State<AppState>,
    Query(query): Query<DeleteRouteQuery>,
) -> ApiResult {
    let control = state.control.clone();
    let message = off_runtime(move || control.delete_route(&query.publisher)).await?;
    Ok(ok_message(message))
}

async fn publish(State(state): State<AppState>, Json(body): Json<PublishBody>) -> ApiResult {
    state.control.publish(&body.topic, &body.message)?;
    Ok(ok_message("Published".to_string()))
}

async fn save_routes(State(state): State<AppState>) -> ApiResult {
    let control = state.control.clone();
    off_runtime(move || control.save_routes()).await?;
    Ok(ok_message("Routes saved".to_string()))
}

async fn spawn_test_client(State(state): State<AppState>) -> ApiResult {
    state.control.spawn_test_client()?;
    Ok(ok_message("Test client spawned".to_string()))
}

// ============================================================================
// WebSocket Handlers
// ============================================================================

async fn route_activity_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| route_activity_session(socket, state))
}

async fn route_activity_session(mut socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    debug!("Route activity observer connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RouterEvent::RouteFired { publisher, subscriber }) => {
                    let activity = RouteActivity {
                        publisher: &publisher,
                        subscriber: &subscriber,
                    };
                    if send_json(&mut socket, &activity).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Route activity observer lagged, {} events lost", n),
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // input is read only to notice the close
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Route activity observer disconnected");
}

async fn web_client_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| web_client_session(socket, state))
}

async fn web_client_session(mut socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    let mut topics: HashSet<String> = HashSet::new();
    debug!("Web client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RouterEvent::Message { topic, message }) if topics.contains(&topic) => {
                    let msg = TopicMessage {
                        topic: &topic,
                        message: &message,
                    };
                    if send_json(&mut socket, &msg).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Web client lagged, {} events lost", n),
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_client_command(&state.control, &mut topics, &text);
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Web client disconnected");
}

fn handle_client_command(control: &ControlSurface, topics: &mut HashSet<String>, text: &str) {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(e) => {
            debug!("Ignoring web client command '{}': {}", text, e);
            return;
        }
    };

    let result = match command {
        ClientCommand::Register { message } => control.register(&message),
        ClientCommand::Publish { topic, message } => control.publish(&topic, &message),
        ClientCommand::Subscribe { topic } => {
            if !topic.is_empty() {
                debug!("Web client subscribed to {}", topic);
                topics.insert(topic);
            }
            return;
        }
    };

    if let Err(e) = result {
        warn!("Web client command failed: {}", e);
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> std::result::Result<(), ()> {
    let text = serde_json::to_string(value).map_err(|e| {
        warn!("Failed to encode websocket message: {}", e);
    })?;
    socket.send(WsMessage::Text(text)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WebConfig::default();
        assert_eq!(config.bind, "0.0.0.0:8088");
        assert!(config.cors);
    }

    #[tokio::test]
    async fn test_route_file_work_leaves_the_async_thread() {
        let caller = std::thread::current().id();

        let ran_on = off_runtime(|| Ok(std::thread::current().id())).await.unwrap();

        assert_ne!(ran_on, caller);
    }

    #[tokio::test]
    async fn test_off_runtime_keeps_router_errors() {
        let err = off_runtime::<(), _>(|| Err(RouterError::RouteNotFound("ghost".into())))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (RouterError::RouteNotFound("a".into()), StatusCode::NOT_FOUND),
            (
                RouterError::RouteExists {
                    publisher: "a".into(),
                    subscriber: "b".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                RouterError::InvalidTopic {
                    topic: "".into(),
                    reason: "topic is empty",
                },
                StatusCode::BAD_REQUEST,
            ),
            (RouterError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (RouterError::Transport("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RouterError::Spawn("none".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_client_command_parsing() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"cmd":"publish","topic":"a/b","message":"1"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Publish { ref topic, .. } if topic == "a/b"));

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"cmd":"subscribe","topic":"a/b"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Subscribe { .. }));

        assert!(serde_json::from_str::<ClientCommand>(r#"{"cmd":"publish","topic":"a"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"cmd":"dance"}"#).is_err());
    }

    #[test]
    fn test_route_activity_shape() {
        let json = serde_json::to_value(RouteActivity {
            publisher: "A/x",
            subscriber: "B/y",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"pub": "A/x", "sub": "B/y"}));
    }
}
