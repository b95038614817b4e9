//! HTTP handlers for the Huddle server.
//!
//! Handlers check the shape of each request, then call into the presence
//! engine, which decides whether it is allowed. The caller's identity comes from the `User` header and
//! is checked against the registry before anything is posted on its behalf.

use crate::config::Config;
use crate::metrics;
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, FromRequestParts, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use huddle_core::{ChatError, PresenceEngine};
use huddle_protocol::{
    ErrorBody, HealthBody, LimitError, MessageView, MessagesQuery, ParticipantView,
    PostMessageRequest, RegisterRequest, USER_HEADER,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared server state.
pub struct AppState {
    /// The presence engine.
    pub engine: Arc<PresenceEngine>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create app state with an in-memory engine.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let engine = Arc::new(PresenceEngine::in_memory(config.presence_config()));
        Self::with_engine(engine, config)
    }

    /// Create app state around an existing engine.
    #[must_use]
    pub fn with_engine(engine: Arc<PresenceEngine>, config: Config) -> Self {
        Self { engine, config }
    }
}

/// Errors returned to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Limit(#[from] LimitError),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Missing or invalid `User` header")]
    MissingIdentity,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Chat(ChatError::InvalidInput(_))
            | ApiError::Limit(_)
            | ApiError::Malformed(_)
            | ApiError::MissingIdentity => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Chat(ChatError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Chat(ChatError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Chat(ChatError::StoreUnavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Chat(e) => e.kind(),
            _ => "invalid_input",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::record_error(self.kind());
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }
        (status, Json(ErrorBody::new(self.kind(), self.to_string()))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

/// Participant name claimed by the `User` header.
///
/// This is only a claim; handlers resolve it through the engine before
/// acting on it.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or(ApiError::MissingIdentity)?;
        let name = std::str::from_utf8(value.as_bytes()).map_err(|_| ApiError::MissingIdentity)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::MissingIdentity);
        }
        Ok(Identity(name.to_string()))
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.limits.max_body_bytes;
    let cors = state.config.cors.enabled;

    let router = Router::new()
        .route("/participants", get(list_participants).post(register))
        .route("/status", post(heartbeat))
        .route("/messages", get(get_messages).post(post_message))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Run the HTTP server and the background sweeper.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let sweeper = state.engine.spawn_sweeper_with(metrics::record_sweep);
    let app = app(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Huddle server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("Huddle server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Health check handler.
async fn health_handler() -> Json<HealthBody> {
    metrics::record_request("health");
    Json(HealthBody {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /participants`
async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ParticipantView>), ApiError> {
    metrics::record_request("register");
    let Json(request) = payload?;

    let participant = state.engine.register(&request.name).await?;
    metrics::record_registration();
    metrics::participant_joined();

    Ok((StatusCode::CREATED, Json(ParticipantView::from(&participant))))
}

/// `GET /participants`
async fn list_participants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ParticipantView>>, ApiError> {
    metrics::record_request("list_participants");
    let participants = state.engine.participants().await?;
    metrics::set_active_participants(participants.len());

    Ok(Json(participants.iter().map(ParticipantView::from).collect()))
}

/// `POST /status`
async fn heartbeat(
    State(state): State<Arc<AppState>>,
    identity: Option<Identity>,
) -> Result<StatusCode, ApiError> {
    metrics::record_request("heartbeat");
    let Some(Identity(name)) = identity else {
        return Err(ChatError::NotFound(String::new()).into());
    };

    state.engine.heartbeat(&name).await?;
    Ok(StatusCode::OK)
}

/// `POST /messages`
async fn post_message(
    State(state): State<Arc<AppState>>,
    Identity(name): Identity,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    metrics::record_request("post_message");
    let Json(request) = payload?;
    let post = request.into_post();

    let sender = state.engine.sender(&name).await?;
    let message = state
        .engine
        .post(&sender, post.to, &post.text, post.kind)
        .await?;
    metrics::record_message(message.kind.as_str());

    Ok((StatusCode::CREATED, Json(MessageView::from(&message))))
}

/// `GET /messages`
async fn get_messages(
    State(state): State<Arc<AppState>>,
    Identity(viewer): Identity,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    metrics::record_request("get_messages");
    let Query(query) = query?;
    let limit = query.limit()?;

    let messages = state.engine.messages(&viewer, limit).await?;
    Ok(Json(messages.iter().map(MessageView::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use huddle_core::{ManualClock, MemoryMessageStore, MemoryParticipantStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        engine: Arc<PresenceEngine>,
        clock: Arc<ManualClock>,
    }

    fn test_app() -> TestApp {
        let config = Config::default();
        let clock = Arc::new(ManualClock::default());
        let engine = Arc::new(PresenceEngine::new(
            Arc::new(MemoryParticipantStore::new()),
            Arc::new(MemoryMessageStore::new()),
            clock.clone(),
            config.presence_config(),
        ));
        let state = Arc::new(AppState::with_engine(engine.clone(), config));
        TestApp {
            router: app(state),
            engine,
            clock,
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(router: &Router, name: &str) -> StatusCode {
        send(router, "POST", "/participants", None, Some(json!({ "name": name })))
            .await
            .0
    }

    #[tokio::test]
    async fn test_register_statuses() {
        let app = test_app();

        assert_eq!(register(&app.router, "alice").await, StatusCode::CREATED);
        assert_eq!(register(&app.router, "alice").await, StatusCode::CONFLICT);
        assert_eq!(register(&app.router, "").await, StatusCode::UNPROCESSABLE_ENTITY);
        for marker in ["todos", "TODOS", "Todos"] {
            assert_eq!(
                register(&app.router, marker).await,
                StatusCode::UNPROCESSABLE_ENTITY,
                "{marker}"
            );
        }

        let (status, body) = send(
            &app.router,
            "POST",
            "/participants",
            None,
            Some(json!({ "nome": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_list_participants() {
        let app = test_app();
        register(&app.router, "bob").await;
        register(&app.router, "alice").await;

        let (status, body) = send(&app.router, "GET", "/participants", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert!(body[0]["lastStatus"].is_i64());
    }

    #[tokio::test]
    async fn test_heartbeat_statuses() {
        let app = test_app();
        register(&app.router, "alice").await;

        let (status, _) = send(&app.router, "POST", "/status", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app.router, "POST", "/status", Some("bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app.router, "POST", "/status", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_message_requires_active_sender() {
        let app = test_app();
        let body = json!({ "to": "todos", "text": "hi", "type": "message" });

        let (status, _) = send(
            &app.router,
            "POST",
            "/messages",
            Some("ghost"),
            Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app.router, "POST", "/messages", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_post_message_schema() {
        let app = test_app();
        register(&app.router, "x").await;

        for body in [
            json!({ "to": "todos", "text": "hi", "type": "shout" }),
            json!({ "to": "todos", "type": "message" }),
            json!({ "to": "todos", "text": "hi", "type": "status" }),
            json!({ "to": "todos", "text": "hi", "type": "private_message" }),
            json!({ "to": "", "text": "hi", "type": "message" }),
        ] {
            let (status, _) =
                send(&app.router, "POST", "/messages", Some("x"), Some(body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }

        let (status, body) = send(
            &app.router,
            "POST",
            "/messages",
            Some("x"),
            Some(json!({ "to": "y", "text": "psst", "type": "private_message" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["from"], "x");
        assert_eq!(body["type"], "private_message");
    }

    #[tokio::test]
    async fn test_end_to_end_flow() {
        let app = test_app();
        register(&app.router, "x").await;

        let (status, _) = send(
            &app.router,
            "POST",
            "/messages",
            Some("x"),
            Some(json!({ "to": "todos", "text": "hi", "type": "message" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app.router, "GET", "/messages", Some("y"), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["from"], "x");
        assert_eq!(messages[0]["to"], "todos");
        assert_eq!(messages[0]["type"], "status");
        assert_eq!(messages[1]["text"], "hi");
        assert_eq!(messages[1]["to"], "todos");
    }

    #[tokio::test]
    async fn test_broadcast_marker_ignores_case() {
        let app = test_app();
        register(&app.router, "x").await;
        register(&app.router, "z").await;

        let (status, _) = send(
            &app.router,
            "POST",
            "/messages",
            Some("x"),
            Some(json!({ "to": "Todos", "text": "hello room", "type": "message" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app.router, "GET", "/messages", Some("z"), None).await;
        let seen = body
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["text"] == "hello room" && m["to"] == "todos");
        assert!(seen);
    }

    #[tokio::test]
    async fn test_get_messages_limit() {
        let app = test_app();
        register(&app.router, "x").await;
        let sender = app.engine.sender("x").await.unwrap();
        for i in 1..=4 {
            app.engine
                .post(
                    &sender,
                    huddle_core::Recipient::Everyone,
                    &format!("m{i}"),
                    huddle_core::MessageKind::Broadcast,
                )
                .await
                .unwrap();
        }

        let (status, body) = send(&app.router, "GET", "/messages?limit=2", Some("y"), None).await;
        assert_eq!(status, StatusCode::OK);
        let texts: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["m3", "m4"]);

        for bad in ["0", "-3", "abc"] {
            let uri = format!("/messages?limit={bad}");
            let (status, _) = send(&app.router, "GET", &uri, Some("y"), None).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "limit={bad}");
        }
    }

    #[tokio::test]
    async fn test_expired_participant_cannot_post() {
        let app = test_app();
        register(&app.router, "alice").await;

        app.clock.advance(chrono::Duration::seconds(11));
        app.engine.sweep().await.unwrap();

        let (status, _) = send(&app.router, "POST", "/status", Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app.router, "GET", "/messages", Some("bob"), None).await;
        let last = body.as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["from"], "alice");
        assert_eq!(last["text"], "sai da sala...");
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app.router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
