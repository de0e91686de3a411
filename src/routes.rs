//! Axum router: the chat page plus the JSON API it drives.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::database::{ConnectionSettings, MySqlDatabase};
use crate::error::AppError;
use crate::message::ChatMessage;
use crate::session::ChatSession;
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/settings/defaults", get(default_settings))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/sessions/{id}", delete(close_session))
        .route("/api/sessions/{id}/connect", post(connect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub connected: bool,
    pub messages: Vec<ChatMessage>,
}

impl SessionResponse {
    fn from_session(id: String, session: &ChatSession) -> Self {
        SessionResponse {
            id,
            connected: session.is_connected(),
            messages: session.history().messages().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status":   "ok",
        "version":  env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len().await,
    }))
}

async fn default_settings(State(state): State<Arc<AppState>>) -> Json<ConnectionSettings> {
    Json(state.config.default_connection.clone())
}

async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let (id, session) = state.sessions.create().await;
    let session = session.lock().await;
    Json(SessionResponse::from_session(id.to_string(), &session))
}

async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::SessionNotFound(id))
    }
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get(&id).await?;
    let session = session.lock().await;
    Ok(Json(SessionResponse::from_session(id, &session)))
}

async fn connect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(settings): Json<ConnectionSettings>,
) -> Result<Json<Value>, AppError> {
    let session = state.sessions.get(&id).await?;

    let db = MySqlDatabase::connect(&settings)
        .await
        .map_err(AppError::Connect)?;
    session.lock().await.connect(Arc::new(db));

    info!(session_id = %id, database = %settings.database, "session connected");
    Ok(Json(json!({
        "connected": true,
        "message": "Connected to database!",
    })))
}

/// One chat turn. The session stays locked until both model calls and the
/// query have finished, so turns within a session never interleave.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get(&id).await?;
    let mut session = session.lock().await;

    session.ask(&req.content, Arc::clone(&state.llm)).await?;

    Ok(Json(SessionResponse::from_session(id, &session)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::message::GREETING;
    use crate::session::SessionStore;
    use crate::text_to_sql_chain::stubs::{ScriptedModel, StubDatabase};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_state(llm: Arc<ScriptedModel>) -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::new(Config::from_env()),
            llm,
            sessions: Arc::new(SessionStore::new()),
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn index_serves_chat_page() {
        let app = build(app_state(Arc::new(ScriptedModel::default())));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Chat with MySQL"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build(app_state(Arc::new(ScriptedModel::default())));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn new_session_is_seeded_and_disconnected() {
        let app = build(app_state(Arc::new(ScriptedModel::default())));

        let response = app
            .oneshot(post_json("/api/sessions", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["connected"], false);
        assert_eq!(body["messages"][0]["role"], "ai");
        assert_eq!(body["messages"][0]["content"], GREETING);
    }

    #[tokio::test]
    async fn chat_turn_round_trip() {
        let llm = Arc::new(ScriptedModel::new(["SELECT 1;", "There is exactly one."]));
        let state = app_state(llm.clone());
        let (id, session) = state.sessions.create().await;
        session
            .lock()
            .await
            .connect(Arc::new(StubDatabase::new("CREATE TABLE `t` (`x` int)")));
        let app = build(state);

        let response = app
            .oneshot(post_json(
                &format!("/api/sessions/{id}/messages"),
                json!({ "content": "how many?" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "human");
        assert_eq!(messages[1]["content"], "how many?");
        assert_eq!(messages[2]["role"], "ai");
        assert_eq!(messages[2]["content"], "There is exactly one.");
        assert_eq!(llm.prompts().len(), 2);
    }

    #[tokio::test]
    async fn chat_before_connect_is_a_conflict() {
        let state = app_state(Arc::new(ScriptedModel::default()));
        let (id, _) = state.sessions.create().await;
        let app = build(state);

        let response = app
            .oneshot(post_json(
                &format!("/api/sessions/{id}/messages"),
                json!({ "content": "hello" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn closing_a_session_forgets_it() {
        let state = app_state(Arc::new(ScriptedModel::default()));
        let (id, _) = state.sessions.create().await;
        let app = build(Arc::clone(&state));

        let delete_request = |uri: String| {
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(delete_request(format!("/api/sessions/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.sessions.len().await, 0);

        let response = app
            .oneshot(delete_request(format!("/api/sessions/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = build(app_state(Arc::new(ScriptedModel::default())));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/sessions/00000000-0000-0000-0000-000000000000/messages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn connect_with_bad_port_is_rejected_before_dialing() {
        let state = app_state(Arc::new(ScriptedModel::default()));
        let (id, session) = state.sessions.create().await;
        let app = build(state);

        let response = app
            .oneshot(post_json(
                &format!("/api/sessions/{id}/connect"),
                json!({
                    "host": "localhost",
                    "port": "not-a-port",
                    "user": "root",
                    "password": "root",
                    "database": "classicmodels",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!session.lock().await.is_connected());
    }
}
