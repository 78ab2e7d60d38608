//! HTTP routes.

use crate::error::{ApiError, ApiResult};
use crate::page;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use teller_agent::{ChatMessage, ToolChoice};
use teller_knowledge::{parser, DocumentInput, LoadReport};

/// Largest accepted upload request.
pub const UPLOAD_LIMIT_BYTES: usize = 32 * 1024 * 1024;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/session", post(create_session))
        .route("/api/session/clear", post(clear_session))
        .route("/api/chat", post(chat))
        .route(
            "/api/documents",
            post(upload_documents).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let (sources, chunks) = match &state.knowledge {
        Some(knowledge) => {
            let stats = knowledge.stats()?;
            (stats.sources_count, stats.chunks_count)
        }
        None => (0, 0),
    };

    Ok(Json(json!({
        "knowledge_loaded": chunks > 0,
        "sources": sources,
        "chunks": chunks,
        "web_search": state.features.web_search,
        "ai_chat": state.features.ai_chat,
        "tracing": state.features.tracing,
        "sessions": state.sessions.len(),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionRequest {
    session: Option<String>,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    session: String,
    created: bool,
    messages: Vec<ChatMessage>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let resolved = state.sessions.resolve(request.session.as_deref())?;
    let messages = resolved.session.lock().await.messages().to_vec();

    Ok(Json(SessionResponse {
        session: resolved.token,
        created: resolved.created,
        messages,
    }))
}

async fn clear_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> ApiResult<Json<Value>> {
    let token = request
        .session
        .ok_or_else(|| ApiError::BadRequest("Missing session".to_string()))?;

    if !state.sessions.clear(&token).await? {
        return Err(ApiError::NotFound("Unknown session".to_string()));
    }

    Ok(Json(json!({ "cleared": true })))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    session: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session: String,
    reply: String,
    tool: Option<ToolChoice>,
    degraded: bool,
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    let resolved = state.sessions.resolve(request.session.as_deref())?;
    let reply = resolved.session.lock().await.chat(message).await;

    Ok(Json(ChatResponse {
        session: resolved.token,
        reply: reply.answer,
        tool: reply.tool,
        degraded: reply.degraded,
    }))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    #[serde(flatten)]
    report: LoadReport,
    summary: String,
}

async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let knowledge = state
        .knowledge
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Knowledge base not available".to_string()))?;

    let mut report = LoadReport::default();
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if !parser::is_supported(&name) {
            tracing::warn!("Rejected upload with unsupported type: {}", name);
            report.push_failure(
                name,
                format!("Unsupported file type, expected one of: {}", parser::SUPPORTED_EXTENSIONS.join(", ")),
            );
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
        documents.push(DocumentInput::new(name, bytes.to_vec()));
    }

    if documents.is_empty() && report.files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    tracing::info!("Processing {} uploaded documents", documents.len());
    report.merge(knowledge.load_documents(&documents).await);

    Ok(Json(UploadResponse {
        summary: report.summary(),
        report,
    }))
}
