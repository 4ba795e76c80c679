// HTTP surface
// Chat, refresh and health endpoints over the orchestrator and inventory engine

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::hotel_data::Provenance;
use crate::inventory::{InventoryEngine, InventoryError};
use crate::orchestrator::{
    AssistantError, ConversationOrchestrator, ConversationRole, ConversationTurn,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub inventory: Arc<InventoryEngine>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>) -> Self {
        let inventory = orchestrator.inventory().clone();
        Self {
            orchestrator,
            inventory,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/chat", post(handle_chat).get(chat_usage))
        .route("/refresh-hotel-data", post(refresh_hotel_data));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(state)
}

// Roles a client may send back; only user and assistant turns reach the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingRole {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: IncomingRole,
    #[serde(default)]
    pub content: String,
}

impl IncomingMessage {
    fn into_turn(self) -> Option<ConversationTurn> {
        let role = match self.role {
            IncomingRole::User => ConversationRole::User,
            IncomingRole::Assistant => ConversationRole::Assistant,
            IncomingRole::Other => return None,
        };
        Some(ConversationTurn {
            role,
            text: self.content,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<IncomingMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_history: Vec<ConversationTurn>,
    pub data_source: Provenance,
    pub show_date_picker: bool,
}

// Error body returned to HTTP callers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: String,
    kind: &'static str,
}

impl ApiError {
    fn chat(err: AssistantError) -> Self {
        let status = match err {
            AssistantError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = match err {
            AssistantError::Validation(_) => "Message is required",
            _ => "Failed to process chat message",
        };
        Self {
            status,
            error,
            details: err.to_string(),
            kind: err.kind(),
        }
    }

    fn refresh(err: InventoryError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Failed to refresh hotel data",
            details: err.to_string(),
            kind: err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error,
            "details": self.details,
            "kind": self.kind,
        }));
        (self.status, body).into_response()
    }
}

#[instrument(skip(state, request))]
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::chat(AssistantError::Validation(
            "Message is required".to_string(),
        )));
    }

    let history = request
        .conversation_history
        .into_iter()
        .filter_map(IncomingMessage::into_turn)
        .collect();

    let outcome = state
        .orchestrator
        .exchange(&request.message, history)
        .await
        .map_err(|e| {
            error!(kind = e.kind(), error = %e, "Chat exchange failed");
            ApiError::chat(e)
        })?;

    Ok(Json(ChatResponse {
        reply: outcome.reply_text,
        conversation_history: outcome.updated_history,
        data_source: outcome.provenance,
        show_date_picker: outcome.show_date_picker,
    }))
}

async fn chat_usage() -> Json<Value> {
    Json(json!({
        "message": "Chat endpoint is working. Use POST method to send messages.",
        "example": {
            "method": "POST",
            "url": "/api/chat",
            "body": { "message": "Hello" }
        }
    }))
}

#[instrument(skip(state))]
async fn refresh_hotel_data(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let provenance = state.inventory.refresh().await.map_err(|e| {
        error!(kind = e.kind(), error = %e, "Hotel data refresh failed");
        ApiError::refresh(e)
    })?;

    info!(provenance = %provenance, "Hotel data refreshed on request");
    Ok(Json(json!({
        "message": "Hotel data refreshed successfully",
        "dataSource": provenance,
    })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Hotel booking assistant is running",
    }))
}
