//! Conversational shopping endpoints.
//!
//! Quota exhaustion never surfaces as an error to the shopper: the handler
//! answers with a canned category suggestion and marks the payload
//! `fallback: true`. Transient rate limiting, after retries, maps to 429.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use chrono::Utc;
use fernwood_agent::{AgentError, AgentRuntime, LlmError};
use fernwood_core::ThreadId;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::fallback::fallback_reply;
use crate::products::ApiError;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

impl ChatState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/chat", post(start_chat))
        .route("/chat/{thread_id}", post(continue_chat))
        .with_state(ChatState::new(runtime))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub thread_id: ThreadId,
    pub response: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

pub async fn start_chat(
    State(state): State<ChatState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    let thread = ThreadId::from_timestamp(Utc::now());
    respond(&state, thread, &body.message).await
}

pub async fn continue_chat(
    State(state): State<ChatState>,
    Path(thread_id): Path<String>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    respond(&state, ThreadId(thread_id), &body.message).await
}

async fn respond(
    state: &ChatState,
    thread: ThreadId,
    message: &str,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    if message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError { error: "message is required".to_string() }),
        ));
    }

    match state.runtime.handle_thread_message(&thread, message).await {
        Ok(response) => {
            Ok(Json(ChatResponse { thread_id: thread, response, fallback: false }))
        }
        Err(AgentError::Llm(LlmError::QuotaExhausted)) => {
            info!(
                event_name = "api.chat.fallback",
                thread_id = %thread,
                "model quota exhausted; serving canned reply"
            );
            Ok(Json(ChatResponse {
                thread_id: thread,
                response: fallback_reply(message),
                fallback: true,
            }))
        }
        Err(AgentError::Llm(LlmError::RateLimited | LlmError::RetriesExhausted { .. })) => Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError {
                error: "Rate limit exceeded. Please try again in a moment.".to_string(),
            }),
        )),
        Err(err) => {
            error!(
                event_name = "api.chat.error",
                thread_id = %thread,
                error = %err,
                "chat turn failed"
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: "Failed to process chat message".to_string() }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fernwood_agent::{
        AgentRuntime, ChatRequest, LlmClient, LlmError, ModelTurn, RuntimeOptions, ToolRegistry,
    };
    use fernwood_core::Role;
    use fernwood_db::repositories::memory::InMemoryThreadLog;
    use fernwood_db::repositories::ThreadLog;

    use super::*;

    struct ScriptedLlm {
        turns: Mutex<Vec<Result<ModelTurn, LlmError>>>,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<Result<ModelTurn, LlmError>>) -> Self {
            Self { turns: Mutex::new(turns) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<ModelTurn, LlmError> {
            self.turns
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(LlmError::Upstream("script exhausted".into())))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![0.0])
        }
    }

    fn chat_state(
        turns: Vec<Result<ModelTurn, LlmError>>,
    ) -> (ChatState, Arc<InMemoryThreadLog>) {
        let log = Arc::new(InMemoryThreadLog::new());
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedLlm::new(turns)),
            ToolRegistry::new(),
            log.clone(),
            RuntimeOptions::default(),
        );
        (ChatState::new(Arc::new(runtime)), log)
    }

    #[tokio::test]
    async fn new_chat_mints_a_thread_and_replies() {
        let (state, log) = chat_state(vec![Ok(ModelTurn::Respond("Welcome in!".into()))]);
        let body = ChatRequestBody { message: "hello".into() };

        let Json(response) = start_chat(State(state), Json(body)).await.unwrap();
        assert_eq!(response.response, "Welcome in!");
        assert!(!response.fallback);
        // Thread ids are millisecond timestamps.
        assert!(response.thread_id.0.parse::<i64>().is_ok());

        let messages = log.read(&response.thread_id).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn second_message_appends_to_the_same_thread() {
        let (state, log) = chat_state(vec![
            Ok(ModelTurn::Respond("Second reply.".into())),
            Ok(ModelTurn::Respond("First reply.".into())),
        ]);

        let Json(first) = start_chat(
            State(state.clone()),
            Json(ChatRequestBody { message: "show me beds".into() }),
        )
        .await
        .unwrap();

        let Json(second) = continue_chat(
            State(state),
            Path(first.thread_id.0.clone()),
            Json(ChatRequestBody { message: "under $500".into() }),
        )
        .await
        .unwrap();
        assert_eq!(second.thread_id, first.thread_id);
        assert_eq!(second.response, "Second reply.");

        let messages = log.read(&first.thread_id).await.unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "show me beds");
        assert_eq!(messages[2].content, "under $500");
    }

    #[tokio::test]
    async fn quota_exhaustion_serves_a_canned_fallback() {
        let (state, _log) = chat_state(vec![Err(LlmError::QuotaExhausted)]);
        let body = ChatRequestBody { message: "I want a sofa".into() };

        let Json(response) = start_chat(State(state), Json(body)).await.unwrap();
        assert!(response.fallback);
        assert!(response.response.contains("Sofa"));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limiting_maps_to_429() {
        let turns = (0..5).map(|_| Err(LlmError::RateLimited)).collect();
        let (state, _log) = chat_state(turns);
        let body = ChatRequestBody { message: "hello".into() };

        let (status, Json(error)) =
            start_chat(State(state), Json(body)).await.err().expect("expected an error");
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(error.error.contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let (state, _log) = chat_state(Vec::new());
        let body = ChatRequestBody { message: "   ".into() };

        let (status, Json(error)) =
            start_chat(State(state), Json(body)).await.err().expect("expected an error");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.error, "message is required");
    }

    #[test]
    fn fallback_flag_is_omitted_from_normal_replies() {
        let response = ChatResponse {
            thread_id: ThreadId("1".into()),
            response: "hi".into(),
            fallback: false,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("fallback").is_none());
        assert_eq!(value["threadId"], "1");
    }
}
