use crate::api::{ApiError, ChatCompletionRequest, Completion};
use crate::auth::{require_api_key, ApiKeys};
use axum::{
    extract::{rejection::JsonRejection, State},
    middleware as axum_mw,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use ensemble_agent::StreamEvent;
use ensemble_core::{ChatMessage, Role};
use ensemble_orchestrator::Orchestrator;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

/// Model name reported when the request names none.
pub const DEFAULT_MODEL_NAME: &str = "ensemble";

/// Shared application state.
pub struct AppState {
    /// Engine serving every turn.
    pub orchestrator: Arc<Orchestrator>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth.
    pub fn build(orchestrator: Arc<Orchestrator>) -> Router {
        Self::build_with_auth(orchestrator, ApiKeys::default())
    }

    /// Build the gateway; when keys are configured the `/v1` routes require one.
    /// `/health` stays open.
    pub fn build_with_auth(orchestrator: Arc<Orchestrator>, keys: ApiKeys) -> Router {
        let state = Arc::new(AppState { orchestrator });

        let mut api = Router::new()
            .route("/v1/chat/completions", post(chat_completions_handler))
            .with_state(state.clone());

        if !keys.is_empty() {
            api = api.layer(axum_mw::from_fn_with_state(
                Arc::new(keys),
                require_api_key,
            ));
        }

        Router::new()
            .route("/health", get(health_handler))
            .with_state(state)
            .merge(api)
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents: Vec<String> = state
        .orchestrator
        .agents()
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(serde_json::json!({"status": "ok", "service": "ensemble", "agents": agents}))
}

async fn chat_completions_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };

    if !request.messages.iter().any(|m| m.role == Role::User) {
        return ApiError::bad_request("conversation has no user message").into_response();
    }

    let completion = Completion::new(
        request
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
    );
    info!(
        completion_id = %completion.id,
        messages = request.messages.len(),
        stream = request.stream,
        "Chat completion requested"
    );

    if request.stream {
        stream_completion(state, completion, request.messages).into_response()
    } else {
        match state.orchestrator.handle_turn(&request.messages, None).await {
            Ok(outcome) => Json(completion.response(&outcome.message)).into_response(),
            Err(e) => {
                error!(completion_id = %completion.id, error = %e, "Turn failed");
                ApiError::from(e).into_response()
            }
        }
    }
}

/// Runs the turn in the background and relays it as SSE chunks: content
/// deltas as they stream, then one chunk with the persisted state, then `[DONE]`.
fn stream_completion(
    state: Arc<AppState>,
    completion: Completion,
    messages: Vec<ChatMessage>,
) -> impl IntoResponse {
    let (events_tx, events_rx) = mpsc::channel::<Result<Event, Infallible>>(64);

    tokio::spawn(async move {
        let (sink_tx, mut sink_rx) = mpsc::channel::<StreamEvent>(64);
        let orchestrator = state.orchestrator.clone();
        let turn =
            tokio::spawn(async move { orchestrator.handle_turn(&messages, Some(sink_tx)).await });

        let mut first = true;
        while let Some(event) = sink_rx.recv().await {
            if let StreamEvent::TextDelta { text } = event {
                let chunk = completion.content_chunk(&text, first);
                first = false;
                let _ = events_tx
                    .send(Ok(Event::default().data(chunk.to_string())))
                    .await;
            }
        }

        let closing = match turn.await {
            Ok(Ok(outcome)) => completion.final_chunk(&outcome.state),
            Ok(Err(e)) => {
                error!(completion_id = %completion.id, error = %e, "Turn failed mid-stream");
                ApiError::from(e).body()
            }
            Err(e) => {
                error!(completion_id = %completion.id, error = %e, "Turn task aborted");
                ApiError::from(ensemble_core::EnsembleError::Gateway(e.to_string())).body()
            }
        };
        let _ = events_tx
            .send(Ok(Event::default().data(closing.to_string())))
            .await;
        let _ = events_tx.send(Ok(Event::default().data("[DONE]"))).await;
    });

    Sse::new(ReceiverStream::new(events_rx)).keep_alive(KeepAlive::default())
}
