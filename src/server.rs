//! HTTP surface.
//!
//! Two routes: `GET /health` and `POST /api/chat`. The chat handler
//! either returns the assembled reply object or a chunked
//! `application/x-ndjson` body, depending on the request's `stream`
//! flag. All orchestration faults have already been rendered into
//! user-facing replies by the time they reach this layer; a 500 with a
//! JSON detail body is reserved for truly unexpected cases.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::stream::{render_reply, render_stream, to_ndjson_line};
use crate::types::ChatRequest;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Shared, read-only per-process state. Cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub model: String,
}

/// Unexpected handler fault, rendered as `{"detail": ...}`.
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.0 })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model,
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    info!(stream = request.stream, "chat request received");

    if request.stream {
        let rx = render_stream(
            state.orchestrator.clone(),
            request.message,
            request.conversation_id,
        );
        let body = Body::from_stream(
            ReceiverStream::new(rx)
                .map(|record| Ok::<_, Infallible>(Bytes::from(to_ndjson_line(&record)))),
        );
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body)
            .map_err(|e| ApiError(e.to_string()))
    } else {
        let response = render_reply(
            state.orchestrator.clone(),
            request.message,
            request.conversation_id,
        )
        .await;
        Ok(Json(response).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::llm::{GatewayError, ModelDecision, ModelGateway};
    use crate::tools::ToolRegistry;
    use crate::types::{Message, ToolSchema};
    use async_trait::async_trait;
    use axum::http::Request;
    use tower::ServiceExt;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    struct CannedGateway;

    #[async_trait]
    impl ModelGateway for CannedGateway {
        async fn decide(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> Result<ModelDecision, GatewayError> {
            Ok(ModelDecision::FinalAnswer {
                text: "Hello there!".to_string(),
            })
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn test_state() -> AppState {
        AppState {
            orchestrator: Arc::new(Orchestrator::new(
                Arc::new(CannedGateway),
                Arc::new(ToolRegistry::new()),
                OrchestratorConfig {
                    max_validation_retries: 1,
                    max_tool_iterations: 3,
                },
                "sys",
            )),
            model: "qwen3:4b".to_string(),
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_health_reports_status_and_version() {
        let rt = rt();
        rt.block_on(async {
            let response = router(test_state())
                .oneshot(
                    Request::builder()
                        .uri("/health")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["status"], "healthy");
            assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        });
    }

    #[test]
    fn test_chat_non_streaming_returns_reply_object() {
        let rt = rt();
        rt.block_on(async {
            let response = router(test_state())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/chat")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(r#"{"message": "hi", "stream": false}"#))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["reply"], "Hello there!");
            assert!(body["conversation_id"].is_string());
            assert!(body["step_id"].is_string());
        });
    }

    #[test]
    fn test_chat_streaming_returns_ndjson() {
        let rt = rt();
        rt.block_on(async {
            let response = router(test_state())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/chat")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(r#"{"message": "hi", "stream": true}"#))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok()),
                Some(NDJSON_CONTENT_TYPE)
            );

            let text = body_string(response).await;
            let lines: Vec<serde_json::Value> = text
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect();

            assert!(lines.len() >= 3);
            assert_eq!(lines.first().unwrap()["type"], "meta");
            assert_eq!(lines.last().unwrap()["type"], "final");
            assert_eq!(lines.last().unwrap()["message"], "Hello there!");
            for line in &lines[1..lines.len() - 1] {
                assert_eq!(line["type"], "delta");
            }

            let concatenated: String = lines[1..lines.len() - 1]
                .iter()
                .map(|l| l["content"].as_str().unwrap())
                .collect();
            assert_eq!(concatenated, "Hello there!");
        });
    }
}
