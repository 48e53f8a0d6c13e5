//! HTTP API next to the WebSocket hub.
//!
//! Routes:
//! - `GET  /health`
//! - `GET  /api/figma/file`
//! - `GET  /api/figma/search?query=`
//! - `POST /api/command/text`
//! - `POST /api/suggestions`

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use voice_canvas_core::{
    CommandContext, Element, FileMetadata, Translation, TranslationInput, TreeSource,
    command::now_ms,
};

use crate::hub::Hub;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "voice-canvas-server";

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

fn api_error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
}

fn tree_source(hub: &Hub) -> Result<&Arc<dyn TreeSource>, (StatusCode, Json<ErrorBody>)> {
    hub.tree.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Design file access is not configured",
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub nodes: Vec<Element>,
}

#[derive(Debug, Deserialize)]
pub struct TextCommandRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsRequest {
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": now_ms(),
    }))
}

async fn file_metadata(State(hub): State<Arc<Hub>>) -> ApiResult<FileMetadata> {
    let tree = tree_source(&hub)?;
    match tree.document().await {
        Ok(snapshot) => Ok(Json(snapshot.metadata())),
        Err(e) => {
            tracing::error!("Error fetching file: {e}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn search_nodes(
    State(hub): State<Arc<Hub>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let Some(query) = params.query.filter(|q| !q.is_empty()) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Query parameter required",
        ));
    };
    let tree = tree_source(&hub)?;
    match tree.find_by_name(&query).await {
        Ok(nodes) => Ok(Json(SearchResponse { nodes })),
        Err(e) => {
            tracing::error!("Error searching nodes: {e}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn text_command(
    State(hub): State<Arc<Hub>>,
    Json(request): Json<TextCommandRequest>,
) -> ApiResult<Translation> {
    let Some(text) = request.text.filter(|t| !t.trim().is_empty()) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Text parameter required"));
    };

    let context = match request.context {
        Some(value) => Some(CommandContext::from_value(value)),
        None => hub.fallback_context().await,
    };

    match hub
        .translate(TranslationInput::Text(text), context.as_ref())
        .await
    {
        Ok(translation) => Ok(Json(translation)),
        Err(e) => {
            tracing::error!("Error processing text command: {e}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn suggestions(
    State(hub): State<Arc<Hub>>,
    Json(request): Json<SuggestionsRequest>,
) -> Json<SuggestionsResponse> {
    let suggestions = hub.gateway.suggestions(&request.state).await;
    Json(SuggestionsResponse { suggestions })
}

/// Create the HTTP API router.
///
/// CORS is permissive and every request is traced.
#[must_use]
pub fn create_api_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/figma/file", get(file_metadata))
        .route("/api/figma/search", get(search_nodes))
        .route("/api/command/text", post(text_command))
        .route("/api/suggestions", post(suggestions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use tower::ServiceExt;
    use voice_canvas_core::{
        Command, CommandAction, DocumentSnapshot, ElementKind, GatewayError, TranslationGateway,
        TreeSourceError, command::CreateProps,
    };

    use super::*;
    use crate::hub::HubConfig;

    struct EchoGateway;

    #[async_trait]
    impl TranslationGateway for EchoGateway {
        async fn translate(
            &self,
            input: TranslationInput,
            context: Option<&CommandContext>,
        ) -> Result<Translation, GatewayError> {
            let TranslationInput::Text(text) = input else {
                return Err(GatewayError::Voice("text only".into()));
            };
            if text == "fail" {
                return Err(GatewayError::Text("model unavailable".into()));
            }
            Ok(Translation {
                command: Command::new(CommandAction::Create(CreateProps::default()), text),
                confidence: 0.75,
                explanation: context.and_then(|c| c.name.clone()),
            })
        }

        async fn suggestions(&self, state: &Value) -> Vec<String> {
            if state.is_null() {
                return Vec::new();
            }
            vec!["Add a header".into(), "Make the button blue".into()]
        }
    }

    struct FixedTree;

    #[async_trait]
    impl TreeSource for FixedTree {
        async fn document(&self) -> Result<DocumentSnapshot, TreeSourceError> {
            Ok(DocumentSnapshot {
                name: "Landing".into(),
                schema_version: 14,
                document: Element::container(
                    "0:0",
                    "Landing",
                    ElementKind::Document,
                    vec![
                        Element::leaf("1:1", "Login Button", ElementKind::Rectangle),
                        Element::leaf("1:2", "Header", ElementKind::Frame),
                    ],
                ),
            })
        }
    }

    fn router(tree: bool) -> Router {
        let tree: Option<Arc<dyn TreeSource>> = if tree { Some(Arc::new(FixedTree)) } else { None };
        let hub = Hub::new(Arc::new(EchoGateway), tree, HubConfig::default());
        create_api_router(Arc::new(hub))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(router(false), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn test_file_metadata() {
        let (status, body) = call(router(true), get_req("/api/figma/file")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Landing");
        assert_eq!(body["schemaVersion"], 14);
        assert_eq!(body["nodeCount"], 3);
    }

    #[tokio::test]
    async fn test_file_metadata_without_tree_source() {
        let (status, body) = call(router(false), get_req("/api/figma/file")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_search() {
        let (status, body) = call(router(true), get_req("/api/figma/search?query=button")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"][0]["name"], "Login Button");
        assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (status, body) = call(router(true), get_req("/api/figma/search")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Query parameter required");
    }

    #[tokio::test]
    async fn test_text_command() {
        let request = post_json(
            "/api/command/text",
            &json!({"text": "add a box", "context": {"name": "Mobile"}}),
        );
        let (status, body) = call(router(false), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["command"]["type"], "create");
        assert_eq!(body["command"]["rawText"], "add a box");
        assert_eq!(body["explanation"], "Mobile");
    }

    #[tokio::test]
    async fn test_text_command_fetches_context() {
        let request = post_json("/api/command/text", &json!({"text": "add a box"}));
        let (status, body) = call(router(true), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["explanation"], "Landing");
    }

    #[tokio::test]
    async fn test_text_command_errors() {
        let (status, body) = call(router(false), post_json("/api/command/text", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text parameter required");

        let request = post_json("/api/command/text", &json!({"text": "fail"}));
        let (status, body) = call(router(false), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to process text command: model unavailable");
    }

    #[tokio::test]
    async fn test_suggestions() {
        let request = post_json("/api/suggestions", &json!({"state": {"selection": []}}));
        let (status, body) = call(router(false), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"][0], "Add a header");

        let (_, body) = call(router(false), post_json("/api/suggestions", &json!({}))).await;
        assert_eq!(body["suggestions"], json!([]));
    }
}
