//! Figma REST client.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use voice_canvas_core::{
    DocumentSnapshot, Element, ElementId, FileMetadata, TreeSource, TreeSourceError,
};

/// Public Figma API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.figma.com/v1";

const TOKEN_HEADER: &str = "X-Figma-Token";

#[derive(Debug, Deserialize)]
struct NodesResponse {
    #[serde(default)]
    nodes: HashMap<ElementId, Option<NodeEntry>>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    document: Element,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    err: Option<String>,
    #[serde(default)]
    images: HashMap<ElementId, Option<String>>,
}

/// Read-only access to one design file.
pub struct FigmaClient {
    http: Client,
    token: String,
    file_key: String,
    base_url: String,
}

impl FigmaClient {
    #[must_use]
    pub fn new(token: impl Into<String>, file_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), token, file_key)
    }

    /// Create a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(
        http: Client,
        token: impl Into<String>,
        file_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token: token.into(),
            file_key: file_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn file_key(&self) -> &str {
        &self.file_key
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, TreeSourceError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header(TOKEN_HEADER, &self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| TreeSourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TreeSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Fetch the whole file.
    ///
    /// # Errors
    /// Returns error if the request fails or the body is not a file document.
    pub async fn file(&self) -> Result<DocumentSnapshot, TreeSourceError> {
        self.get(&format!("/files/{}", self.file_key), &[])
            .await?
            .json()
            .await
            .map_err(|e| TreeSourceError::Request(e.to_string()))
    }

    /// Fetch one node and its subtree.
    ///
    /// # Errors
    /// Returns [`TreeSourceError::NodeNotFound`] if the file has no such node.
    pub async fn node(&self, id: &str) -> Result<Element, TreeSourceError> {
        let response: NodesResponse = self
            .get(&format!("/files/{}/nodes", self.file_key), &[("ids", id)])
            .await?
            .json()
            .await
            .map_err(|e| TreeSourceError::Request(e.to_string()))?;

        response
            .nodes
            .into_iter()
            .find(|(key, _)| key == id)
            .and_then(|(_, entry)| entry)
            .map(|entry| entry.document)
            .ok_or_else(|| TreeSourceError::NodeNotFound(id.to_owned()))
    }

    /// Nodes whose name contains `query`, case-insensitively, depth-first.
    ///
    /// # Errors
    /// Returns error if the file cannot be fetched.
    pub async fn find_nodes_by_name(&self, query: &str) -> Result<Vec<Element>, TreeSourceError> {
        self.find_by_name(query).await
    }

    /// Name, schema version and total node count of the file.
    ///
    /// # Errors
    /// Returns error if the file cannot be fetched.
    pub async fn file_metadata(&self) -> Result<FileMetadata, TreeSourceError> {
        Ok(self.file().await?.metadata())
    }

    /// PNG render URLs for the given nodes.
    ///
    /// Nodes Figma failed to render map to `None`.
    ///
    /// # Errors
    /// Returns error if the request fails or Figma reports a render error.
    pub async fn images(
        &self,
        ids: &[&str],
    ) -> Result<HashMap<ElementId, Option<String>>, TreeSourceError> {
        let ids = ids.join(",");
        let response: ImagesResponse = self
            .get(
                &format!("/images/{}", self.file_key),
                &[("ids", ids.as_str()), ("format", "png")],
            )
            .await?
            .json()
            .await
            .map_err(|e| TreeSourceError::Request(e.to_string()))?;

        if let Some(err) = response.err {
            return Err(TreeSourceError::Request(err));
        }
        Ok(response.images)
    }
}

#[async_trait]
impl TreeSource for FigmaClient {
    async fn document(&self) -> Result<DocumentSnapshot, TreeSourceError> {
        self.file().await
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;
    use voice_canvas_core::ElementKind;

    use super::*;

    fn file_json() -> Value {
        json!({
            "name": "Landing",
            "schemaVersion": 14,
            "lastModified": "2024-01-01T00:00:00Z",
            "document": {
                "id": "0:0", "name": "Document", "type": "DOCUMENT",
                "children": [{
                    "id": "0:1", "name": "Page 1", "type": "CANVAS",
                    "children": [
                        {"id": "1:1", "name": "Header", "type": "FRAME", "children": [
                            {"id": "1:2", "name": "Title", "type": "TEXT", "characters": "Hi"}
                        ]},
                        {"id": "1:3", "name": "Sign-up button", "type": "RECTANGLE"},
                        {"id": "1:4", "name": "Badge", "type": "BOOLEAN_OPERATION"}
                    ]
                }]
            }
        })
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) == Some("secret")
    }

    async fn get_file(headers: HeaderMap, Path(key): Path<String>) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::FORBIDDEN, Json(json!({"status": 403, "err": "Invalid token"})));
        }
        if key != "abc" {
            return (StatusCode::NOT_FOUND, Json(json!({"status": 404, "err": "Not found"})));
        }
        (StatusCode::OK, Json(file_json()))
    }

    async fn get_nodes(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        let id = query.get("ids").cloned().unwrap_or_default();
        let entry = if id == "1:1" {
            json!({"document": {"id": "1:1", "name": "Header", "type": "FRAME", "children": []}})
        } else {
            Value::Null
        };
        let mut nodes = serde_json::Map::new();
        nodes.insert(id, entry);
        Json(json!({"name": "Landing", "nodes": nodes}))
    }

    async fn get_images(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        assert_eq!(query.get("format").map(String::as_str), Some("png"));
        let images: serde_json::Map<String, Value> = query
            .get("ids")
            .map(|ids| {
                ids.split(',')
                    .map(|id| (id.to_owned(), json!(format!("https://img.example/{id}.png"))))
                    .collect()
            })
            .unwrap_or_default();
        Json(json!({"err": null, "images": images}))
    }

    async fn spawn_figma() -> String {
        let app = Router::new()
            .route("/files/{key}", get(get_file))
            .route("/files/{key}/nodes", get(get_nodes))
            .route("/images/{key}", get(get_images));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn client(base: &str, token: &str, key: &str) -> FigmaClient {
        let http = Client::builder().no_proxy().build().unwrap();
        FigmaClient::with_client(http, token, key).with_base_url(base)
    }

    #[tokio::test]
    async fn test_file() {
        let base = spawn_figma().await;
        let snapshot = assert_ok!(client(&base, "secret", "abc").file().await);
        assert_eq!(snapshot.name, "Landing");
        assert_eq!(snapshot.document.kind, ElementKind::Document);
        let page = &snapshot.document.children()[0];
        assert_eq!(page.children()[2].kind, ElementKind::Other);
    }

    #[tokio::test]
    async fn test_file_metadata() {
        let base = spawn_figma().await;
        let meta = assert_ok!(client(&base, "secret", "abc").file_metadata().await);
        assert_eq!(
            meta,
            FileMetadata {
                name: "Document".into(),
                schema_version: 14,
                node_count: 6,
            }
        );
    }

    #[tokio::test]
    async fn test_status_errors() {
        let base = spawn_figma().await;
        let err = client(&base, "wrong", "abc").file().await.unwrap_err();
        assert!(matches!(err, TreeSourceError::Status { status: 403, .. }));

        let err = client(&base, "secret", "missing").document().await.unwrap_err();
        assert!(matches!(err, TreeSourceError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_find_nodes_by_name() {
        let base = spawn_figma().await;
        let figma = client(&base, "secret", "abc");
        let found = assert_ok!(figma.find_nodes_by_name("BUTTON").await);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1:3");

        let found = assert_ok!(figma.find_nodes_by_name("e").await);
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["0:0", "0:1", "1:1", "1:2", "1:4"]);
    }

    #[tokio::test]
    async fn test_node() {
        let base = spawn_figma().await;
        let figma = client(&base, "secret", "abc");
        let node = assert_ok!(figma.node("1:1").await);
        assert_eq!(node.name, "Header");

        let err = figma.node("9:9").await.unwrap_err();
        assert!(matches!(err, TreeSourceError::NodeNotFound(id) if id == "9:9"));
    }

    #[tokio::test]
    async fn test_images() {
        let base = spawn_figma().await;
        let images = assert_ok!(client(&base, "secret", "abc").images(&["1:1", "1:3"]).await);
        assert_eq!(
            images.get("1:3"),
            Some(&Some("https://img.example/1:3.png".to_string()))
        );
        assert_eq!(images.len(), 2);
    }
}
