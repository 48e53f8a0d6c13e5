//! Document context handed to the translation gateway.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::{DocumentSnapshot, NodeSummary};
use crate::resolver::{SUGGESTION_DEPTH_LIMIT, context_nodes};

/// What the language model is told about the current document.
///
/// Render hosts send this shape as the `context` of a voice command or as a
/// `file-data` payload. Every field is optional and keys this type does not
/// model are kept in `metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_nodes: Vec<NodeSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<NodeSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<usize>,

    /// Arbitrary extra keys sent by the client.
    #[serde(flatten)]
    pub metadata: HashMap<String, Value>,
}

impl CommandContext {
    /// Decode a client-supplied context object.
    ///
    /// A value that does not fit the typed fields is kept whole under the
    /// `raw` metadata key rather than rejected.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::debug!("context does not match the expected shape: {e}");
                let mut ctx = Self::default();
                ctx.set_metadata("raw", value);
                ctx
            }
        }
    }

    /// Build a context from a freshly fetched document.
    #[must_use]
    pub fn from_document(snapshot: &DocumentSnapshot) -> Self {
        let document = &snapshot.document;
        let all_nodes = context_nodes(document.children(), SUGGESTION_DEPTH_LIMIT);
        Self {
            name: Some(document.name.clone()),
            node_count: Some(all_nodes.len()),
            child_count: Some(document.children().len()),
            all_nodes,
            ..Self::default()
        }
    }

    /// Get a metadata value by key.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Node count as reported by the client, falling back to `allNodes`.
    #[must_use]
    pub fn reported_node_count(&self) -> usize {
        self.node_count.unwrap_or(self.all_nodes.len())
    }
}
