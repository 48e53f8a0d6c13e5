//! Read-only element tree snapshots.

use serde::{Deserialize, Serialize};

/// Host-assigned element identifier.
pub type ElementId = String;

/// Kind of a node in the render tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementKind {
    Document,
    Canvas,
    Frame,
    Group,
    Rectangle,
    Ellipse,
    Text,
    Component,
    Instance,
    Vector,
    Line,
    /// Any kind this crate does not model explicitly.
    #[serde(other)]
    Other,
}

impl ElementKind {
    /// Upper-case wire name, as rendered in prompts and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "DOCUMENT",
            Self::Canvas => "CANVAS",
            Self::Frame => "FRAME",
            Self::Group => "GROUP",
            Self::Rectangle => "RECTANGLE",
            Self::Ellipse => "ELLIPSE",
            Self::Text => "TEXT",
            Self::Component => "COMPONENT",
            Self::Instance => "INSTANCE",
            Self::Vector => "VECTOR",
            Self::Line => "LINE",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a tree snapshot.
///
/// Snapshots are supplied by the render host (or fetched from the design
/// service) and are only ever read. Unknown fields in the source JSON are
/// ignored, so a full design-file document deserializes into this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Element>>,
}

impl Element {
    /// Create a leaf element.
    #[must_use]
    pub fn leaf(id: impl Into<ElementId>, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            children: None,
        }
    }

    /// Create an element with children.
    #[must_use]
    pub fn container(
        id: impl Into<ElementId>,
        name: impl Into<String>,
        kind: ElementKind,
        children: Vec<Self>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            children: Some(children),
        }
    }

    /// Children in their original order (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[Self] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Self::node_count).sum::<usize>()
    }
}

/// Depth-first, parent-before-children traversal over a forest.
///
/// Yields `(depth, element)` pairs; roots have depth 0.
pub struct Walk<'a> {
    stack: Vec<(usize, &'a Element)>,
}

impl<'a> Walk<'a> {
    /// Walk every root in order.
    #[must_use]
    pub fn new(roots: &'a [Element]) -> Self {
        Self {
            stack: roots.iter().rev().map(|e| (0, e)).collect(),
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, element) = self.stack.pop()?;
        self.stack
            .extend(element.children().iter().rev().map(|c| (depth + 1, c)));
        Some((depth, element))
    }
}

/// Compact `{id, name, type}` view of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: ElementId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
}

impl From<&Element> for NodeSummary {
    fn from(element: &Element) -> Self {
        Self {
            id: element.id.clone(),
            name: element.name.clone(),
            kind: element.kind,
        }
    }
}

/// Full design document as returned by the tree source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub name: String,
    pub document: Element,
    #[serde(default)]
    pub schema_version: u32,
}

impl DocumentSnapshot {
    /// Lightweight description of the document.
    #[must_use]
    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.document.name.clone(),
            schema_version: self.schema_version,
            node_count: self.document.node_count(),
        }
    }
}

/// Summary of a design document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub schema_version: u32,
    pub node_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<Element> {
        vec![
            Element::container(
                "1",
                "Page",
                ElementKind::Canvas,
                vec![
                    Element::container(
                        "2",
                        "Card",
                        ElementKind::Frame,
                        vec![Element::leaf("3", "Title", ElementKind::Text)],
                    ),
                    Element::leaf("4", "Footer", ElementKind::Rectangle),
                ],
            ),
            Element::leaf("5", "Loose", ElementKind::Ellipse),
        ]
    }

    #[test]
    fn test_walk_is_preorder() {
        let roots = tree();
        let visited: Vec<(usize, &str)> = Walk::new(&roots)
            .map(|(d, e)| (d, e.id.as_str()))
            .collect();
        assert_eq!(
            visited,
            vec![(0, "1"), (1, "2"), (2, "3"), (1, "4"), (0, "5")]
        );
    }

    #[test]
    fn test_node_count() {
        let roots = tree();
        assert_eq!(roots[0].node_count(), 4);
        assert_eq!(roots[1].node_count(), 1);
    }

    #[test]
    fn test_unknown_kind_and_extra_fields() {
        let json = r#"{"id":"9:1","name":"Star","type":"STAR","fills":[],"absoluteBoundingBox":{}}"#;
        let element: Element = serde_json::from_str(json).unwrap();
        assert_eq!(element.kind, ElementKind::Other);
        assert!(element.children.is_none());
    }

    #[test]
    fn test_document_metadata() {
        let json = r#"{
            "name": "Landing",
            "schemaVersion": 14,
            "components": {},
            "document": {"id": "0:0", "name": "Document", "type": "DOCUMENT", "children": [
                {"id": "0:1", "name": "Page 1", "type": "CANVAS", "children": []}
            ]}
        }"#;
        let snapshot: DocumentSnapshot = serde_json::from_str(json).unwrap();
        let meta = snapshot.metadata();
        assert_eq!(meta.name, "Document");
        assert_eq!(meta.schema_version, 14);
        assert_eq!(meta.node_count, 2);
    }
}
