//! In-memory scene graph that executes commands.

use serde::Serialize;
use serde_json::Value;
use voice_canvas_core::{
    Applied, Command, CommandAction, CommandContext, CommandExecutor, Element, ElementId,
    ElementKind, ExecutionError, NodeSummary, resolve_target,
    command::{CreateProps, ModifyProps, MoveProps, ResizeProps, ShapeKind, StyleProps},
    resolver::{SUGGESTION_DEPTH_LIMIT, context_nodes},
};

use crate::paint::parse_paints;

/// Characters of a text node created without any.
pub const DEFAULT_TEXT: &str = "New Text";

/// Font size of newly created text.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

const PAGE_ID: &str = "0:1";

/// A node of the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id: ElementId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
    pub fills: Vec<Value>,
    pub strokes: Vec<Value>,
    pub effects: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Create a node with default geometry for its kind.
    #[must_use]
    pub fn new(id: impl Into<ElementId>, name: impl Into<String>, kind: ElementKind) -> Self {
        let text = kind == ElementKind::Text;
        let rounded = matches!(
            kind,
            ElementKind::Rectangle
                | ElementKind::Frame
                | ElementKind::Component
                | ElementKind::Instance
        );
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            x: 0.0,
            y: 0.0,
            width: CreateProps::DEFAULT_WIDTH,
            height: CreateProps::DEFAULT_HEIGHT,
            opacity: 1.0,
            fills: Vec::new(),
            strokes: Vec::new(),
            effects: Vec::new(),
            corner_radius: rounded.then_some(0.0),
            characters: text.then(|| DEFAULT_TEXT.to_owned()),
            font_size: text.then_some(DEFAULT_FONT_SIZE),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        self.kind == ElementKind::Text
    }

    /// Read-only element view of this subtree.
    #[must_use]
    pub fn to_element(&self) -> Element {
        if self.children.is_empty() && !is_container(self.kind) {
            return Element::leaf(self.id.clone(), self.name.clone(), self.kind);
        }
        Element::container(
            self.id.clone(),
            self.name.clone(),
            self.kind,
            self.children.iter().map(Self::to_element).collect(),
        )
    }

    /// Find a node in this subtree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Remove a strict descendant. Returns whether it was found.
    fn remove_descendant(&mut self, id: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c.id != id);
        if self.children.len() != before {
            return true;
        }
        self.children.iter_mut().any(|c| c.remove_descendant(id))
    }

    fn apply_modify(&mut self, props: &ModifyProps) {
        if let Some(name) = &props.name {
            self.name.clone_from(name);
        }
        if self.is_text() {
            if let Some(size) = props.font_size {
                self.font_size = Some(size);
            }
            if let Some(characters) = &props.characters {
                self.characters = Some(characters.clone());
            }
        }
        if let Some(opacity) = props.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    fn apply_style(&mut self, props: &StyleProps) {
        if let Some(fills) = &props.fills {
            self.fills = parse_paints(fills);
        }
        if let Some(strokes) = &props.strokes {
            self.strokes = parse_paints(strokes);
        }
        if let Some(effects) = &props.effects {
            self.effects.clone_from(effects);
        }
        if let (Some(radius), Some(current)) = (props.corner_radius, self.corner_radius.as_mut()) {
            *current = radius;
        }
    }

    fn apply_move(&mut self, props: &MoveProps) {
        if let Some(x) = props.x {
            self.x = x;
        }
        if let Some(y) = props.y {
            self.y = y;
        }
    }

    /// Resize only when both dimensions are given.
    fn apply_resize(&mut self, props: &ResizeProps) -> bool {
        let (Some(width), Some(height)) = (props.width, props.height) else {
            return false;
        };
        self.width = width;
        self.height = height;
        true
    }
}

const fn is_container(kind: ElementKind) -> bool {
    matches!(
        kind,
        ElementKind::Document
            | ElementKind::Canvas
            | ElementKind::Frame
            | ElementKind::Group
            | ElementKind::Component
            | ElementKind::Instance
    )
}

const fn default_name(shape: ShapeKind) -> &'static str {
    match shape {
        ShapeKind::Ellipse => "Ellipse",
        ShapeKind::Text => "Text",
        ShapeKind::Frame => "Frame",
        ShapeKind::Rectangle | ShapeKind::Unknown => "Rectangle",
    }
}

const fn element_kind(shape: ShapeKind) -> ElementKind {
    match shape {
        ShapeKind::Ellipse => ElementKind::Ellipse,
        ShapeKind::Text => ElementKind::Text,
        ShapeKind::Frame => ElementKind::Frame,
        ShapeKind::Rectangle | ShapeKind::Unknown => ElementKind::Rectangle,
    }
}

/// Reference render host: one document with a single page.
#[derive(Debug, Clone)]
pub struct Canvas {
    name: String,
    page: SceneNode,
    selection: Vec<ElementId>,
    next_id: u32,
}

impl Canvas {
    #[must_use]
    pub fn new(name: impl Into<String>, page_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page: SceneNode::new(PAGE_ID, page_name, ElementKind::Canvas),
            selection: Vec::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn page(&self) -> &SceneNode {
        &self.page
    }

    #[must_use]
    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&SceneNode> {
        self.page.find(id)
    }

    /// First node whose name is exactly `name`, depth-first.
    #[must_use]
    pub fn node_named(&self, name: &str) -> Option<&SceneNode> {
        fn walk<'a>(node: &'a SceneNode, name: &str) -> Option<&'a SceneNode> {
            if node.name == name {
                return Some(node);
            }
            node.children.iter().find_map(|c| walk(c, name))
        }
        walk(&self.page, name)
    }

    fn allocate_id(&mut self) -> ElementId {
        let id = format!("1:{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a node under `parent` (the page when `None`).
    ///
    /// Returns `None` if the parent does not exist.
    pub fn add(
        &mut self,
        parent: Option<&str>,
        name: impl Into<String>,
        kind: ElementKind,
    ) -> Option<ElementId> {
        let id = self.allocate_id();
        let node = SceneNode::new(id.clone(), name, kind);
        let parent = match parent {
            Some(parent) => self.page.find_mut(parent)?,
            None => &mut self.page,
        };
        parent.children.push(node);
        Some(id)
    }

    /// Replace the selection.
    pub fn select(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.page.find(id).is_some())
            .collect();
    }

    /// Describe the document for the translation gateway.
    #[must_use]
    pub fn file_context(&self) -> CommandContext {
        let page = self.page.to_element();
        let all_nodes = context_nodes(std::slice::from_ref(&page), SUGGESTION_DEPTH_LIMIT);
        let selection = self
            .selection
            .iter()
            .filter_map(|id| self.page.find(id))
            .map(|node| NodeSummary {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: node.kind,
            })
            .collect();
        CommandContext {
            name: Some(self.name.clone()),
            page_name: Some(self.page.name.clone()),
            node_count: Some(all_nodes.len()),
            all_nodes,
            selection,
            ..CommandContext::default()
        }
    }

    fn create(&mut self, props: &CreateProps) -> ElementId {
        let shape = props.shape();
        let id = self.allocate_id();
        let name = props.name.clone().unwrap_or_else(|| default_name(shape).to_owned());

        let mut node = SceneNode::new(id.clone(), name, element_kind(shape));
        node.width = props.width();
        node.height = props.height();
        node.x = props.x();
        node.y = props.y();
        if node.is_text() {
            if let Some(text) = props.text.as_ref().filter(|t| !t.is_empty()) {
                node.characters = Some(text.clone());
            }
        }
        if let Some(fills) = &props.fills {
            node.fills = parse_paints(fills);
        }

        tracing::debug!(id = %id, kind = %node.kind, "created node");
        self.page.children.push(node);
        self.selection = vec![id.clone()];
        id
    }

    /// Apply `change` to every node the command's target resolves to.
    fn update_matches(
        &mut self,
        command: &Command,
        mut change: impl FnMut(&mut SceneNode) -> bool,
    ) -> Result<Vec<ElementId>, ExecutionError> {
        let ids = resolve_target(&self.snapshot(), command)?;
        tracing::debug!(
            matches = ids.len(),
            element = command.target().unwrap_or_default(),
            "updating nodes"
        );
        Ok(ids
            .into_iter()
            .filter(|id| self.page.find_mut(id).is_some_and(&mut change))
            .collect())
    }

    fn delete_matches(&mut self, command: &Command) -> Result<Vec<ElementId>, ExecutionError> {
        let ids = resolve_target(&self.snapshot(), command)?;
        let mut removed = Vec::new();
        for id in ids {
            // Descendants of an already removed match are gone with it.
            if self.page.remove_descendant(&id) {
                removed.push(id);
            }
        }
        self.selection.retain(|id| self.page.find(id).is_some());
        Ok(removed)
    }
}

impl CommandExecutor for Canvas {
    fn snapshot(&self) -> Vec<Element> {
        vec![self.page.to_element()]
    }

    fn apply(&mut self, command: &Command) -> Result<Applied, ExecutionError> {
        let affected = match &command.action {
            CommandAction::Create(props) => vec![self.create(props)],
            CommandAction::Modify { props, .. } => self.update_matches(command, |node| {
                node.apply_modify(props);
                true
            })?,
            CommandAction::Delete { .. } => self.delete_matches(command)?,
            CommandAction::Style { props, .. } => self.update_matches(command, |node| {
                node.apply_style(props);
                true
            })?,
            CommandAction::Move { props, .. } => self.update_matches(command, |node| {
                node.apply_move(props);
                true
            })?,
            CommandAction::Resize { props, .. } => {
                self.update_matches(command, |node| node.apply_resize(props))?
            }
        };

        Ok(Applied {
            command_type: command.command_type(),
            affected,
        })
    }
}
