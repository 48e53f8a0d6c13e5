//! Prompt construction for the language model.

use std::fmt::Write as _;

use serde_json::Value;
use voice_canvas_core::{CommandContext, NodeSummary};

const ROLE: &str = "You are a design assistant for a vector design tool. \
Convert commands into structured design operations.";

const PROPERTY_RULES: &str = r#"IMPORTANT RULES:
1. For CREATE commands: use "properties" with "elementType" (rectangle/ellipse/circle/text/frame), "width", "height", "x", "y", "fills", "name"
2. For MODIFY/STYLE/DELETE commands: Use the EXACT node names from the available nodes list above. If the user says "header" or "headers", look for nodes containing "header" in the list.
3. For color fills: use format { "fills": [{ "type": "SOLID", "color": { "r": 0-1, "g": 0-1, "b": 0-1 } }] }
4. For fontSize: use actual number values (e.g., 24, 32, 48), not strings like "increase" or "larger"
5. If user says "button" or "buttons", match any node name containing "button" (case insensitive)
6. For plurals like "headers", "buttons", use the singular form or find all matching nodes"#;

const RESPONSE_FORMAT: &str = r#"Response format:
{
  "command": {
    "type": "create" | "modify" | "delete" | "style" | "move" | "resize",
    "target": "exact node name to find (use names from available nodes list)",
    "properties": {
      // For CREATE: { "elementType": "rectangle", "width": 200, "height": 100, "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 1}}], "name": "Button" }
      // For MODIFY: { "fontSize": 32, "characters": "new text", "opacity": 0.5 }
      // For STYLE: { "fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0}}] }
      // For MOVE: { "x": 100, "y": 200 }
      // For RESIZE: { "width": 300, "height": 150 }
    },
    "rawText": "the original command text"
  },
  "confidence": 0.95,
  "explanation": "brief explanation"
}"#;

const EXAMPLES: &str = r#"Examples:
- "Create a blue button" -> {"command": {"type": "create", "properties": {"elementType": "rectangle", "width": 120, "height": 40, "fills": [{"type": "SOLID", "color": {"r": 0.2, "g": 0.4, "b": 1}}], "name": "Button"}}}
- "Make header larger" (if "My Header" exists) -> {"command": {"type": "modify", "target": "header", "properties": {"fontSize": 48}}}
- "Move the login button to the right" -> {"command": {"type": "move", "target": "login button", "properties": {"x": 300}}}
- "Delete the footer" -> {"command": {"type": "delete", "target": "footer"}}
- "Change background to red" -> {"command": {"type": "style", "target": "background", "properties": {"fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0}}]}}}"#;

fn node_list(title: &str, nodes: &[NodeSummary]) -> String {
    if nodes.is_empty() {
        return String::new();
    }
    let mut out = format!("\n\n{title}:");
    for node in nodes {
        let _ = write!(out, "\n- \"{}\" ({})", node.name, node.kind);
    }
    out
}

/// Prompt for a typed instruction.
#[must_use]
pub fn text_prompt(text: &str, context: Option<&CommandContext>) -> String {
    let (selected, available) = context.map_or_else(Default::default, |ctx| {
        (
            node_list("CURRENTLY SELECTED", &ctx.selection),
            node_list("AVAILABLE NODES IN FILE", &ctx.all_nodes),
        )
    });

    format!(
        "{ROLE}{selected}{available}\n\n\
         Analyze the command and respond ONLY with a valid JSON object (no markdown, no extra text).\n\n\
         {PROPERTY_RULES}\n\n{RESPONSE_FORMAT}\n\n{EXAMPLES}\n\nCommand: {text}"
    )
}

/// Prompt sent alongside recorded audio.
#[must_use]
pub fn voice_prompt(context: Option<&CommandContext>) -> String {
    let context = context
        .and_then(|ctx| serde_json::to_string(ctx).ok())
        .map(|json| format!("\n\nCurrent design context: {json}"))
        .unwrap_or_default();

    format!(
        "{ROLE} The command is in the attached audio recording.{context}\n\n\
         Transcribe the command into \"rawText\" and respond ONLY with a valid JSON object.\n\n\
         {PROPERTY_RULES}\n\n{RESPONSE_FORMAT}\n\n{EXAMPLES}"
    )
}

/// Prompt asking for follow-up instructions.
#[must_use]
pub fn suggestions_prompt(state: &Value) -> String {
    let state = serde_json::to_string_pretty(state).unwrap_or_else(|_| state.to_string());
    format!(
        "Based on this design file state: {state}\n\n\
         Suggest 3-5 helpful voice commands the user could say to improve or modify this design.\n\
         Return ONLY a JSON array of suggestion strings."
    )
}
