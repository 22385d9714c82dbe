use serde::Deserialize;
use tracing::debug;

use super::service::StructureError;
use crate::content::{ContentNode, NodeKind};
use crate::hits::Scalar;

#[derive(Debug, Deserialize)]
struct RawTree {
    title: String,
    #[serde(rename = "type")]
    kind: String,
    content: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    kind: String,
    title: String,
    #[serde(default)]
    number: Option<Scalar>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "subcontent")]
    content: Option<Vec<RawNode>>,
}

/// Pull the JSON object out of generated text: code fences are dropped, then
/// everything from the first `{` to the last `}` is kept.
pub fn extract_json(generated: &str) -> Option<&str> {
    let text = generated.trim();
    let text = match text.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
            body.rfind("```").map(|end| &body[..end]).unwrap_or(body)
        }
        None => text,
    };
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Validate generated text into a strict content tree rooted at a Document node.
///
/// `type` and `title` are required on every node; anything nested deeper than
/// `max_depth` is rejected.
pub fn parse_tree(generated: &str, max_depth: usize) -> Result<ContentNode, StructureError> {
    let json = extract_json(generated).ok_or(StructureError::NoJson)?;
    let tree: RawTree = serde_json::from_str(json)?;
    debug!("Parsed '{}' ({}) with {} top-level nodes", tree.title, tree.kind, tree.content.len());

    let children = convert_all(tree.content, 1, max_depth)?;
    Ok(ContentNode::new(NodeKind::Document, tree.title).with_children(children))
}

fn convert_all(nodes: Vec<RawNode>, depth: usize, max_depth: usize) -> Result<Vec<ContentNode>, StructureError> {
    if depth > max_depth && !nodes.is_empty() {
        return Err(StructureError::TooDeep(max_depth));
    }
    nodes
        .into_iter()
        .map(|raw| -> Result<ContentNode, StructureError> {
            let children = convert_all(raw.content.unwrap_or_default(), depth + 1, max_depth)?;
            Ok(ContentNode {
                kind: NodeKind::from_label(&raw.kind),
                number: raw
                    .number
                    .map(|n| n.to_text())
                    .filter(|n| !n.trim().is_empty()),
                title: raw.title,
                text: raw.text.unwrap_or_default(),
                children,
            })
        })
        .collect()
}

// ── Tests ──
