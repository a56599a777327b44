use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{EditorError, Result};
use super::fragment::{Fragment, FragmentNode};
use super::node::{NodeData, NodeKind, TextFormat};

/// Version tag of the structured clipboard encoding.
pub const STRUCTURED_VERSION: u32 = 1;

/// What travels through the clipboard: the structured encoding of the
/// copied forest plus a plain-text rendition for every other consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<String>,
    #[serde(default)]
    pub plain_text: String,
}

impl ClipboardPayload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            structured: None,
            plain_text: text.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFragment {
    version: u32,
    roots: Vec<u32>,
    nodes: Vec<WireNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireNode {
    id: u32,
    node: NodeData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<u32>,
}

pub fn serialize(fragment: &Fragment) -> Result<ClipboardPayload> {
    Ok(ClipboardPayload {
        structured: Some(encode_structured(fragment)?),
        plain_text: fragment.plain_text(),
    })
}

/// Parses a payload. The structured form is used only when it passes every
/// consistency check; otherwise the plain text is used instead.
pub fn deserialize(payload: &ClipboardPayload) -> Fragment {
    if let Some(structured) = payload.structured.as_deref() {
        match decode_structured(structured) {
            Ok(fragment) => {
                debug!(roots = fragment.nodes.len(), "decoded structured clipboard payload");
                return fragment;
            }
            Err(err) => {
                warn!(%err, "rejected structured clipboard payload, pasting plain text");
            }
        }
    }
    from_plain_text(&payload.plain_text)
}

pub fn encode_structured(fragment: &Fragment) -> Result<String> {
    let mut wire = WireFragment {
        version: STRUCTURED_VERSION,
        roots: Vec::with_capacity(fragment.nodes.len()),
        nodes: Vec::new(),
    };
    for node in &fragment.nodes {
        let id = flatten(node, &mut wire.nodes);
        wire.roots.push(id);
    }
    serde_json::to_string(&wire).map_err(|err| EditorError::MalformedPayload(err.to_string()))
}

fn flatten(node: &FragmentNode, table: &mut Vec<WireNode>) -> u32 {
    let id = table.len() as u32;
    table.push(WireNode {
        id,
        node: node.data.clone(),
        children: Vec::new(),
    });
    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        children.push(flatten(child, table));
    }
    table[id as usize].children = children;
    id
}

pub fn decode_structured(encoded: &str) -> Result<Fragment> {
    let malformed = |message: String| EditorError::MalformedPayload(message);
    let wire: WireFragment =
        serde_json::from_str(encoded).map_err(|err| malformed(err.to_string()))?;
    if wire.version != STRUCTURED_VERSION {
        return Err(malformed(format!("unsupported version {}", wire.version)));
    }

    let mut table: HashMap<u32, &WireNode> = HashMap::with_capacity(wire.nodes.len());
    for node in &wire.nodes {
        if table.insert(node.id, node).is_some() {
            return Err(malformed(format!("duplicate node id {}", node.id)));
        }
    }

    let mut parents: HashMap<u32, u32> = HashMap::new();
    for node in &wire.nodes {
        for child in &node.children {
            if !table.contains_key(child) {
                return Err(malformed(format!("node {} references missing {child}", node.id)));
            }
            if parents.insert(*child, node.id).is_some() {
                return Err(malformed(format!("node {child} has more than one parent")));
            }
        }
    }

    let mut seen_roots = HashSet::new();
    for root in &wire.roots {
        let Some(node) = table.get(root) else {
            return Err(malformed(format!("root {root} does not exist")));
        };
        if parents.contains_key(root) || !seen_roots.insert(*root) {
            return Err(malformed(format!("root {root} is referenced twice")));
        }
        if !matches!(
            node.node.kind(),
            NodeKind::Paragraph | NodeKind::List | NodeKind::Text | NodeKind::Decorator
        ) {
            return Err(malformed(format!(
                "{} cannot appear at the top level",
                node.node.kind()
            )));
        }
    }

    let mut visited = HashSet::new();
    let mut nodes = Vec::with_capacity(wire.roots.len());
    for root in &wire.roots {
        nodes.push(build(*root, &table, &mut visited, 0)?);
    }
    if visited.len() != table.len() {
        return Err(malformed("payload contains unreachable nodes".into()));
    }
    check_siblings(&nodes)?;
    Ok(Fragment::new(nodes))
}

const MAX_DEPTH: usize = 64;

fn build(
    id: u32,
    table: &HashMap<u32, &WireNode>,
    visited: &mut HashSet<u32>,
    depth: usize,
) -> Result<FragmentNode> {
    let malformed = |message: String| EditorError::MalformedPayload(message);
    if depth > MAX_DEPTH || !visited.insert(id) {
        return Err(malformed(format!("cycle through node {id}")));
    }
    let wire = table
        .get(&id)
        .ok_or_else(|| malformed(format!("node {id} does not exist")))?;
    let kind = wire.node.kind();

    match &wire.node {
        NodeData::Root => return Err(malformed("payload cannot contain a root".into())),
        NodeData::Text { text, .. } if text.is_empty() => {
            return Err(malformed(format!("text node {id} is empty")));
        }
        NodeData::List { .. } if wire.children.is_empty() => {
            return Err(malformed(format!("list {id} has no items")));
        }
        _ => {}
    }

    let mut children = Vec::with_capacity(wire.children.len());
    for child in &wire.children {
        let child_node = build(*child, table, visited, depth + 1)?;
        if !kind.can_contain(child_node.kind()) {
            return Err(malformed(format!(
                "{} cannot contain {}",
                kind,
                child_node.kind()
            )));
        }
        children.push(child_node);
    }
    check_siblings(&children)?;
    Ok(FragmentNode {
        data: wire.node.clone(),
        children,
    })
}

fn check_siblings(nodes: &[FragmentNode]) -> Result<()> {
    let mut previous: Option<TextFormat> = None;
    for node in nodes {
        match &node.data {
            NodeData::Text { format, .. } => {
                if previous == Some(*format) {
                    return Err(EditorError::MalformedPayload(
                        "adjacent runs share a format".into(),
                    ));
                }
                previous = Some(*format);
            }
            _ => previous = None,
        }
    }
    Ok(())
}

/// One paragraph per line; empty lines become empty paragraphs.
pub fn from_plain_text(text: &str) -> Fragment {
    if text.is_empty() {
        return Fragment::default();
    }
    let nodes = text
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                FragmentNode::paragraph(Vec::new())
            } else {
                FragmentNode::paragraph(vec![FragmentNode::text(line)])
            }
        })
        .collect();
    Fragment::new(nodes)
}
