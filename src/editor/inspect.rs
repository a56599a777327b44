use std::fmt::Write;

use super::error::Result;
use super::node::{NodeData, NodeId, TextFormat};
use super::selection::Point;
use super::store::Document;

/// Labels of the structures enclosing `point`, outermost first.
///
/// List items are implied by their list and have no label of their own;
/// plain text runs add nothing.
pub fn breadcrumbs(document: &Document, point: Point) -> Result<Vec<String>> {
    let point = document.resolve_point(point)?;
    let mut chain = Vec::new();
    let mut current = Some(point.node);
    while let Some(id) = current {
        if id == document.root() {
            break;
        }
        chain.push(id);
        current = document.parent(id)?;
    }

    let mut labels = Vec::new();
    for id in chain.into_iter().rev() {
        if let Some(label) = node_label(document.data(id)?) {
            labels.push(label.to_string());
        }
    }
    Ok(labels)
}

fn node_label(data: &NodeData) -> Option<&'static str> {
    match data {
        NodeData::Root | NodeData::ListItem { .. } => None,
        NodeData::Paragraph { .. } => Some("Paragraph"),
        NodeData::List { ordered: true } => Some("Numbered List"),
        NodeData::List { ordered: false } => Some("Bulleted List"),
        NodeData::Text { format, .. } => inline_label(*format),
        NodeData::Decorator { .. } => Some("Decorator"),
    }
}

fn inline_label(format: TextFormat) -> Option<&'static str> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Hashtag => Some("Hashtag"),
    }
}

/// Indented outline of the whole tree, one node per line. Used for trace
/// logging and test failure output.
pub fn describe_tree(document: &Document) -> String {
    let mut out = String::new();
    describe_node(document, document.root(), 0, &mut out);
    out
}

fn describe_node(document: &Document, id: NodeId, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let Ok(node) = document.node(id) else {
        let _ = writeln!(out, "{indent}{id} <missing>");
        return;
    };
    let _ = match node.data() {
        NodeData::Text { text, format } => {
            writeln!(out, "{indent}{id} Text {text:?} {format:?}")
        }
        NodeData::Decorator { text, .. } => writeln!(out, "{indent}{id} Decorator {text:?}"),
        NodeData::List { ordered } => writeln!(out, "{indent}{id} List ordered={ordered}"),
        data => match data.direction() {
            Some(direction) => {
                writeln!(out, "{indent}{id} {} dir={}", data.kind(), direction.as_str())
            }
            None => writeln!(out, "{indent}{id} {}", data.kind()),
        },
    };
    for &child in node.children() {
        describe_node(document, child, depth + 1, out);
    }
}
