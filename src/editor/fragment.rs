use super::node::{NodeData, NodeKind};

/// Detached, owned copy of a subtree. Fragments never reference live
/// nodes, so they can outlive any edit of the document they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentNode {
    pub data: NodeData,
    pub children: Vec<FragmentNode>,
}

impl FragmentNode {
    pub fn new(data: NodeData) -> Self {
        Self {
            data,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<FragmentNode>) -> Self {
        self.children = children;
        self
    }

    pub fn paragraph(children: Vec<FragmentNode>) -> Self {
        Self::new(NodeData::paragraph()).with_children(children)
    }

    pub fn list(ordered: bool, items: Vec<FragmentNode>) -> Self {
        Self::new(NodeData::list(ordered)).with_children(items)
    }

    pub fn list_item(children: Vec<FragmentNode>) -> Self {
        Self::new(NodeData::list_item()).with_children(children)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeData::text(text))
    }

    pub fn hashtag(text: impl Into<String>) -> Self {
        Self::new(NodeData::hashtag(text))
    }

    pub fn decorator(text: impl Into<String>) -> Self {
        Self::new(NodeData::decorator(text))
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Flattened text of the subtree. Blocks below this node are separated
    /// by line breaks.
    pub fn text_content(&self) -> String {
        if let Some(text) = self.data.text_payload() {
            return text.to_string();
        }
        let separator = if self.kind().is_block() { "" } else { "\n" };
        self.children
            .iter()
            .map(FragmentNode::text_content)
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub(crate) fn caret_len(&self) -> usize {
        if self.kind().is_leaf() {
            self.data.caret_len()
        } else {
            self.children.iter().map(FragmentNode::caret_len).sum()
        }
    }
}

/// Ordered forest produced by extraction and consumed by the splice engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    pub nodes: Vec<FragmentNode>,
}

impl Fragment {
    pub fn new(nodes: Vec<FragmentNode>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Plain-text rendition: one line per top-level block, consecutive
    /// top-level leaves sharing a line.
    pub fn plain_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut inline: Option<String> = None;
        for node in &self.nodes {
            if node.kind().is_leaf() {
                inline
                    .get_or_insert_with(String::new)
                    .push_str(&node.text_content());
                continue;
            }
            if let Some(line) = inline.take() {
                lines.push(line);
            }
            lines.push(node.text_content());
        }
        if let Some(line) = inline {
            lines.push(line);
        }
        lines.join("\n")
    }
}
