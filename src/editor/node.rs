use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable handle of a node inside a [`Document`](super::Document) arena.
///
/// Freed slots are recycled with a bumped generation, so a handle that
/// outlived its node resolves to `NotFound` instead of addressing the node
/// that took its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self::new(index, 0)
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Paragraph,
    List,
    ListItem,
    Text,
    Decorator,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::Decorator)
    }

    /// Blocks hold inline content directly and survive normalization even
    /// when empty.
    pub fn is_block(self) -> bool {
        matches!(self, NodeKind::Paragraph | NodeKind::ListItem)
    }

    pub fn can_contain(self, child: NodeKind) -> bool {
        match self {
            NodeKind::Root => matches!(child, NodeKind::Paragraph | NodeKind::List),
            NodeKind::Paragraph | NodeKind::ListItem => child.is_leaf(),
            NodeKind::List => child == NodeKind::ListItem,
            NodeKind::Text | NodeKind::Decorator => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::Paragraph => "Paragraph",
            NodeKind::List => "List",
            NodeKind::ListItem => "List Item",
            NodeKind::Text => "Text",
            NodeKind::Decorator => "Decorator",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    #[default]
    Plain,
    Hashtag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Payload of a node. The variant is the node's kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    Root,
    Paragraph {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<Direction>,
    },
    List {
        #[serde(default)]
        ordered: bool,
    },
    ListItem {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<Direction>,
    },
    Text {
        text: String,
        #[serde(default)]
        format: TextFormat,
    },
    Decorator {
        text: String,
        #[serde(default)]
        format: TextFormat,
    },
}

impl NodeData {
    pub fn paragraph() -> Self {
        NodeData::Paragraph { direction: None }
    }

    pub fn list(ordered: bool) -> Self {
        NodeData::List { ordered }
    }

    pub fn list_item() -> Self {
        NodeData::ListItem { direction: None }
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeData::Text {
            text: text.into(),
            format: TextFormat::Plain,
        }
    }

    pub fn hashtag(text: impl Into<String>) -> Self {
        NodeData::Text {
            text: text.into(),
            format: TextFormat::Hashtag,
        }
    }

    pub fn decorator(text: impl Into<String>) -> Self {
        NodeData::Decorator {
            text: text.into(),
            format: TextFormat::Plain,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Root => NodeKind::Root,
            NodeData::Paragraph { .. } => NodeKind::Paragraph,
            NodeData::List { .. } => NodeKind::List,
            NodeData::ListItem { .. } => NodeKind::ListItem,
            NodeData::Text { .. } => NodeKind::Text,
            NodeData::Decorator { .. } => NodeKind::Decorator,
        }
    }

    /// Payload of a leaf; `None` for elements.
    pub fn text_payload(&self) -> Option<&str> {
        match self {
            NodeData::Text { text, .. } | NodeData::Decorator { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn format(&self) -> Option<TextFormat> {
        match self {
            NodeData::Text { format, .. } | NodeData::Decorator { format, .. } => Some(*format),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            NodeData::Paragraph { direction } | NodeData::ListItem { direction } => *direction,
            _ => None,
        }
    }

    pub(crate) fn set_direction(&mut self, value: Option<Direction>) {
        if let NodeData::Paragraph { direction } | NodeData::ListItem { direction } = self {
            *direction = value;
        }
    }

    pub(crate) fn set_format(&mut self, value: TextFormat) {
        if let NodeData::Text { format, .. } | NodeData::Decorator { format, .. } = self {
            *format = value;
        }
    }

    /// Caret width of a leaf. A decorator is a single atomic unit.
    pub fn caret_len(&self) -> usize {
        match self {
            NodeData::Text { text, .. } => text.chars().count(),
            NodeData::Decorator { .. } => 1,
            _ => 0,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.set_direction(Some(direction));
        self
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) data: NodeData,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}
