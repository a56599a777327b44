use thiserror::Error;

use super::node::{NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("node {0} does not exist")]
    NotFound(NodeId),

    #[error("offset {offset} is out of bounds for node {node} (length {len})")]
    InvalidOffset {
        node: NodeId,
        offset: usize,
        len: usize,
    },

    #[error("node {0} is not a text node")]
    NotText(NodeId),

    #[error("a {child} node cannot be placed inside a {parent} node")]
    InvalidStructure { parent: NodeKind, child: NodeKind },

    #[error("malformed clipboard payload: {0}")]
    MalformedPayload(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("document invariant violated: {0}")]
    Corrupted(String),
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
