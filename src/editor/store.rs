use std::collections::HashSet;

use tracing::trace;

use super::content::split_text;
use super::error::{EditorError, Result};
use super::fragment::{Fragment, FragmentNode};
use super::node::{Direction, Node, NodeData, NodeId, NodeKind, TextFormat};

/// Arena-backed document tree.
///
/// Every relationship is stored as a [`NodeId`]; the root owns the block
/// list, blocks own their inline leaves. Freed slots go on a free list and
/// are handed out again under a new generation.
#[derive(Clone, Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

impl Slot {
    fn occupied(node: Node) -> Self {
        Self {
            generation: 0,
            node: Some(node),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document holding a single empty paragraph.
    pub fn new() -> Self {
        let root = NodeId::new(0, 0);
        let paragraph = NodeId::new(1, 0);
        let mut root_node = Node::new(NodeData::Root);
        root_node.children.push(paragraph);
        let mut paragraph_node = Node::new(NodeData::paragraph());
        paragraph_node.parent = Some(root);
        Self {
            slots: vec![Slot::occupied(root_node), Slot::occupied(paragraph_node)],
            free: Vec::new(),
            root,
        }
    }

    /// Builds a normalized document from top-level block fragments.
    pub fn from_blocks(blocks: Vec<FragmentNode>) -> Result<Self> {
        let root = NodeId::new(0, 0);
        let mut document = Self {
            slots: vec![Slot::occupied(Node::new(NodeData::Root))],
            free: Vec::new(),
            root,
        };
        for (index, block) in blocks.iter().enumerate() {
            let id = document.instantiate(block)?;
            document.insert_child(root, index, id)?;
        }
        document.normalize(root)?;
        Ok(document)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
            .ok_or(EditorError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
            .ok_or(EditorError::NotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.kind())
    }

    pub fn data(&self, id: NodeId) -> Result<&NodeData> {
        Ok(&self.node(id)?.data)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn child_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.children.len())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Parent and index of `id`, or `None` for the root and detached nodes.
    pub fn position(&self, id: NodeId) -> Result<Option<(NodeId, usize)>> {
        let Some(parent) = self.parent(id)? else {
            return Ok(None);
        };
        let index = self
            .children(parent)?
            .iter()
            .position(|child| *child == id)
            .ok_or_else(|| {
                EditorError::Corrupted(format!("{id} is missing from its parent {parent}"))
            })?;
        Ok(Some((parent, index)))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Ok(Some(parent)) => current = parent,
                _ => return false,
            }
        }
    }

    // ========================================================================
    // Mutation primitives
    // ========================================================================

    /// Allocates a detached node, reusing a freed slot when there is one.
    pub fn create_node(&mut self, data: NodeData) -> NodeId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.node = Some(Node::new(data));
                return NodeId::new(index, slot.generation);
            }
        }
        self.slots.push(Slot::occupied(Node::new(data)));
        NodeId::new(self.slots.len() - 1, 0)
    }

    /// Attaches a detached node under `parent`. The index is clamped to the
    /// current child count.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        let parent_kind = self.kind(parent)?;
        let child_kind = self.kind(child)?;
        let structure_error = EditorError::InvalidStructure {
            parent: parent_kind,
            child: child_kind,
        };
        if !parent_kind.can_contain(child_kind) || child == self.root {
            return Err(structure_error);
        }
        if self.parent(child)?.is_some() {
            return Err(structure_error);
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(structure_error);
            }
            ancestor = self.parent(current)?;
        }

        let parent_node = self.node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let len = self.child_count(parent)?;
        self.insert_child(parent, len, child)
    }

    /// Detaches the child at `index` and returns it. The subtree stays
    /// allocated so that it can be attached elsewhere.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let parent_node = self.node_mut(parent)?;
        let len = parent_node.children.len();
        if index >= len {
            return Err(EditorError::InvalidOffset {
                node: parent,
                offset: index,
                len,
            });
        }
        let child = parent_node.children.remove(index);
        self.node_mut(child)?.parent = None;
        Ok(child)
    }

    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        if let Some((parent, index)) = self.position(id)? {
            self.remove_child(parent, index)?;
        }
        Ok(())
    }

    /// Detaches `id` and frees its whole subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            if slot.generation != current.generation() {
                continue;
            }
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index());
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Detaches every child of `parent` from `from` onward, keeping order.
    pub(crate) fn take_children(&mut self, parent: NodeId, from: usize) -> Result<Vec<NodeId>> {
        let parent_node = self.node_mut(parent)?;
        let from = from.min(parent_node.children.len());
        let taken: Vec<NodeId> = parent_node.children.split_off(from);
        for child in &taken {
            self.node_mut(*child)?.parent = None;
        }
        Ok(taken)
    }

    pub(crate) fn append_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<()> {
        for child in children {
            self.append_child(parent, child)?;
        }
        Ok(())
    }

    /// Splits a text leaf at a caret offset. The right half keeps the
    /// format and becomes the next sibling.
    pub fn split_text(&mut self, node: NodeId, offset: usize) -> Result<(NodeId, NodeId)> {
        let (text, format) = match self.data(node)? {
            NodeData::Text { text, format } => (text.clone(), *format),
            _ => return Err(EditorError::NotText(node)),
        };
        let len = text.chars().count();
        if offset > len {
            return Err(EditorError::InvalidOffset { node, offset, len });
        }
        let (left, right) = split_text(&text, offset);
        self.set_text(node, left)?;
        let right_id = self.create_node(NodeData::Text {
            text: right,
            format,
        });
        if let Some((parent, index)) = self.position(node)? {
            self.insert_child(parent, index + 1, right_id)?;
        }
        Ok((node, right_id))
    }

    pub(crate) fn set_text(&mut self, id: NodeId, value: String) -> Result<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text { text, .. } | NodeData::Decorator { text, .. } => {
                *text = value;
                Ok(())
            }
            _ => Err(EditorError::NotText(id)),
        }
    }

    pub(crate) fn set_format(&mut self, id: NodeId, format: TextFormat) -> Result<()> {
        self.node_mut(id)?.data.set_format(format);
        Ok(())
    }

    pub(crate) fn set_direction(&mut self, id: NodeId, direction: Option<Direction>) -> Result<()> {
        self.node_mut(id)?.data.set_direction(direction);
        Ok(())
    }

    pub(crate) fn set_data(&mut self, id: NodeId, data: NodeData) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.kind() != data.kind() {
            return Err(EditorError::Corrupted(format!(
                "cannot turn {} {id} into {}",
                node.kind(),
                data.kind()
            )));
        }
        node.data = data;
        Ok(())
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    /// Restores the structural invariants below `subtree` and on its
    /// ancestors: empty text leaves go away, adjacent runs of one format
    /// coalesce, lists without items are dropped, and an empty root
    /// receives a fresh paragraph. Blocks are never removed.
    pub fn normalize(&mut self, subtree: NodeId) -> Result<()> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(subtree)?;
        while let Some(ancestor) = current {
            ancestors.push(ancestor);
            current = self.parent(ancestor)?;
        }

        self.normalize_node(subtree)?;
        for ancestor in ancestors {
            self.tidy_children(ancestor)?;
        }
        Ok(())
    }

    fn normalize_node(&mut self, id: NodeId) -> Result<()> {
        let children = self.children(id)?.to_vec();
        for child in children {
            if !self.kind(child)?.is_leaf() {
                self.normalize_node(child)?;
            }
        }
        self.tidy_children(id)
    }

    fn tidy_children(&mut self, id: NodeId) -> Result<()> {
        let mut index = 0;
        while index < self.child_count(id)? {
            let child = self.children(id)?[index];
            let discard = match self.data(child)? {
                NodeData::Text { text, .. } => text.is_empty(),
                NodeData::List { .. } => self.child_count(child)? == 0,
                _ => false,
            };
            if discard {
                trace!(node = %child, parent = %id, "normalize: dropping empty node");
                self.remove_node(child)?;
                continue;
            }

            if index > 0 {
                let previous = self.children(id)?[index - 1];
                if self.same_format_runs(previous, child)? {
                    let appended = self.leaf_text(child)?.to_string();
                    let mut merged = self.leaf_text(previous)?.to_string();
                    merged.push_str(&appended);
                    self.set_text(previous, merged)?;
                    self.remove_node(child)?;
                    continue;
                }
            }
            index += 1;
        }

        if self.kind(id)? == NodeKind::Root && self.child_count(id)? == 0 {
            let paragraph = self.create_node(NodeData::paragraph());
            self.insert_child(id, 0, paragraph)?;
        }
        Ok(())
    }

    fn same_format_runs(&self, left: NodeId, right: NodeId) -> Result<bool> {
        Ok(match (self.data(left)?, self.data(right)?) {
            (NodeData::Text { format: a, .. }, NodeData::Text { format: b, .. }) => a == b,
            _ => false,
        })
    }

    /// Verifies every structural invariant of an attached tree.
    pub fn check_invariants(&self) -> Result<()> {
        let corrupted = |message: String| EditorError::Corrupted(message);
        let root = self
            .node(self.root)
            .map_err(|_| corrupted("root node is missing".into()))?;
        if root.kind() != NodeKind::Root || root.parent.is_some() {
            return Err(corrupted("root node is not a detached Root".into()));
        }
        if root.children.is_empty() {
            return Err(corrupted("document has no blocks".into()));
        }

        let mut seen = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(corrupted(format!("{id} is reachable twice")));
            }
            let node = self
                .node(id)
                .map_err(|_| corrupted(format!("{id} is referenced but freed")))?;
            let kind = node.kind();
            if kind.is_leaf() && !node.children.is_empty() {
                return Err(corrupted(format!("leaf {id} has children")));
            }
            if kind == NodeKind::List && node.children.is_empty() {
                return Err(corrupted(format!("list {id} has no items")));
            }
            if let NodeData::Text { text, .. } = &node.data {
                if text.is_empty() {
                    return Err(corrupted(format!("text {id} is empty")));
                }
            }

            let mut previous_format: Option<TextFormat> = None;
            for &child in &node.children {
                let child_node = self
                    .node(child)
                    .map_err(|_| corrupted(format!("{id} references freed child {child}")))?;
                if child_node.parent != Some(id) {
                    return Err(corrupted(format!("{child} does not point back at {id}")));
                }
                if !kind.can_contain(child_node.kind()) {
                    return Err(corrupted(format!(
                        "{} {child} placed inside {kind} {id}",
                        child_node.kind()
                    )));
                }
                match &child_node.data {
                    NodeData::Text { format, .. } => {
                        if previous_format == Some(*format) {
                            return Err(corrupted(format!("{child} was not merged into its sibling")));
                        }
                        previous_format = Some(*format);
                    }
                    _ => previous_format = None,
                }
                stack.push(child);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Traversal helpers
    // ========================================================================

    /// Child-index path from the root to `id`.
    pub fn path_of(&self, id: NodeId) -> Result<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = id;
        while current != self.root {
            let Some((parent, index)) = self.position(current)? else {
                return Err(EditorError::InvalidSelection(format!(
                    "{id} is not attached to the document"
                )));
            };
            path.push(index);
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    pub fn node_at_path(&self, path: &[usize]) -> Result<NodeId> {
        let mut current = self.root;
        for &index in path {
            current = *self.children(current)?.get(index).ok_or_else(|| {
                EditorError::InvalidSelection(format!("no node at path {path:?}"))
            })?;
        }
        Ok(current)
    }

    pub fn depth(&self, id: NodeId) -> Result<usize> {
        Ok(self.path_of(id)?.len())
    }

    /// Nearest block at or above `id`.
    pub fn block_of(&self, id: NodeId) -> Result<Option<NodeId>> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if self.kind(candidate)?.is_block() {
                return Ok(Some(candidate));
            }
            current = self.parent(candidate)?;
        }
        Ok(None)
    }

    /// Every block in document order.
    pub fn blocks(&self) -> Result<Vec<NodeId>> {
        let mut blocks = Vec::new();
        for &top in self.children(self.root)? {
            match self.kind(top)? {
                NodeKind::List => blocks.extend_from_slice(self.children(top)?),
                _ => blocks.push(top),
            }
        }
        Ok(blocks)
    }

    /// Leaves below `id` in document order.
    pub fn leaves(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            if node.kind().is_leaf() {
                leaves.push(current);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        Ok(leaves)
    }

    pub fn first_leaf(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.leaves(id)?.first().copied())
    }

    pub fn last_leaf(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.leaves(id)?.last().copied())
    }

    pub fn leaf_text(&self, id: NodeId) -> Result<&str> {
        self.data(id)?
            .text_payload()
            .ok_or(EditorError::NotText(id))
    }

    /// Caret width of a node: a leaf's payload or the sum of its leaves.
    pub fn caret_len(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        if node.kind().is_leaf() {
            return Ok(node.data.caret_len());
        }
        let mut total = 0;
        for leaf in self.leaves(id)? {
            total += self.data(leaf)?.caret_len();
        }
        Ok(total)
    }

    /// Largest valid offset of a point anchored at `id`.
    pub fn max_offset(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        Ok(if node.kind().is_leaf() {
            node.data.caret_len()
        } else {
            node.children.len()
        })
    }

    pub fn text_content(&self, id: NodeId) -> Result<String> {
        Ok(self.clone_subtree(id)?.text_content())
    }

    /// True when no block of the document holds any inline content.
    pub fn is_blank(&self) -> Result<bool> {
        for block in self.blocks()? {
            if self.child_count(block)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Fragments
    // ========================================================================

    /// Deep, detached copy of the subtree at `id`.
    pub fn clone_subtree(&self, id: NodeId) -> Result<FragmentNode> {
        let node = self.node(id)?;
        let mut children = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            children.push(self.clone_subtree(child)?);
        }
        Ok(FragmentNode {
            data: node.data.clone(),
            children,
        })
    }

    /// Allocates fresh nodes for a fragment. The result is detached.
    pub fn instantiate(&mut self, fragment: &FragmentNode) -> Result<NodeId> {
        let id = self.create_node(fragment.data.clone());
        for child in &fragment.children {
            let child_id = self.instantiate(child)?;
            self.append_child(id, child_id)?;
        }
        Ok(id)
    }

    /// The whole document as a forest of top-level blocks.
    pub fn to_fragment(&self) -> Result<Fragment> {
        let mut nodes = Vec::new();
        for &top in self.children(self.root)? {
            nodes.push(self.clone_subtree(top)?);
        }
        Ok(Fragment::new(nodes))
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    /// Arena size, live and free slots together. Bounded by the peak number
    /// of nodes alive at once, not by edit history.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
