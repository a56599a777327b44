use tracing::trace;

use super::error::{EditorError, Result};
use super::node::{NodeData, NodeId, NodeKind};
use super::store::Document;

// ============================================================================
// Inline boundaries
// ============================================================================

impl Document {
    /// Makes sure a leaf boundary exists at caret `offset` of `block` and
    /// returns the index of the first child after it.
    pub(crate) fn split_inline(&mut self, block: NodeId, offset: usize) -> Result<usize> {
        let children = self.children(block)?.to_vec();
        let mut start = 0;
        for (index, &child) in children.iter().enumerate() {
            if offset <= start {
                return Ok(index);
            }
            let end = start + self.data(child)?.caret_len();
            if offset < end {
                self.split_text(child, offset - start)?;
                return Ok(index + 1);
            }
            start = end;
        }
        Ok(children.len())
    }

    fn expect_block(&self, id: NodeId) -> Result<NodeKind> {
        let kind = self.kind(id)?;
        if !kind.is_block() {
            return Err(EditorError::InvalidSelection(format!(
                "{kind} {id} is not a block"
            )));
        }
        Ok(kind)
    }

    fn attached_position(&self, id: NodeId) -> Result<(NodeId, usize)> {
        self.position(id)?.ok_or_else(|| {
            EditorError::InvalidSelection(format!("{id} is not attached to the document"))
        })
    }

    fn list_is_ordered(&self, list: NodeId) -> Result<Option<bool>> {
        Ok(match self.data(list)? {
            NodeData::List { ordered } => Some(*ordered),
            _ => None,
        })
    }

    // ========================================================================
    // Block operations
    // ========================================================================

    /// Splits a block at a caret offset. The new sibling has the same kind
    /// and direction and receives everything after the caret.
    pub fn split_block(&mut self, block: NodeId, offset: usize) -> Result<NodeId> {
        self.expect_block(block)?;
        let (parent, index) = self.attached_position(block)?;
        let boundary = self.split_inline(block, offset)?;
        let moved = self.take_children(block, boundary)?;
        let data = self.data(block)?.clone();
        let sibling = self.create_node(data);
        self.append_children(sibling, moved)?;
        self.insert_child(parent, index + 1, sibling)?;
        trace!(%block, %sibling, offset, "split block");
        Ok(sibling)
    }

    /// Turns a list item into a paragraph at the same place. Items before
    /// it stay in the list, items after it move to a new list of the same
    /// kind right after the paragraph.
    pub fn lift_list_item(&mut self, item: NodeId) -> Result<NodeId> {
        if self.expect_block(item)? != NodeKind::ListItem {
            return Err(EditorError::InvalidSelection(format!(
                "{item} is not a list item"
            )));
        }
        let (list, index) = self.attached_position(item)?;
        let (container, list_index) = self.attached_position(list)?;
        let ordered = self.list_is_ordered(list)?.unwrap_or(false);

        let trailing = self.take_children(list, index + 1)?;
        self.remove_child(list, index)?;
        let direction = self.data(item)?.direction();
        let content = self.take_children(item, 0)?;
        self.remove_node(item)?;

        let paragraph = self.create_node(NodeData::Paragraph { direction });
        self.append_children(paragraph, content)?;
        self.insert_child(container, list_index + 1, paragraph)?;
        if !trailing.is_empty() {
            let tail = self.create_node(NodeData::list(ordered));
            self.append_children(tail, trailing)?;
            self.insert_child(container, list_index + 2, tail)?;
        }
        if self.child_count(list)? == 0 {
            self.remove_node(list)?;
        }
        trace!(%item, %paragraph, "lifted list item");
        Ok(paragraph)
    }

    /// Wraps a paragraph into a one-item list, joining a neighbouring list
    /// of the same kind. Returns the new list item.
    pub fn convert_paragraph_to_list(&mut self, paragraph: NodeId, ordered: bool) -> Result<NodeId> {
        if self.expect_block(paragraph)? != NodeKind::Paragraph {
            return Err(EditorError::InvalidSelection(format!(
                "{paragraph} is not a paragraph"
            )));
        }
        let (container, index) = self.attached_position(paragraph)?;
        let direction = self.data(paragraph)?.direction();
        let content = self.take_children(paragraph, 0)?;
        self.remove_node(paragraph)?;

        let item = self.create_node(NodeData::ListItem { direction });
        self.append_children(item, content)?;
        let list = self.create_node(NodeData::list(ordered));
        self.append_child(list, item)?;
        self.insert_child(container, index, list)?;
        self.merge_adjacent_lists(list)?;
        Ok(item)
    }

    /// Folds `list` into same-kind lists directly before and after it.
    fn merge_adjacent_lists(&mut self, list: NodeId) -> Result<NodeId> {
        let Some(ordered) = self.list_is_ordered(list)? else {
            return Ok(list);
        };
        let mut list = list;

        let (container, index) = self.attached_position(list)?;
        if index > 0 {
            let previous = self.children(container)?[index - 1];
            if self.list_is_ordered(previous)? == Some(ordered) {
                let items = self.take_children(list, 0)?;
                self.append_children(previous, items)?;
                self.remove_node(list)?;
                list = previous;
            }
        }

        let (container, index) = self.attached_position(list)?;
        if let Some(&next) = self.children(container)?.get(index + 1) {
            if self.list_is_ordered(next)? == Some(ordered) {
                let items = self.take_children(next, 0)?;
                self.append_children(list, items)?;
                self.remove_node(next)?;
            }
        }
        Ok(list)
    }
}
