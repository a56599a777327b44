use std::cmp::Ordering;

use tracing::trace;

use super::content::char_slice;
use super::error::{EditorError, Result};
use super::extract::{Bound, child_span, inner_bound, leaf_span};
use super::node::{NodeData, NodeId};
use super::selection::{BlockOffset, Point};
use super::store::Document;

impl Document {
    /// Removes the canonical range `start..end` and returns the caret.
    ///
    /// Nodes strictly inside the range are dropped, the boundary runs are
    /// trimmed and the remainder of the end block is joined onto the start
    /// block. Clearing the whole document leaves a single empty paragraph,
    /// even when the only block was a list item.
    pub fn delete_range(&mut self, start: Point, end: Point) -> Result<BlockOffset> {
        let caret = self.block_offset_of(start)?;
        if self.compare_points(start, end)? != Ordering::Less {
            return Ok(caret);
        }
        let whole_document = start == self.document_start()? && end == self.document_end()?;
        if whole_document {
            trace!("delete: clearing the whole document");
            return self.reset_to_empty_paragraph();
        }

        let start_block = caret.block;
        let end_block = self.block_of(end.node)?.ok_or_else(|| {
            EditorError::InvalidSelection(format!("{} has no enclosing block", end.node))
        })?;

        let common = self.common_ancestor(start.node, end.node)?;
        let depth = self.depth(common)?;
        let lo_key = self.point_key(start)?;
        let hi_key = self.point_key(end)?;
        self.remove_between(common, Some(&lo_key[depth..]), Some(&hi_key[depth..]))?;

        if start_block != end_block {
            let remainder = self.take_children(end_block, 0)?;
            trace!(%start_block, %end_block, moved = remainder.len(), "delete: joining blocks");
            self.append_children(start_block, remainder)?;
            self.remove_node(end_block)?;
        }
        self.refresh_direction(start_block)?;
        let root = self.root();
        self.normalize(root)?;
        Ok(caret)
    }

    fn reset_to_empty_paragraph(&mut self) -> Result<BlockOffset> {
        let root = self.root();
        for top in self.children(root)?.to_vec() {
            self.remove_node(top)?;
        }
        let paragraph = self.create_node(NodeData::paragraph());
        self.insert_child(root, 0, paragraph)?;
        Ok(BlockOffset::new(paragraph, 0))
    }

    fn remove_between(&mut self, id: NodeId, lo: Bound<'_>, hi: Bound<'_>) -> Result<()> {
        if self.kind(id)?.is_leaf() {
            return self.trim_leaf(id, lo, hi);
        }
        let children = self.children(id)?.to_vec();
        let (first, end) = child_span(children.len(), lo, hi);

        for (index, &child) in children.iter().enumerate().take(end).skip(first) {
            let child_lo = inner_bound(lo, index);
            let child_hi = inner_bound(hi, index);
            if child_lo.is_none() && child_hi.is_none() {
                self.remove_node(child)?;
            } else {
                self.remove_between(child, child_lo, child_hi)?;
            }
        }
        Ok(())
    }

    fn trim_leaf(&mut self, id: NodeId, lo: Bound<'_>, hi: Bound<'_>) -> Result<()> {
        let data = self.data(id)?;
        let len = data.caret_len();
        let (from, to) = leaf_span(len, lo, hi);
        if from >= to {
            return Ok(());
        }
        match data {
            NodeData::Text { text, .. } => {
                let mut kept = char_slice(text, 0, from);
                kept.push_str(&char_slice(text, to, len));
                self.set_text(id, kept)
            }
            _ => self.remove_node(id),
        }
    }
}
