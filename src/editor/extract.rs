use std::cmp::Ordering;

use super::content::char_slice;
use super::error::Result;
use super::fragment::{Fragment, FragmentNode};
use super::node::{NodeData, NodeId, NodeKind};
use super::selection::{Point, Selection};
use super::store::Document;

/// Remaining point key below a node: the first entry is a child index (or
/// the caret offset for a leaf), the rest addresses the inside of that
/// child. `None` means the range extends past this side of the node.
pub(super) type Bound<'a> = Option<&'a [usize]>;

impl Document {
    /// Copies the selected range into a detached forest.
    pub fn extract_selection(&self, selection: &Selection) -> Result<Fragment> {
        let (start, end) = self.canonical_range(selection)?;
        self.extract(start, end)
    }

    /// Copies the range `start..end` of canonical points.
    ///
    /// Nodes strictly inside the range are cloned whole, boundary runs are
    /// cut to the covered text and partially covered blocks keep their
    /// wrapper, so a list item cut at a root-level boundary arrives inside
    /// a one-item list.
    pub fn extract(&self, start: Point, end: Point) -> Result<Fragment> {
        if self.compare_points(start, end)? != Ordering::Less {
            return Ok(Fragment::default());
        }

        let common = self.common_ancestor(start.node, end.node)?;
        let depth = self.depth(common)?;
        let lo_key = self.point_key(start)?;
        let hi_key = self.point_key(end)?;
        let lo = &lo_key[depth..];
        let hi = &hi_key[depth..];

        let node = self.node(common)?;
        match node.kind() {
            NodeKind::Text | NodeKind::Decorator => Ok(Fragment::new(
                self.clone_leaf_between(common, Some(lo), Some(hi))?
                    .into_iter()
                    .collect(),
            )),
            NodeKind::List => {
                let items = self.clone_children_between(common, Some(lo), Some(hi))?;
                if items.is_empty() {
                    return Ok(Fragment::default());
                }
                let wrapper = FragmentNode::new(node.data().clone()).with_children(items);
                Ok(Fragment::new(vec![wrapper]))
            }
            NodeKind::Root | NodeKind::Paragraph | NodeKind::ListItem => Ok(Fragment::new(
                self.clone_children_between(common, Some(lo), Some(hi))?,
            )),
        }
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Result<NodeId> {
        let a_path = self.path_of(a)?;
        let b_path = self.path_of(b)?;
        let shared = a_path
            .iter()
            .zip(b_path.iter())
            .take_while(|(x, y)| x == y)
            .count();
        self.node_at_path(&a_path[..shared])
    }

    fn clone_between(&self, id: NodeId, lo: Bound<'_>, hi: Bound<'_>) -> Result<Option<FragmentNode>> {
        let node = self.node(id)?;
        if node.kind().is_leaf() {
            return self.clone_leaf_between(id, lo, hi);
        }
        if lo.is_none() && hi.is_none() {
            return Ok(Some(self.clone_subtree(id)?));
        }
        let children = self.clone_children_between(id, lo, hi)?;
        if node.kind() == NodeKind::List && children.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            FragmentNode::new(node.data().clone()).with_children(children),
        ))
    }

    fn clone_children_between(
        &self,
        id: NodeId,
        lo: Bound<'_>,
        hi: Bound<'_>,
    ) -> Result<Vec<FragmentNode>> {
        let children = self.children(id)?;
        let (first, end) = child_span(children.len(), lo, hi);

        let mut cloned = Vec::new();
        for (index, &child) in children.iter().enumerate().take(end).skip(first) {
            let child_lo = inner_bound(lo, index);
            let child_hi = inner_bound(hi, index);
            if let Some(copy) = self.clone_between(child, child_lo, child_hi)? {
                cloned.push(copy);
            }
        }
        Ok(cloned)
    }

    fn clone_leaf_between(&self, id: NodeId, lo: Bound<'_>, hi: Bound<'_>) -> Result<Option<FragmentNode>> {
        let data = self.data(id)?;
        let (from, to) = leaf_span(data.caret_len(), lo, hi);
        if from >= to {
            return Ok(None);
        }
        let copy = match data {
            NodeData::Text { text, format } => FragmentNode::new(NodeData::Text {
                text: char_slice(text, from, to),
                format: *format,
            }),
            other => FragmentNode::new(other.clone()),
        };
        Ok(Some(copy))
    }
}

/// Child index range `first..end` touched by the bounds of an element.
pub(super) fn child_span(len: usize, lo: Bound<'_>, hi: Bound<'_>) -> (usize, usize) {
    let first = lo.and_then(|key| key.first().copied()).unwrap_or(0);
    let end = match hi {
        None => len,
        Some([index]) => *index,
        Some(key) => key.first().map_or(len, |index| index + 1),
    };
    (first, end.min(len))
}

/// Covered caret range `from..to` of a leaf.
pub(super) fn leaf_span(len: usize, lo: Bound<'_>, hi: Bound<'_>) -> (usize, usize) {
    let from = lo.and_then(|key| key.first().copied()).unwrap_or(0).min(len);
    let to = hi.and_then(|key| key.first().copied()).unwrap_or(len).min(len);
    (from, to)
}

/// Bound for child `index`: the rest of the key when the key descends into
/// that child, unbounded otherwise.
pub(super) fn inner_bound(bound: Bound<'_>, index: usize) -> Bound<'_> {
    match bound {
        Some(key) if key.len() > 1 && key[0] == index => Some(&key[1..]),
        _ => None,
    }
}
