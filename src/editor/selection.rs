use std::cmp::Ordering;

use super::error::{EditorError, Result};
use super::node::{NodeId, NodeKind};
use super::store::Document;

/// A caret position. For leaves the offset counts caret units into the
/// payload; for elements it is a child index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub node: NodeId,
    pub offset: usize,
}

impl Point {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Caret position expressed against a block's flattened inline content.
///
/// Blocks survive normalization, so a block offset taken before a mutation
/// still resolves afterwards even when the leaves around it were merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockOffset {
    pub block: NodeId,
    pub offset: usize,
}

impl BlockOffset {
    pub fn new(block: NodeId, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// Derived, external view of a point: child indices from the root plus
/// the offset. An empty path addresses the root itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl PathPoint {
    pub fn new(path: impl Into<Vec<usize>>, offset: usize) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathSelection {
    pub anchor: PathPoint,
    pub focus: PathPoint,
}

impl PathSelection {
    pub fn new(anchor: PathPoint, focus: PathPoint) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: PathPoint) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

impl Document {
    /// Validates a point against the live tree, clamping its offset.
    pub fn resolve_point(&self, point: Point) -> Result<Point> {
        self.node(point.node)?;
        if !self.is_attached(point.node) {
            return Err(EditorError::InvalidSelection(format!(
                "{} is not attached to the document",
                point.node
            )));
        }
        let max = self.max_offset(point.node)?;
        Ok(Point::new(point.node, point.offset.min(max)))
    }

    /// Strict variant of [`Document::resolve_point`] used after a commit.
    pub fn validate_selection(&self, selection: &Selection) -> Result<()> {
        for point in [selection.anchor, selection.focus] {
            let resolved = self.resolve_point(point)?;
            if resolved.offset != point.offset {
                return Err(EditorError::InvalidSelection(format!(
                    "offset {} exceeds {}",
                    point.offset, point.node
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn point_key(&self, point: Point) -> Result<Vec<usize>> {
        let mut key = self.path_of(point.node)?;
        key.push(point.offset);
        Ok(key)
    }

    /// Document order of two points. An element point sorts before any
    /// position inside the child it precedes.
    pub fn compare_points(&self, a: Point, b: Point) -> Result<Ordering> {
        Ok(self.point_key(a)?.cmp(&self.point_key(b)?))
    }

    /// `(start, end)` of a selection regardless of its direction.
    pub fn ordered(&self, selection: &Selection) -> Result<(Point, Point)> {
        let anchor = self.resolve_point(selection.anchor)?;
        let focus = self.resolve_point(selection.focus)?;
        if self.compare_points(anchor, focus)? == Ordering::Greater {
            Ok((focus, anchor))
        } else {
            Ok((anchor, focus))
        }
    }

    /// Ordered range with both ends moved onto leaves where possible.
    ///
    /// `(Root, 0)..(Root, n)` and `(first leaf, 0)..(last leaf, end)` yield
    /// the same canonical range.
    pub fn canonical_range(&self, selection: &Selection) -> Result<(Point, Point)> {
        let (start, end) = self.ordered(selection)?;
        let start = self.canonical_start(start)?;
        if selection.is_collapsed() {
            return Ok((start, start));
        }
        let end = self.canonical_end(end)?;
        if self.compare_points(start, end)? == Ordering::Greater {
            return Ok((start, start));
        }
        Ok((start, end))
    }

    /// Moves an element point forward onto the first leaf at or after it.
    pub fn canonical_start(&self, point: Point) -> Result<Point> {
        let mut point = self.resolve_point(point)?;
        loop {
            let node = self.node(point.node)?;
            if node.kind().is_leaf() {
                return Ok(point);
            }
            let children = node.children();
            if children.is_empty() {
                return Ok(Point::new(point.node, 0));
            }
            point = if point.offset < children.len() {
                Point::new(children[point.offset], 0)
            } else {
                let last = children[children.len() - 1];
                Point::new(last, self.max_offset(last)?)
            };
        }
    }

    /// Moves an element point backward onto the last leaf at or before it.
    pub fn canonical_end(&self, point: Point) -> Result<Point> {
        let mut point = self.resolve_point(point)?;
        loop {
            let node = self.node(point.node)?;
            if node.kind().is_leaf() {
                return Ok(point);
            }
            let children = node.children();
            if children.is_empty() {
                return Ok(Point::new(point.node, 0));
            }
            point = if point.offset > 0 {
                let previous = children[point.offset - 1];
                Point::new(previous, self.max_offset(previous)?)
            } else {
                Point::new(children[0], 0)
            };
        }
    }

    pub fn document_start(&self) -> Result<Point> {
        self.canonical_start(Point::new(self.root(), 0))
    }

    pub fn document_end(&self) -> Result<Point> {
        let count = self.child_count(self.root())?;
        self.canonical_end(Point::new(self.root(), count))
    }

    pub fn select_all_range(&self) -> Result<Selection> {
        Ok(Selection::new(self.document_start()?, self.document_end()?))
    }

    // ========================================================================
    // Block offsets
    // ========================================================================

    pub fn block_offset_of(&self, point: Point) -> Result<BlockOffset> {
        let point = self.resolve_point(point)?;
        let kind = self.kind(point.node)?;
        if kind.is_leaf() {
            let Some((block, index)) = self.position(point.node)? else {
                return Err(EditorError::InvalidSelection(format!(
                    "{} has no enclosing block",
                    point.node
                )));
            };
            let before = self.inline_len_before(block, index)?;
            return Ok(BlockOffset::new(block, before + point.offset));
        }
        if kind.is_block() {
            let before = self.inline_len_before(point.node, point.offset)?;
            return Ok(BlockOffset::new(point.node, before));
        }
        let inner = self.canonical_start(point)?;
        if inner == point {
            return Err(EditorError::InvalidSelection(format!(
                "{} has no enclosing block",
                point.node
            )));
        }
        self.block_offset_of(inner)
    }

    fn inline_len_before(&self, block: NodeId, index: usize) -> Result<usize> {
        let mut total = 0;
        for &child in self.children(block)?.iter().take(index) {
            total += self.data(child)?.caret_len();
        }
        Ok(total)
    }

    /// Resolves a block offset to a point, preferring a text leaf and the
    /// run to the left of the caret. Empty blocks give `(block, 0)`.
    pub fn point_at_block_offset(&self, at: BlockOffset) -> Result<Point> {
        if !self.kind(at.block)?.is_block() {
            return Err(EditorError::InvalidSelection(format!(
                "{} is not a block",
                at.block
            )));
        }
        let children = self.children(at.block)?;
        if children.is_empty() {
            return Ok(Point::new(at.block, 0));
        }
        let offset = at.offset.min(self.caret_len(at.block)?);

        let mut fallback: Option<Point> = None;
        let mut start = 0;
        for &child in children {
            let end = start + self.data(child)?.caret_len();
            if start <= offset && offset <= end {
                let candidate = Point::new(child, offset - start);
                if self.kind(child)? == NodeKind::Text {
                    return Ok(candidate);
                }
                fallback.get_or_insert(candidate);
            }
            start = end;
        }
        Ok(fallback.unwrap_or(Point::new(at.block, 0)))
    }

    pub fn block_len(&self, block: NodeId) -> Result<usize> {
        self.caret_len(block)
    }

    // ========================================================================
    // Path view
    // ========================================================================

    pub fn path_point(&self, point: Point) -> Result<PathPoint> {
        let point = self.resolve_point(point)?;
        Ok(PathPoint::new(self.path_of(point.node)?, point.offset))
    }

    pub fn point_from_path(&self, point: &PathPoint) -> Result<Point> {
        let node = self.node_at_path(&point.path)?;
        self.resolve_point(Point::new(node, point.offset))
    }

    pub fn path_selection(&self, selection: &Selection) -> Result<PathSelection> {
        Ok(PathSelection::new(
            self.path_point(selection.anchor)?,
            self.path_point(selection.focus)?,
        ))
    }

    pub fn selection_from_paths(&self, selection: &PathSelection) -> Result<Selection> {
        Ok(Selection::new(
            self.point_from_path(&selection.anchor)?,
            self.point_from_path(&selection.focus)?,
        ))
    }
}
