use super::content::{next_word_boundary, previous_word_boundary};
use super::error::Result;
use super::node::NodeId;
use super::selection::BlockOffset;
use super::store::Document;

/// Caret movements. A line is the nearest enclosing block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    WordLeft,
    WordRight,
    Up,
    Down,
    LineStart,
    LineEnd,
    DocumentStart,
    DocumentEnd,
}

impl Document {
    fn neighbour_block(&self, block: NodeId, forward: bool) -> Result<Option<NodeId>> {
        let blocks = self.blocks()?;
        let Some(index) = blocks.iter().position(|candidate| *candidate == block) else {
            return Ok(None);
        };
        Ok(if forward {
            blocks.get(index + 1).copied()
        } else if index > 0 {
            blocks.get(index - 1).copied()
        } else {
            None
        })
    }

    /// Caret stop one unit before `at`; the start of a block steps to the
    /// end of the previous block.
    pub fn previous_caret_stop(&self, at: BlockOffset) -> Result<Option<BlockOffset>> {
        if at.offset > 0 {
            let offset = at.offset.min(self.block_len(at.block)?);
            return Ok(Some(BlockOffset::new(at.block, offset - 1)));
        }
        match self.neighbour_block(at.block, false)? {
            Some(previous) => Ok(Some(BlockOffset::new(previous, self.block_len(previous)?))),
            None => Ok(None),
        }
    }

    pub fn next_caret_stop(&self, at: BlockOffset) -> Result<Option<BlockOffset>> {
        if at.offset < self.block_len(at.block)? {
            return Ok(Some(BlockOffset::new(at.block, at.offset + 1)));
        }
        Ok(self
            .neighbour_block(at.block, true)?
            .map(|next| BlockOffset::new(next, 0)))
    }

    /// Where `motion` takes a caret. `column` is the preferred offset kept
    /// across vertical moves.
    pub fn motion_target(&self, from: BlockOffset, motion: Motion, column: usize) -> Result<BlockOffset> {
        let len = self.block_len(from.block)?;
        let target = match motion {
            Motion::Left => self.previous_caret_stop(from)?.unwrap_or(from),
            Motion::Right => self.next_caret_stop(from)?.unwrap_or(from),
            Motion::WordLeft => {
                let (block, offset) = if from.offset == 0 {
                    match self.neighbour_block(from.block, false)? {
                        Some(previous) => (previous, self.block_len(previous)?),
                        None => return Ok(from),
                    }
                } else {
                    (from.block, from.offset)
                };
                let text = self.block_caret_text(block)?;
                BlockOffset::new(block, previous_word_boundary(&text, offset))
            }
            Motion::WordRight => {
                if from.offset >= len {
                    match self.neighbour_block(from.block, true)? {
                        Some(next) => BlockOffset::new(next, 0),
                        None => BlockOffset::new(from.block, len),
                    }
                } else {
                    let text = self.block_caret_text(from.block)?;
                    BlockOffset::new(from.block, next_word_boundary(&text, from.offset))
                }
            }
            Motion::Up => match self.neighbour_block(from.block, false)? {
                Some(previous) => {
                    BlockOffset::new(previous, column.min(self.block_len(previous)?))
                }
                None => BlockOffset::new(from.block, 0),
            },
            Motion::Down => match self.neighbour_block(from.block, true)? {
                Some(next) => BlockOffset::new(next, column.min(self.block_len(next)?)),
                None => BlockOffset::new(from.block, len),
            },
            Motion::LineStart => BlockOffset::new(from.block, 0),
            Motion::LineEnd => BlockOffset::new(from.block, len),
            Motion::DocumentStart => {
                let start = self.document_start()?;
                self.block_offset_of(start)?
            }
            Motion::DocumentEnd => {
                let end = self.document_end()?;
                self.block_offset_of(end)?
            }
        };
        Ok(target)
    }
}
