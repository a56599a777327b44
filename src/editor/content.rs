use super::error::Result;
use super::node::{Direction, NodeData, NodeId, NodeKind, TextFormat};
use super::selection::BlockOffset;
use super::store::Document;

impl Document {
    /// Inserts typed text at a block offset and returns the offset after it.
    ///
    /// The text joins the run to the left of the caret when there is one,
    /// otherwise the run to the right, otherwise a new plain run.
    pub(crate) fn insert_text_at(&mut self, at: BlockOffset, text: &str) -> Result<BlockOffset> {
        let inserted = text.chars().count();
        if inserted == 0 {
            return Ok(at);
        }

        let offset = at.offset.min(self.caret_len(at.block)?);
        let children = self.children(at.block)?.to_vec();
        let mut start = 0;
        let mut target: Option<(NodeId, usize)> = None;
        let mut insert_index = 0;
        for &child in &children {
            let end = start + self.data(child)?.caret_len();
            if self.kind(child)? == NodeKind::Text && start <= offset && offset <= end {
                target = Some((child, offset - start));
                break;
            }
            if end <= offset {
                insert_index += 1;
            }
            start = end;
        }

        match target {
            Some((leaf, offset)) => {
                let mut value = self.leaf_text(leaf)?.to_string();
                let byte_idx = char_to_byte_idx(&value, offset);
                value.insert_str(byte_idx, text);
                self.set_text(leaf, value)?;
            }
            None => {
                let leaf = self.create_node(NodeData::text(text));
                self.insert_child(at.block, insert_index, leaf)?;
            }
        }

        if self.data(at.block)?.direction().is_none() {
            let direction = detect_direction(text);
            if direction.is_some() {
                self.set_direction(at.block, direction)?;
            }
        }

        Ok(BlockOffset {
            block: at.block,
            offset: offset + inserted,
        })
    }

    /// Re-splits the text run the caret just typed into (the run ending at
    /// or containing `at`) into plain and hashtag runs.
    pub(crate) fn recognize_hashtags(&mut self, at: BlockOffset) -> Result<()> {
        let children = self.children(at.block)?.to_vec();
        let mut start = 0;
        let mut target = None;
        for (index, &child) in children.iter().enumerate() {
            let end = start + self.data(child)?.caret_len();
            if start < at.offset && at.offset <= end {
                target = Some((index, child));
                break;
            }
            start = end;
        }
        let Some((index, leaf)) = target else {
            return Ok(());
        };
        let (text, format) = match self.data(leaf)? {
            NodeData::Text { text, format } => (text.clone(), *format),
            _ => return Ok(()),
        };
        let after_word = match index.checked_sub(1).map(|previous| children[previous]) {
            Some(previous) => match self.data(previous)? {
                NodeData::Text { text, .. } => text.chars().last().is_some_and(is_word_char),
                _ => false,
            },
            None => false,
        };

        let pieces = hashtag_pieces(&text, after_word);
        if matches!(pieces.as_slice(), [(only, _)] if *only == format) {
            return Ok(());
        }
        let mut pieces = pieces.into_iter();
        let Some((first_format, first_text)) = pieces.next() else {
            return Ok(());
        };
        self.set_text(leaf, first_text)?;
        self.set_format(leaf, first_format)?;
        for (shift, (format, text)) in pieces.enumerate() {
            let data = match format {
                TextFormat::Plain => NodeData::text(text),
                TextFormat::Hashtag => NodeData::hashtag(text),
            };
            let node = self.create_node(data);
            self.insert_child(at.block, index + 1 + shift, node)?;
        }
        Ok(())
    }

    /// Recomputes a block's direction from its text, `None` when empty.
    pub(crate) fn refresh_direction(&mut self, block: NodeId) -> Result<()> {
        let text = self.text_content(block)?;
        let direction = detect_direction(&text).or_else(|| {
            if text.is_empty() {
                None
            } else {
                self.data(block).ok().and_then(NodeData::direction)
            }
        });
        self.set_direction(block, direction)
    }

    /// Flattened inline text of a block, decorators as one placeholder
    /// character each so that char offsets equal caret offsets.
    pub(crate) fn block_caret_text(&self, block: NodeId) -> Result<String> {
        let mut text = String::new();
        for &child in self.children(block)? {
            match self.data(child)? {
                NodeData::Text { text: run, .. } => text.push_str(run),
                _ => text.push(OBJECT_REPLACEMENT),
            }
        }
        Ok(text)
    }
}

const OBJECT_REPLACEMENT: char = '\u{FFFC}';

pub fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    if char_idx == 0 {
        return 0;
    }
    for (count, (byte_idx, _)) in text.char_indices().enumerate() {
        if count == char_idx {
            return byte_idx;
        }
    }
    text.len()
}

pub(crate) fn split_text(text: &str, offset: usize) -> (String, String) {
    let byte_idx = char_to_byte_idx(text, offset);
    let left = text[..byte_idx].to_string();
    let right = text[byte_idx..].to_string();
    (left, right)
}

/// Substring by char offsets, clamped to the text.
pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> String {
    let start_byte = char_to_byte_idx(text, start);
    let end_byte = char_to_byte_idx(text, end.max(start));
    text[start_byte..end_byte].to_string()
}

/// Direction of the first strongly directional character.
pub fn detect_direction(text: &str) -> Option<Direction> {
    text.chars().find_map(|ch| {
        if is_rtl_char(ch) {
            Some(Direction::Rtl)
        } else if ch.is_alphabetic() {
            Some(Direction::Ltr)
        } else {
            None
        }
    })
}

fn is_rtl_char(ch: char) -> bool {
    matches!(ch,
        '\u{0590}'..='\u{08FF}'
        | '\u{FB1D}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}'
        | '\u{10800}'..='\u{10FFF}'
        | '\u{1E800}'..='\u{1EFFF}')
}

pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Splits `text` into plain and hashtag pieces. A hashtag is `#` followed
/// by word characters, not itself preceded by a word character;
/// `after_word` says whether the text right before `text` ends in one.
pub(crate) fn hashtag_pieces(text: &str, after_word: bool) -> Vec<(TextFormat, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut plain = String::new();
    let mut previous_is_word = after_word;
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '#' && !previous_is_word {
            let tag_len = chars[idx + 1..]
                .iter()
                .take_while(|next| is_word_char(**next))
                .count();
            if tag_len > 0 {
                if !plain.is_empty() {
                    pieces.push((TextFormat::Plain, std::mem::take(&mut plain)));
                }
                let tag: String = chars[idx..=idx + tag_len].iter().collect();
                pieces.push((TextFormat::Hashtag, tag));
                idx += tag_len + 1;
                previous_is_word = true;
                continue;
            }
        }
        plain.push(ch);
        previous_is_word = is_word_char(ch);
        idx += 1;
    }
    if !plain.is_empty() {
        pieces.push((TextFormat::Plain, plain));
    }
    pieces
}

pub fn previous_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut idx = offset.min(chars.len());
    if idx == 0 {
        return 0;
    }

    while idx > 0 && chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    if idx == 0 {
        return 0;
    }

    while idx > 0 && is_word_char(chars[idx - 1]) {
        idx -= 1;
    }
    if idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
        while idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
            idx -= 1;
        }
    }
    idx
}

pub fn next_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut idx = offset.min(len);
    if idx >= len {
        return len;
    }

    if chars[idx].is_whitespace() {
        while idx < len && chars[idx].is_whitespace() {
            idx += 1;
        }
        return idx;
    }

    if is_word_char(chars[idx]) {
        while idx < len && is_word_char(chars[idx]) {
            idx += 1;
        }
        while idx < len && !chars[idx].is_whitespace() && !is_word_char(chars[idx]) {
            idx += 1;
        }
        while idx < len && chars[idx].is_whitespace() {
            idx += 1;
        }
        return idx;
    }

    while idx < len && !chars[idx].is_whitespace() && !is_word_char(chars[idx]) {
        idx += 1;
    }
    while idx < len && chars[idx].is_whitespace() {
        idx += 1;
    }
    idx
}
