use tracing::{debug, error, trace, warn};

mod clipboard;
mod content;
mod cursor;
mod delete;
mod error;
mod extract;
mod fragment;
mod inspect;
mod node;
mod selection;
mod splice;
mod store;
mod structure;

pub use clipboard::{
    ClipboardPayload, STRUCTURED_VERSION, decode_structured, deserialize, encode_structured,
    from_plain_text, serialize,
};
pub use content::{char_to_byte_idx, detect_direction, next_word_boundary, previous_word_boundary};
pub use cursor::Motion;
pub use error::{EditorError, Result};
pub use fragment::{Fragment, FragmentNode};
pub use inspect::{breadcrumbs, describe_tree};
pub use node::{Direction, Node, NodeData, NodeId, NodeKind, TextFormat};
pub use selection::{BlockOffset, PathPoint, PathSelection, Point, Selection};
pub use splice::RunMergePolicy;
pub use store::Document;

/// Knobs a session consults on every command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditorSettings {
    pub run_merge_policy: RunMergePolicy,
    /// Typing `- `, `* ` or `1. ` at the start of a paragraph turns it into
    /// a list item.
    pub markdown_shortcuts: bool,
    /// Typed `#word` tokens become hashtag runs. Pasted text keeps the
    /// formats it arrived with.
    pub recognize_hashtags: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            run_merge_policy: RunMergePolicy::default(),
            markdown_shortcuts: true,
            recognize_hashtags: true,
        }
    }
}

type CommitObserver = Box<dyn FnMut(&Document, &Selection)>;

/// An editing session: one document, one selection, and the commands a
/// user drives them with.
///
/// Every mutating command runs as a transaction. The document and the
/// selection are snapshotted first; when the command fails or leaves the
/// tree inconsistent, both are restored and the error is returned.
pub struct DocumentEditor {
    document: Document,
    selection: Selection,
    settings: EditorSettings,
    revision: u64,
    preferred_column: Option<usize>,
    observers: Vec<CommitObserver>,
}

impl DocumentEditor {
    pub fn new(document: Document) -> Self {
        Self::with_settings(document, EditorSettings::default())
    }

    pub fn with_settings(document: Document, settings: EditorSettings) -> Self {
        let caret = document
            .document_start()
            .unwrap_or_else(|_| Point::new(document.root(), 0));
        Self {
            document,
            selection: Selection::caret(caret),
            settings,
            revision: 0,
            preferred_column: None,
            observers: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn settings(&self) -> EditorSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: EditorSettings) {
        self.settings = settings;
    }

    /// Number of committed transactions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Registers a callback that sees the document after every commit.
    pub fn on_commit(&mut self, observer: impl FnMut(&Document, &Selection) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Block and offset of the focus end of the selection.
    pub fn caret(&self) -> Result<BlockOffset> {
        let focus = self.document.canonical_start(self.selection.focus)?;
        self.document.block_offset_of(focus)
    }

    pub fn path_selection(&self) -> Result<PathSelection> {
        self.document.path_selection(&self.selection)
    }

    pub fn set_path_selection(&mut self, selection: &PathSelection) -> Result<()> {
        let resolved = self.document.selection_from_paths(selection)?;
        self.set_selection(resolved)
    }

    /// Replaces the selection. Offsets past the end of a node are clamped.
    pub fn set_selection(&mut self, selection: Selection) -> Result<()> {
        self.preferred_column = None;
        self.transact("set_selection", |document, current, _| {
            let anchor = document.resolve_point(selection.anchor)?;
            let focus = document.resolve_point(selection.focus)?;
            *current = Selection::new(anchor, focus);
            Ok(())
        })
    }

    pub fn select_all(&mut self) -> Result<()> {
        self.preferred_column = None;
        self.transact("select_all", |document, selection, _| {
            *selection = document.select_all_range()?;
            Ok(())
        })
    }

    pub fn collapse_to(&mut self, point: Point) -> Result<()> {
        self.preferred_column = None;
        self.transact("collapse_to", |document, selection, _| {
            *selection = Selection::caret(document.resolve_point(point)?);
            Ok(())
        })
    }

    /// Moves the focus to `point`, keeping the anchor.
    pub fn extend_to(&mut self, point: Point) -> Result<()> {
        self.preferred_column = None;
        self.transact("extend_to", |document, selection, _| {
            selection.focus = document.resolve_point(point)?;
            Ok(())
        })
    }

    // ========================================================================
    // Caret movement
    // ========================================================================

    /// Moves the caret and collapses the selection. Left and Right on a
    /// range land on its start and end.
    pub fn move_caret(&mut self, motion: Motion) -> Result<()> {
        let preferred = self.preferred_column;
        let origin = self.transact("move_caret", |document, selection, _| {
            let (start, end) = document.canonical_range(selection)?;
            let collapsing = start != end && matches!(motion, Motion::Left | Motion::Right);
            let (origin, target) = if collapsing {
                let edge = if motion == Motion::Left { start } else { end };
                let at = document.block_offset_of(edge)?;
                (at, at)
            } else {
                let from = focus_offset(document, selection)?;
                let column = preferred.unwrap_or(from.offset);
                (from, document.motion_target(from, motion, column)?)
            };
            place_caret(document, selection, target)?;
            Ok(origin)
        })?;
        self.remember_column(motion, preferred, origin);
        Ok(())
    }

    /// Moves only the focus end of the selection.
    pub fn extend_selection(&mut self, motion: Motion) -> Result<()> {
        let preferred = self.preferred_column;
        let origin = self.transact("extend_selection", |document, selection, _| {
            let from = focus_offset(document, selection)?;
            let column = preferred.unwrap_or(from.offset);
            let target = document.motion_target(from, motion, column)?;
            selection.focus = document.point_at_block_offset(target)?;
            Ok(from)
        })?;
        self.remember_column(motion, preferred, origin);
        Ok(())
    }

    fn remember_column(&mut self, motion: Motion, preferred: Option<usize>, origin: BlockOffset) {
        self.preferred_column = match motion {
            Motion::Up | Motion::Down => Some(preferred.unwrap_or(origin.offset)),
            _ => None,
        };
    }

    // ========================================================================
    // Typing
    // ========================================================================

    /// Types `text` at the caret, replacing the selection. Line breaks
    /// inside `text` split the block. Hashtags and markdown shortcuts are
    /// applied character by character, exactly as for keystrokes.
    pub fn insert_text(&mut self, text: &str) -> Result<()> {
        self.preferred_column = None;
        self.transact("insert_text", |document, selection, settings| {
            let mut at = collapse_range(document, selection)?;
            for (index, line) in text.split('\n').enumerate() {
                if index > 0 {
                    at = break_block(document, at)?;
                }
                let line = line.strip_suffix('\r').unwrap_or(line);
                for ch in line.chars() {
                    at = type_char(document, at, ch, settings)?;
                }
            }
            let root = document.root();
            document.normalize(root)?;
            place_caret(document, selection, at)
        })
    }

    pub fn insert_char(&mut self, ch: char) -> Result<()> {
        let mut buffer = [0u8; 4];
        self.insert_text(ch.encode_utf8(&mut buffer))
    }

    /// Splits the current block at the caret. On an empty list item the
    /// item becomes a paragraph instead.
    pub fn insert_paragraph_break(&mut self) -> Result<()> {
        self.preferred_column = None;
        self.transact("insert_paragraph_break", |document, selection, _| {
            let at = collapse_range(document, selection)?;
            let at = break_block(document, at)?;
            let root = document.root();
            document.normalize(root)?;
            place_caret(document, selection, at)
        })
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Deletes the selection, or the caret unit before the caret. At the
    /// start of a list item the item becomes a paragraph.
    pub fn delete_backward(&mut self) -> Result<()> {
        self.preferred_column = None;
        self.transact("delete_backward", |document, selection, _| {
            let (start, end) = document.canonical_range(selection)?;
            let at = if start != end {
                document.delete_range(start, end)?
            } else {
                let at = document.block_offset_of(start)?;
                if at.offset == 0 && document.kind(at.block)? == NodeKind::ListItem {
                    let paragraph = document.lift_list_item(at.block)?;
                    BlockOffset::new(paragraph, 0)
                } else {
                    match document.previous_caret_stop(at)? {
                        Some(previous) => delete_between(document, previous, at)?,
                        None => at,
                    }
                }
            };
            let root = document.root();
            document.normalize(root)?;
            place_caret(document, selection, at)
        })
    }

    /// Deletes the selection, or the caret unit after the caret.
    pub fn delete_forward(&mut self) -> Result<()> {
        self.preferred_column = None;
        self.transact("delete_forward", |document, selection, _| {
            let (start, end) = document.canonical_range(selection)?;
            let at = if start != end {
                document.delete_range(start, end)?
            } else {
                let at = document.block_offset_of(start)?;
                match document.next_caret_stop(at)? {
                    Some(next) => delete_between(document, at, next)?,
                    None => at,
                }
            };
            let root = document.root();
            document.normalize(root)?;
            place_caret(document, selection, at)
        })
    }

    pub fn delete_selection(&mut self) -> Result<()> {
        self.preferred_column = None;
        self.transact("delete_selection", |document, selection, _| {
            let at = collapse_range(document, selection)?;
            let root = document.root();
            document.normalize(root)?;
            place_caret(document, selection, at)
        })
    }

    // ========================================================================
    // Clipboard
    // ========================================================================

    /// Detached copy of the selection, ready for the system clipboard.
    pub fn selected_fragment(&self) -> Result<Fragment> {
        self.document.extract_selection(&self.selection)
    }

    pub fn copy(&self) -> Result<ClipboardPayload> {
        let fragment = self.selected_fragment()?;
        let payload = serialize(&fragment)?;
        debug!(
            roots = fragment.nodes.len(),
            chars = payload.plain_text.chars().count(),
            "copied selection"
        );
        Ok(payload)
    }

    /// Copies the selection and deletes it. Nothing is removed when the
    /// copy fails.
    pub fn cut(&mut self) -> Result<ClipboardPayload> {
        let payload = self.copy()?;
        self.delete_selection()?;
        Ok(payload)
    }

    /// Pastes a clipboard payload over the selection. A structured payload
    /// that fails validation is pasted as its plain text.
    pub fn paste(&mut self, payload: &ClipboardPayload) -> Result<()> {
        let fragment = deserialize(payload);
        self.paste_fragment(&fragment)
    }

    pub fn paste_plain_text(&mut self, text: &str) -> Result<()> {
        self.paste(&ClipboardPayload::plain(text))
    }

    pub fn paste_fragment(&mut self, fragment: &Fragment) -> Result<()> {
        self.preferred_column = None;
        self.transact("paste", |document, selection, settings| {
            let at = collapse_range(document, selection)?;
            let caret = document.insert_fragment(at, fragment, settings.run_merge_policy)?;
            place_caret(document, selection, caret)
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn transact<T>(
        &mut self,
        command: &'static str,
        op: impl FnOnce(&mut Document, &mut Selection, EditorSettings) -> Result<T>,
    ) -> Result<T> {
        let snapshot = (self.document.clone(), self.selection);
        let outcome = op(&mut self.document, &mut self.selection, self.settings).and_then(|value| {
            if let Err(err) = self.document.check_invariants() {
                error!(command, %err, "command left the document inconsistent");
                return Err(err);
            }
            self.document.validate_selection(&self.selection)?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                self.revision += 1;
                debug!(command, revision = self.revision, "committed");
                trace!(tree = %describe_tree(&self.document), "document after commit");
                for observer in &mut self.observers {
                    observer(&self.document, &self.selection);
                }
                Ok(value)
            }
            Err(err) => {
                warn!(command, %err, "rolled back");
                (self.document, self.selection) = snapshot;
                Err(err)
            }
        }
    }
}

fn focus_offset(document: &Document, selection: &Selection) -> Result<BlockOffset> {
    let focus = document.canonical_start(selection.focus)?;
    document.block_offset_of(focus)
}

fn place_caret(document: &Document, selection: &mut Selection, at: BlockOffset) -> Result<()> {
    *selection = Selection::caret(document.point_at_block_offset(at)?);
    Ok(())
}

/// Deletes a non-empty selection and returns where the caret ends up.
fn collapse_range(document: &mut Document, selection: &Selection) -> Result<BlockOffset> {
    let (start, end) = document.canonical_range(selection)?;
    if start == end {
        document.block_offset_of(start)
    } else {
        document.delete_range(start, end)
    }
}

fn delete_between(document: &mut Document, from: BlockOffset, to: BlockOffset) -> Result<BlockOffset> {
    let start = document.point_at_block_offset(from)?;
    let end = document.point_at_block_offset(to)?;
    document.delete_range(start, end)
}

fn break_block(document: &mut Document, at: BlockOffset) -> Result<BlockOffset> {
    if document.kind(at.block)? == NodeKind::ListItem && document.child_count(at.block)? == 0 {
        let paragraph = document.lift_list_item(at.block)?;
        return Ok(BlockOffset::new(paragraph, 0));
    }
    let sibling = document.split_block(at.block, at.offset)?;
    Ok(BlockOffset::new(sibling, 0))
}

/// Inserts one typed character and applies the typing rules that look at
/// what precedes it.
fn type_char(
    document: &mut Document,
    at: BlockOffset,
    ch: char,
    settings: EditorSettings,
) -> Result<BlockOffset> {
    let mut buffer = [0u8; 4];
    let at = document.insert_text_at(at, ch.encode_utf8(&mut buffer))?;
    if settings.recognize_hashtags {
        document.recognize_hashtags(at)?;
    }
    if settings.markdown_shortcuts {
        return apply_markdown_shortcut(document, at);
    }
    Ok(at)
}

fn list_marker(prefix: &str) -> Option<bool> {
    match prefix {
        "- " | "* " => Some(false),
        "1. " => Some(true),
        _ => None,
    }
}

/// Converts a paragraph whose text before the caret is exactly a list
/// marker. The marker itself is removed.
fn apply_markdown_shortcut(document: &mut Document, at: BlockOffset) -> Result<BlockOffset> {
    if document.kind(at.block)? != NodeKind::Paragraph {
        return Ok(at);
    }
    let prefix: String = document
        .block_caret_text(at.block)?
        .chars()
        .take(at.offset)
        .collect();
    let Some(ordered) = list_marker(&prefix) else {
        return Ok(at);
    };
    let Some(&first) = document.children(at.block)?.first() else {
        return Ok(at);
    };
    let rest = match document.data(first)? {
        NodeData::Text { text, .. } => match text.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.to_string(),
            None => return Ok(at),
        },
        _ => return Ok(at),
    };
    document.set_text(first, rest)?;
    let item = document.convert_paragraph_to_list(at.block, ordered)?;
    debug!(ordered, "markdown shortcut turned paragraph into a list");
    Ok(BlockOffset::new(item, 0))
}

#[cfg(test)]
#[path = "editor/test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;

#[cfg(test)]
#[path = "editor/store_tests.rs"]
mod store_tests;
