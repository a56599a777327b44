use std::collections::HashMap;

use ratatui::{
    style::Style,
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::editor::{BlockOffset, Document, NodeData, NodeId, Result, Selection, TextFormat};
use crate::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
}

/// Lays the document out as wrapped terminal lines, highlighting the
/// selection and locating the caret.
pub fn render_document(
    document: &Document,
    selection: &Selection,
    width: usize,
    theme: &Theme,
) -> Result<RenderResult> {
    let highlight = SelectionHighlight::new(document, selection)?;
    let mut renderer = Renderer::new(width.max(1), theme, highlight);
    renderer.render_document(document)?;
    Ok(renderer.finish())
}

/// Selection resolved to per-block caret ranges.
struct SelectionHighlight {
    caret: BlockOffset,
    range: Option<(BlockOffset, BlockOffset)>,
    order: HashMap<NodeId, usize>,
}

impl SelectionHighlight {
    fn new(document: &Document, selection: &Selection) -> Result<Self> {
        let focus = document.canonical_start(selection.focus)?;
        let caret = document.block_offset_of(focus)?;
        let (start, end) = document.canonical_range(selection)?;
        let range = if start == end {
            None
        } else {
            Some((document.block_offset_of(start)?, document.block_offset_of(end)?))
        };
        let order = document
            .blocks()?
            .into_iter()
            .enumerate()
            .map(|(index, block)| (block, index))
            .collect();
        Ok(Self {
            caret,
            range,
            order,
        })
    }

    fn caret_in(&self, block: NodeId) -> Option<usize> {
        (self.caret.block == block).then_some(self.caret.offset)
    }

    /// Selected caret range `from..to` inside `block`.
    fn span_in(&self, block: NodeId, len: usize) -> Option<(usize, usize)> {
        let (start, end) = self.range?;
        let index = *self.order.get(&block)?;
        let first = *self.order.get(&start.block)?;
        let last = *self.order.get(&end.block)?;
        if index < first || index > last {
            return None;
        }
        let from = if index == first { start.offset } else { 0 };
        let to = if index == last { end.offset } else { len };
        (from < to).then_some((from, to))
    }
}

struct Renderer<'a> {
    wrap_width: usize,
    theme: &'a Theme,
    highlight: SelectionHighlight,
    cursor: Option<CursorVisualPosition>,
    lines: Vec<Line<'static>>,
    current_line_index: usize,
}

impl<'a> Renderer<'a> {
    fn new(wrap_width: usize, theme: &'a Theme, highlight: SelectionHighlight) -> Self {
        Self {
            wrap_width,
            theme,
            highlight,
            cursor: None,
            lines: Vec::new(),
            current_line_index: 0,
        }
    }

    fn render_document(&mut self, document: &Document) -> Result<()> {
        for (idx, &top) in document.children(document.root())?.iter().enumerate() {
            if idx > 0 {
                self.push_blank_line();
            }
            match document.data(top)? {
                NodeData::List { ordered } => self.render_list(document, top, *ordered)?,
                _ => self.render_block(document, top, "", "")?,
            }
        }
        Ok(())
    }

    fn render_list(&mut self, document: &Document, list: NodeId, ordered: bool) -> Result<()> {
        for (idx, &item) in document.children(list)?.iter().enumerate() {
            let marker = if ordered {
                format!("{}. ", idx + 1)
            } else {
                "• ".to_string()
            };
            let continuation = " ".repeat(visible_width(&marker));
            self.render_block(document, item, &marker, &continuation)?;
        }
        Ok(())
    }

    fn render_block(
        &mut self,
        document: &Document,
        block: NodeId,
        first_prefix: &str,
        continuation_prefix: &str,
    ) -> Result<()> {
        let cells = self.block_cells(document, block)?;
        let caret = self
            .highlight
            .caret_in(block)
            .map(|offset| caret_to_cell(&cells, offset));
        let mut fragments = Vec::new();
        tokenize_cells(&cells, caret, &mut fragments);
        let prefix_style = if first_prefix.trim().is_empty() {
            Style::default()
        } else {
            self.theme.list_marker_style()
        };
        let lines = wrap_fragments(
            &fragments,
            (first_prefix, prefix_style),
            continuation_prefix,
            self.wrap_width,
        );
        self.consume_lines(lines);
        Ok(())
    }

    /// One styled cell per visible character. `unit` is the caret offset
    /// the character belongs to; a decorator spans several cells of one
    /// unit.
    fn block_cells(&self, document: &Document, block: NodeId) -> Result<Vec<Cell>> {
        let len = document.block_len(block)?;
        let selected = self.highlight.span_in(block, len);
        let mut cells = Vec::new();
        let mut unit = 0;
        for &leaf in document.children(block)? {
            match document.data(leaf)? {
                NodeData::Text { text, format } => {
                    let base = match format {
                        TextFormat::Plain => Style::default(),
                        TextFormat::Hashtag => self.theme.hashtag_style(),
                    };
                    for ch in text.chars() {
                        let style = self.selected_style(base, selected, unit);
                        cells.push(Cell { ch, style, unit });
                        unit += 1;
                    }
                }
                NodeData::Decorator { text, .. } => {
                    let style = self.selected_style(self.theme.decorator_style(), selected, unit);
                    for ch in text.chars() {
                        cells.push(Cell { ch, style, unit });
                    }
                    unit += 1;
                }
                _ => {}
            }
        }
        Ok(cells)
    }

    fn selected_style(&self, base: Style, selected: Option<(usize, usize)>, unit: usize) -> Style {
        match selected {
            Some((from, to)) if from <= unit && unit < to => base.patch(self.theme.selection_style()),
            _ => base,
        }
    }

    fn push_blank_line(&mut self) {
        self.lines.push(Line::from(""));
        self.current_line_index += 1;
    }

    fn consume_lines(&mut self, outputs: Vec<LineOutput>) {
        for output in outputs {
            let mut spans: Vec<Span<'static>> = Vec::with_capacity(output.spans.len());
            for segment in output.spans {
                spans.push(Span::styled(segment.text, segment.style));
            }
            if let Some(column) = output.cursor {
                self.cursor = Some(CursorVisualPosition {
                    line: self.current_line_index,
                    column,
                });
            }
            self.lines.push(Line::from(spans));
            self.current_line_index += 1;
        }
    }

    fn finish(mut self) -> RenderResult {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        let total_lines = self.lines.len();
        RenderResult {
            lines: self.lines,
            cursor: self.cursor,
            total_lines,
        }
    }
}

#[derive(Clone, Copy)]
struct Cell {
    ch: char,
    style: Style,
    unit: usize,
}

/// Index of the first cell at or after caret offset `offset`.
fn caret_to_cell(cells: &[Cell], offset: usize) -> usize {
    cells
        .iter()
        .position(|cell| cell.unit >= offset)
        .unwrap_or(cells.len())
}

#[derive(Clone)]
struct LineSegment {
    text: String,
    style: Style,
}

struct LineOutput {
    spans: Vec<LineSegment>,
    cursor: Option<u16>,
}

#[derive(Clone)]
struct Fragment {
    segments: Vec<LineSegment>,
    kind: FragmentKind,
    width: usize,
    /// Width into the fragment where the caret sits.
    cursor: Option<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FragmentKind {
    Word,
    Whitespace,
}

#[derive(Clone)]
enum FragmentItem {
    Token(Fragment),
    LineBreak,
}

fn tokenize_cells(cells: &[Cell], caret: Option<usize>, fragments: &mut Vec<FragmentItem>) {
    let mut builder: Option<TokenBuilder> = None;
    let mut pending_cursor = false;

    for (idx, cell) in cells.iter().enumerate() {
        if caret == Some(idx) {
            pending_cursor = true;
        }
        if cell.ch == '\r' {
            continue;
        }
        if cell.ch == '\n' {
            if let Some(mut token) = builder.take() {
                token.take_cursor(&mut pending_cursor);
                fragments.push(FragmentItem::Token(token.finish()));
            } else if pending_cursor {
                fragments.push(FragmentItem::Token(cursor_only()));
                pending_cursor = false;
            }
            fragments.push(FragmentItem::LineBreak);
            continue;
        }

        let (ch, repeat) = if cell.ch == '\t' { (' ', 4) } else { (cell.ch, 1) };
        let is_whitespace = ch.is_whitespace();
        for _ in 0..repeat {
            let matches = builder
                .as_ref()
                .is_some_and(|existing| existing.kind_matches(is_whitespace));
            if !matches {
                if let Some(existing) = builder.take() {
                    fragments.push(FragmentItem::Token(existing.finish()));
                }
                builder = Some(TokenBuilder::new(is_whitespace));
            }
            if let Some(current) = builder.as_mut() {
                current.take_cursor(&mut pending_cursor);
                current.push_char(ch, cell.style);
            }
        }
    }

    if caret == Some(cells.len()) {
        pending_cursor = true;
    }
    if let Some(mut token) = builder {
        token.take_cursor(&mut pending_cursor);
        fragments.push(FragmentItem::Token(token.finish()));
    } else if pending_cursor {
        fragments.push(FragmentItem::Token(cursor_only()));
    }
}

fn cursor_only() -> Fragment {
    Fragment {
        segments: Vec::new(),
        kind: FragmentKind::Word,
        width: 0,
        cursor: Some(0),
    }
}

struct TokenBuilder {
    segments: Vec<LineSegment>,
    kind: FragmentKind,
    width: usize,
    cursor: Option<usize>,
}

impl TokenBuilder {
    fn new(is_whitespace: bool) -> Self {
        Self {
            segments: Vec::new(),
            kind: if is_whitespace {
                FragmentKind::Whitespace
            } else {
                FragmentKind::Word
            },
            width: 0,
            cursor: None,
        }
    }

    fn kind_matches(&self, is_whitespace: bool) -> bool {
        matches!(
            (self.kind, is_whitespace),
            (FragmentKind::Whitespace, true) | (FragmentKind::Word, false)
        )
    }

    fn take_cursor(&mut self, pending: &mut bool) {
        if *pending {
            self.cursor = Some(self.width);
            *pending = false;
        }
    }

    fn push_char(&mut self, ch: char, style: Style) {
        match self.segments.last_mut() {
            Some(segment) if segment.style == style => segment.text.push(ch),
            _ => self.segments.push(LineSegment {
                text: ch.to_string(),
                style,
            }),
        }
        self.width += UnicodeWidthChar::width(ch).unwrap_or(0);
    }

    fn finish(self) -> Fragment {
        Fragment {
            segments: self.segments,
            kind: self.kind,
            width: self.width,
            cursor: self.cursor,
        }
    }
}

fn wrap_fragments(
    fragments: &[FragmentItem],
    first_prefix: (&str, Style),
    continuation_prefix: &str,
    width: usize,
) -> Vec<LineOutput> {
    let mut outputs = Vec::new();
    let (prefix, prefix_style) = first_prefix;
    let mut builder = LineBuilder::new(prefix, prefix_style);
    let mut pending_whitespace: Vec<Fragment> = Vec::new();

    for fragment in fragments {
        match fragment {
            FragmentItem::LineBreak => {
                builder.consume_pending(&mut pending_whitespace);
                outputs.push(builder.build_line());
                builder = LineBuilder::new(continuation_prefix, Style::default());
            }
            FragmentItem::Token(token) => match token.kind {
                FragmentKind::Whitespace => {
                    pending_whitespace.push(token.clone());
                }
                FragmentKind::Word => {
                    let whitespace_width: usize =
                        pending_whitespace.iter().map(|item| item.width).sum();
                    if builder.current_width() > builder.prefix_width
                        && builder.current_width() + whitespace_width + token.width > width
                    {
                        builder.consume_pending(&mut pending_whitespace);
                        outputs.push(builder.build_line());
                        builder = LineBuilder::new(continuation_prefix, Style::default());
                    }

                    builder.append_with_pending(token.clone(), &mut pending_whitespace);
                }
            },
        }
    }

    builder.consume_pending(&mut pending_whitespace);
    outputs.push(builder.build_line());
    outputs
}

struct LineBuilder {
    segments: Vec<LineSegment>,
    cursor: Option<u16>,
    width: usize,
    prefix_width: usize,
}

impl LineBuilder {
    fn new(prefix: &str, style: Style) -> Self {
        let prefix_width = visible_width(prefix);
        let mut segments = Vec::new();
        if !prefix.is_empty() {
            segments.push(LineSegment {
                text: prefix.to_string(),
                style,
            });
        }
        Self {
            segments,
            cursor: None,
            width: prefix_width,
            prefix_width,
        }
    }

    fn current_width(&self) -> usize {
        self.width
    }

    fn append_with_pending(&mut self, token: Fragment, pending_whitespace: &mut Vec<Fragment>) {
        self.consume_pending(pending_whitespace);
        self.append_token(token);
    }

    fn consume_pending(&mut self, pending_whitespace: &mut Vec<Fragment>) {
        for fragment in pending_whitespace.drain(..) {
            self.append_token(fragment);
        }
    }

    fn append_token(&mut self, fragment: Fragment) {
        if let Some(offset) = fragment.cursor {
            self.cursor = Some((self.width + offset) as u16);
        }
        self.segments.extend(fragment.segments);
        self.width += fragment.width;
    }

    fn build_line(mut self) -> LineOutput {
        if self.segments.is_empty() {
            self.segments.push(LineSegment {
                text: String::new(),
                style: Style::default(),
            });
        }
        LineOutput {
            spans: self.segments,
            cursor: self.cursor,
        }
    }
}

fn visible_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}
