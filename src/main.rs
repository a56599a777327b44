use std::{
    env,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use arboard::Clipboard;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use outline_tui::config::Config;
use outline_tui::editor::{
    self, ClipboardPayload, Document, DocumentEditor, Motion, breadcrumbs,
    decode_structured, encode_structured, from_plain_text,
};
use outline_tui::render::{CursorVisualPosition, RenderResult, render_document};
use outline_tui::theme::Theme;

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);

fn main() -> Result<()> {
    init_logging()?;
    run()
}

/// Logs go to the file named by `OUTLINE_LOG`; the terminal belongs to
/// the UI.
fn init_logging() -> Result<()> {
    let Ok(path) = env::var("OUTLINE_LOG") else {
        return Ok(());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(path_arg) = args.next() else {
        eprintln!("Usage: outline-tui <file.json>");
        return Ok(());
    };
    let path = PathBuf::from(path_arg);
    let config = Config::load();

    let (document, initial_status) = load_document(&path)?;
    let mut app = App::new(document, path, config, initial_status);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Reads a saved document. Files that are not a structured document are
/// taken as plain text, one paragraph per line.
fn load_document(path: &Path) -> Result<(Document, Option<String>)> {
    if !path.exists() {
        return Ok((Document::new(), Some("New document".to_string())));
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let structured = decode_structured(&content)
        .and_then(|fragment| Document::from_blocks(fragment.nodes));
    match structured {
        Ok(document) => Ok((document, None)),
        Err(err) => {
            info!(path = %path.display(), %err, "loading file as plain text");
            let document = Document::from_blocks(from_plain_text(&content).nodes)
                .context("failed to build document from plain text")?;
            Ok((document, Some("Opened as plain text".to_string())))
        }
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    while !app.should_quit() {
        terminal
            .draw(|frame| app.draw(frame))
            .context("failed to draw frame")?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt)?;
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }

    Ok(())
}

struct App {
    editor: DocumentEditor,
    file_path: PathBuf,
    config: Config,
    theme: Theme,
    clipboard: Option<Clipboard>,
    last_copied: Option<ClipboardPayload>,
    scroll_top: usize,
    last_view_height: usize,
    should_quit: bool,
    dirty: bool,
    status_message: Option<(String, Instant)>,
    last_cursor_visual: Option<CursorVisualPosition>,
}

impl App {
    fn new(
        document: Document,
        path: PathBuf,
        config: Config,
        initial_status: Option<String>,
    ) -> Self {
        let editor = DocumentEditor::with_settings(document, config.editor_settings());
        let clipboard = if config.sync_system_clipboard {
            match Clipboard::new() {
                Ok(clipboard) => Some(clipboard),
                Err(err) => {
                    warn!(%err, "system clipboard unavailable");
                    None
                }
            }
        } else {
            None
        };

        Self {
            editor,
            file_path: path,
            config,
            theme: Theme::default(),
            clipboard,
            last_copied: None,
            scroll_top: 0,
            last_view_height: 1,
            should_quit: false,
            dirty: false,
            status_message: initial_status.map(|msg| (msg, Instant::now())),
            last_cursor_visual: None,
        }
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let status_height = if area.height > 1 { 2 } else { 1 };
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(status_height)])
            .split(area);

        let editor_area = vertical[0];
        let status_area = vertical[1];

        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(editor_area);
        let mut text_area = horizontal[0];
        let scrollbar_area = horizontal[1];
        text_area.width = self.config.wrap_width(text_area.width).max(1);

        let render = match render_document(
            self.editor.document(),
            &self.editor.selection(),
            text_area.width as usize,
            &self.theme,
        ) {
            Ok(render) => render,
            Err(err) => {
                warn!(%err, "failed to render document");
                self.set_status(format!("Render error: {err}"));
                return;
            }
        };

        let cursor_visual = render.cursor;
        self.last_cursor_visual = cursor_visual;

        let viewport_height = text_area.height as usize;
        self.last_view_height = viewport_height.max(1);
        self.adjust_scroll(&render, viewport_height);

        let paragraph = Paragraph::new(Text::from(render.lines.clone()))
            .style(ratatui::style::Style::default().bg(self.theme.background))
            .block(Block::default().borders(Borders::NONE))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, text_area);

        let mut scrollbar_state = ScrollbarState::new(render.total_lines).position(self.scroll_top);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
        frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);

        if let Some(cursor) = cursor_visual {
            if cursor.line >= self.scroll_top
                && cursor.line < self.scroll_top + viewport_height
                && text_area.width > 0
            {
                let cursor_y = text_area.y + (cursor.line - self.scroll_top) as u16;
                let cursor_x = text_area.x + cursor.column.min(text_area.width - 1);
                frame.set_cursor_position(Position::new(cursor_x, cursor_y));
            }
        }

        let status_text = self.status_line(render.total_lines);
        let status_widget = Paragraph::new(Line::from(Span::styled(
            status_text,
            self.theme.status_bar_style(),
        )))
        .block(Block::default().borders(Borders::TOP));
        frame.render_widget(status_widget, status_area);
    }

    fn status_line(&mut self, total_lines: usize) -> String {
        self.prune_status_message();
        let cursor_details = self.cursor_status_text();
        if let Some((message, _)) = &self.status_message {
            return format!("{cursor_details} | {message}");
        }

        let marker = if self.dirty { "*" } else { "" };
        format!(
            "{} | {}{} | Lines: {} | Ctrl-S save | Ctrl-Q quit",
            cursor_details,
            self.file_path.display(),
            marker,
            total_lines
        )
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message {
            if instant.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    fn adjust_scroll(&mut self, render: &RenderResult, viewport_height: usize) {
        let viewport = viewport_height.max(1);
        let max_scroll = render
            .total_lines
            .saturating_sub(viewport)
            .min(render.total_lines);
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
        if let Some(cursor) = &render.cursor {
            if cursor.line < self.scroll_top {
                self.scroll_top = cursor.line;
            } else if cursor.line >= self.scroll_top + viewport_height {
                let target = cursor.line.saturating_add(1);
                self.scroll_top = target.saturating_sub(viewport);
            }
        }
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
    }

    /// Reports a failed command in the status bar. The editor has already
    /// rolled the document back.
    fn apply(&mut self, result: editor::Result<()>, edits: bool) {
        match result {
            Ok(()) => {
                if edits {
                    self.dirty = true;
                }
            }
            Err(err) => self.set_status(format!("Error: {err}")),
        }
    }

    fn copy(&mut self, cut: bool) {
        let payload = if cut {
            self.editor.cut()
        } else {
            self.editor.copy()
        };
        match payload {
            Ok(payload) => {
                if let Some(clipboard) = self.clipboard.as_mut() {
                    if let Err(err) = clipboard.set_text(payload.plain_text.clone()) {
                        warn!(%err, "failed to update system clipboard");
                    }
                }
                self.last_copied = Some(payload);
                if cut {
                    self.dirty = true;
                }
            }
            Err(err) => self.set_status(format!("Error: {err}")),
        }
    }

    /// Pastes the last copied payload while the system clipboard still
    /// holds its text, otherwise whatever text the system clipboard holds.
    fn paste(&mut self) {
        let system_text = self
            .clipboard
            .as_mut()
            .and_then(|clipboard| clipboard.get_text().ok());
        let result = match (system_text, self.last_copied.as_ref()) {
            (Some(text), Some(payload)) if payload.plain_text == text => self.editor.paste(payload),
            (Some(text), _) => self.editor.paste_plain_text(&text),
            (None, Some(payload)) => self.editor.paste(payload),
            (None, None) => Ok(()),
        };
        self.apply(result, true);
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event
        {
            let control = modifiers.contains(KeyModifiers::CONTROL);
            let shift = modifiers.contains(KeyModifiers::SHIFT);
            match (code, modifiers) {
                (KeyCode::Char('q'), m) if m.contains(KeyModifiers::CONTROL) => {
                    self.should_quit = true;
                }
                (KeyCode::Char('s'), m) if m.contains(KeyModifiers::CONTROL) => {
                    self.save()?;
                }
                (KeyCode::Char('a'), m) if m.contains(KeyModifiers::CONTROL) => {
                    let result = self.editor.select_all();
                    self.apply(result, false);
                }
                (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => self.copy(false),
                (KeyCode::Char('x'), m) if m.contains(KeyModifiers::CONTROL) => self.copy(true),
                (KeyCode::Char('v'), m) if m.contains(KeyModifiers::CONTROL) => self.paste(),
                (KeyCode::Left, _) => {
                    let motion = if control { Motion::WordLeft } else { Motion::Left };
                    self.move_or_extend(motion, shift);
                }
                (KeyCode::Right, _) => {
                    let motion = if control { Motion::WordRight } else { Motion::Right };
                    self.move_or_extend(motion, shift);
                }
                (KeyCode::Up, m) if m.contains(KeyModifiers::CONTROL) => {
                    self.scroll_top = self.scroll_top.saturating_sub(self.last_view_height);
                }
                (KeyCode::Up, _) => self.move_or_extend(Motion::Up, shift),
                (KeyCode::Down, m) if m.contains(KeyModifiers::CONTROL) => {
                    self.scroll_top += self.last_view_height;
                }
                (KeyCode::Down, _) => self.move_or_extend(Motion::Down, shift),
                (KeyCode::Home, _) => {
                    let motion = if control { Motion::DocumentStart } else { Motion::LineStart };
                    self.move_or_extend(motion, shift);
                }
                (KeyCode::End, _) => {
                    let motion = if control { Motion::DocumentEnd } else { Motion::LineEnd };
                    self.move_or_extend(motion, shift);
                }
                (KeyCode::Backspace, _) => {
                    let result = self.editor.delete_backward();
                    self.apply(result, true);
                }
                (KeyCode::Delete, _) => {
                    let result = self.editor.delete_forward();
                    self.apply(result, true);
                }
                (KeyCode::Enter, _) => {
                    let result = self.editor.insert_paragraph_break();
                    self.apply(result, true);
                }
                (KeyCode::Tab, _) => {
                    let result = self.editor.insert_char('\t');
                    self.apply(result, true);
                }
                (KeyCode::Char(ch), m)
                    if !m.contains(KeyModifiers::CONTROL) && !m.contains(KeyModifiers::ALT) =>
                {
                    let result = self.editor.insert_char(ch);
                    self.apply(result, true);
                }
                (KeyCode::PageUp, _) => {
                    self.scroll_top = self.scroll_top.saturating_sub(self.last_view_height.max(1));
                }
                (KeyCode::PageDown, _) => {
                    self.scroll_top += self.last_view_height.max(1);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn move_or_extend(&mut self, motion: Motion, extend: bool) {
        let result = if extend {
            self.editor.extend_selection(motion)
        } else {
            self.editor.move_caret(motion)
        };
        self.apply(result, false);
    }

    fn on_tick(&mut self) {
        self.prune_status_message();
    }

    fn save(&mut self) -> Result<()> {
        let fragment = self
            .editor
            .document()
            .to_fragment()
            .context("failed to snapshot document")?;
        let contents = encode_structured(&fragment).context("failed to encode document")?;
        fs::write(&self.file_path, contents)
            .with_context(|| format!("failed to write {}", self.file_path.display()))?;

        self.dirty = false;
        self.set_status("Saved");
        Ok(())
    }

    fn cursor_status_text(&self) -> String {
        let position_text = if let Some(position) = self.last_cursor_visual {
            format!("[{},{}]", position.line + 1, usize::from(position.column) + 1)
        } else {
            "[?,?]".to_string()
        };
        let mut parts = vec![position_text];
        if let Ok(labels) = breadcrumbs(self.editor.document(), self.editor.selection().focus) {
            if !labels.is_empty() {
                parts.push(labels.join(" > "));
            }
        }
        parts.join(" ")
    }
}
