use ratatui::style::{Color, Modifier, Style};

/// Theme configuration for the editor
#[derive(Clone, Debug)]
pub struct Theme {
    /// Background color for the editor
    pub background: Color,

    /// Foreground (text) color for the status bar
    pub status_bar_fg: Color,

    /// Background color for the status bar
    pub status_bar_bg: Color,

    /// Foreground color for active selection
    pub selection_fg: Color,

    /// Background color for active selection
    pub selection_bg: Color,

    /// Color for hashtag runs
    pub hashtag_color: Color,

    /// Foreground color for decorators
    pub decorator_fg: Color,

    /// Background color for decorators
    pub decorator_bg: Color,

    /// Color for list bullets and numbers
    pub list_marker_color: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            selection_fg: Color::White,
            selection_bg: Color::LightBlue,
            hashtag_color: Color::Cyan,
            decorator_fg: Color::Black,
            decorator_bg: Color::Gray,
            list_marker_color: Color::DarkGray,
        }
    }
}

impl Theme {
    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    /// Layered over a run's own style, so hashtags stay bold when selected.
    pub fn selection_style(&self) -> Style {
        Style::default().fg(self.selection_fg).bg(self.selection_bg)
    }

    pub fn hashtag_style(&self) -> Style {
        Style::default()
            .fg(self.hashtag_color)
            .add_modifier(Modifier::BOLD)
    }

    pub fn decorator_style(&self) -> Style {
        Style::default().fg(self.decorator_fg).bg(self.decorator_bg)
    }

    pub fn list_marker_style(&self) -> Style {
        Style::default().fg(self.list_marker_color)
    }
}
