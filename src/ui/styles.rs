use ratatui::style;

pub struct VerseStyles {
    pub before: style::Style,
    pub current: style::Style,
    pub after: style::Style,
    /// The word being recited inside the current verse.
    pub word: style::Style,
    pub gauge: style::Style,
    pub status: style::Style,
    pub error: style::Style,
}

impl Default for VerseStyles {
    fn default() -> Self {
        Self {
            before: style::Style::default()
                .add_modifier(style::Modifier::ITALIC | style::Modifier::DIM),
            current: style::Style::default()
                .fg(style::Color::Green)
                .add_modifier(style::Modifier::BOLD),
            after: style::Style::default(),
            word: style::Style::default()
                .fg(style::Color::Black)
                .bg(style::Color::Green)
                .add_modifier(style::Modifier::BOLD),
            gauge: style::Style::default().fg(style::Color::Green),
            status: style::Style::default().add_modifier(style::Modifier::DIM),
            error: style::Style::default().fg(style::Color::Red),
        }
    }
}
