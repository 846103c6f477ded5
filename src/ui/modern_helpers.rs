use crate::state::Update;
use crate::ui::styles::VerseStyles;
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Gauge, Paragraph};
use std::error::Error;

/// Verse numbers in display order: from the verse text when present,
/// otherwise `1..=verse_count`.
pub fn verse_numbers(update: &Update) -> Vec<u32> {
    if update.verses.is_empty() {
        (1..=update.verse_count as u32).collect()
    } else {
        update.verses.iter().map(|v| v.verse_number).collect()
    }
}

/// Text shown for a verse: its words, or its `chapter:verse` key when the
/// text is unavailable.
pub fn verse_display_text(update: &Update, verse: u32) -> String {
    match update.verse_text(verse) {
        Some(v) if !v.words.is_empty() => v.words.join(" "),
        _ => format!("{}:{}", update.chapter, verse),
    }
}

pub fn wrap_verse(text: &str, width: usize) -> Vec<String> {
    let wrapped: Vec<String> = textwrap::wrap(text, width.max(1))
        .into_iter()
        .map(|l| l.into_owned())
        .collect();
    if wrapped.is_empty() {
        vec![String::new()]
    } else {
        wrapped
    }
}

/// `m:ss`, `--:--` for unknown times.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn format_status(update: &Update) -> String {
    let mut parts = vec![format!("Surah {}", update.chapter)];
    if let Some(id) = update.reciter_id {
        parts.push(format!("reciter {}", id));
    }
    if let Some(mode) = update.mode {
        parts.push(mode.to_string());
    }
    parts.push(update.phase.label().to_string());
    if update.muted {
        parts.push("muted".to_string());
    } else {
        parts.push(format!("vol {}%", (update.volume * 100.0).round() as u32));
    }
    if let Some(id) = update.swapping_to {
        parts.push(format!("loading reciter {}", id));
    }
    parts.join(" · ")
}

/// A collection of styled text lines ready for rendering.
pub struct VisibleLines<'a> {
    pub before: Vec<Line<'a>>,
    pub current: Vec<Line<'a>>,
    pub after: Vec<Line<'a>>,
}

impl<'a> VisibleLines<'a> {
    pub fn into_vec(self) -> Vec<Line<'a>> {
        [self.before, self.current, self.after].concat()
    }
}

/// Collects the styled lines that should appear *before* the current verse.
pub fn collect_before_lines<'a>(
    current_index: usize,
    wrapped_blocks: &[Vec<String>],
    mut lines_needed: usize,
    style: Style,
) -> Vec<Line<'a>> {
    let mut before = Vec::new();
    let mut i = current_index;
    while i > 0 && lines_needed > 0 {
        i -= 1;
        let block = &wrapped_blocks[i];
        let take = block.len().min(lines_needed);
        let start = block.len() - take;
        let lines = block[start..]
            .iter()
            .map(|line| Line::from(Span::styled(line.clone(), style)));
        before.splice(0..0, lines);
        lines_needed -= take;
    }
    before
}

/// Collects the styled lines that should appear *after* the current verse.
pub fn collect_after_lines<'a>(
    current_index: usize,
    wrapped_blocks: &[Vec<String>],
    mut lines_needed: usize,
    style: Style,
) -> Vec<Line<'a>> {
    let mut after = Vec::new();
    let mut j = current_index + 1;
    while j < wrapped_blocks.len() && lines_needed > 0 {
        let block = &wrapped_blocks[j];
        let take = block.len().min(lines_needed);
        after.extend(
            block[..take]
                .iter()
                .map(|line| Line::from(Span::styled(line.clone(), style))),
        );
        lines_needed -= take;
        j += 1;
    }
    after
}

/// Split words into visual lines by width (chars), keeping each word's
/// 0-based index so it can be styled on its own.
pub fn split_words_into_lines(words: &[String], width: usize) -> Vec<Vec<(usize, &str)>> {
    let mut lines = Vec::new();
    let mut current: Vec<(usize, &str)> = Vec::new();
    let mut current_len = 0usize;
    for (i, w) in words.iter().enumerate() {
        let wlen = w.chars().count();
        if !current.is_empty() && width > 0 && current_len + 1 + wlen > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += if current.is_empty() { wlen } else { 1 + wlen };
        current.push((i, w.as_str()));
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn current_verse_lines(
    update: &Update,
    verse: u32,
    width: usize,
    styles: &VerseStyles,
) -> Vec<Line<'static>> {
    let words = match update.verse_text(verse) {
        Some(v) if !v.words.is_empty() => &v.words,
        _ => {
            return wrap_verse(&verse_display_text(update, verse), width)
                .into_iter()
                .map(|l| Line::from(Span::styled(l, styles.current)))
                .collect();
        }
    };
    let active_word = update
        .highlight
        .active_word
        .filter(|w| w.verse == verse)
        .map(|w| w.word_index as usize);
    split_words_into_lines(words, width)
        .into_iter()
        .map(|line| {
            let mut spans = Vec::with_capacity(line.len() * 2);
            for (n, (i, w)) in line.into_iter().enumerate() {
                if n > 0 {
                    spans.push(Span::styled(" ", styles.current));
                }
                let style = if active_word == Some(i + 1) {
                    styles.word
                } else {
                    styles.current
                };
                spans.push(Span::styled(w.to_string(), style));
            }
            Line::from(spans)
        })
        .collect()
}

/// Lines for a `w`×`h` window centred on `anchor` (or the active verse).
pub fn gather_visible_lines(
    update: &Update,
    anchor: Option<u32>,
    w: usize,
    h: usize,
    styles: &VerseStyles,
) -> VisibleLines<'static> {
    let numbers = verse_numbers(update);
    if numbers.is_empty() || h == 0 {
        return VisibleLines {
            before: Vec::new(),
            current: Vec::new(),
            after: Vec::new(),
        };
    }
    let current_index = anchor
        .or(update.highlight.active_verse)
        .and_then(|v| numbers.iter().position(|n| *n == v))
        .unwrap_or_else(|| update.active_verse_index.min(numbers.len() - 1));

    let wrapped_blocks: Vec<Vec<String>> = numbers
        .iter()
        .map(|v| wrap_verse(&verse_display_text(update, *v), w))
        .collect();
    let mut current = current_verse_lines(update, numbers[current_index], w, styles);
    current.truncate(h);

    let remaining = h.saturating_sub(current.len());
    let before_needed = remaining / 2;
    let after_needed = remaining - before_needed;
    VisibleLines {
        before: collect_before_lines(current_index, &wrapped_blocks, before_needed, styles.before),
        current,
        after: collect_after_lines(current_index, &wrapped_blocks, after_needed, styles.after),
    }
}

/// Draw the verse window, the progress gauge and the status line.
pub fn draw_ui<B: Backend>(
    terminal: &mut Terminal<B>,
    update: Option<&Update>,
    anchor: Option<u32>,
    error: Option<&str>,
    styles: &VerseStyles,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    terminal
        .draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(1),
                    Constraint::Length(1),
                    Constraint::Length(1),
                ])
                .split(f.area());
            let main = chunks[0];

            let Some(update) = update else {
                let waiting = Paragraph::new(Line::from(Span::styled("Loading…", styles.status)))
                    .alignment(Alignment::Center);
                f.render_widget(waiting, main);
                return;
            };

            let visible = gather_visible_lines(
                update,
                anchor,
                main.width as usize,
                main.height as usize,
                styles,
            )
            .into_vec();
            let top_padding = (main.height as usize).saturating_sub(visible.len()) / 2;
            let render_area = Rect {
                x: main.x,
                y: main.y + top_padding as u16,
                width: main.width,
                height: (visible.len() as u16).min(main.height),
            };
            f.render_widget(
                Paragraph::new(visible).alignment(Alignment::Center),
                render_area,
            );

            let label = format!(
                "{} / {}",
                format_clock(update.current_time),
                format_clock(update.total_duration)
            );
            f.render_widget(
                Gauge::default()
                    .gauge_style(styles.gauge)
                    .ratio(update.progress())
                    .label(label),
                chunks[1],
            );

            let status = match error {
                Some(err) => Span::styled(err.to_string(), styles.error),
                None => Span::styled(format_status(update), styles.status),
            };
            f.render_widget(
                Paragraph::new(Line::from(status)).alignment(Alignment::Center),
                chunks[2],
            );
        })
        .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)?;
    Ok(())
}
