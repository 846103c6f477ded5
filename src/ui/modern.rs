//! Full-screen terminal player.
//!
//! Shows a window of verses centred on the one being recited, with the
//! active word emphasised, a progress gauge and a status line. The event
//! loop uses `tokio::select!` over runtime updates and keyboard input; all
//! player state lives in the runtime task and arrives as [`Update`]s.

use crate::content::ContentSource;
use crate::controller::VerseTarget;
use crate::event::Command;
use crate::highlight::HighlightEvent;
use crate::pool::{Runtime, Session};
use crate::state::{NowPlaying, Update};
use crate::ui::modern_helpers::verse_numbers;
use crate::ui::styles::VerseStyles;
use crossterm::{
    event::{Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::thread;
use tokio::sync::mpsc;

const SEEK_STEP: f64 = 5.0;
const VOLUME_STEP: f64 = 0.1;

/// UI state for the full-screen mode
#[derive(Debug, Default)]
pub struct ModernUIState {
    pub last_update: Option<Update>,
    /// Verse the window is centred on.
    pub anchor: Option<u32>,
    /// Last reported error, kept until the next key press.
    pub error: Option<String>,
    pub should_exit: bool,
}

impl ModernUIState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an update into the view state.
    pub fn apply_update(&mut self, update: Update) {
        for event in &update.events {
            if let HighlightEvent::VerseEnter { verse, scroll } = *event
                && (scroll || self.anchor.is_none())
            {
                self.anchor = Some(verse);
            }
        }
        if let Some(err) = &update.err {
            self.error = Some(err.clone());
        }
        // nothing to follow yet
        if let Some(active) = update.highlight.active_verse
            && self.anchor.is_none()
        {
            self.anchor = Some(active);
        }
        self.last_update = Some(update);
    }

    /// Browse the window up or down by whole verses.
    pub fn move_anchor(&mut self, delta: isize) {
        let Some(update) = &self.last_update else {
            return;
        };
        let numbers = verse_numbers(update);
        let Some(last) = numbers.len().checked_sub(1) else {
            return;
        };
        let from = self
            .anchor
            .or(update.highlight.active_verse)
            .and_then(|v| numbers.iter().position(|n| *n == v))
            .unwrap_or(update.active_verse_index.min(last));
        let to = from.saturating_add_signed(delta).min(last);
        self.anchor = Some(numbers[to]);
    }
}

/// Map a key press to a player command. `q`, Esc and Ctrl-C return
/// `Shutdown`.
pub fn command_for_key(
    code: KeyCode,
    modifiers: KeyModifiers,
    state: &ModernUIState,
) -> Option<Command> {
    let update = state.last_update.as_ref();
    let volume = update.map(|u| u.volume).unwrap_or(1.0);
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Shutdown),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Shutdown),
        KeyCode::Char(' ') => Some(Command::Toggle),
        KeyCode::Char('n') => Some(Command::Next),
        KeyCode::Char('p') => Some(Command::Prev),
        KeyCode::Left => Some(Command::SeekBy(-SEEK_STEP)),
        KeyCode::Right => Some(Command::SeekBy(SEEK_STEP)),
        KeyCode::Char('r') => Some(Command::CycleReciter),
        KeyCode::Char('m') => Some(Command::ToggleMute),
        KeyCode::Enter => state
            .anchor
            .map(|verse| Command::PlayVerse(VerseTarget::Number(verse))),
        KeyCode::Home => Some(Command::PlayVerse(VerseTarget::Index(0))),
        KeyCode::Char('w') => update
            .and_then(|u| u.highlight.active_word)
            .map(|w| Command::PlayWord {
                verse: w.verse,
                word: w.word_index,
            }),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::SetVolume(volume + VOLUME_STEP)),
        KeyCode::Char('-') => Some(Command::SetVolume(volume - VOLUME_STEP)),
        KeyCode::Char(c) => c
            .to_digit(10)
            .map(|d| Command::SeekFraction(d as f64 / 10.0)),
        _ => None,
    }
}

/// Run the full-screen player. Returns where playback stopped.
pub async fn display_verses_modern<C: ContentSource + 'static>(
    session: Session<C>,
) -> Result<NowPlaying, Box<dyn std::error::Error + Send + Sync>> {
    let (tx, mut rx) = mpsc::channel(32);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let runtime = Runtime::new(session, tx);
    let now_playing = runtime.now_playing();
    let handle = tokio::spawn(runtime.run(cmd_rx));

    enable_raw_mode().map_err(to_boxed_err)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(to_boxed_err)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(to_boxed_err)?;
    let styles = VerseStyles::default();
    let mut state = ModernUIState::new();

    // One OS thread reads crossterm events and forwards them; it stops once
    // the receiver is gone.
    let (event_tx, mut event_rx) = mpsc::channel(32);
    thread::spawn(move || {
        loop {
            match crossterm::event::poll(std::time::Duration::from_millis(100)) {
                Ok(true) => {
                    if let Ok(ev) = crossterm::event::read()
                        && event_tx.blocking_send(ev).is_err()
                    {
                        break;
                    }
                }
                Ok(false) => {
                    if event_tx.is_closed() {
                        break;
                    }
                }
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(100)),
            }
        }
    });

    crate::ui::modern_helpers::draw_ui(&mut terminal, None, None, None, &styles)?;
    while !state.should_exit {
        tokio::select! {
            biased;

            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    state.should_exit = true;
                    continue;
                };
                if let Some(cmd) = process_event(event, &mut state) {
                    if cmd == Command::Shutdown {
                        state.should_exit = true;
                    } else if cmd_tx.send(cmd).await.is_err() {
                        state.should_exit = true;
                    }
                }
                redraw(&mut terminal, &state, &styles)?;
            }

            update = rx.recv() => {
                match update {
                    Some(update) => state.apply_update(update),
                    None => state.should_exit = true,
                }
                redraw(&mut terminal, &state, &styles)?;
            }
        }
    }

    disable_raw_mode().map_err(to_boxed_err)?;
    execute!(io::stdout(), LeaveAlternateScreen).map_err(to_boxed_err)?;

    drop(rx);
    let _ = cmd_tx.send(Command::Shutdown).await;
    handle.await?;
    let last = now_playing.borrow().clone();
    Ok(last)
}

fn redraw<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: &ModernUIState,
    styles: &VerseStyles,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    crate::ui::modern_helpers::draw_ui(
        terminal,
        state.last_update.as_ref(),
        state.anchor,
        state.error.as_deref(),
        styles,
    )
}

/// Handle user input events (keyboard)
fn process_event(event: Event, state: &mut ModernUIState) -> Option<Command> {
    let Event::Key(key) = event else {
        return None;
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    state.error = None;
    match key.code {
        KeyCode::Up => {
            state.move_anchor(-1);
            return None;
        }
        KeyCode::Down => {
            state.move_anchor(1);
            return None;
        }
        _ => {}
    }
    let cmd = command_for_key(key.code, key.modifiers, state)?;
    // follow the listener's jumps even while scroll is suppressed
    if matches!(
        cmd,
        Command::Next
            | Command::Prev
            | Command::SeekBy(_)
            | Command::SeekFraction(_)
            | Command::PlayVerse(_)
    ) {
        state.anchor = None;
    }
    Some(cmd)
}

fn to_boxed_err<E: std::error::Error + Send + Sync + 'static>(
    e: E,
) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}
