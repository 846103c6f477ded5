// state.rs: snapshots published by the player

use crate::content::VerseText;
use crate::controller::phase::SessionPhase;
use crate::highlight::{HighlightEvent, HighlightState};
use std::sync::Arc;

/// Scrubber-ready snapshot of the player, sent to the front end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub chapter: u32,
    pub reciter_id: Option<u32>,
    /// Playback mode label, `None` before content is attached.
    pub mode: Option<&'static str>,
    pub phase: SessionPhase,
    /// Global timeline position in seconds.
    pub current_time: f64,
    pub total_duration: f64,
    pub active_verse_index: usize,
    pub verse_count: usize,
    pub playing: bool,
    pub activated: bool,
    pub volume: f64,
    pub muted: bool,
    pub highlight: HighlightState,
    /// Highlight transitions since the previous update.
    pub events: Vec<HighlightEvent>,
    pub verses: Arc<Vec<VerseText>>,
    /// Reciter being fetched for a hot-swap.
    pub swapping_to: Option<u32>,
    pub err: Option<String>,
    pub version: u64, // Incremented on any state change
}

impl Update {
    pub fn progress(&self) -> f64 {
        let ratio = self.current_time / self.total_duration;
        if self.total_duration > 0.0 && ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn verse_text(&self, verse_number: u32) -> Option<&VerseText> {
        self.verses.iter().find(|v| v.verse_number == verse_number)
    }
}

/// Last-value "now playing" broadcast for the rest of the application
/// (a continue-reading tracker, a status line).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub chapter: Option<u32>,
    pub reciter_id: Option<u32>,
    pub verse: Option<u32>,
    pub word: Option<u32>,
    /// Position inside the loaded file.
    pub native_time: f64,
    pub playing: bool,
}

impl NowPlaying {
    /// Deep-link query that resumes at this place, e.g. `verse=3&word=2`.
    pub fn resume_query(&self) -> Option<String> {
        let verse = self.verse?;
        Some(match self.word {
            Some(word) => format!("verse={verse}&word={word}"),
            None => format!("verse={verse}"),
        })
    }
}
