//! Verse and word highlight transitions.
//!
//! The emitter remembers what is lit and turns every change into a paired
//! leave/enter notification, so observers never see an "enter" without the
//! previous target's "leave". Notifications queue up until the runtime
//! drains them into the next [`Update`](crate::state::Update).

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WordRef {
    pub verse: u32,
    pub word_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HighlightEvent {
    VerseLeave(u32),
    /// `scroll` asks the view to bring the verse into view.
    VerseEnter { verse: u32, scroll: bool },
    WordLeave(WordRef),
    WordEnter(WordRef),
}

/// What is currently lit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HighlightState {
    pub active_verse: Option<u32>,
    pub active_word: Option<WordRef>,
}

#[derive(Debug, Default)]
pub struct HighlightEmitter {
    state: HighlightState,
    suppress_scroll: bool,
    /// Known word count per verse; verses missing here are not checked.
    word_counts: HashMap<u32, u32>,
    pending: Vec<HighlightEvent>,
}

impl HighlightEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn set_word_counts(&mut self, counts: HashMap<u32, u32>) {
        self.word_counts = counts;
    }

    pub fn word_count(&self, verse: u32) -> Option<u32> {
        self.word_counts.get(&verse).copied()
    }

    /// While set, verse enters do not request scrolling.
    pub fn suppress_scroll(&mut self, suppress: bool) {
        self.suppress_scroll = suppress;
    }

    /// Returns true when the active verse changed.
    pub fn set_active_verse(&mut self, verse: Option<u32>) -> bool {
        if self.state.active_verse == verse {
            return false;
        }
        if let Some(old) = self.state.active_verse {
            self.pending.push(HighlightEvent::VerseLeave(old));
        }
        if let Some(new) = verse {
            self.pending.push(HighlightEvent::VerseEnter {
                verse: new,
                scroll: !self.suppress_scroll,
            });
        }
        self.state.active_verse = verse;
        true
    }

    /// Returns true when the active word changed. Word indices outside the
    /// verse's known word count are logged and ignored.
    pub fn set_active_word(&mut self, word: Option<WordRef>) -> bool {
        if self.state.active_word == word {
            return false;
        }
        if let Some(w) = word
            && !self.is_known_word(w)
        {
            tracing::warn!(
                verse = w.verse,
                word = w.word_index,
                known = ?self.word_count(w.verse),
                "Ignoring word highlight outside the verse"
            );
            return false;
        }
        if let Some(old) = self.state.active_word {
            self.pending.push(HighlightEvent::WordLeave(old));
        }
        if let Some(new) = word {
            self.pending.push(HighlightEvent::WordEnter(new));
        }
        self.state.active_word = word;
        true
    }

    fn is_known_word(&self, w: WordRef) -> bool {
        if w.word_index == 0 {
            return false;
        }
        match self.word_count(w.verse) {
            Some(count) => w.word_index <= count,
            None => true,
        }
    }

    /// Leave everything that is lit.
    pub fn clear(&mut self) {
        self.set_active_word(None);
        self.set_active_verse(None);
    }

    pub fn drain(&mut self) -> Vec<HighlightEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(verse: u32, word_index: u32) -> WordRef {
        WordRef { verse, word_index }
    }

    #[test]
    fn verse_changes_are_paired() {
        let mut e = HighlightEmitter::new();
        assert!(e.set_active_verse(Some(1)));
        assert!(!e.set_active_verse(Some(1)));
        assert!(e.set_active_verse(Some(2)));
        assert!(e.set_active_verse(None));
        assert_eq!(
            e.drain(),
            vec![
                HighlightEvent::VerseEnter { verse: 1, scroll: true },
                HighlightEvent::VerseLeave(1),
                HighlightEvent::VerseEnter { verse: 2, scroll: true },
                HighlightEvent::VerseLeave(2),
            ]
        );
        assert!(e.drain().is_empty());
    }

    #[test]
    fn scroll_suppression_marks_enters() {
        let mut e = HighlightEmitter::new();
        e.suppress_scroll(true);
        e.set_active_verse(Some(4));
        assert_eq!(
            e.drain(),
            vec![HighlightEvent::VerseEnter { verse: 4, scroll: false }]
        );
    }

    #[test]
    fn word_changes_are_independent_of_verse() {
        let mut e = HighlightEmitter::new();
        e.set_active_verse(Some(1));
        e.drain();
        e.set_active_word(Some(w(1, 1)));
        e.set_active_word(Some(w(1, 2)));
        e.set_active_word(None);
        assert_eq!(
            e.drain(),
            vec![
                HighlightEvent::WordEnter(w(1, 1)),
                HighlightEvent::WordLeave(w(1, 1)),
                HighlightEvent::WordEnter(w(1, 2)),
                HighlightEvent::WordLeave(w(1, 2)),
            ]
        );
        assert_eq!(e.state().active_verse, Some(1));
    }

    #[test]
    fn out_of_range_words_are_ignored() {
        let mut e = HighlightEmitter::new();
        e.set_word_counts(HashMap::from([(1, 3)]));
        assert!(e.set_active_word(Some(w(1, 3))));
        assert!(!e.set_active_word(Some(w(1, 4))));
        assert!(!e.set_active_word(Some(w(1, 0))));
        assert_eq!(e.state().active_word, Some(w(1, 3)));
        // unknown verse is not checked
        assert!(e.set_active_word(Some(w(9, 40))));
    }

    #[test]
    fn clear_leaves_word_then_verse() {
        let mut e = HighlightEmitter::new();
        e.set_active_verse(Some(2));
        e.set_active_word(Some(w(2, 1)));
        e.drain();
        e.clear();
        assert_eq!(
            e.drain(),
            vec![HighlightEvent::WordLeave(w(2, 1)), HighlightEvent::VerseLeave(2)]
        );
        assert_eq!(e.state(), HighlightState::default());
    }
}
