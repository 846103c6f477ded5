//! Verse- and word-level time intervals and the lookups over them.
//!
//! Both lookups are a binary search over `start` followed by a boundary
//! check against `end`. Verse lookups always resolve to some verse (the
//! nearest one when the clock sits in a gap); word lookups may resolve to
//! nothing, so the UI can show "no active word" during silence.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Time span during which a verse is recited within the loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub verse_number: u32,
    pub start: f64,
    pub end: f64,
}

/// Time span of a single word. `word_index` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WordSegment {
    pub verse_number: u32,
    pub word_index: u32,
    pub start: f64,
    pub end: f64,
}

/// Anything with a `[start, end)` interval.
pub trait Span {
    fn start(&self) -> f64;
    fn end(&self) -> f64;
}

impl Span for Segment {
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
}

impl Span for WordSegment {
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
}

/// Greatest index whose start is `<= t`, or `None` when `t` precedes every
/// span (or is NaN).
fn last_started<S: Span>(spans: &[S], t: f64) -> Option<usize> {
    if t.is_nan() {
        return None;
    }
    match spans.partition_point(|s| s.start() <= t) {
        0 => None,
        n => Some(n - 1),
    }
}

/// Index of the span containing `t`, or the nearest one when `t` is outside
/// every span.
///
/// Times before the first start (and NaN) resolve to `0`; times past the
/// last end resolve to the last index. A time between one span's end and
/// the next one's start resolves to the next span, which absorbs encoder
/// rounding at verse boundaries.
///
/// Callers must not pass an empty slice; the result would be meaningless.
pub fn locate<S: Span>(spans: &[S], t: f64) -> usize {
    let Some(k) = last_started(spans, t) else {
        return 0;
    };
    if t > spans[k].end() && k + 1 < spans.len() {
        k + 1
    } else {
        k
    }
}

/// Word containing `t`, or `None` when `t` is in a gap between words,
/// before the first word, or past the last one.
pub fn locate_word(words: &[WordSegment], t: f64) -> Option<&WordSegment> {
    let k = last_started(words, t)?;
    let w = &words[k];
    if t < w.end { Some(w) } else { None }
}

fn is_valid<S: Span>(s: &S) -> bool {
    s.start().is_finite() && s.end().is_finite() && s.end() >= s.start()
}

/// Sort spans ascending by start and drop the malformed ones.
///
/// Upstream ordering is not guaranteed, so every list goes through here
/// before it is searched.
pub fn normalize<S: Span>(mut spans: Vec<S>) -> Vec<S> {
    let before = spans.len();
    spans.retain(is_valid);
    if spans.len() != before {
        tracing::warn!(
            dropped = before - spans.len(),
            "Dropped malformed timing spans"
        );
    }
    spans.sort_by(|a, b| a.start().total_cmp(&b.start()));
    spans
}

/// Sorted verse and word timings for one loaded source.
///
/// In Single mode all times are positions in the chapter file. In PerAyah
/// mode word times are relative to the verse's own file and are kept per
/// verse instead (see [`VerseWords`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentIndex {
    verses: Vec<Segment>,
    words: Vec<WordSegment>,
    word_counts: HashMap<u32, u32>,
}

impl SegmentIndex {
    pub fn new(verses: Vec<Segment>, words: Vec<WordSegment>) -> Self {
        let verses = normalize(verses);
        let words = normalize(words);
        let word_counts = count_words(&words);
        Self {
            verses,
            words,
            word_counts,
        }
    }

    pub fn verses(&self) -> &[Segment] {
        &self.verses
    }

    pub fn verse_count(&self) -> usize {
        self.verses.len()
    }

    /// Verse index for a native time. `None` only when there are no verses.
    pub fn verse_at(&self, t: f64) -> Option<usize> {
        if self.verses.is_empty() {
            None
        } else {
            Some(locate(&self.verses, t))
        }
    }

    pub fn word_at(&self, t: f64) -> Option<&WordSegment> {
        locate_word(&self.words, t)
    }

    /// Position of a verse number in the sorted verse list.
    pub fn verse_position(&self, verse_number: u32) -> Option<usize> {
        self.verses.iter().position(|s| s.verse_number == verse_number)
    }

    pub fn word_start(&self, verse_number: u32, word_index: u32) -> Option<f64> {
        self.words
            .iter()
            .find(|w| w.verse_number == verse_number && w.word_index == word_index)
            .map(|w| w.start)
    }

    pub fn word_end(&self, verse_number: u32, word_index: u32) -> Option<f64> {
        self.words
            .iter()
            .find(|w| w.verse_number == verse_number && w.word_index == word_index)
            .map(|w| w.end)
    }

    pub fn word_counts(&self) -> &HashMap<u32, u32> {
        &self.word_counts
    }
}

/// Word timings of one verse in PerAyah mode, relative to that verse's file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerseWords {
    by_verse: HashMap<u32, Vec<WordSegment>>,
}

impl VerseWords {
    pub fn new(by_verse: HashMap<u32, Vec<WordSegment>>) -> Self {
        let by_verse = by_verse
            .into_iter()
            .map(|(verse, words)| (verse, normalize(words)))
            .filter(|(_, words)| !words.is_empty())
            .collect();
        Self { by_verse }
    }

    pub fn word_at(&self, verse_number: u32, t: f64) -> Option<&WordSegment> {
        self.by_verse
            .get(&verse_number)
            .and_then(|words| locate_word(words, t))
    }

    fn find(&self, verse_number: u32, word_index: u32) -> Option<&WordSegment> {
        self.by_verse
            .get(&verse_number)?
            .iter()
            .find(|w| w.word_index == word_index)
    }

    pub fn word_start(&self, verse_number: u32, word_index: u32) -> Option<f64> {
        self.find(verse_number, word_index).map(|w| w.start)
    }

    pub fn word_end(&self, verse_number: u32, word_index: u32) -> Option<f64> {
        self.find(verse_number, word_index).map(|w| w.end)
    }

    /// End of the last word of a verse; a lower bound for the track length.
    pub fn last_end(&self, verse_number: u32) -> Option<f64> {
        self.by_verse
            .get(&verse_number)
            .and_then(|words| words.iter().map(|w| w.end).reduce(f64::max))
    }

    pub fn word_counts(&self) -> HashMap<u32, u32> {
        self.by_verse
            .values()
            .flat_map(|words| words.iter())
            .fold(HashMap::new(), |mut acc, w| {
                let e = acc.entry(w.verse_number).or_insert(0);
                *e = (*e).max(w.word_index);
                acc
            })
    }
}

fn count_words(words: &[WordSegment]) -> HashMap<u32, u32> {
    let mut counts = HashMap::new();
    for w in words {
        let e = counts.entry(w.verse_number).or_insert(0);
        *e = (*e).max(w.word_index);
    }
    counts
}
