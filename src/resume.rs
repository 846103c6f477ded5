//! Deep-link resume targets.
//!
//! A target comes from an inbound link (or from a reciter swap capturing
//! the listener's place) and is applied once, after the first metadata
//! load of the source it was recorded for.

use once_cell::sync::Lazy;
use regex::Regex;

static VERSE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3}):(\d{1,3})\s*$").expect("verse key regex"));

static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}):(\d{2}(?:\.\d+)?)$").expect("clock regex"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeTarget {
    pub verse: Option<u32>,
    /// 1-based word index within `verse`.
    pub word: Option<u32>,
    /// Global timeline position in seconds.
    pub raw_time: Option<f64>,
    pub autoplay: bool,
}

/// Parse a `chapter:verse` key such as `2:255`.
pub fn parse_verse_key(key: &str) -> Option<(u32, u32)> {
    let caps = VERSE_KEY_RE.captures(key)?;
    let chapter = caps.get(1)?.as_str().parse().ok()?;
    let verse = caps.get(2)?.as_str().parse().ok()?;
    Some((chapter, verse))
}

fn parse_seconds(raw: &str) -> Option<f64> {
    if let Some(caps) = CLOCK_RE.captures(raw) {
        let min: f64 = caps.get(1)?.as_str().parse().ok()?;
        let sec: f64 = caps.get(2)?.as_str().parse().ok()?;
        return Some(min * 60.0 + sec);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|t| t.is_finite() && *t >= 0.0)
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on" | "")
}

impl ResumeTarget {
    /// Build a target from deep-link query parameters.
    ///
    /// Accepts `verse` (a number or a `chapter:verse` key, alias
    /// `startingVerse`), `word`, `t` (seconds or `m:ss`, alias `time`) and
    /// `autoplay`. Unknown keys and unparsable values are ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches(['?', '#']);
        let mut target = ResumeTarget::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = match urlencoding::decode(raw) {
                Ok(v) => v.into_owned(),
                Err(e) => {
                    tracing::debug!(key, error = %e, "Undecodable deep-link value");
                    continue;
                }
            };
            match key {
                "verse" | "startingVerse" | "ayah" => {
                    target.verse = parse_verse_key(&value)
                        .map(|(_, v)| v)
                        .or_else(|| value.trim().parse().ok())
                        .filter(|v| *v > 0);
                }
                "word" => target.word = value.trim().parse().ok().filter(|w| *w > 0),
                "t" | "time" => target.raw_time = parse_seconds(value.trim()),
                "autoplay" => target.autoplay = parse_flag(value.trim()),
                _ => {}
            }
        }
        target
    }

    /// Target for a `chapter:verse` key; the chapter is returned alongside.
    pub fn from_verse_key(key: &str, autoplay: bool) -> Option<(u32, Self)> {
        let (chapter, verse) = parse_verse_key(key)?;
        Some((
            chapter,
            ResumeTarget {
                verse: Some(verse),
                autoplay,
                ..Default::default()
            },
        ))
    }

    /// No resume intent at all.
    pub fn is_empty(&self) -> bool {
        self.verse.is_none() && self.word.is_none() && self.raw_time.is_none() && !self.autoplay
    }
}

/// Holds a target until it is applied. Taking it empties the slot, so a
/// second metadata event for the same load finds nothing to apply.
#[derive(Debug, Default)]
pub struct ResumeSlot {
    target: Option<ResumeTarget>,
}

impl ResumeSlot {
    pub fn set(&mut self, target: ResumeTarget) {
        self.target = if target.is_empty() { None } else { Some(target) };
    }

    pub fn take(&mut self) -> Option<ResumeTarget> {
        self.target.take()
    }

    pub fn peek(&self) -> Option<&ResumeTarget> {
        self.target.as_ref()
    }

    pub fn clear(&mut self) {
        self.target = None;
    }
}
