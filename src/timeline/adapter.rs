//! Conversion between the scrubber's global timeline and the position
//! inside whichever file the media element currently holds.

/// Duration assumed for a verse track until its metadata reports the real one.
pub const DEFAULT_VERSE_SECONDS: f64 = 5.0;

/// A position inside one verse's track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativePosition {
    pub verse_index: usize,
    pub offset: f64,
}

/// A seek into a verse whose track is not loaded yet. Applied once that
/// verse's metadata arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSeek {
    pub verse_index: usize,
    pub offset: f64,
    /// Resume playback after the seek lands.
    pub resume: bool,
}

/// Single mode: the chapter file *is* the global timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleTimeline {
    duration_override: Option<f64>,
    media_duration: Option<f64>,
}

impl SingleTimeline {
    pub fn new(duration_override: Option<f64>) -> Self {
        Self {
            duration_override: duration_override.filter(|d| d.is_finite() && *d > 0.0),
            media_duration: None,
        }
    }

    pub fn learn(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.media_duration = Some(duration);
        }
    }

    pub fn total(&self) -> f64 {
        self.duration_override
            .or(self.media_duration)
            .unwrap_or(0.0)
    }
}

/// PerAyah mode: per-verse track durations laid end to end.
#[derive(Debug, Clone, PartialEq)]
pub struct AyahDurations {
    durations: Vec<f64>,
    learned: Vec<bool>,
}

impl AyahDurations {
    pub fn new(count: usize) -> Self {
        Self {
            durations: vec![DEFAULT_VERSE_SECONDS; count],
            learned: vec![false; count],
        }
    }

    /// Seed an estimate (e.g. from word timings) without marking it learned.
    pub fn estimate(&mut self, verse_index: usize, seconds: f64) {
        if let Some(d) = self.durations.get_mut(verse_index)
            && !self.learned[verse_index]
            && seconds.is_finite()
            && seconds > 0.0
        {
            *d = seconds;
        }
    }

    /// Record the real duration reported by the media element. Returns true
    /// when the table changed.
    pub fn learn(&mut self, verse_index: usize, seconds: f64) -> bool {
        if !seconds.is_finite() || seconds <= 0.0 {
            return false;
        }
        let Some(d) = self.durations.get_mut(verse_index) else {
            return false;
        };
        let changed = !self.learned[verse_index] || (*d - seconds).abs() > f64::EPSILON;
        *d = seconds;
        self.learned[verse_index] = true;
        changed
    }

    pub fn duration(&self, verse_index: usize) -> f64 {
        self.durations.get(verse_index).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.durations.iter().sum()
    }

    /// Global time at which a verse's track begins.
    pub fn verse_offset(&self, verse_index: usize) -> f64 {
        self.durations.iter().take(verse_index).sum()
    }

    /// Locate the verse track containing a global time. Times past the end
    /// clamp to the end of the last verse, negative times to the start.
    pub fn global_to_native(&self, global: f64) -> NativePosition {
        let global = if global.is_finite() { global.max(0.0) } else { 0.0 };
        let mut before = 0.0;
        for (verse_index, d) in self.durations.iter().enumerate() {
            if global < before + d {
                return NativePosition {
                    verse_index,
                    offset: global - before,
                };
            }
            before += d;
        }
        match self.durations.len() {
            0 => NativePosition {
                verse_index: 0,
                offset: 0.0,
            },
            n => NativePosition {
                verse_index: n - 1,
                offset: self.durations[n - 1],
            },
        }
    }

    pub fn native_to_global(&self, verse_index: usize, native: f64) -> f64 {
        self.verse_offset(verse_index) + native.max(0.0)
    }
}
