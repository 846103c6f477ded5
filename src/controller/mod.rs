//! The playback controller.
//!
//! Owns the one media element and everything derived from the loaded
//! recitation: segment index, timeline, session phase, highlights, the
//! pending resume target and the reciter swap in flight. All mutation goes
//! through `&mut self`, so the runtime loop that owns the controller is the
//! single writer.
//!
//! ```text
//!  commands ─┐                      ┌─▶ MediaElement (set_source/seek/play)
//!  media ────┼─▶ PlaybackController ┼─▶ Scheduler (frames, deferred resume)
//!  frames ───┘                      └─▶ HighlightEmitter ─▶ Update / NowPlaying
//! ```

pub mod phase;
#[cfg(test)]
mod tests;

use crate::content::{AyahTrack, ContentError, LoadedContent, PlaybackMode, VerseText};
use crate::highlight::{HighlightEmitter, HighlightEvent, HighlightState, WordRef};
use crate::media::{MediaElement, MediaEvent, MediaSource};
use crate::resume::{ResumeSlot, ResumeTarget};
use crate::scheduler::{FrameToken, ResumeToken, Scheduler};
use crate::state::{NowPlaying, Update};
use crate::swap::{SwapContext, SwapManager, SwapOutcome, SwapTicket};
use crate::timeline::{
    AyahDurations, NativePosition, PendingSeek, SegmentIndex, SingleTimeline, VerseWords,
};
use phase::{SessionPhase, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Added to a verse start when jumping to it in Single mode, so the
/// lookup does not land on the previous verse's end.
pub const SEEK_EPSILON: f64 = 0.01;

/// Delay between a verse jump and the `play()` that follows it, giving the
/// new source time to attach.
pub const RESUME_DELAY: Duration = Duration::from_millis(50);

/// A verse to jump to, by number or by position in the chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerseTarget {
    Number(u32),
    Index(usize),
}

/// Timing data for the attached content, per mode.
#[derive(Debug)]
enum Layout {
    Single {
        url: String,
        index: SegmentIndex,
        timeline: SingleTimeline,
    },
    PerAyah {
        tracks: Vec<AyahTrack>,
        words: VerseWords,
        durations: AyahDurations,
    },
}

impl Layout {
    fn from_mode(mode: &PlaybackMode) -> Self {
        match mode {
            PlaybackMode::Single(track) => Layout::Single {
                url: track.track_url.clone(),
                index: SegmentIndex::new(track.segments.clone(), track.word_segments.clone()),
                timeline: SingleTimeline::new(track.total_duration),
            },
            PlaybackMode::PerAyah(per_ayah) => {
                let mut tracks = per_ayah.items.clone();
                tracks.sort_by_key(|t| t.verse_number);
                tracks.dedup_by_key(|t| t.verse_number);
                let words = VerseWords::new(per_ayah.word_segments_by_verse.clone());
                let mut durations = AyahDurations::new(tracks.len());
                for (i, track) in tracks.iter().enumerate() {
                    if let Some(end) = words.last_end(track.verse_number) {
                        durations.estimate(i, end);
                    }
                }
                Layout::PerAyah {
                    tracks,
                    words,
                    durations,
                }
            }
        }
    }

    fn verse_count(&self) -> usize {
        match self {
            Layout::Single { index, .. } => index.verse_count(),
            Layout::PerAyah { tracks, .. } => tracks.len(),
        }
    }

    fn verse_number(&self, verse_index: usize) -> Option<u32> {
        match self {
            Layout::Single { index, .. } => index.verses().get(verse_index).map(|s| s.verse_number),
            Layout::PerAyah { tracks, .. } => tracks.get(verse_index).map(|t| t.verse_number),
        }
    }

    fn position_of(&self, verse_number: u32) -> Option<usize> {
        match self {
            Layout::Single { index, .. } => index.verse_position(verse_number),
            Layout::PerAyah { tracks, .. } => {
                tracks.iter().position(|t| t.verse_number == verse_number)
            }
        }
    }

    /// Native time at which a verse starts.
    fn verse_start(&self, verse_index: usize) -> f64 {
        match self {
            Layout::Single { index, .. } => index
                .verses()
                .get(verse_index)
                .map(|s| s.start)
                .unwrap_or(0.0),
            Layout::PerAyah { .. } => 0.0,
        }
    }

    fn word_start(&self, verse: u32, word: u32) -> Option<f64> {
        match self {
            Layout::Single { index, .. } => index.word_start(verse, word),
            Layout::PerAyah { words, .. } => words.word_start(verse, word),
        }
    }

    fn word_end(&self, verse: u32, word: u32) -> Option<f64> {
        match self {
            Layout::Single { index, .. } => index.word_end(verse, word),
            Layout::PerAyah { words, .. } => words.word_end(verse, word),
        }
    }

    fn word_counts(&self) -> HashMap<u32, u32> {
        match self {
            Layout::Single { index, .. } => index.word_counts().clone(),
            Layout::PerAyah { words, .. } => words.word_counts(),
        }
    }

    fn total(&self) -> f64 {
        match self {
            Layout::Single {
                index, timeline, ..
            } => match timeline.total() {
                t if t > 0.0 => t,
                _ => index.verses().last().map(|s| s.end).unwrap_or(0.0),
            },
            Layout::PerAyah { durations, .. } => durations.total(),
        }
    }

    fn global_to_native(&self, global: f64) -> NativePosition {
        match self {
            Layout::Single { index, .. } => {
                let offset = if global.is_finite() { global.max(0.0) } else { 0.0 };
                NativePosition {
                    verse_index: index.verse_at(offset).unwrap_or(0),
                    offset,
                }
            }
            Layout::PerAyah { durations, .. } => durations.global_to_native(global),
        }
    }

    fn native_to_global(&self, pos: NativePosition) -> f64 {
        match self {
            Layout::Single { .. } => pos.offset.max(0.0),
            Layout::PerAyah { durations, .. } => {
                durations.native_to_global(pos.verse_index, pos.offset)
            }
        }
    }

    fn source_for(&self, verse_index: usize) -> Option<MediaSource> {
        match self {
            Layout::Single { url, .. } => Some(MediaSource {
                url: url.clone(),
                expected_duration: Some(self.total()).filter(|d| *d > 0.0),
            }),
            Layout::PerAyah {
                tracks, durations, ..
            } => tracks.get(verse_index).map(|t| MediaSource {
                url: t.track_url.clone(),
                expected_duration: Some(durations.duration(verse_index)),
            }),
        }
    }

    /// Resume precedence: word start, then verse start, then raw time.
    fn resolve_resume(&self, target: &ResumeTarget) -> Option<NativePosition> {
        if let (Some(verse), Some(word)) = (target.verse, target.word)
            && let Some(verse_index) = self.position_of(verse)
            && let Some(offset) = self.word_start(verse, word)
        {
            return Some(NativePosition {
                verse_index,
                offset,
            });
        }
        if let Some(verse) = target.verse
            && let Some(verse_index) = self.position_of(verse)
        {
            return Some(NativePosition {
                verse_index,
                offset: self.verse_start(verse_index),
            });
        }
        target.raw_time.map(|t| self.global_to_native(t))
    }

    /// Point `target` at a verse (or one of its words), keeping `autoplay`.
    fn place_at(&self, target: &mut ResumeTarget, verse_index: usize, word: Option<u32>) {
        let verse = self.verse_number(verse_index);
        let word_offset = verse.zip(word).and_then(|(v, w)| self.word_start(v, w));
        let offset = word_offset.unwrap_or_else(|| self.verse_start(verse_index));
        target.verse = verse;
        target.word = word_offset.and(word);
        target.raw_time = Some(self.native_to_global(NativePosition {
            verse_index,
            offset,
        }));
    }
}

#[derive(Debug)]
struct Loaded {
    content: LoadedContent,
    verses: Arc<Vec<VerseText>>,
    layout: Layout,
}

/// Ephemeral single-word playback; pauses at the word's end.
#[derive(Debug, Clone, Copy)]
struct WordClip {
    verse_index: usize,
    end: f64,
}

pub struct PlaybackController<M: MediaElement, S: Scheduler> {
    media: M,
    scheduler: S,
    phase: SessionPhase,
    loaded: Option<Loaded>,
    /// Active verse index; in PerAyah mode also the loaded track.
    current: usize,
    /// Metadata arrived for the source currently set on the element.
    source_loaded: bool,
    /// The element reported an error for the current source.
    source_failed: bool,
    pending_seek: Option<PendingSeek>,
    resume: ResumeSlot,
    highlight: HighlightEmitter,
    swap: SwapManager,
    frame_generation: u64,
    live_frame: Option<FrameToken>,
    resume_generation: u64,
    live_resume: Option<ResumeToken>,
    word_clip: Option<WordClip>,
    volume: f64,
    muted: bool,
    version: u64,
    now_playing: watch::Sender<NowPlaying>,
}

impl<M: MediaElement, S: Scheduler> PlaybackController<M, S> {
    pub fn new(media: M, scheduler: S) -> Self {
        let (now_playing, _) = watch::channel(NowPlaying::default());
        Self {
            media,
            scheduler,
            phase: SessionPhase::Idle,
            loaded: None,
            current: 0,
            source_loaded: false,
            source_failed: false,
            pending_seek: None,
            resume: ResumeSlot::default(),
            highlight: HighlightEmitter::new(),
            swap: SwapManager::default(),
            frame_generation: 0,
            live_frame: None,
            resume_generation: 0,
            live_resume: None,
            word_clip: None,
            volume: 1.0,
            muted: false,
            version: 0,
            now_playing,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn content(&self) -> Option<&LoadedContent> {
        self.loaded.as_ref().map(|l| &l.content)
    }

    pub fn verse_count(&self) -> usize {
        self.loaded
            .as_ref()
            .map(|l| l.layout.verse_count())
            .unwrap_or(0)
    }

    pub fn highlight_state(&self) -> HighlightState {
        self.highlight.state()
    }

    pub fn subscribe_now_playing(&self) -> watch::Receiver<NowPlaying> {
        self.now_playing.subscribe()
    }

    pub fn total_duration(&self) -> f64 {
        self.loaded.as_ref().map(|l| l.layout.total()).unwrap_or(0.0)
    }

    /// Global timeline position. While a swap is fetching, the position
    /// captured for it.
    pub fn current_time(&self) -> f64 {
        if let Some(t) = self.swap.pending().and_then(|ctx| ctx.target.raw_time) {
            return t;
        }
        let Some(loaded) = &self.loaded else {
            return 0.0;
        };
        let total = loaded.layout.total();
        let t = loaded.layout.native_to_global(self.native_position());
        if total > 0.0 { t.min(total) } else { t }
    }

    fn current_verse_number(&self) -> Option<u32> {
        self.loaded
            .as_ref()
            .and_then(|l| l.layout.verse_number(self.current))
    }

    /// Where the element is, or is about to be once a pending seek lands.
    fn native_position(&self) -> NativePosition {
        match self.pending_seek {
            Some(p) => NativePosition {
                verse_index: p.verse_index,
                offset: p.offset,
            },
            None => NativePosition {
                verse_index: self.current,
                offset: self.media.current_time(),
            },
        }
    }

    /// Attach new content. The resume target (possibly empty) is applied
    /// once the first track's metadata loads.
    pub fn attach(&mut self, content: LoadedContent, target: ResumeTarget) {
        self.swap.cancel();
        self.install(content, target);
    }

    fn install(&mut self, content: LoadedContent, target: ResumeTarget) {
        self.stop_frames();
        self.cancel_resume_timer();
        self.word_clip = None;
        self.pending_seek = None;
        self.media.unload();
        self.highlight.clear();

        let layout = Layout::from_mode(&content.mode);
        if layout.verse_count() == 0 {
            tracing::warn!(
                chapter = content.chapter,
                reciter_id = content.reciter_id,
                "Attached content has no verses"
            );
        }
        let mut counts = layout.word_counts();
        counts.extend(content.text_word_counts());
        self.highlight.set_word_counts(counts);

        // PerAyah starts on the resume verse's own track.
        let start = match &layout {
            Layout::PerAyah { .. } => target
                .verse
                .and_then(|v| layout.position_of(v))
                .unwrap_or(0),
            Layout::Single { .. } => 0,
        };
        tracing::info!(
            chapter = content.chapter,
            reciter_id = content.reciter_id,
            mode = content.mode.label(),
            verses = layout.verse_count(),
            "Attached recitation"
        );
        self.loaded = Some(Loaded {
            verses: Arc::new(content.text.clone()),
            content,
            layout,
        });
        self.current = start;
        self.resume.set(target);
        if self.resume.peek().is_none() {
            self.highlight.suppress_scroll(false);
        }
        self.phase = self.phase.attach();
        self.load_track(start);
        self.touch();
        self.publish();
    }

    fn load_track(&mut self, verse_index: usize) {
        self.source_loaded = false;
        self.source_failed = false;
        let Some(source) = self
            .loaded
            .as_ref()
            .and_then(|l| l.layout.source_for(verse_index))
        else {
            return;
        };
        self.media.set_source(&source);
        self.media.set_volume(self.volume);
        self.media.set_muted(self.muted);
    }

    /// Start playback. Ignored until metadata has loaded once; the first
    /// play activates the session.
    pub fn play(&mut self) -> bool {
        let current = self.current;
        if self.retarget_swap(|layout, target| {
            if target.verse.is_none() && target.raw_time.is_none() {
                layout.place_at(target, current, None);
            }
            target.autoplay = true;
        }) {
            return true;
        }
        match self.phase {
            SessionPhase::Idle | SessionPhase::Attached => {
                tracing::debug!(phase = self.phase.label(), "Play ignored, source not ready");
                false
            }
            SessionPhase::Ready => {
                self.activate();
                self.start_playback()
            }
            SessionPhase::Activated(Transport::Playing) => true,
            SessionPhase::Activated(_) => {
                self.cancel_resume_timer();
                self.start_playback()
            }
        }
    }

    pub fn pause(&mut self) {
        if self.retarget_swap(|_, target| target.autoplay = false) {
            return;
        }
        if !self.phase.wants_playback() {
            return;
        }
        self.media.pause();
        self.cancel_resume_timer();
        self.stop_frames();
        self.word_clip = None;
        if let Some(p) = self.pending_seek.as_mut() {
            p.resume = false;
        }
        self.set_transport(Transport::Paused);
    }

    pub fn toggle(&mut self) {
        let wants_playback = match self.swap.pending() {
            Some(ctx) => ctx.target.autoplay,
            None => self.phase.wants_playback(),
        };
        if wants_playback {
            self.pause();
        } else {
            self.play();
        }
    }

    fn activate(&mut self) {
        let Some(next) = self.phase.activate() else {
            return;
        };
        let first = !self.phase.is_activated();
        self.phase = next;
        if first {
            tracing::info!("Player activated");
            self.refresh_highlight(true);
            self.touch();
        }
    }

    fn start_playback(&mut self) -> bool {
        if !self.phase.is_activated() {
            return false;
        }
        if !self.source_loaded {
            if self.source_failed {
                tracing::warn!(
                    verse = ?self.current_verse_number(),
                    "Current track is unavailable"
                );
                self.set_transport(Transport::Paused);
                return false;
            }
            self.set_transport(Transport::Buffering);
            return true;
        }
        match self.media.play() {
            Ok(()) => {
                self.set_transport(Transport::Playing);
                self.start_frames();
                true
            }
            Err(e) => {
                tracing::warn!(
                    verse = ?self.current_verse_number(),
                    error = %e,
                    "Playback rejected"
                );
                self.set_transport(Transport::Paused);
                self.refresh_highlight(true);
                false
            }
        }
    }

    fn set_transport(&mut self, transport: Transport) {
        let next = self.phase.with_transport(transport);
        if next != self.phase {
            self.phase = next;
            self.touch();
            self.publish();
        }
    }

    /// Seek to a fraction of the whole recitation.
    pub fn seek_global(&mut self, fraction: f64) {
        let total = self.total_duration();
        if self.loaded.is_none() || total <= 0.0 || !fraction.is_finite() {
            return;
        }
        self.seek_to(fraction.clamp(0.0, 1.0) * total);
    }

    /// Seek relative to the current global position.
    pub fn seek_by(&mut self, seconds: f64) {
        if self.loaded.is_none() || !seconds.is_finite() {
            return;
        }
        let target = (self.current_time() + seconds).clamp(0.0, self.total_duration());
        self.seek_to(target);
    }

    fn seek_to(&mut self, global: f64) {
        if self.retarget_swap(|layout, target| {
            let pos = layout.global_to_native(global);
            target.verse = layout.verse_number(pos.verse_index);
            target.word = None;
            target.raw_time = Some(global);
        }) {
            return;
        }
        let Some(pos) = self
            .loaded
            .as_ref()
            .map(|l| l.layout.global_to_native(global))
        else {
            return;
        };
        tracing::debug!(global, verse_index = pos.verse_index, offset = pos.offset, "Seek");
        // A manual seek invalidates the inferred word.
        self.word_clip = None;
        self.highlight.set_active_word(None);
        self.seek_native(pos);
        self.refresh_highlight(false);
        self.touch();
    }

    fn seek_native(&mut self, pos: NativePosition) {
        let single = matches!(
            self.loaded.as_ref().map(|l| &l.layout),
            Some(Layout::Single { .. })
        );
        if single {
            if self.source_loaded {
                self.media.seek(pos.offset);
            } else {
                self.pending_seek = Some(PendingSeek {
                    verse_index: pos.verse_index,
                    offset: pos.offset,
                    resume: self.phase.wants_playback(),
                });
            }
            self.current = pos.verse_index;
        } else if pos.verse_index == self.current && self.source_loaded {
            self.media.seek(pos.offset);
        } else {
            self.switch_track(pos.verse_index, pos.offset);
        }
    }

    /// Load another verse's track (PerAyah) and seek once it is ready.
    fn switch_track(&mut self, verse_index: usize, offset: f64) {
        let resume = self.phase.wants_playback();
        self.stop_frames();
        self.current = verse_index;
        self.load_track(verse_index);
        self.pending_seek = Some(PendingSeek {
            verse_index,
            offset,
            resume,
        });
        if resume {
            self.set_transport(Transport::Buffering);
        }
    }

    pub fn next(&mut self) {
        self.step(1);
    }

    pub fn prev(&mut self) {
        self.step(-1);
    }

    fn step(&mut self, delta: isize) {
        let count = self.verse_count();
        if count == 0 {
            return;
        }
        let target = (self.current as isize + delta).clamp(0, count as isize - 1) as usize;
        if target == self.current {
            return;
        }
        if self.retarget_swap(|layout, t| layout.place_at(t, target, None)) {
            return;
        }
        let resume = self.phase.wants_playback();
        self.jump_to(target, resume);
    }

    fn jump_to(&mut self, verse_index: usize, resume: bool) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let single_start = match &loaded.layout {
            Layout::Single { index, .. } => match index.verses().get(verse_index) {
                Some(seg) => Some(seg.start),
                None => return,
            },
            Layout::PerAyah { .. } => None,
        };
        self.word_clip = None;
        self.highlight.set_active_word(None);
        match single_start {
            Some(start) => {
                if self.phase.is_playing() {
                    self.media.pause();
                    self.stop_frames();
                }
                self.seek_native(NativePosition {
                    verse_index,
                    offset: start + SEEK_EPSILON,
                });
            }
            None => self.switch_track(verse_index, 0.0),
        }
        self.current = verse_index;
        if resume {
            self.request_resume();
        }
        self.refresh_highlight(false);
        self.touch();
    }

    /// Play a verse now, activating the player if needed.
    pub fn play_from_verse(&mut self, target: VerseTarget) -> bool {
        let Some(loaded) = &self.loaded else {
            tracing::debug!(?target, "No content attached");
            return false;
        };
        let verse_index = match target {
            VerseTarget::Number(n) => loaded.layout.position_of(n),
            VerseTarget::Index(i) => (i < loaded.layout.verse_count()).then_some(i),
        };
        let Some(verse_index) = verse_index else {
            tracing::warn!(?target, "No such verse");
            return false;
        };
        if self.retarget_swap(|layout, t| {
            layout.place_at(t, verse_index, None);
            t.autoplay = true;
        }) {
            return true;
        }
        self.resume.clear();
        self.activate();
        self.jump_to(verse_index, true);
        true
    }

    /// Play a single word and pause at its end.
    pub fn play_word(&mut self, verse: u32, word: u32) -> bool {
        let Some(loaded) = &self.loaded else {
            return false;
        };
        let Some(verse_index) = loaded.layout.position_of(verse) else {
            tracing::warn!(verse, word, "No such verse");
            return false;
        };
        let (Some(start), Some(end)) = (
            loaded.layout.word_start(verse, word),
            loaded.layout.word_end(verse, word),
        ) else {
            tracing::warn!(verse, word, "No timing for word");
            return false;
        };
        if self.retarget_swap(|layout, t| {
            layout.place_at(t, verse_index, Some(word));
            t.autoplay = true;
        }) {
            return true;
        }
        self.resume.clear();
        self.cancel_resume_timer();
        self.activate();
        self.highlight.set_active_word(None);
        self.seek_native(NativePosition {
            verse_index,
            offset: start,
        });
        self.current = verse_index;
        self.word_clip = Some(WordClip { verse_index, end });
        // Signal the word even if the platform blocks the sound.
        self.highlight.set_active_verse(Some(verse));
        self.highlight.set_active_word(Some(WordRef {
            verse,
            word_index: word,
        }));
        self.touch();
        self.start_playback();
        true
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
        self.volume = volume;
        self.media.set_volume(volume);
        self.touch();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.media.set_muted(muted);
        self.touch();
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Close the player: unload the element and return to `Idle`. Any swap
    /// in flight becomes stale.
    pub fn close(&mut self) {
        self.stop_frames();
        self.cancel_resume_timer();
        self.swap.cancel();
        self.word_clip = None;
        self.pending_seek = None;
        self.resume.clear();
        self.media.unload();
        self.highlight.clear();
        self.highlight.suppress_scroll(false);
        self.loaded = None;
        self.current = 0;
        self.source_loaded = false;
        self.source_failed = false;
        self.phase = SessionPhase::Idle;
        self.touch();
        self.publish();
        tracing::info!("Player closed");
    }

    /// Drain and handle everything the element raised since the last call.
    pub fn pump_media(&mut self) {
        for event in self.media.poll_events() {
            self.handle_media_event(event);
        }
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.loaded.is_none() {
            return;
        }
        match event {
            MediaEvent::LoadedMetadata { duration } => self.on_metadata(duration),
            MediaEvent::TimeUpdate { time } => {
                self.check_word_clip(time);
                self.publish();
            }
            MediaEvent::Ended => self.on_track_finished(false),
            MediaEvent::Error(msg) => {
                tracing::warn!(verse = ?self.current_verse_number(), error = %msg, "Media error");
                self.on_track_finished(true);
            }
        }
    }

    fn on_metadata(&mut self, duration: f64) {
        let current = self.current;
        let mut single = false;
        if let Some(loaded) = self.loaded.as_mut() {
            match &mut loaded.layout {
                Layout::Single { timeline, .. } => {
                    single = true;
                    timeline.learn(duration);
                }
                Layout::PerAyah { durations, .. } => {
                    if durations.learn(current, duration) {
                        tracing::debug!(verse_index = current, duration, "Learned verse duration");
                    }
                }
            }
        }
        self.source_loaded = true;
        self.phase = self.phase.metadata_loaded();

        let mut wants_play = self.phase.transport() == Some(Transport::Buffering);
        if let Some(p) = self.pending_seek.take()
            && (single || p.verse_index == current)
        {
            self.media.seek(p.offset);
            wants_play |= p.resume && self.phase.is_activated();
        }
        if let Some(target) = self.resume.take() {
            wants_play |= self.apply_resume(target);
            self.highlight.suppress_scroll(false);
        }
        if wants_play {
            if self.source_loaded && self.live_resume.is_none() {
                self.start_playback();
            } else {
                self.set_transport(Transport::Buffering);
            }
        }
        self.refresh_highlight(true);
        self.touch();
    }

    /// Seek to a resume target. Returns whether playback should start.
    fn apply_resume(&mut self, target: ResumeTarget) -> bool {
        let Some(pos) = self
            .loaded
            .as_ref()
            .and_then(|l| l.layout.resolve_resume(&target))
        else {
            tracing::debug!(?target, "Resume target did not resolve");
            return false;
        };
        tracing::info!(
            verse = ?target.verse,
            word = ?target.word,
            time = ?target.raw_time,
            autoplay = target.autoplay,
            "Applying resume target"
        );
        self.activate();
        self.seek_native(pos);
        self.refresh_highlight(false);
        target.autoplay
    }

    fn on_track_finished(&mut self, failed: bool) {
        if self.word_clip.take().is_some() && !failed {
            self.pause();
            return;
        }
        let per_ayah = matches!(
            self.loaded.as_ref().map(|l| &l.layout),
            Some(Layout::PerAyah { .. })
        );
        if failed {
            self.source_failed = true;
        }
        let next = self.current + 1;
        if per_ayah && next < self.verse_count() && (failed || self.phase.wants_playback()) {
            if failed {
                tracing::info!(verse_index = self.current, "Skipping unavailable verse");
            }
            self.highlight.set_active_word(None);
            self.switch_track(next, 0.0);
            self.refresh_highlight(false);
            self.touch();
            return;
        }
        self.stop_frames();
        self.cancel_resume_timer();
        if self.phase.wants_playback() {
            self.media.pause();
            tracing::info!(verse = ?self.current_verse_number(), "Recitation finished");
        }
        self.set_transport(Transport::Paused);
    }

    fn check_word_clip(&mut self, native: f64) {
        if let Some(clip) = self.word_clip
            && self.source_loaded
            && clip.verse_index == self.current
            && native >= clip.end
        {
            self.pause();
        }
    }

    /// One tick of the highlight loop.
    pub fn on_frame(&mut self, token: FrameToken) {
        if self.live_frame != Some(token) {
            tracing::trace!(token = token.0, "Dropping stale frame");
            return;
        }
        self.live_frame = None;
        if !self.phase.is_playing() {
            return;
        }
        self.check_word_clip(self.media.current_time());
        if !self.phase.is_playing() {
            return;
        }
        self.refresh_highlight(true);
        self.request_frame();
    }

    /// Deferred `play()` after a verse jump.
    pub fn on_resume_timer(&mut self, token: ResumeToken) {
        if self.live_resume != Some(token) {
            return;
        }
        self.live_resume = None;
        if self.phase.transport() == Some(Transport::Buffering) {
            self.start_playback();
        }
    }

    fn request_resume(&mut self) {
        if !self.phase.is_activated() {
            return;
        }
        self.set_transport(Transport::Buffering);
        self.resume_generation += 1;
        let token = ResumeToken(self.resume_generation);
        self.live_resume = Some(token);
        self.scheduler.schedule_resume(token, RESUME_DELAY);
    }

    fn cancel_resume_timer(&mut self) {
        self.live_resume = None;
    }

    fn request_frame(&mut self) {
        self.frame_generation += 1;
        let token = FrameToken(self.frame_generation);
        self.live_frame = Some(token);
        self.scheduler.request_frame(token);
    }

    /// Start a frame chain, cancelling any that is alive.
    fn start_frames(&mut self) {
        self.stop_frames();
        self.request_frame();
    }

    fn stop_frames(&mut self) {
        if let Some(token) = self.live_frame.take() {
            self.scheduler.cancel_frame(token);
        }
    }

    /// Re-resolve the active verse (and word, if asked) from the element's
    /// position. Highlights only change once the session is activated.
    fn refresh_highlight(&mut self, words: bool) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let pos = self.native_position();
        let (verse_index, word) = match &loaded.layout {
            Layout::Single { index, .. } => (
                index.verse_at(pos.offset),
                index.word_at(pos.offset).map(|w| WordRef {
                    verse: w.verse_number,
                    word_index: w.word_index,
                }),
            ),
            Layout::PerAyah { tracks, words, .. } => {
                let verse_index = (pos.verse_index < tracks.len()).then_some(pos.verse_index);
                let word = verse_index
                    .filter(|_| self.source_loaded)
                    .and_then(|i| words.word_at(tracks[i].verse_number, pos.offset))
                    .map(|w| WordRef {
                        verse: w.verse_number,
                        word_index: w.word_index,
                    });
                (verse_index, word)
            }
        };
        let verse = verse_index.and_then(|i| loaded.layout.verse_number(i));
        if let Some(i) = verse_index {
            self.current = i;
        }
        if self.phase.is_activated() {
            let mut changed = self.highlight.set_active_verse(verse);
            if words {
                changed |= self.highlight.set_active_word(word);
            }
            if changed {
                self.touch();
            }
        }
        self.publish();
    }

    /// Hand out highlight transitions queued since the last call.
    pub fn take_highlight_events(&mut self) -> Vec<HighlightEvent> {
        self.highlight.drain()
    }

    /// Begin swapping to another reciter. Captures the listener's place,
    /// clears highlights and unloads the element; the caller fetches the
    /// content and hands it to [`Self::complete_reciter_swap`].
    pub fn begin_reciter_swap(&mut self, reciter_id: u32) -> Option<SwapTicket> {
        let loaded = self.loaded.as_ref()?;
        if loaded.content.reciter_id == reciter_id && self.swap.pending().is_none() {
            tracing::debug!(reciter_id, "Reciter already playing");
            return None;
        }
        let context = match self.swap.pending() {
            // Position was captured by the swap in flight.
            Some(ctx) => ctx.clone(),
            None => SwapContext {
                previous: loaded.content.clone(),
                target: self.capture_resume_target(),
            },
        };
        tracing::info!(
            from = loaded.content.reciter_id,
            to = reciter_id,
            verse = ?context.target.verse,
            word = ?context.target.word,
            "Swapping reciter"
        );
        self.highlight.suppress_scroll(true);
        self.highlight.clear();
        self.stop_frames();
        self.cancel_resume_timer();
        self.word_clip = None;
        self.pending_seek = None;
        self.media.unload();
        self.source_loaded = false;
        self.source_failed = false;
        self.resume.set(context.target.clone());
        self.phase = self.phase.with_transport(Transport::Paused);
        let ticket = self.swap.begin(reciter_id, context);
        self.touch();
        self.publish();
        Some(ticket)
    }

    /// While a swap is fetching, fold a transport command into the place
    /// the swap resumes at. Returns false when no swap is in flight.
    fn retarget_swap(&mut self, update: impl FnOnce(&Layout, &mut ResumeTarget)) -> bool {
        let Some(loaded) = self.loaded.as_ref() else {
            return false;
        };
        let Some(target) = self.swap.pending_target_mut() else {
            return false;
        };
        update(&loaded.layout, target);
        if let Some(verse_index) = target.verse.and_then(|v| loaded.layout.position_of(v)) {
            self.current = verse_index;
        }
        tracing::debug!(
            verse = ?target.verse,
            word = ?target.word,
            autoplay = target.autoplay,
            "Retargeted pending swap"
        );
        let target = target.clone();
        self.resume.set(target);
        self.touch();
        self.publish();
        true
    }

    fn capture_resume_target(&self) -> ResumeTarget {
        if !self.phase.is_activated() {
            return ResumeTarget::default();
        }
        let state = self.highlight.state();
        let verse = state.active_verse.or_else(|| self.current_verse_number());
        let word = state
            .active_word
            .filter(|w| Some(w.verse) == verse)
            .map(|w| w.word_index);
        ResumeTarget {
            verse,
            word,
            raw_time: Some(self.current_time()),
            autoplay: self.phase.wants_playback(),
        }
    }

    /// Finish a swap with the fetched content. A failed fetch re-attaches
    /// the previous reciter at the captured place.
    pub fn complete_reciter_swap(
        &mut self,
        ticket: SwapTicket,
        result: Result<LoadedContent, ContentError>,
    ) -> SwapOutcome {
        let Some(context) = self.swap.finish(ticket) else {
            tracing::debug!(reciter_id = ticket.reciter_id, "Discarding stale swap result");
            return SwapOutcome::Stale;
        };
        match result {
            Ok(content) => {
                self.install(content, context.target);
                SwapOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(
                    reciter_id = ticket.reciter_id,
                    error = %e,
                    "Reciter swap failed, restoring previous reciter"
                );
                self.install(context.previous, context.target);
                SwapOutcome::Reverted(e)
            }
        }
    }

    pub fn pending_swap(&self) -> Option<u32> {
        self.swap.pending_reciter()
    }

    /// Scrubber snapshot. Highlight events are not included; drain them
    /// with [`Self::take_highlight_events`].
    pub fn snapshot(&self) -> Update {
        let loaded = self.loaded.as_ref();
        Update {
            chapter: loaded.map(|l| l.content.chapter).unwrap_or(0),
            reciter_id: loaded.map(|l| l.content.reciter_id),
            mode: loaded.map(|l| l.content.mode.label()),
            phase: self.phase,
            current_time: self.current_time(),
            total_duration: self.total_duration(),
            active_verse_index: self.current,
            verse_count: self.verse_count(),
            playing: self.phase.is_playing(),
            activated: self.phase.is_activated(),
            volume: self.volume(),
            muted: self.muted(),
            highlight: self.highlight_state(),
            events: Vec::new(),
            verses: loaded.map(|l| l.verses.clone()).unwrap_or_default(),
            swapping_to: self.swap.pending_reciter(),
            err: None,
            version: self.version,
        }
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn publish(&self) {
        let state = self.highlight_state();
        let now = NowPlaying {
            chapter: self.loaded.as_ref().map(|l| l.content.chapter),
            reciter_id: self.loaded.as_ref().map(|l| l.content.reciter_id),
            verse: state.active_verse.or_else(|| self.current_verse_number()),
            word: state.active_word.map(|w| w.word_index),
            native_time: self.native_position().offset,
            playing: self.phase.is_playing(),
        };
        self.now_playing.send_if_modified(|current| {
            if *current == now {
                false
            } else {
                *current = now;
                true
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn media(&self) -> &M {
        &self.media
    }

    #[cfg(test)]
    pub(crate) fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> &S {
        &self.scheduler
    }

    #[cfg(test)]
    pub(crate) fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}
