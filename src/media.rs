//! The media element the controller drives.
//!
//! The controller is the only writer: it owns one `MediaElement` and every
//! mutation goes through its public operations. Events flow back through
//! [`MediaElement::poll_events`], which the runtime pumps on a fixed tick.

#[cfg(feature = "audio")]
pub mod audio;

use crate::timeline::DEFAULT_VERSE_SECONDS;
use crate::timer::{PlaybackTimer, sanitize_position};
use thiserror::Error;

/// A track to load, with the duration we expect it to report (if known).
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: String,
    pub expected_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    TimeUpdate { time: f64 },
    Ended,
    Error(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("playback rejected: {0}")]
    PlayRejected(String),
    #[error("no source attached")]
    NoSource,
    #[error("audio output unavailable: {0}")]
    Output(String),
}

pub trait MediaElement {
    fn set_source(&mut self, source: &MediaSource);
    /// Pause, zero the position, drop the source and reload so no network or
    /// decoding continues in the background.
    fn unload(&mut self);
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn current_time(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    /// Drain events raised since the last call, in order.
    fn poll_events(&mut self) -> Vec<MediaEvent>;
}

impl<M: MediaElement + ?Sized> MediaElement for Box<M> {
    fn set_source(&mut self, source: &MediaSource) {
        (**self).set_source(source)
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn play(&mut self) -> Result<(), MediaError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, seconds: f64) {
        (**self).seek(seconds)
    }

    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn set_volume(&mut self, volume: f64) {
        (**self).set_volume(volume)
    }

    fn set_muted(&mut self, muted: bool) {
        (**self).set_muted(muted)
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        (**self).poll_events()
    }
}

/// A silent element that follows the recitation clock.
///
/// Metadata "loads" on the first poll after a source is set, reporting the
/// source's expected duration (or [`DEFAULT_VERSE_SECONDS`]). Position
/// advances in real time while playing and `Ended` fires once at the end.
/// A source without a URL fails to load instead.
#[derive(Debug, Default)]
pub struct SimulatedMedia {
    source: Option<MediaSource>,
    timer: PlaybackTimer,
    duration: Option<f64>,
    metadata_pending: bool,
    failed: bool,
    play_requested: bool,
    ended_sent: bool,
    volume: f64,
    muted: bool,
}

impl SimulatedMedia {
    pub fn new() -> Self {
        Self {
            volume: 1.0,
            ..Default::default()
        }
    }

    fn clamp_to_duration(&self, t: f64) -> f64 {
        match self.duration {
            Some(d) => t.min(d),
            None => t,
        }
    }
}

impl MediaElement for SimulatedMedia {
    fn set_source(&mut self, source: &MediaSource) {
        tracing::debug!(url = %source.url, "Loading media source");
        self.source = Some(source.clone());
        self.timer.reset(0.0);
        self.duration = None;
        self.metadata_pending = true;
        self.failed = false;
        self.play_requested = false;
        self.ended_sent = false;
    }

    fn unload(&mut self) {
        self.source = None;
        self.timer.reset(0.0);
        self.duration = None;
        self.metadata_pending = false;
        self.failed = false;
        self.play_requested = false;
        self.ended_sent = false;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.failed {
            return Err(MediaError::PlayRejected("source failed to load".to_string()));
        }
        if self.duration.is_some() {
            if self.ended_sent {
                // Playing after the end restarts, as a browser element does.
                self.timer.reset(0.0);
                self.ended_sent = false;
            }
            self.timer.mark_playing();
        } else {
            self.play_requested = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.play_requested = false;
        self.timer.mark_paused();
    }

    fn seek(&mut self, seconds: f64) {
        let t = self.clamp_to_duration(sanitize_position(seconds));
        self.timer.set_position(t);
        self.ended_sent = false;
    }

    fn current_time(&self) -> f64 {
        self.clamp_to_duration(self.timer.estimate())
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        tracing::trace!(volume = self.volume, muted = self.muted, "Output level");
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        tracing::trace!(volume = self.volume, muted = self.muted, "Output level");
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        let Some(source) = &self.source else {
            return events;
        };
        if self.metadata_pending && source.url.is_empty() {
            self.metadata_pending = false;
            self.failed = true;
            self.play_requested = false;
            events.push(MediaEvent::Error("source has no URL".to_string()));
            return events;
        }
        if self.metadata_pending {
            let duration = source
                .expected_duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(DEFAULT_VERSE_SECONDS);
            self.metadata_pending = false;
            self.duration = Some(duration);
            events.push(MediaEvent::LoadedMetadata { duration });
            if std::mem::take(&mut self.play_requested) {
                self.timer.mark_playing();
            }
        }
        if !self.timer.is_running() {
            return events;
        }
        let t = self.timer.estimate();
        match self.duration {
            Some(d) if t >= d => {
                self.timer.reset(d);
                if !self.ended_sent {
                    self.ended_sent = true;
                    events.push(MediaEvent::TimeUpdate { time: d });
                    events.push(MediaEvent::Ended);
                }
            }
            _ => events.push(MediaEvent::TimeUpdate { time: t }),
        }
        events
    }
}
