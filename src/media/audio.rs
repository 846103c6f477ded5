//! Speaker output through rodio.
//!
//! Tracks are fetched whole over HTTP, decoded in memory and played
//! through a `Sink` on the default output device. The device stream lives
//! on its own thread; the element only holds its mixer.

use super::{MediaElement, MediaError, MediaEvent, MediaSource};
use crate::content::types::http_client;
use crate::timeline::DEFAULT_VERSE_SECONDS;
use crate::timer::sanitize_position;
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Chapter recordings run to tens of megabytes.
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

type Track = Decoder<Cursor<Arc<[u8]>>>;

struct Fetched {
    generation: u64,
    result: Result<Arc<[u8]>, String>,
}

pub struct AudioMedia {
    mixer: Mixer,
    /// Dropping this closes the output stream.
    _output: std_mpsc::Sender<()>,
    source: Option<MediaSource>,
    generation: u64,
    fetch: Option<JoinHandle<()>>,
    fetched_tx: mpsc::UnboundedSender<Fetched>,
    fetched: mpsc::UnboundedReceiver<Fetched>,
    bytes: Option<Arc<[u8]>>,
    sink: Option<Sink>,
    duration: Option<f64>,
    failed: bool,
    play_requested: bool,
    seek_requested: Option<f64>,
    playing: bool,
    ended_sent: bool,
    volume: f64,
    muted: bool,
}

impl AudioMedia {
    /// Open the default output device.
    pub fn open() -> Result<Self, MediaError> {
        let (mixer, output) = open_output()?;
        let (fetched_tx, fetched) = mpsc::unbounded_channel();
        Ok(Self {
            mixer,
            _output: output,
            source: None,
            generation: 0,
            fetch: None,
            fetched_tx,
            fetched,
            bytes: None,
            sink: None,
            duration: None,
            failed: false,
            play_requested: false,
            seek_requested: None,
            playing: false,
            ended_sent: false,
            volume: 1.0,
            muted: false,
        })
    }

    fn reset(&mut self) {
        self.generation += 1;
        if let Some(task) = self.fetch.take() {
            task.abort();
        }
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.bytes = None;
        self.duration = None;
        self.failed = false;
        self.play_requested = false;
        self.seek_requested = None;
        self.playing = false;
        self.ended_sent = false;
    }

    /// Build a paused sink over the fetched bytes, positioned at `at`.
    fn start_sink(&mut self, at: f64) -> Result<(), String> {
        let bytes = self.bytes.clone().ok_or("no track data")?;
        let track = decode(bytes)?;
        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.set_volume(output_level(self.volume, self.muted));
        sink.append(track);
        if at > 0.0
            && let Err(e) = sink.try_seek(Duration::from_secs_f64(at))
        {
            tracing::warn!(position = at, error = %e, "Seek failed");
        }
        if let Some(old) = self.sink.replace(sink) {
            old.stop();
        }
        self.ended_sent = false;
        Ok(())
    }

    fn on_fetched(&mut self, fetched: Fetched, events: &mut Vec<MediaEvent>) {
        self.fetch = None;
        let url = self.source.as_ref().map(|s| s.url.clone()).unwrap_or_default();
        let loaded = fetched.result.and_then(|bytes| {
            let decoded = decode(bytes.clone())?;
            self.bytes = Some(bytes);
            Ok(decoded.total_duration())
        });
        let reported = match loaded {
            Ok(reported) => reported,
            Err(e) => return self.fail(&url, e, events),
        };
        let at = self.seek_requested.take().unwrap_or(0.0);
        if let Err(e) = self.start_sink(at) {
            return self.fail(&url, e, events);
        }
        let duration = reported
            .map(|d| d.as_secs_f64())
            .or_else(|| self.source.as_ref().and_then(|s| s.expected_duration))
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(DEFAULT_VERSE_SECONDS);
        tracing::debug!(url = %url, duration, "Track decoded");
        self.duration = Some(duration);
        events.push(MediaEvent::LoadedMetadata { duration });
        if std::mem::take(&mut self.play_requested)
            && let Some(sink) = &self.sink
        {
            sink.play();
            self.playing = true;
        }
    }

    fn fail(&mut self, url: &str, error: String, events: &mut Vec<MediaEvent>) {
        tracing::warn!(url, error = %error, "Could not load track");
        self.failed = true;
        self.play_requested = false;
        events.push(MediaEvent::Error(error));
    }
}

impl MediaElement for AudioMedia {
    fn set_source(&mut self, source: &MediaSource) {
        self.reset();
        self.source = Some(source.clone());
        let generation = self.generation;
        let tx = self.fetched_tx.clone();
        if source.url.is_empty() {
            let _ = tx.send(Fetched {
                generation,
                result: Err("source has no URL".to_string()),
            });
            return;
        }
        tracing::debug!(url = %source.url, "Fetching track");
        let url = source.url.clone();
        self.fetch = Some(tokio::spawn(async move {
            let result = fetch_track(&url).await;
            let _ = tx.send(Fetched { generation, result });
        }));
    }

    fn unload(&mut self) {
        self.reset();
        self.source = None;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.failed {
            return Err(MediaError::PlayRejected("source failed to load".to_string()));
        }
        if self.sink.is_none() {
            self.play_requested = true;
            return Ok(());
        }
        if self.ended_sent {
            // Playing after the end restarts.
            self.start_sink(0.0).map_err(MediaError::PlayRejected)?;
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.play_requested = false;
        self.playing = false;
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn seek(&mut self, seconds: f64) {
        let t = sanitize_position(seconds);
        let t = self.duration.map_or(t, |d| t.min(d));
        if self.sink.is_none() {
            self.seek_requested = Some(t);
            return;
        }
        if self.ended_sent {
            if let Err(e) = self.start_sink(t) {
                tracing::warn!(error = %e, "Could not rewind track");
            }
            return;
        }
        if let Some(sink) = &self.sink
            && let Err(e) = sink.try_seek(Duration::from_secs_f64(t))
        {
            tracing::warn!(position = t, error = %e, "Seek failed");
        }
    }

    fn current_time(&self) -> f64 {
        match (&self.sink, self.duration) {
            (_, Some(d)) if self.ended_sent => d,
            (Some(sink), Some(d)) => sink.get_pos().as_secs_f64().min(d),
            (Some(sink), None) => sink.get_pos().as_secs_f64(),
            (None, _) => self.seek_requested.unwrap_or(0.0),
        }
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(output_level(self.volume, self.muted));
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(sink) = &self.sink {
            sink.set_volume(output_level(self.volume, self.muted));
        }
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        while let Ok(fetched) = self.fetched.try_recv() {
            if fetched.generation == self.generation {
                self.on_fetched(fetched, &mut events);
            }
        }
        if !self.playing {
            return events;
        }
        let Some(sink) = &self.sink else {
            return events;
        };
        if sink.empty() {
            let end = self.duration.unwrap_or_else(|| sink.get_pos().as_secs_f64());
            self.playing = false;
            if !self.ended_sent {
                self.ended_sent = true;
                events.push(MediaEvent::TimeUpdate { time: end });
                events.push(MediaEvent::Ended);
            }
        } else {
            events.push(MediaEvent::TimeUpdate {
                time: self.current_time(),
            });
        }
        events
    }
}

fn open_output() -> Result<(Mixer, std_mpsc::Sender<()>), MediaError> {
    let (ready_tx, ready_rx) = std_mpsc::channel();
    let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
    thread::Builder::new()
        .name("audio-output".to_string())
        .spawn(move || {
            let mut stream = match OutputStreamBuilder::open_default_stream() {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            stream.log_on_drop(false);
            let _ = ready_tx.send(Ok(stream.mixer().clone()));
            // Blocks until the element drops its sender.
            let _ = stop_rx.recv();
        })
        .map_err(|e| MediaError::Output(e.to_string()))?;
    let mixer = ready_rx
        .recv()
        .map_err(|e| MediaError::Output(e.to_string()))?
        .map_err(MediaError::Output)?;
    Ok((mixer, stop_tx))
}

async fn fetch_track(url: &str) -> Result<Arc<[u8]>, String> {
    let resp = http_client()
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;
    let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
    Ok(Arc::from(&bytes[..]))
}

fn decode(bytes: Arc<[u8]>) -> Result<Track, String> {
    let byte_len = bytes.len() as u64;
    Decoder::builder()
        .with_data(Cursor::new(bytes))
        .with_byte_len(byte_len)
        .with_seekable(true)
        .build()
        .map_err(|e| e.to_string())
}

fn output_level(volume: f64, muted: bool) -> f32 {
    if muted { 0.0 } else { volume.clamp(0.0, 1.0) as f32 }
}
