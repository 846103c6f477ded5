// event.rs: commands from the front ends, runtime callbacks, update dispatch

use crate::content::{ContentError, LoadedContent};
use crate::controller::{PlaybackController, VerseTarget};
use crate::media::MediaElement;
use crate::scheduler::{FrameToken, ResumeToken, Scheduler};
use crate::state::Update;
use crate::swap::SwapTicket;
use tokio::sync::mpsc;

/// Listener intent, sent by a front end to the runtime loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Toggle,
    /// Seek to a fraction (0..=1) of the whole recitation.
    SeekFraction(f64),
    SeekBy(f64),
    Next,
    Prev,
    PlayVerse(VerseTarget),
    PlayWord { verse: u32, word: u32 },
    SwapReciter(u32),
    /// Swap to the next reciter in the configured list.
    CycleReciter,
    SetVolume(f64),
    ToggleMute,
    /// Close the session and stop the runtime.
    Shutdown,
}

/// Callbacks posted back into the runtime loop by timers and fetch tasks.
#[derive(Debug)]
pub enum RuntimeEvent {
    Frame(FrameToken),
    ResumeTimer(ResumeToken),
    SwapLoaded {
        ticket: SwapTicket,
        result: Result<LoadedContent, ContentError>,
    },
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Start a swap to this reciter.
    Swap(u32),
    Quit,
}

/// Apply a command that the controller handles on its own. Swaps and
/// shutdown need the runtime, so they come back as a [`Flow`].
pub fn apply_command<M: MediaElement, S: Scheduler>(
    command: Command,
    controller: &mut PlaybackController<M, S>,
    reciters: &[u32],
) -> Flow {
    match command {
        Command::Play => {
            controller.play();
        }
        Command::Toggle => controller.toggle(),
        Command::SeekFraction(f) => controller.seek_global(f),
        Command::SeekBy(s) => controller.seek_by(s),
        Command::Next => controller.next(),
        Command::Prev => controller.prev(),
        Command::PlayVerse(target) => {
            controller.play_from_verse(target);
        }
        Command::PlayWord { verse, word } => {
            controller.play_word(verse, word);
        }
        Command::SwapReciter(id) => return Flow::Swap(id),
        Command::CycleReciter => {
            let current = controller
                .pending_swap()
                .or_else(|| controller.content().map(|c| c.reciter_id));
            if let Some(id) = next_reciter(reciters, current) {
                return Flow::Swap(id);
            }
            tracing::debug!("No other reciter to cycle to");
        }
        Command::SetVolume(v) => controller.set_volume(v),
        Command::ToggleMute => controller.set_muted(!controller.muted()),
        Command::Shutdown => return Flow::Quit,
    }
    Flow::Continue
}

/// The reciter after `current` in `reciters`, wrapping around.
pub fn next_reciter(reciters: &[u32], current: Option<u32>) -> Option<u32> {
    let pos = current.and_then(|c| reciters.iter().position(|r| *r == c));
    let next = match pos {
        Some(i) => reciters[(i + 1) % reciters.len()],
        None => *reciters.first()?,
    };
    (Some(next) != current).then_some(next)
}

/// Sends snapshots to the front end, skipping ones that carry nothing new.
#[derive(Debug)]
pub struct UpdateSender {
    tx: mpsc::Sender<Update>,
    // Last sent (version + playing bit).
    last_key: Option<u64>,
    err: Option<String>,
}

impl UpdateSender {
    pub fn new(tx: mpsc::Sender<Update>) -> Self {
        Self {
            tx,
            last_key: None,
            err: None,
        }
    }

    /// Attach an error message to the next update.
    pub fn set_error(&mut self, err: impl Into<String>) {
        self.err = Some(err.into());
    }

    /// Send the controller's snapshot with the highlight events queued
    /// since the last send. Unless `force` is set, nothing is sent when the
    /// state version, playing flag and event queue are all unchanged.
    pub async fn send<M: MediaElement, S: Scheduler>(
        &mut self,
        controller: &mut PlaybackController<M, S>,
        force: bool,
    ) -> bool {
        let events = controller.take_highlight_events();
        let mut update = controller.snapshot();
        let playing_bit: u64 = if update.playing { 1 } else { 0 };
        let key = (update.version << 1) | playing_bit;
        if !force && events.is_empty() && self.err.is_none() && self.last_key == Some(key) {
            return false;
        }
        update.events = events;
        update.err = self.err.take();
        if self.tx.send(update).await.is_ok() {
            self.last_key = Some(key);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PlaybackMode, SingleTrack};
    use crate::media::SimulatedMedia;
    use crate::resume::ResumeTarget;
    use crate::scheduler::ManualScheduler;
    use crate::timeline::Segment;

    fn controller() -> PlaybackController<SimulatedMedia, ManualScheduler> {
        let mut c = PlaybackController::new(SimulatedMedia::new(), ManualScheduler::default());
        c.attach(
            LoadedContent {
                chapter: 112,
                reciter_id: 7,
                mode: PlaybackMode::Single(SingleTrack {
                    track_url: "https://audio/112.mp3".to_string(),
                    segments: vec![
                        Segment {
                            verse_number: 1,
                            start: 0.0,
                            end: 3.0,
                        },
                        Segment {
                            verse_number: 2,
                            start: 3.0,
                            end: 6.0,
                        },
                    ],
                    word_segments: Vec::new(),
                    total_duration: Some(6.0),
                }),
                text: Vec::new(),
            },
            ResumeTarget::default(),
        );
        c
    }

    #[test]
    fn cycles_through_reciters() {
        let list = [7, 9, 11];
        assert_eq!(next_reciter(&list, Some(7)), Some(9));
        assert_eq!(next_reciter(&list, Some(11)), Some(7));
        assert_eq!(next_reciter(&list, Some(3)), Some(7));
        assert_eq!(next_reciter(&[7], Some(7)), None);
        assert_eq!(next_reciter(&[], Some(7)), None);
    }

    #[test]
    fn swap_and_shutdown_are_left_to_the_runtime() {
        let mut c = controller();
        assert_eq!(apply_command(Command::CycleReciter, &mut c, &[7, 9]), Flow::Swap(9));
        assert_eq!(apply_command(Command::SwapReciter(4), &mut c, &[]), Flow::Swap(4));
        assert_eq!(apply_command(Command::Shutdown, &mut c, &[]), Flow::Quit);
        assert_eq!(apply_command(Command::ToggleMute, &mut c, &[]), Flow::Continue);
        assert!(c.muted());
    }

    #[tokio::test]
    async fn redundant_updates_are_skipped() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sender = UpdateSender::new(tx);
        let mut c = controller();
        assert!(sender.send(&mut c, false).await);
        assert!(!sender.send(&mut c, false).await);
        assert!(sender.send(&mut c, true).await);

        sender.set_error("fetch failed");
        assert!(sender.send(&mut c, false).await);
        let mut last = None;
        while let Ok(u) = rx.try_recv() {
            last = Some(u);
        }
        let last = last.unwrap();
        assert_eq!(last.err.as_deref(), Some("fetch failed"));
        assert_eq!(last.chapter, 112);
    }
}
