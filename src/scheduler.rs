//! Frame and deferred-resume scheduling.
//!
//! The controller never sleeps or spawns; it asks a `Scheduler` to call
//! it back later with a token. Tokens carry a generation so callbacks that
//! belong to a superseded chain are recognised and dropped.

use crate::event::RuntimeEvent;
use std::time::Duration;
use tokio::sync::mpsc;

/// Spacing of the highlight loop, one display frame at 60 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResumeToken(pub u64);

pub trait Scheduler {
    /// Ask for `on_frame(token)` on the next frame.
    fn request_frame(&mut self, token: FrameToken);
    fn cancel_frame(&mut self, token: FrameToken);
    /// Ask for `on_resume_timer(token)` after `delay`.
    fn schedule_resume(&mut self, token: ResumeToken, delay: Duration);
}

/// Posts callbacks back into the runtime loop as [`RuntimeEvent`]s.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<RuntimeEvent>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self { tx }
    }
}

impl Scheduler for TokioScheduler {
    fn request_frame(&mut self, token: FrameToken) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FRAME_INTERVAL).await;
            let _ = tx.send(RuntimeEvent::Frame(token));
        });
    }

    // Stale frames are filtered by generation in the controller.
    fn cancel_frame(&mut self, _token: FrameToken) {}

    fn schedule_resume(&mut self, token: ResumeToken, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RuntimeEvent::ResumeTimer(token));
        });
    }
}

/// Records requests so tests can fire them by hand.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pub frames: Vec<FrameToken>,
    pub cancelled: Vec<FrameToken>,
    pub resumes: Vec<(ResumeToken, Duration)>,
}

#[cfg(test)]
impl ManualScheduler {
    /// Frame requests that were not cancelled, oldest first.
    pub fn live_frames(&self) -> Vec<FrameToken> {
        self.frames
            .iter()
            .filter(|t| !self.cancelled.contains(t))
            .copied()
            .collect()
    }

    pub fn take_frames(&mut self) -> Vec<FrameToken> {
        let live = self.live_frames();
        self.frames.clear();
        self.cancelled.clear();
        live
    }

    pub fn take_resumes(&mut self) -> Vec<ResumeToken> {
        self.resumes.drain(..).map(|(t, _)| t).collect()
    }
}

#[cfg(test)]
impl Scheduler for ManualScheduler {
    fn request_frame(&mut self, token: FrameToken) {
        self.frames.push(token);
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.cancelled.push(token);
    }

    fn schedule_resume(&mut self, token: ResumeToken, delay: Duration) {
        self.resumes.push((token, delay));
    }
}
