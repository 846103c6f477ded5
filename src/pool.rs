// pool.rs: the runtime loop that owns the player
//
// One task owns the controller and is its only writer. Front-end commands,
// frame and resume callbacks, swap fetch results and a media tick all come
// through one `select!`, so handlers never overlap.

use crate::content::{ContentCache, ContentSource, LoadedContent, load_content};
use crate::controller::PlaybackController;
use crate::event::{Command, Flow, RuntimeEvent, UpdateSender, apply_command};
use crate::media::MediaElement;
use crate::resume::ResumeTarget;
use crate::scheduler::TokioScheduler;
use crate::state::{NowPlaying, Update};
use crate::swap::SwapOutcome;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

/// How often the media element is polled for events.
pub const TIMEUPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// The element a session plays through.
pub type Player = Box<dyn MediaElement + Send>;

/// What a session starts from.
pub struct Session<C> {
    pub media: Player,
    pub content: LoadedContent,
    pub resume: ResumeTarget,
    pub source: Arc<C>,
    pub cache: Option<Arc<Mutex<ContentCache>>>,
    /// Reciters to cycle through.
    pub reciters: Vec<u32>,
}

pub struct Runtime<C: ContentSource + 'static> {
    controller: PlaybackController<Player, TokioScheduler>,
    events: mpsc::UnboundedReceiver<RuntimeEvent>,
    event_tx: mpsc::UnboundedSender<RuntimeEvent>,
    source: Arc<C>,
    cache: Option<Arc<Mutex<ContentCache>>>,
    reciters: Vec<u32>,
    updates: UpdateSender,
    swap_task: Option<JoinHandle<()>>,
}

impl<C: ContentSource + 'static> Runtime<C> {
    pub fn new(session: Session<C>, update_tx: mpsc::Sender<Update>) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let scheduler = TokioScheduler::new(event_tx.clone());
        let mut controller = PlaybackController::new(session.media, scheduler);
        controller.attach(session.content, session.resume);
        Self {
            controller,
            events,
            event_tx,
            source: session.source,
            cache: session.cache,
            reciters: session.reciters,
            updates: UpdateSender::new(update_tx),
            swap_task: None,
        }
    }

    pub fn now_playing(&self) -> watch::Receiver<NowPlaying> {
        self.controller.subscribe_now_playing()
    }

    /// Run until `Shutdown` or until every command sender is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut tick = tokio::time::interval(TIMEUPDATE_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.updates.send(&mut self.controller, true).await;
        loop {
            tokio::select! {
                biased;

                maybe_cmd = commands.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    tracing::debug!(?cmd, "Command");
                    match apply_command(cmd, &mut self.controller, &self.reciters) {
                        Flow::Continue => {}
                        Flow::Swap(reciter_id) => self.start_swap(reciter_id),
                        Flow::Quit => break,
                    }
                    self.updates.send(&mut self.controller, false).await;
                }

                Some(event) = self.events.recv() => {
                    self.handle_event(event);
                    self.updates.send(&mut self.controller, false).await;
                }

                _ = tick.tick() => {
                    self.controller.pump_media();
                    // progress moves without a state change while playing
                    let force = self.controller.phase().is_playing();
                    self.updates.send(&mut self.controller, force).await;
                }
            }
        }
        self.abort_swap();
        self.controller.close();
        tracing::debug!("Runtime loop stopped");
    }

    fn handle_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Frame(token) => self.controller.on_frame(token),
            RuntimeEvent::ResumeTimer(token) => self.controller.on_resume_timer(token),
            RuntimeEvent::SwapLoaded { ticket, result } => {
                match self.controller.complete_reciter_swap(ticket, result) {
                    SwapOutcome::Applied | SwapOutcome::Stale => {}
                    SwapOutcome::Reverted(e) => {
                        self.updates.set_error(format!(
                            "Could not load reciter {}: {}",
                            ticket.reciter_id, e
                        ));
                    }
                }
            }
        }
    }

    fn start_swap(&mut self, reciter_id: u32) {
        let Some(chapter) = self.controller.content().map(|c| c.chapter) else {
            return;
        };
        let Some(ticket) = self.controller.begin_reciter_swap(reciter_id) else {
            return;
        };
        // the superseded fetch would come back stale anyway
        self.abort_swap();
        let source = Arc::clone(&self.source);
        let cache = self.cache.clone();
        let tx = self.event_tx.clone();
        self.swap_task = Some(tokio::spawn(async move {
            let result = load_content(source.as_ref(), cache.as_ref(), reciter_id, chapter).await;
            let _ = tx.send(RuntimeEvent::SwapLoaded { ticket, result });
        }));
    }

    fn abort_swap(&mut self) {
        if let Some(task) = self.swap_task.take() {
            task.abort();
        }
    }
}
