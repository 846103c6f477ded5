use crate::content::ContentSource;
use crate::controller::phase::{SessionPhase, Transport};
use crate::event::Command;
use crate::highlight::{HighlightEvent, WordRef};
use crate::pool::{Runtime, Session};
use crate::state::{NowPlaying, Update};
use tokio::sync::mpsc;

/// Turns updates into stdout lines.
#[derive(Debug, Default)]
pub struct PipePrinter {
    words: bool,
    started: bool,
    finished: bool,
}

impl PipePrinter {
    pub fn new(words: bool) -> Self {
        Self {
            words,
            ..Default::default()
        }
    }

    pub fn process(&mut self, update: &Update) -> Vec<String> {
        let mut out = Vec::new();
        for event in &update.events {
            match *event {
                HighlightEvent::VerseEnter { verse, .. } => out.push(verse_line(update, verse)),
                HighlightEvent::WordEnter(word) if self.words => out.push(word_line(update, word)),
                _ => {}
            }
        }
        if update.playing {
            self.started = true;
        } else if self.started
            && update.phase == SessionPhase::Activated(Transport::Paused)
            && update.swapping_to.is_none()
        {
            self.finished = true;
        }
        out
    }

    /// Playback ran and has come to rest.
    pub fn finished(&self) -> bool {
        self.finished
    }
}

fn verse_line(update: &Update, verse: u32) -> String {
    match update.verse_text(verse) {
        Some(v) if !v.words.is_empty() => v.words.join(" "),
        _ => format!("{}:{}", update.chapter, verse),
    }
}

fn word_line(update: &Update, word: WordRef) -> String {
    update
        .verse_text(word.verse)
        .and_then(|v| v.words.get(word.word_index.saturating_sub(1) as usize))
        .cloned()
        .unwrap_or_else(|| format!("{}:{}:{}", update.chapter, word.verse, word.word_index))
}

/// Recite in pipe mode (stdout only, for scripting). Returns where
/// playback stopped.
pub async fn display_verses_pipe<C: ContentSource + 'static>(
    session: Session<C>,
    words: bool,
) -> Result<NowPlaying, Box<dyn std::error::Error + Send + Sync>> {
    let (tx, mut rx) = mpsc::channel(32);
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let runtime = Runtime::new(session, tx);
    let now_playing = runtime.now_playing();
    let handle = tokio::spawn(runtime.run(cmd_rx));

    let mut printer = PipePrinter::new(words);
    let mut requested_play = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            maybe_update = rx.recv() => {
                let Some(update) = maybe_update else { break };
                if let Some(err) = &update.err {
                    tracing::warn!(error = %err, "Playback error");
                }
                if update.mode.is_some() && update.verse_count == 0 {
                    tracing::warn!(chapter = update.chapter, "Nothing to recite");
                    break;
                }
                if !requested_play && (update.phase == SessionPhase::Ready || update.activated) {
                    requested_play = true;
                    cmd_tx.send(Command::Play).await?;
                }
                for line in printer.process(&update) {
                    println!("{}", line);
                }
                if printer.finished() {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    // the loop may be parked on a full update channel
    drop(rx);
    let _ = cmd_tx.send(Command::Shutdown).await;
    handle.await?;
    let last = now_playing.borrow().clone();
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::VerseText;
    use std::sync::Arc;

    fn update(events: Vec<HighlightEvent>) -> Update {
        Update {
            chapter: 1,
            verses: Arc::new(vec![VerseText {
                verse_number: 1,
                words: vec!["bismi".to_string(), "allahi".to_string()],
            }]),
            events,
            ..Default::default()
        }
    }

    #[test]
    fn prints_verses_and_optionally_words() {
        let events = vec![
            HighlightEvent::VerseEnter {
                verse: 1,
                scroll: true,
            },
            HighlightEvent::WordEnter(WordRef {
                verse: 1,
                word_index: 2,
            }),
            HighlightEvent::VerseEnter {
                verse: 2,
                scroll: true,
            },
        ];
        let mut verses_only = PipePrinter::new(false);
        assert_eq!(
            verses_only.process(&update(events.clone())),
            vec!["bismi allahi".to_string(), "1:2".to_string()]
        );
        let mut with_words = PipePrinter::new(true);
        assert_eq!(
            with_words.process(&update(events)),
            vec!["bismi allahi", "allahi", "1:2"]
        );
    }

    #[test]
    fn finishes_once_playback_comes_to_rest() {
        let mut printer = PipePrinter::new(false);
        let mut u = update(Vec::new());
        u.phase = SessionPhase::Activated(Transport::Paused);
        printer.process(&u);
        assert!(!printer.finished());

        u.phase = SessionPhase::Activated(Transport::Playing);
        u.playing = true;
        printer.process(&u);
        u.phase = SessionPhase::Activated(Transport::Buffering);
        u.playing = false;
        printer.process(&u);
        assert!(!printer.finished());

        u.phase = SessionPhase::Activated(Transport::Paused);
        printer.process(&u);
        assert!(printer.finished());
    }
}
