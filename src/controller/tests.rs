use super::phase::{SessionPhase, Transport};
use super::*;
use crate::content::{PerAyahTracks, SingleTrack};
use crate::media::MediaError;
use crate::scheduler::ManualScheduler;
use crate::timeline::{Segment, WordSegment};

/// Media element whose clock only moves when a test moves it.
#[derive(Debug, Default)]
struct FakeMedia {
    source: Option<MediaSource>,
    time: f64,
    playing: bool,
    reject_play: bool,
    loads: Vec<String>,
    unloads: usize,
}

impl MediaElement for FakeMedia {
    fn set_source(&mut self, source: &MediaSource) {
        self.source = Some(source.clone());
        self.time = 0.0;
        self.playing = false;
        self.loads.push(source.url.clone());
    }

    fn unload(&mut self) {
        self.source = None;
        self.time = 0.0;
        self.playing = false;
        self.unloads += 1;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.reject_play {
            return Err(MediaError::PlayRejected("autoplay policy".to_string()));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        self.time = seconds;
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn set_muted(&mut self, _muted: bool) {}

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        Vec::new()
    }
}

type Controller = PlaybackController<FakeMedia, ManualScheduler>;

fn seg(verse_number: u32, start: f64, end: f64) -> Segment {
    Segment {
        verse_number,
        start,
        end,
    }
}

fn word(verse_number: u32, word_index: u32, start: f64, end: f64) -> WordSegment {
    WordSegment {
        verse_number,
        word_index,
        start,
        end,
    }
}

/// Verses 1..=3 at [0,5) [5,9) [9,14), two timed words in verse 2.
fn single_content(reciter_id: u32) -> LoadedContent {
    LoadedContent {
        chapter: 1,
        reciter_id,
        mode: PlaybackMode::Single(SingleTrack {
            track_url: format!("https://audio/{reciter_id}/001.mp3"),
            segments: vec![seg(1, 0.0, 5.0), seg(2, 5.0, 9.0), seg(3, 9.0, 14.0)],
            word_segments: vec![word(2, 1, 5.0, 6.5), word(2, 2, 7.0, 8.5)],
            total_duration: Some(14.0),
        }),
        text: Vec::new(),
    }
}

/// Three verse tracks, no word timings: durations start at the default.
fn per_ayah_content(reciter_id: u32) -> LoadedContent {
    LoadedContent {
        chapter: 1,
        reciter_id,
        mode: PlaybackMode::PerAyah(PerAyahTracks {
            items: (1..=3)
                .map(|v| AyahTrack {
                    verse_number: v,
                    track_url: format!("https://audio/{reciter_id}/00100{v}.mp3"),
                })
                .collect(),
            word_segments_by_verse: Default::default(),
        }),
        text: Vec::new(),
    }
}

fn controller() -> Controller {
    PlaybackController::new(FakeMedia::default(), ManualScheduler::default())
}

fn metadata(c: &mut Controller, duration: f64) {
    c.handle_media_event(MediaEvent::LoadedMetadata { duration });
}

/// Attached, metadata loaded and playing.
fn playing(content: LoadedContent, duration: f64) -> Controller {
    let mut c = controller();
    c.attach(content, ResumeTarget::default());
    metadata(&mut c, duration);
    assert!(c.play());
    c
}

/// Fire every live frame once.
fn tick(c: &mut Controller) {
    for token in c.scheduler_mut().take_frames() {
        c.on_frame(token);
    }
}

fn fire_resumes(c: &mut Controller) {
    for token in c.scheduler_mut().take_resumes() {
        c.on_resume_timer(token);
    }
}

const PLAYING: SessionPhase = SessionPhase::Activated(Transport::Playing);
const PAUSED: SessionPhase = SessionPhase::Activated(Transport::Paused);
const BUFFERING: SessionPhase = SessionPhase::Activated(Transport::Buffering);

#[test]
fn play_is_ignored_until_metadata_loads() {
    let mut c = controller();
    assert!(!c.play());
    assert_eq!(c.phase(), SessionPhase::Idle);

    c.attach(single_content(1), ResumeTarget::default());
    assert!(!c.play());
    assert_eq!(c.phase(), SessionPhase::Attached);

    metadata(&mut c, 14.0);
    assert_eq!(c.phase(), SessionPhase::Ready);
    assert!(!c.snapshot().activated);

    assert!(c.play());
    assert_eq!(c.phase(), PLAYING);
    assert!(c.media().playing);
    assert_eq!(c.scheduler().live_frames().len(), 1);
    assert_eq!(c.highlight_state().active_verse, Some(1));
}

#[test]
fn frames_track_verse_and_word() {
    let mut c = playing(single_content(1), 14.0);
    c.take_highlight_events();
    c.media_mut().time = 7.2;
    tick(&mut c);

    let state = c.highlight_state();
    assert_eq!(state.active_verse, Some(2));
    assert_eq!(
        state.active_word,
        Some(WordRef {
            verse: 2,
            word_index: 2
        })
    );
    let events = c.take_highlight_events();
    assert_eq!(
        events,
        vec![
            HighlightEvent::VerseLeave(1),
            HighlightEvent::VerseEnter {
                verse: 2,
                scroll: true
            },
            HighlightEvent::WordEnter(WordRef {
                verse: 2,
                word_index: 2
            }),
        ]
    );
    assert_eq!(c.snapshot().active_verse_index, 1);

    // silence between words leaves no word lit, the verse stays
    c.media_mut().time = 6.8;
    tick(&mut c);
    assert_eq!(c.highlight_state().active_word, None);
    assert_eq!(c.highlight_state().active_verse, Some(2));
}

#[test]
fn only_one_frame_chain_is_alive() {
    let mut c = playing(single_content(1), 14.0);
    c.pause();
    assert!(c.scheduler().live_frames().is_empty());
    assert!(c.play());
    assert!(c.play());
    assert_eq!(c.scheduler().live_frames(), vec![FrameToken(2)]);

    // the cancelled chain's frame is ignored and schedules nothing
    c.on_frame(FrameToken(1));
    assert_eq!(c.scheduler().live_frames(), vec![FrameToken(2)]);

    tick(&mut c);
    assert_eq!(c.scheduler().live_frames(), vec![FrameToken(3)]);
}

#[test]
fn pausing_stops_the_frame_loop() {
    let mut c = playing(single_content(1), 14.0);
    let live = c.scheduler().live_frames();
    c.pause();
    assert_eq!(c.phase(), PAUSED);
    assert!(!c.media().playing);
    for token in live {
        c.on_frame(token);
    }
    assert!(c.scheduler().live_frames().is_empty());
}

#[test]
fn next_in_single_mode_seeks_past_boundary_and_resumes_after_delay() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 1.0;
    c.next();

    assert_eq!(c.media().time, 5.0 + SEEK_EPSILON);
    assert_eq!(c.phase(), BUFFERING);
    assert!(!c.media().playing);
    assert_eq!(c.highlight_state().active_verse, Some(2));
    assert_eq!(c.scheduler().resumes.len(), 1);
    assert_eq!(c.scheduler().resumes[0].1, RESUME_DELAY);

    fire_resumes(&mut c);
    assert_eq!(c.phase(), PLAYING);
    assert!(c.media().playing);
}

#[test]
fn next_and_prev_clamp_at_the_ends() {
    let mut c = playing(single_content(1), 14.0);
    c.prev();
    assert_eq!(c.media().time, 0.0);
    assert!(c.scheduler().resumes.is_empty());

    c.next();
    c.next();
    c.next();
    assert_eq!(c.snapshot().active_verse_index, 2);
    assert_eq!(c.media().time, 9.0 + SEEK_EPSILON);
}

#[test]
fn next_while_paused_does_not_start_playback() {
    let mut c = playing(single_content(1), 14.0);
    c.pause();
    c.next();
    assert_eq!(c.phase(), PAUSED);
    assert!(c.scheduler().resumes.is_empty());
    assert_eq!(c.highlight_state().active_verse, Some(2));
}

#[test]
fn per_ayah_next_switches_track_then_plays() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.next();
    assert_eq!(c.media().loads.len(), 2);
    assert_eq!(c.media().loads[1], "https://audio/1/001002.mp3");
    assert_eq!(c.phase(), BUFFERING);

    // the deferred play fires before the track is ready
    fire_resumes(&mut c);
    assert_eq!(c.phase(), BUFFERING);

    metadata(&mut c, 4.0);
    assert_eq!(c.phase(), PLAYING);
    assert!(c.media().playing);
    assert_eq!(c.total_duration(), 14.0);
    assert_eq!(c.highlight_state().active_verse, Some(2));
}

#[test]
fn per_ayah_seek_into_another_verse_lands_after_its_metadata() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.seek_global(0.5); // 7.5 s on a 3 × 5 s timeline
    assert_eq!(c.media().loads.len(), 2);
    assert_eq!(c.phase(), BUFFERING);
    assert!((c.current_time() - 7.5).abs() < 1e-9);

    metadata(&mut c, 5.0);
    assert!((c.media().time - 2.5).abs() < 1e-9);
    assert_eq!(c.phase(), PLAYING);
    assert!((c.current_time() - 7.5).abs() < 1e-9);
}

#[test]
fn per_ayah_seek_within_loaded_verse_does_not_reload() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.seek_global(0.2); // 3 s
    assert_eq!(c.media().loads.len(), 1);
    assert!((c.media().time - 3.0).abs() < 1e-9);
    assert_eq!(c.phase(), PLAYING);
}

#[test]
fn ended_on_the_last_verse_stops() {
    let mut c = playing(per_ayah_content(1), 5.0);
    assert!(c.play_from_verse(VerseTarget::Index(2)));
    metadata(&mut c, 5.0);
    fire_resumes(&mut c);
    assert_eq!(c.phase(), PLAYING);

    c.handle_media_event(MediaEvent::Ended);
    assert_eq!(c.phase(), PAUSED);
    assert!(!c.snapshot().playing);
    assert!(!c.media().playing);
    assert!(c.scheduler().live_frames().is_empty());
    assert_eq!(c.snapshot().active_verse_index, 2);
    assert_eq!(c.media().loads.len(), 2);
}

#[test]
fn ended_advances_to_the_next_verse() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.handle_media_event(MediaEvent::Ended);
    assert_eq!(c.media().loads.len(), 2);
    assert_eq!(c.phase(), BUFFERING);
    metadata(&mut c, 4.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.snapshot().active_verse_index, 1);
}

#[test]
fn media_error_skips_the_unavailable_verse() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.handle_media_event(MediaEvent::Error("decode failed".to_string()));
    assert_eq!(c.media().loads[1], "https://audio/1/001002.mp3");
    metadata(&mut c, 5.0);
    assert_eq!(c.phase(), PLAYING);
}

#[test]
fn media_error_while_paused_moves_past_the_verse() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.pause();
    c.next();
    c.handle_media_event(MediaEvent::Error("404".to_string()));
    assert_eq!(
        c.media().loads.last().map(String::as_str),
        Some("https://audio/1/001003.mp3")
    );
    assert_eq!(c.phase(), PAUSED);
    assert_eq!(c.highlight_state().active_verse, Some(3));

    assert!(c.play());
    fire_resumes(&mut c);
    metadata(&mut c, 5.0);
    assert_eq!(c.phase(), PLAYING);
    assert!(c.media().playing);
}

#[test]
fn play_on_a_failed_last_verse_stays_paused() {
    let mut c = playing(per_ayah_content(1), 5.0);
    c.pause();
    assert!(c.play_from_verse(VerseTarget::Index(2)));
    c.handle_media_event(MediaEvent::Error("404".to_string()));
    assert_eq!(c.media().loads.len(), 2);

    assert!(!c.play());
    assert_eq!(c.phase(), PAUSED);
    assert!(!c.media().playing);
}

#[test]
fn single_mode_ended_stops() {
    let mut c = playing(single_content(1), 14.0);
    c.handle_media_event(MediaEvent::Ended);
    assert_eq!(c.phase(), PAUSED);
    assert_eq!(c.media().loads.len(), 1);
}

#[test]
fn resume_target_is_applied_once() {
    let mut c = controller();
    c.attach(
        single_content(1),
        ResumeTarget {
            verse: Some(2),
            autoplay: true,
            ..Default::default()
        },
    );
    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 5.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.highlight_state().active_verse, Some(2));

    // metadata re-firing must not seek back
    c.media_mut().time = 6.0;
    let before = c.snapshot().phase;
    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 6.0);
    assert_eq!(c.snapshot().phase, before);
}

#[test]
fn resume_prefers_word_then_verse_then_raw_time() {
    let mut c = controller();
    c.attach(
        single_content(1),
        ResumeTarget::from_query("verse=2&word=2&autoplay=1"),
    );
    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 7.0);

    let mut c = controller();
    c.attach(
        single_content(1),
        ResumeTarget {
            verse: Some(99),
            raw_time: Some(10.0),
            ..Default::default()
        },
    );
    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 10.0);
    // a successful seek activates without playing
    assert_eq!(c.phase(), PAUSED);
    assert_eq!(c.highlight_state().active_verse, Some(3));
}

#[test]
fn empty_resume_target_leaves_player_hidden() {
    let mut c = controller();
    c.attach(single_content(1), ResumeTarget::default());
    metadata(&mut c, 14.0);
    assert_eq!(c.phase(), SessionPhase::Ready);
    assert_eq!(c.media().time, 0.0);
    assert_eq!(c.highlight_state().active_verse, None);
}

#[test]
fn per_ayah_resume_starts_on_the_target_verse_track() {
    let mut c = controller();
    c.attach(
        per_ayah_content(1),
        ResumeTarget {
            verse: Some(3),
            autoplay: true,
            ..Default::default()
        },
    );
    assert_eq!(c.media().loads, vec!["https://audio/1/001003.mp3"]);
    metadata(&mut c, 5.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.snapshot().active_verse_index, 2);
    assert!((c.current_time() - 10.0).abs() < 1e-9);
}

#[test]
fn reciter_swap_preserves_position() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 7.2;
    tick(&mut c);
    c.take_highlight_events();

    let ticket = c.begin_reciter_swap(9).unwrap();
    assert_eq!(c.media().unloads, 2);
    assert!(c.media().source.is_none());
    assert_eq!(c.phase(), PAUSED);
    assert_eq!(c.highlight_state(), HighlightState::default());
    assert!(c.scheduler().live_frames().is_empty());
    assert_eq!(c.pending_swap(), Some(9));
    assert!((c.current_time() - 7.2).abs() < 1e-9);

    // the new reciter recites verse 2 later and slower
    let mut content = single_content(9);
    if let PlaybackMode::Single(track) = &mut content.mode {
        track.segments = vec![seg(1, 0.0, 6.0), seg(2, 6.0, 10.0), seg(3, 10.0, 15.0)];
        track.word_segments = vec![word(2, 1, 6.0, 7.5), word(2, 2, 8.0, 9.0)];
        track.total_duration = Some(15.0);
    }
    assert!(matches!(
        c.complete_reciter_swap(ticket, Ok(content)),
        SwapOutcome::Applied
    ));
    c.take_highlight_events();
    metadata(&mut c, 15.0);

    assert_eq!(c.media().time, 8.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.snapshot().reciter_id, Some(9));
    assert!(
        c.take_highlight_events().contains(&HighlightEvent::VerseEnter {
            verse: 2,
            scroll: false
        })
    );

    // scroll suppression ends with the swap
    c.next();
    assert!(
        c.take_highlight_events().contains(&HighlightEvent::VerseEnter {
            verse: 3,
            scroll: true
        })
    );
}

#[test]
fn reciter_swap_into_per_ayah_loads_the_verse_track() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 9.5;
    tick(&mut c);
    let ticket = c.begin_reciter_swap(4).unwrap();
    c.complete_reciter_swap(ticket, Ok(per_ayah_content(4)));
    assert_eq!(
        c.media().loads.last().map(String::as_str),
        Some("https://audio/4/001003.mp3")
    );
    metadata(&mut c, 5.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.media().time, 0.0);
    assert_eq!(c.highlight_state().active_verse, Some(3));
}

#[test]
fn superseded_swap_result_is_discarded() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 7.2;
    tick(&mut c);

    let first = c.begin_reciter_swap(9).unwrap();
    let second = c.begin_reciter_swap(10).unwrap();
    assert!(matches!(
        c.complete_reciter_swap(first, Ok(single_content(9))),
        SwapOutcome::Stale
    ));
    assert!(c.media().source.is_none());
    assert_eq!(c.pending_swap(), Some(10));

    assert!(matches!(
        c.complete_reciter_swap(second, Ok(single_content(10))),
        SwapOutcome::Applied
    ));
    metadata(&mut c, 14.0);
    assert_eq!(c.snapshot().reciter_id, Some(10));
    // the place captured by the first swap survives the second
    assert_eq!(c.media().time, 7.0);
    assert_eq!(c.phase(), PLAYING);
}

#[test]
fn failed_swap_reverts_to_previous_reciter() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 7.2;
    tick(&mut c);

    let ticket = c.begin_reciter_swap(9).unwrap();
    let outcome = c.complete_reciter_swap(
        ticket,
        Err(ContentError::Unavailable {
            reciter: 9,
            chapter: 1,
        }),
    );
    assert!(matches!(outcome, SwapOutcome::Reverted(_)));
    assert_eq!(c.snapshot().reciter_id, Some(1));
    assert_eq!(
        c.media().loads.last().map(String::as_str),
        Some("https://audio/1/001.mp3")
    );
    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 7.0);
    assert_eq!(c.phase(), PLAYING);
}

#[test]
fn reciter_swap_falls_back_to_time_when_the_verse_is_missing() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 7.2;
    tick(&mut c);
    let ticket = c.begin_reciter_swap(9).unwrap();

    // the new recording has no timing for verse 2
    let mut content = single_content(9);
    if let PlaybackMode::Single(track) = &mut content.mode {
        track.segments = vec![seg(1, 0.0, 6.0), seg(3, 6.0, 12.0)];
        track.word_segments = Vec::new();
        track.total_duration = Some(12.0);
    }
    assert!(matches!(
        c.complete_reciter_swap(ticket, Ok(content)),
        SwapOutcome::Applied
    ));
    metadata(&mut c, 12.0);
    assert!((c.media().time - 7.2).abs() < 1e-9);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.highlight_state().active_verse, Some(3));
}

#[test]
fn commands_during_a_swap_move_where_it_resumes() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 7.2;
    tick(&mut c);
    let ticket = c.begin_reciter_swap(9).unwrap();

    c.next();
    c.pause();
    assert_eq!(c.media().loads.len(), 1);
    assert!(c.scheduler().resumes.is_empty());
    assert_eq!(c.snapshot().active_verse_index, 2);
    assert!((c.current_time() - 9.0).abs() < 1e-9);

    c.complete_reciter_swap(ticket, Ok(single_content(9)));
    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 9.0);
    assert_eq!(c.phase(), PAUSED);
    assert_eq!(c.highlight_state().active_verse, Some(3));

    // a toggle mid-swap starts playback once the new reciter loads
    let ticket = c.begin_reciter_swap(4).unwrap();
    c.toggle();
    assert_eq!(c.phase(), PAUSED);
    c.complete_reciter_swap(ticket, Ok(single_content(4)));
    metadata(&mut c, 14.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.media().time, 9.0);
}

#[test]
fn swapping_to_the_current_reciter_is_a_no_op() {
    let mut c = playing(single_content(1), 14.0);
    assert!(c.begin_reciter_swap(1).is_none());
    assert_eq!(c.phase(), PLAYING);
}

#[test]
fn close_unloads_and_makes_swap_stale() {
    let mut c = playing(single_content(1), 14.0);
    let ticket = c.begin_reciter_swap(9).unwrap();
    c.close();
    assert_eq!(c.phase(), SessionPhase::Idle);
    assert!(c.media().source.is_none());
    assert!(c.content().is_none());
    assert!(matches!(
        c.complete_reciter_swap(ticket, Ok(single_content(9))),
        SwapOutcome::Stale
    ));
    assert!(c.content().is_none());
    assert!(!c.play());
}

#[test]
fn rejected_play_stays_paused_but_highlights() {
    let mut c = controller();
    c.media_mut().reject_play = true;
    c.attach(single_content(1), ResumeTarget::default());
    metadata(&mut c, 14.0);
    assert!(!c.play());
    assert_eq!(c.phase(), PAUSED);
    assert_eq!(c.highlight_state().active_verse, Some(1));
    assert!(c.scheduler().live_frames().is_empty());
}

#[test]
fn word_clip_pauses_at_word_end() {
    let mut c = controller();
    c.attach(single_content(1), ResumeTarget::default());
    metadata(&mut c, 14.0);

    assert!(c.play_word(2, 1));
    assert_eq!(c.media().time, 5.0);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(
        c.highlight_state().active_word,
        Some(WordRef {
            verse: 2,
            word_index: 1
        })
    );

    c.media_mut().time = 6.0;
    tick(&mut c);
    assert_eq!(c.phase(), PLAYING);

    c.media_mut().time = 6.6;
    tick(&mut c);
    assert_eq!(c.phase(), PAUSED);
    assert!(!c.media().playing);
    assert!(!c.play_word(2, 9));
}

#[test]
fn manual_seek_clears_word_highlight() {
    let mut c = playing(single_content(1), 14.0);
    c.media_mut().time = 7.2;
    tick(&mut c);
    c.take_highlight_events();

    c.seek_global(0.0);
    let events = c.take_highlight_events();
    assert_eq!(
        events[0],
        HighlightEvent::WordLeave(WordRef {
            verse: 2,
            word_index: 2
        })
    );
    assert!(events.contains(&HighlightEvent::VerseEnter {
        verse: 1,
        scroll: true
    }));
    assert_eq!(c.highlight_state().active_word, None);
    assert_eq!(c.media().time, 0.0);
}

#[test]
fn seek_by_clamps_to_the_timeline() {
    let mut c = playing(single_content(1), 14.0);
    c.seek_by(-5.0);
    assert_eq!(c.media().time, 0.0);
    c.seek_by(100.0);
    assert_eq!(c.media().time, 14.0);
}

#[test]
fn play_from_verse_activates_before_metadata() {
    let mut c = controller();
    c.attach(single_content(1), ResumeTarget::default());
    assert!(c.play_from_verse(VerseTarget::Number(3)));
    assert_eq!(c.phase(), BUFFERING);
    assert!(!c.play_from_verse(VerseTarget::Number(7)));

    metadata(&mut c, 14.0);
    assert_eq!(c.media().time, 9.0 + SEEK_EPSILON);
    assert_eq!(c.phase(), BUFFERING);
    fire_resumes(&mut c);
    assert_eq!(c.phase(), PLAYING);
    assert_eq!(c.highlight_state().active_verse, Some(3));
}

#[test]
fn now_playing_is_broadcast() {
    let mut c = playing(single_content(1), 14.0);
    let rx = c.subscribe_now_playing();
    c.media_mut().time = 7.2;
    tick(&mut c);
    let now = rx.borrow().clone();
    assert_eq!(now.chapter, Some(1));
    assert_eq!(now.verse, Some(2));
    assert_eq!(now.word, Some(2));
    assert!(now.playing);
    assert_eq!(now.native_time, 7.2);
}

#[test]
fn volume_is_clamped() {
    let mut c = playing(single_content(1), 14.0);
    c.set_volume(1.7);
    assert_eq!(c.volume(), 1.0);
    c.set_muted(true);
    assert!(c.snapshot().muted);
}
