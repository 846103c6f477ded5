mod content;
mod controller;
mod event;
mod highlight;
mod media;
mod pool;
mod resume;
mod scheduler;
mod state;
mod swap;
mod timeline;
mod timer;
mod ui;

use crate::content::quran_api::{DEFAULT_API_BASE, DEFAULT_AUDIO_BASE, DEFAULT_CHAPTER_AUDIO_BASE};
use crate::content::{ContentCache, QuranApi, load_content};
use crate::media::SimulatedMedia;
use crate::pool::{Player, Session};
use crate::resume::ResumeTarget;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Chapter (surah) to recite
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=114))]
    chapter: u32,
    /// Reciter id to start with
    #[arg(long, default_value_t = 7)]
    reciter: u32,
    /// Comma-separated reciter ids to cycle through with `r`.
    /// If empty, the TILAWA_RECITERS env var will be used as a fallback.
    #[arg(long, value_delimiter = ',')]
    reciters: Vec<u32>,
    /// Deep-link query to resume from (e.g. "verse=3&word=2&autoplay=1")
    #[arg(long)]
    link: Option<String>,
    /// Start at a `chapter:verse` key; overrides --chapter
    #[arg(long)]
    verse_key: Option<String>,
    /// Print verses to stdout as they are recited (default is the full-screen UI)
    #[arg(long)]
    pipe: bool,
    /// In pipe mode, print every word as well
    #[arg(long)]
    words: bool,
    /// Follow the recitation clock without playing audio
    #[arg(long)]
    silent: bool,
    /// Path to a local content cache (optional)
    #[arg(long)]
    cache: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,
    #[arg(long, default_value = DEFAULT_CHAPTER_AUDIO_BASE)]
    chapter_audio_base: String,
    #[arg(long, default_value = DEFAULT_AUDIO_BASE)]
    audio_base: String,
    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug_log: bool,
}

fn reciters_from_env_if_empty(cli: &mut Config) {
    if cli.reciters.is_empty()
        && let Ok(s) = std::env::var("TILAWA_RECITERS")
    {
        cli.reciters = parse_reciter_list(&s);
    }
    if cli.reciters.is_empty() {
        cli.reciters = vec![cli.reciter];
    }
}

fn parse_reciter_list(s: &str) -> Vec<u32> {
    s.split(',')
        .filter_map(|p| {
            let p = p.trim();
            match p.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    if !p.is_empty() {
                        tracing::warn!(value = p, "Ignoring invalid reciter id");
                    }
                    None
                }
            }
        })
        .collect()
}

/// Chapter and resume target from `--verse-key` and `--link`. Fields set by
/// the link win over the verse key.
fn start_point(cfg: &Config) -> Result<(u32, ResumeTarget), String> {
    let (chapter, mut target) = match &cfg.verse_key {
        Some(key) => ResumeTarget::from_verse_key(key, false)
            .ok_or_else(|| format!("Invalid verse key: {}", key))?,
        None => (cfg.chapter, ResumeTarget::default()),
    };
    if let Some(link) = &cfg.link {
        let linked = ResumeTarget::from_query(link);
        target = ResumeTarget {
            verse: linked.verse.or(target.verse),
            word: linked.word,
            raw_time: linked.raw_time,
            autoplay: linked.autoplay || target.autoplay,
        };
    }
    if !(1..=114).contains(&chapter) {
        return Err(format!("Chapter out of range: {}", chapter));
    }
    Ok((chapter, target))
}

#[cfg(feature = "audio")]
fn open_player(cfg: &Config) -> Player {
    if cfg.silent {
        return Box::new(SimulatedMedia::new());
    }
    match crate::media::audio::AudioMedia::open() {
        Ok(media) => Box::new(media),
        Err(e) => {
            tracing::warn!(error = %e, "No audio output, following the clock silently");
            Box::new(SimulatedMedia::new())
        }
    }
}

#[cfg(not(feature = "audio"))]
fn open_player(_cfg: &Config) -> Player {
    Box::new(SimulatedMedia::new())
}

fn init_tracing(cfg: &Config) {
    let default = if cfg.debug_log {
        "debug"
    } else if cfg.pipe {
        "warn"
    } else {
        // stderr shares the screen with the full-screen UI
        "off"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    init_tracing(&cfg);
    reciters_from_env_if_empty(&mut cfg);

    let (chapter, resume) = start_point(&cfg)?;
    let source = Arc::new(QuranApi::new(
        &cfg.api_base,
        &cfg.chapter_audio_base,
        &cfg.audio_base,
    ));
    let cache = match &cfg.cache {
        Some(path) => Some(Arc::new(Mutex::new(ContentCache::load(path.clone()).await))),
        None => None,
    };

    let content = match load_content(source.as_ref(), cache.as_ref(), cfg.reciter, chapter).await {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    };
    let session = Session {
        media: open_player(&cfg),
        content,
        resume,
        source,
        cache,
        reciters: cfg.reciters.clone(),
    };

    let result = if cfg.pipe {
        crate::ui::pipe::display_verses_pipe(session, cfg.words).await
    } else {
        crate::ui::modern::display_verses_modern(session).await
    };

    // Print error if any, for better diagnostics
    match result {
        Ok(now) => {
            tracing::info!(
                verse = ?now.verse,
                word = ?now.word,
                native_time = now.native_time,
                playing = now.playing,
                "Session ended"
            );
            if let (Some(chapter), Some(reciter), Some(query)) =
                (now.chapter, now.reciter_id, now.resume_query())
            {
                eprintln!(
                    "Resume with: --chapter {} --reciter {} --link \"{}\"",
                    chapter, reciter, query
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}
