use crate::timeline::{Segment, WordSegment};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("tilawa/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

pub(crate) fn http_client() -> &'static Client {
    &HTTP_CLIENT
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no audio for reciter {reciter} in chapter {chapter}")]
    Unavailable { reciter: u32, chapter: u32 },
}

/// One audio file covering a whole chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTrack {
    pub track_url: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub word_segments: Vec<WordSegment>,
    /// Chapter length reported by the API, preferred over the file's own.
    pub total_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AyahTrack {
    pub verse_number: u32,
    pub track_url: String,
}

/// One audio file per verse. Word times are relative to each verse's file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerAyahTracks {
    pub items: Vec<AyahTrack>,
    #[serde(default)]
    pub word_segments_by_verse: HashMap<u32, Vec<WordSegment>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Single(SingleTrack),
    PerAyah(PerAyahTracks),
}

impl PlaybackMode {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackMode::Single(_) => "chapter",
            PlaybackMode::PerAyah(_) => "per-verse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseText {
    pub verse_number: u32,
    pub words: Vec<String>,
}

/// Everything needed to play one chapter with one reciter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedContent {
    pub chapter: u32,
    pub reciter_id: u32,
    pub mode: PlaybackMode,
    /// Verse words for display; empty when the text could not be fetched.
    #[serde(default)]
    pub text: Vec<VerseText>,
}

impl LoadedContent {
    /// Word counts from the verse text, where known.
    pub fn text_word_counts(&self) -> HashMap<u32, u32> {
        self.text
            .iter()
            .filter(|v| !v.words.is_empty())
            .map(|v| (v.verse_number, v.words.len() as u32))
            .collect()
    }
}
