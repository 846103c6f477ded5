use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::content::parse::{absolute_audio_url, ms_to_secs, parse_word_segments, verse_in_chapter};
use crate::content::source::ContentSource;
use crate::content::types::{
    AyahTrack, ContentError, PerAyahTracks, SingleTrack, VerseText, http_client,
};
use crate::timeline::Segment;

pub const DEFAULT_API_BASE: &str = "https://api.quran.com/api/v4";
pub const DEFAULT_CHAPTER_AUDIO_BASE: &str = "https://api.qurancdn.com/api/qdc";
pub const DEFAULT_AUDIO_BASE: &str = "https://verses.quran.com";

const PAGE_SIZE: u32 = 50;
// Longest chapter is 286 verses; anything past this is a pagination bug.
const MAX_PAGES: u32 = 10;

#[derive(Deserialize)]
struct ChapterAudioResponse {
    #[serde(default)]
    audio_files: Vec<ChapterAudioFile>,
}

#[derive(Deserialize)]
struct ChapterAudioFile {
    audio_url: Option<String>,
    /// Milliseconds.
    duration: Option<f64>,
    #[serde(default)]
    verse_timings: Vec<VerseTiming>,
}

#[derive(Deserialize)]
struct VerseTiming {
    verse_key: String,
    timestamp_from: f64,
    timestamp_to: f64,
    #[serde(default)]
    segments: Vec<Value>,
}

#[derive(Deserialize)]
struct AyahAudioResponse {
    #[serde(default)]
    audio_files: Vec<AyahAudioFile>,
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct AyahAudioFile {
    verse_key: String,
    url: Option<String>,
    #[serde(default)]
    segments: Vec<Value>,
}

#[derive(Deserialize)]
struct VersesResponse {
    #[serde(default)]
    verses: Vec<ApiVerse>,
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct ApiVerse {
    verse_number: u32,
    #[serde(default)]
    words: Vec<ApiWord>,
}

#[derive(Deserialize)]
struct ApiWord {
    position: u32,
    text_uthmani: Option<String>,
    char_type_name: Option<String>,
}

#[derive(Deserialize)]
struct Pagination {
    next_page: Option<u32>,
}

/// Content source backed by the public Quran.com REST API.
#[derive(Debug, Clone)]
pub struct QuranApi {
    api_base: String,
    chapter_audio_base: String,
    audio_base: String,
}

impl Default for QuranApi {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_CHAPTER_AUDIO_BASE, DEFAULT_AUDIO_BASE)
    }
}

impl QuranApi {
    pub fn new(api_base: &str, chapter_audio_base: &str, audio_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            chapter_audio_base: chapter_audio_base.trim_end_matches('/').to_string(),
            audio_base: audio_base.to_string(),
        }
    }

    /// GET a JSON document. A 404 means "nothing here" and maps to `None`.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, ContentError> {
        tracing::debug!(url, "Fetching content");
        let resp = http_client().get(url).send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ContentError::Api(format!("{}: HTTP {}", url, resp.status())));
        }
        let body = resp.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }
}

fn single_track_from(file: ChapterAudioFile, chapter: u32) -> Option<SingleTrack> {
    let track_url = file.audio_url.filter(|u| !u.is_empty())?;
    let mut segments = Vec::with_capacity(file.verse_timings.len());
    let mut word_segments = Vec::new();
    for timing in file.verse_timings {
        let Some(verse_number) = verse_in_chapter(&timing.verse_key, chapter) else {
            tracing::debug!(key = %timing.verse_key, chapter, "Skipping foreign verse timing");
            continue;
        };
        segments.push(Segment {
            verse_number,
            start: ms_to_secs(timing.timestamp_from),
            end: ms_to_secs(timing.timestamp_to),
        });
        word_segments.extend(parse_word_segments(verse_number, &timing.segments));
    }
    if segments.is_empty() {
        return None;
    }
    Some(SingleTrack {
        track_url,
        segments,
        word_segments,
        total_duration: file.duration.map(ms_to_secs),
    })
}

impl ContentSource for QuranApi {
    async fn fetch_single_track(
        &self,
        reciter_id: u32,
        chapter: u32,
    ) -> Result<Option<SingleTrack>, ContentError> {
        let url = format!(
            "{}/audio/reciters/{}/audio_files?chapter={}&segments=true",
            self.chapter_audio_base, reciter_id, chapter
        );
        let Some(resp) = self.get_json::<ChapterAudioResponse>(&url).await? else {
            return Ok(None);
        };
        Ok(resp
            .audio_files
            .into_iter()
            .next()
            .and_then(|file| single_track_from(file, chapter)))
    }

    async fn fetch_per_ayah_tracks(
        &self,
        reciter_id: u32,
        chapter: u32,
    ) -> Result<Option<PerAyahTracks>, ContentError> {
        let mut items = Vec::new();
        let mut word_segments_by_verse = HashMap::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/recitations/{}/by_chapter/{}?per_page={}&page={}",
                self.api_base, reciter_id, chapter, PAGE_SIZE, page
            );
            let Some(resp) = self.get_json::<AyahAudioResponse>(&url).await? else {
                break;
            };
            for file in resp.audio_files {
                let Some(verse_number) = verse_in_chapter(&file.verse_key, chapter) else {
                    continue;
                };
                let Some(url) = file.url.filter(|u| !u.is_empty()) else {
                    continue;
                };
                let words = parse_word_segments(verse_number, &file.segments);
                if !words.is_empty() {
                    word_segments_by_verse.insert(verse_number, words);
                }
                items.push(AyahTrack {
                    verse_number,
                    track_url: absolute_audio_url(&self.audio_base, &url),
                });
            }
            match resp.pagination.and_then(|p| p.next_page) {
                Some(next) if next > page && next <= MAX_PAGES => page = next,
                _ => break,
            }
        }
        if items.is_empty() {
            return Ok(None);
        }
        items.sort_by_key(|i| i.verse_number);
        items.dedup_by_key(|i| i.verse_number);
        Ok(Some(PerAyahTracks {
            items,
            word_segments_by_verse,
        }))
    }

    async fn fetch_chapter_text(&self, chapter: u32) -> Result<Vec<VerseText>, ContentError> {
        let mut verses = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/verses/by_chapter/{}?words=true&word_fields=text_uthmani&per_page={}&page={}",
                self.api_base, chapter, PAGE_SIZE, page
            );
            let Some(resp) = self.get_json::<VersesResponse>(&url).await? else {
                break;
            };
            verses.extend(resp.verses.into_iter().map(|v| {
                let mut words: Vec<ApiWord> = v
                    .words
                    .into_iter()
                    .filter(|w| w.char_type_name.as_deref().unwrap_or("word") == "word")
                    .collect();
                words.sort_by_key(|w| w.position);
                VerseText {
                    verse_number: v.verse_number,
                    words: words
                        .into_iter()
                        .filter_map(|w| w.text_uthmani)
                        .collect(),
                }
            }));
            match resp.pagination.and_then(|p| p.next_page) {
                Some(next) if next > page && next <= MAX_PAGES => page = next,
                _ => break,
            }
        }
        Ok(verses)
    }
}
