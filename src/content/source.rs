use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::content::cache::ContentCache;
use crate::content::types::{
    ContentError, LoadedContent, PerAyahTracks, PlaybackMode, SingleTrack, VerseText,
};

/// Where recitation audio, timings and verse text come from.
///
/// Timings are expected sorted ascending and in seconds, but the engine
/// re-sorts them anyway.
pub trait ContentSource: Send + Sync {
    fn fetch_single_track(
        &self,
        reciter_id: u32,
        chapter: u32,
    ) -> impl Future<Output = Result<Option<SingleTrack>, ContentError>> + Send;

    fn fetch_per_ayah_tracks(
        &self,
        reciter_id: u32,
        chapter: u32,
    ) -> impl Future<Output = Result<Option<PerAyahTracks>, ContentError>> + Send;

    fn fetch_chapter_text(
        &self,
        chapter: u32,
    ) -> impl Future<Output = Result<Vec<VerseText>, ContentError>> + Send;
}

/// Pick the playback mode: the whole-chapter file when it exists with verse
/// timings, otherwise one file per verse.
async fn fetch_mode<C: ContentSource>(
    source: &C,
    reciter_id: u32,
    chapter: u32,
) -> Result<PlaybackMode, ContentError> {
    match source.fetch_single_track(reciter_id, chapter).await {
        Ok(Some(track)) if !track.segments.is_empty() => return Ok(PlaybackMode::Single(track)),
        Ok(_) => {
            tracing::debug!(reciter_id, chapter, "No chapter audio, trying per-verse audio");
        }
        Err(e) => {
            tracing::warn!(
                reciter_id,
                chapter,
                error = %e,
                "Chapter audio failed, trying per-verse audio"
            );
        }
    }
    match source.fetch_per_ayah_tracks(reciter_id, chapter).await? {
        Some(tracks) if !tracks.items.is_empty() => Ok(PlaybackMode::PerAyah(tracks)),
        _ => Err(ContentError::Unavailable {
            reciter: reciter_id,
            chapter,
        }),
    }
}

/// Load a chapter for a reciter: cache first, then the source.
///
/// Audio and text are fetched concurrently. A text failure is not fatal;
/// the content just has no verse words.
pub async fn load_content<C: ContentSource>(
    source: &C,
    cache: Option<&Arc<Mutex<ContentCache>>>,
    reciter_id: u32,
    chapter: u32,
) -> Result<LoadedContent, ContentError> {
    if let Some(cache) = cache
        && let Some(hit) = cache.lock().await.get(reciter_id, chapter)
    {
        tracing::debug!(reciter_id, chapter, "Content cache hit");
        return Ok(hit.clone());
    }

    let (mode, text) = futures_util::future::join(
        fetch_mode(source, reciter_id, chapter),
        source.fetch_chapter_text(chapter),
    )
    .await;
    let mode = mode?;
    let text = text.unwrap_or_else(|e| {
        tracing::warn!(chapter, error = %e, "Verse text unavailable");
        Vec::new()
    });

    let content = LoadedContent {
        chapter,
        reciter_id,
        mode,
        text,
    };
    tracing::info!(
        reciter_id,
        chapter,
        mode = content.mode.label(),
        "Loaded recitation"
    );

    if let Some(cache) = cache {
        let mut guard = cache.lock().await;
        guard.insert(content.clone());
        if let Err(e) = guard.save().await {
            tracing::warn!(error = %e, "Failed to save content cache");
        }
    }
    Ok(content)
}
