//! Local recitation cache.
//!
//! A JSON file of fully parsed [`LoadedContent`] keyed by reciter and
//! chapter. It spares the network on repeat listens and lets a chapter
//! played once be played again offline (given the audio is reachable).
//!
//! ```text
//! load_content ──▶ cache hit? ── yes ──▶ return
//!                      │ no
//!                      ▼
//!                 content source ──▶ insert + save
//! ```

use crate::content::types::LoadedContent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, LoadedContent>,
}

#[derive(Debug)]
pub struct ContentCache {
    entries: HashMap<String, LoadedContent>,
    path: PathBuf,
}

fn cache_key(reciter_id: u32, chapter: u32) -> String {
    format!("{}|{}", reciter_id, chapter)
}

impl ContentCache {
    /// Load the cache file, starting empty when it is missing or unreadable.
    pub async fn load(path: PathBuf) -> Self {
        let entries = match load_entries(&path).await {
            Ok(entries) => entries,
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Creating new content cache");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load content cache, starting empty"
                );
                HashMap::new()
            }
        };
        let cache = Self { entries, path };
        if !cache.is_empty() {
            tracing::info!(
                path = %cache.path.display(),
                entries = cache.len(),
                "Loaded content cache"
            );
        }
        cache
    }

    pub fn get(&self, reciter_id: u32, chapter: u32) -> Option<&LoadedContent> {
        self.entries.get(&cache_key(reciter_id, chapter))
    }

    pub fn insert(&mut self, content: LoadedContent) {
        self.entries
            .insert(cache_key(content.reciter_id, content.chapter), content);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache, creating parent directories as needed.
    pub async fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let file = CacheFile {
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&file)?;
        let mut out = fs::File::create(&self.path).await?;
        out.write_all(json.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

async fn load_entries(path: &Path) -> Result<HashMap<String, LoadedContent>, CacheError> {
    let contents = fs::read_to_string(path).await?;
    let file: CacheFile = serde_json::from_str(&contents)?;
    Ok(file.entries)
}
