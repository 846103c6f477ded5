// content/mod.rs - recitation audio, timings and verse text
pub mod cache;
pub mod parse;
pub mod quran_api;
pub mod source;
pub mod types;

pub use cache::ContentCache;
pub use quran_api::QuranApi;
pub use source::{ContentSource, load_content};
pub use types::{
    AyahTrack, ContentError, LoadedContent, PerAyahTracks, PlaybackMode, SingleTrack, VerseText,
};
