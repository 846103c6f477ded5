// timeline/mod.rs - segment lookups and global/native time conversion
pub mod adapter;
pub mod segments;

pub use adapter::{
    AyahDurations, DEFAULT_VERSE_SECONDS, NativePosition, PendingSeek, SingleTimeline,
};
pub use segments::{Segment, SegmentIndex, VerseWords, WordSegment};
