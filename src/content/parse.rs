use crate::resume::parse_verse_key;
use crate::timeline::WordSegment;
use serde_json::Value;

pub(crate) fn ms_to_secs(ms: f64) -> f64 {
    ms / 1000.0
}

/// Verse number from a `chapter:verse` key, if it belongs to `chapter`.
pub fn verse_in_chapter(verse_key: &str, chapter: u32) -> Option<u32> {
    match parse_verse_key(verse_key) {
        Some((c, v)) if c == chapter => Some(v),
        _ => None,
    }
}

/// Parse word timings from the API's segment arrays.
///
/// Entries are arrays of numbers whose first element is the word position
/// and whose last two are start/end in milliseconds. Three- and
/// four-element shapes both occur. Some recitations number words from zero;
/// those are shifted so indices are always 1-based.
pub fn parse_word_segments(verse_number: u32, raw: &[Value]) -> Vec<WordSegment> {
    let mut words: Vec<WordSegment> = raw
        .iter()
        .filter_map(|entry| {
            let arr = entry.as_array()?;
            if arr.len() < 3 {
                return None;
            }
            let position = arr.first()?.as_f64()?;
            let start = arr.get(arr.len() - 2)?.as_f64()?;
            let end = arr.last()?.as_f64()?;
            if position < 0.0 || end < start {
                return None;
            }
            Some(WordSegment {
                verse_number,
                word_index: position as u32,
                start: ms_to_secs(start),
                end: ms_to_secs(end),
            })
        })
        .collect();
    if words.iter().any(|w| w.word_index == 0) {
        for w in &mut words {
            w.word_index += 1;
        }
    }
    words
}

/// Absolute URL for an audio path the API may return relative.
pub fn absolute_audio_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_three_and_four_element_segments() {
        let raw = vec![json!([1, 0, 630]), json!([2, 2, 650, 1590]), json!("junk"), json!([3, 10])];
        let words = parse_word_segments(1, &raw);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word_index, 1);
        assert_eq!(words[0].end, 0.63);
        assert_eq!(words[1].word_index, 2);
        assert_eq!(words[1].start, 0.65);
    }

    #[test]
    fn zero_based_positions_are_shifted() {
        let raw = vec![json!([0, 1000, 1500]), json!([1, 1500, 1900])];
        let words = parse_word_segments(4, &raw);
        assert_eq!(words[0].word_index, 1);
        assert_eq!(words[1].word_index, 2);
        assert_eq!(words[0].start, 1.0);
    }

    #[test]
    fn verse_keys_must_match_chapter() {
        assert_eq!(verse_in_chapter("2:5", 2), Some(5));
        assert_eq!(verse_in_chapter("3:5", 2), None);
    }

    #[test]
    fn relative_urls_get_the_audio_base() {
        assert_eq!(
            absolute_audio_url("https://verses.quran.com/", "Alafasy/mp3/001001.mp3"),
            "https://verses.quran.com/Alafasy/mp3/001001.mp3"
        );
        assert_eq!(
            absolute_audio_url("https://x", "//mirrors.test/a.mp3"),
            "https://mirrors.test/a.mp3"
        );
        assert_eq!(absolute_audio_url("https://x", "https://y/a.mp3"), "https://y/a.mp3");
    }
}
