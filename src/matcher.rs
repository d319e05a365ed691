//! Approximate matching of prize-track names against free-text descriptions.
//!
//! A description is cut into sentence-level segments; every track is scored
//! against every segment with the larger of a substring-oriented ratio and a
//! token-order-insensitive ratio. The best segment per track is kept as
//! evidence, and tracks at or above the threshold are reported.

use crate::model::{Track, TrackMatch};

pub const DEFAULT_THRESHOLD: u8 = 80;

/// Words every prize title carries that say nothing about its subject.
const PRIZE_FILLER: &[&str] = &[
    "a", "an", "and", "award", "best", "category", "for", "grand", "hack", "hacks", "in",
    "most", "of", "overall", "place", "prize", "tech", "the", "track", "use", "winner",
];

/// Stripped keys shorter than this fall back to the full name.
const MIN_KEY_LEN: usize = 4;

/// Tracks scored against descriptions; the track list is shared read-only.
pub struct Matcher {
    keys: Vec<(String, String)>,
    threshold: u8,
}

impl Matcher {
    pub fn new(tracks: &[Track], threshold: u8) -> Self {
        let keys = tracks
            .iter()
            .map(|t| (t.name.clone(), match_key(&t.name)))
            .collect();
        Matcher { keys, threshold }
    }

    /// Tracks whose best segment scores at least the threshold, in track order.
    pub fn match_text(&self, text: &str) -> Vec<TrackMatch> {
        let segs: Vec<(&str, String)> = segments(text)
            .into_iter()
            .map(|s| (s, s.to_lowercase()))
            .collect();

        let mut out = Vec::new();
        for (track_name, key) in &self.keys {
            let mut best: Option<(u8, &str)> = None;
            for (seg, lowered) in &segs {
                let sc = score_lowered(key, lowered);
                // Strictly greater: the first segment with the top score wins.
                if best.map_or(true, |(b, _)| sc > b) {
                    best = Some((sc, *seg));
                }
            }

            let confidence = best.map_or(0, |(sc, _)| sc);
            if confidence >= self.threshold {
                out.push(TrackMatch {
                    track_name: track_name.clone(),
                    confidence,
                    matched_text: best.map(|(_, seg)| seg.to_string()),
                });
            }
        }
        out
    }
}

pub fn match_tracks(text: &str, tracks: &[Track], threshold: u8) -> Vec<TrackMatch> {
    Matcher::new(tracks, threshold).match_text(text)
}

/// Lower-cased track name with generic prize vocabulary dropped, so
/// "Best Mental Health Hack" is looked for as "mental health". A key that
/// would end up shorter than `MIN_KEY_LEN` keeps the whole name.
pub fn match_key(track_name: &str) -> String {
    let full = track_name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let words: Vec<&str> = full
        .split(' ')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty() && !PRIZE_FILLER.contains(w))
        .collect();
    let key = words.join(" ");
    if key.chars().count() < MIN_KEY_LEN {
        full
    } else {
        key
    }
}

/// Sentence/paragraph segments, trimmed, in text order. A segment ends at
/// `.`, `!` or `?` followed by whitespace (or the end), or at a newline.
pub fn segments(text: &str) -> Vec<&str> {
    fn push<'a>(out: &mut Vec<&'a str>, s: &'a str) {
        let s = s.trim();
        if !s.is_empty() {
            out.push(s);
        }
    }

    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                None => Some(i + c.len_utf8()),
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = end {
            push(&mut out, &text[start..end]);
            start = end;
        }
    }
    push(&mut out, &text[start..]);
    out
}

/// max(partial ratio, token-sort ratio) of two strings, lower-cased.
pub fn score(key: &str, segment: &str) -> u8 {
    score_lowered(&key.to_lowercase(), &segment.to_lowercase())
}

fn score_lowered(key: &str, seg: &str) -> u8 {
    let partial = partial_ratio(key, seg);
    if partial == 100 {
        return partial;
    }
    partial.max(token_sort_ratio(key, seg))
}

/// Normalized Levenshtein similarity on a 0-100 scale.
pub fn ratio(a: &str, b: &str) -> u8 {
    to_score(strsim::normalized_levenshtein(a, b))
}

/// Best `ratio` of the shorter string against any alignment inside the
/// longer one, including windows cut off at either edge.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }

    // byte offset of every char boundary in `long`, end included
    let bounds: Vec<usize> = long
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(long.len()))
        .collect();
    let n = short.chars().count();
    let len = bounds.len() - 1;

    let windows = (1..n)
        .map(|j| (0, j))
        .chain((0..=len - n).map(|i| (i, i + n)))
        .chain((len - n + 1..len).map(|i| (i, len)));

    let mut best = 0.0f64;
    for (from, to) in windows {
        let sim = strsim::normalized_levenshtein(short, &long[bounds[from]..bounds[to]]);
        if sim > best {
            best = sim;
            if best >= 1.0 {
                break;
            }
        }
    }
    to_score(best)
}

/// `ratio` after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    fn sorted(s: &str) -> String {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    }
    ratio(&sorted(a), &sorted(b))
}

fn to_score(sim: f64) -> u8 {
    (sim * 100.0).round().clamp(0.0, 100.0) as u8
}
