// src/snippet.rs
//! Contextual snippet extraction with optional `<mark>` highlighting.
//!
//! With a query, every whole-word occurrence is scored by the coding/AI vocabulary found in
//! a small window around it; windows that are really URL query strings
//! (`width=1920&amp;format=png`) are thrown out. The best window is returned, shrunk to fit
//! `max_length`. Without a query, or when nothing scores, the first meaningful sentence is used.
//!
//! All lengths are in characters.

use crate::keywords::{phrase_body, word_pattern, CONTEXT_TERMS};
use once_cell::sync::Lazy;
use regex::Regex;

pub const HIGHLIGHT_OPEN: &str = "<mark>";
pub const HIGHLIGHT_CLOSE: &str = "</mark>";
pub const ELLIPSIS: &str = "...";

const SCORING_RADIUS: usize = 50;
const DISPLAY_RADIUS: usize = 100;
const URL_CONTEXT_RADIUS: usize = 30;
const SHRINK_STEP: usize = 5;
const MIN_SENTENCE_CHARS: usize = 20;

/// Fragments left behind when image-CDN query strings are cleaned for scoring.
const URL_ARTIFACTS: &[&str] = &[
    "format png",
    "format jpg",
    "format webp",
    "auto webp",
    "auto format",
    "width height",
    "fit crop",
    "utm source",
    "utm medium",
    "utm campaign",
];

const URL_MARKERS: &[&str] = &[
    "://", "www.", "&amp;", "=", ".png", ".jpg", ".jpeg", ".webp", ".gif", "%2f", "%3a",
];

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:https?://|www\.)\S+").expect("url regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));
static CONTEXT_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    CONTEXT_TERMS
        .iter()
        .filter_map(|t| Regex::new(&format!(r"\b(?:{})s?\b", phrase_body(t))).ok())
        .collect()
});

fn collapse_ws(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Text used for scoring only: entities decoded, URLs and tags removed,
/// punctuation turned into spaces, lowercased.
pub fn clean_for_scoring(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let no_urls = RE_URL.replace_all(&decoded, " ");
    let no_tags = RE_TAGS.replace_all(&no_urls, " ");
    let no_punct = RE_PUNCT.replace_all(&no_tags, " ");
    collapse_ws(&no_punct).to_lowercase()
}

/// Number of distinct coding/AI context terms in already-cleaned text.
pub fn context_score(cleaned: &str) -> usize {
    CONTEXT_RES.iter().filter(|re| re.is_match(cleaned)).count()
}

fn has_url_artifact(cleaned: &str) -> bool {
    URL_ARTIFACTS.iter().any(|a| cleaned.contains(a))
}

fn looks_url_like(local: &str) -> bool {
    let l = local.to_lowercase();
    URL_MARKERS.iter().any(|m| l.contains(m))
}

/// Byte range covering `radius` chars either side of `start..end`.
fn expand(text: &str, start: usize, end: usize, radius: usize) -> (usize, usize) {
    let lo = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let hi = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    (lo, hi)
}

/// Cut to `max_length` chars, ending in `...` when anything was dropped.
pub fn truncate_with_ellipsis(s: &str, max_length: usize) -> String {
    if s.chars().count() <= max_length {
        return s.to_string();
    }
    let marker = ELLIPSIS.chars().count();
    if max_length <= marker {
        return s.chars().take(max_length).collect();
    }
    let head: String = s.chars().take(max_length - marker).collect();
    format!("{}{ELLIPSIS}", head.trim_end())
}

fn highlight_all(window: &str, term: &Regex) -> String {
    let mut out = String::with_capacity(window.len() + 32);
    let mut last = 0;
    for m in term.find_iter(window) {
        let (lo, hi) = expand(window, m.start(), m.end(), URL_CONTEXT_RADIUS);
        if looks_url_like(&window[lo..hi]) {
            continue;
        }
        out.push_str(&window[last..m.start()]);
        out.push_str(HIGHLIGHT_OPEN);
        out.push_str(m.as_str());
        out.push_str(HIGHLIGHT_CLOSE);
        last = m.end();
    }
    out.push_str(&window[last..]);
    out
}

fn render_window(
    display: &str,
    start: usize,
    end: usize,
    term: &Regex,
    max_length: usize,
    highlight: bool,
) -> String {
    let mut radius = DISPLAY_RADIUS;
    loop {
        let (lo, hi) = expand(display, start, end, radius);
        let window = display[lo..hi].trim();
        let rendered = if highlight {
            highlight_all(window, term)
        } else {
            window.to_string()
        };
        if rendered.chars().count() <= max_length {
            return rendered;
        }
        if radius == 0 {
            // Markup never fits here; cutting it would leave an unclosed tag.
            return truncate_with_ellipsis(window, max_length);
        }
        radius = radius.saturating_sub(SHRINK_STEP);
    }
}

fn first_sentence(display: &str, max_length: usize) -> String {
    match display
        .split('.')
        .map(str::trim)
        .find(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
    {
        Some(sentence) => truncate_with_ellipsis(sentence, max_length),
        None => truncate_with_ellipsis(display, max_length),
    }
}

/// Extract a snippet of at most `max_length` chars from `content`.
pub fn extract_snippet(
    content: &str,
    query: Option<&str>,
    max_length: usize,
    highlight: bool,
) -> String {
    let display = collapse_ws(content);
    if display.is_empty() {
        return String::new();
    }

    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let term = query.and_then(|q| Regex::new(&format!("(?i){}", word_pattern(q))).ok());
    let Some(term) = term else {
        return first_sentence(&display, max_length);
    };

    let mut best: Option<(usize, usize, usize)> = None;
    for m in term.find_iter(&display) {
        let (lo, hi) = expand(&display, m.start(), m.end(), SCORING_RADIUS);
        let cleaned = clean_for_scoring(&display[lo..hi]);
        if has_url_artifact(&cleaned) {
            continue;
        }
        let score = context_score(&cleaned);
        if score > 0 && best.map_or(true, |(s, _, _)| score > s) {
            best = Some((score, m.start(), m.end()));
        }
    }

    match best {
        Some((_, start, end)) => render_window(&display, start, end, &term, max_length, highlight),
        None => first_sentence(&display, max_length),
    }
}
