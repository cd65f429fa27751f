use once_cell::sync::Lazy;
use regex::Regex;

/// En/em space family (U+2002..U+200A).
static UNICODE_SPACES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{2002}-\u{200A}]+").expect("unicode spaces"));

static SEGMENT_DELIM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("segment delim"));

static DATE_THEN_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}/\d{2}/\d{2,4})\s*(.*)").expect("date then text"));

/// Line breaks become spaces and the unicode space family collapses to one space.
/// Runs of ordinary spaces are kept: they delimit segments.
pub fn normalize(raw: &str) -> String {
    let flat = raw.replace('\n', " ");
    UNICODE_SPACES_RE.replace_all(&flat, " ").into_owned()
}

/// Splits normalized text on runs of two or more whitespace characters.
pub fn segments(text: &str) -> impl Iterator<Item = &str> {
    SEGMENT_DELIM_RE.split(text)
}

/// Splits on the first colon; both halves trimmed.
pub fn split_key_value(segment: &str) -> Option<(&str, &str)> {
    segment
        .split_once(':')
        .map(|(k, v)| (k.trim(), v.trim()))
}

/// Text after the first colon, trimmed, if the line has one.
pub fn colon_suffix(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, v)| v.trim())
}

/// `"01/02/2023 Dr. Smith"` -> `("01/02/2023", "Dr. Smith")`.
pub fn split_date_then_text(value: &str) -> Option<(&str, &str)> {
    let caps = DATE_THEN_TEXT_RE.captures(value)?;
    let date = caps.get(1)?.as_str().trim();
    let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some((date, rest))
}

/// The first `n` characters of `s`.
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
