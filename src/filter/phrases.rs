// src/filter/phrases.rs
// =============================================================================
// Longest-match phrase substitution over HTML-ish text.
//
// How it works:
// 1. Split the text ONCE into segments with a tiny scanner:
//    - Text: plain text between tags (the only thing we ever search)
//    - Markup: a tag, an ignored region (<a>..</a>, <nolink>..), an H5P
//      embed, or a replacement we inserted on an earlier run
//    - Claimed: a replacement inserted during this run
// 2. For each phrase, in the order given (longest first), search the Text
//    segments and split them around every match. A match turns into a
//    Claimed segment, which later (shorter) phrases never look inside.
// 3. Glue the segments back together.
//
// Because tags are never Text, a phrase can't match inside an attribute
// value, and it can't span across a tag either.
// =============================================================================

use serde::Serialize;
use std::borrow::{Borrow, Cow};

use super::text::tag_end;

/// A phrase to look for and the markup to wrap it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterPhrase {
    /// Text to match
    pub phrase: String,
    /// Markup inserted before the match
    pub open: String,
    /// Markup inserted after the match
    pub close: String,
    pub case_sensitive: bool,
    /// Only match when not glued to a letter or digit on either side
    pub full_match: bool,
    /// If set, this goes between `open` and `close` instead of the matched text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl FilterPhrase {
    // Case-sensitive, matches anywhere, keeps the matched text
    pub fn new(phrase: impl Into<String>, open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            open: open.into(),
            close: close.into(),
            case_sensitive: true,
            full_match: false,
            replacement: None,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn full_words(mut self) -> Self {
        self.full_match = true;
        self
    }

    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    // Builds what a match turns into
    fn render(&self, matched: &str) -> String {
        let inner = self.replacement.as_deref().unwrap_or(matched);
        let mut out = String::with_capacity(self.open.len() + inner.len() + self.close.len());
        out.push_str(&self.open);
        out.push_str(inner);
        out.push_str(&self.close);
        out
    }
}

// One piece of the scanned text
#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Markup(&'a str),
    Claimed(String),
}

// Tags whose whole content is off limits, with the tags that can end them
//
// Anchors only count when they carry attributes (`<a href=..>`), and spans
// only when they are marked class="nolink". An H5P embed is recognised by its
// class, whoever inserted it; a div embed's escaped twin closes with
// `</iframe>`, so either close ends a div embed.
fn protected_region_closes(tag: &str) -> &'static [&'static str] {
    let body = &tag[1..];
    let name_len = body
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let name = body[..name_len].to_ascii_lowercase();
    let after_name = body[name_len..].chars().next();
    let is_embed = tag.contains(r#"class="h5p-content""#);

    match name.as_str() {
        "a" if after_name.is_some_and(char::is_whitespace) => &["</a>"],
        "textarea" => &["</textarea>"],
        "select" => &["</select>"],
        "head" => &["</head>"],
        "nolink" => &["</nolink>"],
        "span" if tag.contains(r#"class="nolink""#) => &["</span>"],
        "div" if is_embed => &["</div>", "</iframe>"],
        "iframe" if is_embed => &["</iframe>"],
        _ => &[],
    }
}

// Finds `needle` (ASCII) in `haystack[from..]` ignoring ASCII case
fn find_ascii_ci(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack.as_bytes()[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|i| from + i)
}

// End of a protected region whose opening tag ends at `from`: just past the
// earliest of its close tags, or the end of the text when none shows up
fn protected_region_end(text: &str, from: usize, closes: &[&str]) -> usize {
    closes
        .iter()
        .filter_map(|close| find_ascii_ci(text, from, close).map(|i| i + close.len()))
        .min()
        .unwrap_or(text.len())
}

// The scanner: splits text into Text and Markup segments
//
// State is just "where does the current run of plain text start"; every '<'
// that has a matching '>' flips us into a tag until that '>'.
fn segment<'a, P: Borrow<FilterPhrase>>(text: &'a str, phrases: &[P]) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('<') {
        let start = cursor + offset;
        let Some(end) = tag_end(text, start) else {
            // A lone '<' is just a character
            cursor = start + 1;
            continue;
        };

        if start > text_start {
            segments.push(Segment::Text(&text[text_start..start]));
        }

        let closes = protected_region_closes(&text[start..end]);
        let region_end = if !closes.is_empty() {
            protected_region_end(text, end, closes)
        } else if let Some(close) = inserted_markup_close(text, start, phrases) {
            close
        } else {
            end
        };

        segments.push(Segment::Markup(&text[start..region_end]));
        text_start = region_end;
        cursor = region_end;
    }

    if text_start < text.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }

    segments
}

// If a replacement from a previous run starts at `start`, returns where it ends
//
// This is what keeps filtering idempotent: the text between our own open and
// close markup is never offered to the phrases again.
fn inserted_markup_close<P: Borrow<FilterPhrase>>(
    text: &str,
    start: usize,
    phrases: &[P],
) -> Option<usize> {
    phrases.iter().map(Borrow::<FilterPhrase>::borrow).find_map(|p| {
        if p.open.is_empty() || p.close.is_empty() || !text[start..].starts_with(&p.open) {
            return None;
        }
        let inner = start + p.open.len();
        text[inner..].find(&p.close).map(|i| inner + i + p.close.len())
    })
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

// Tries to match `needle` at byte `at` of `haystack`, returns the end of the match
fn match_at(haystack: &str, at: usize, needle: &str, case_sensitive: bool) -> Option<usize> {
    let rest = &haystack[at..];

    if case_sensitive {
        return rest.starts_with(needle).then_some(at + needle.len());
    }

    let mut hay_chars = rest.char_indices();
    for n in needle.chars() {
        let (_, h) = hay_chars.next()?;
        if !chars_eq_ignore_case(h, n) {
            return None;
        }
    }

    Some(at + hay_chars.next().map_or(rest.len(), |(i, _)| i))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

// Every non-overlapping match of the phrase in one text segment, left to right
fn find_matches(haystack: &str, phrase: &FilterPhrase) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();
    let mut from = 0;

    while from < haystack.len() {
        let found = haystack[from..].char_indices().find_map(|(i, _)| {
            let start = from + i;
            let end = match_at(haystack, start, &phrase.phrase, phrase.case_sensitive)?;

            if phrase.full_match {
                let before = haystack[..start].chars().next_back();
                let after = haystack[end..].chars().next();
                if before.is_some_and(is_word_char) || after.is_some_and(is_word_char) {
                    return None;
                }
            }

            Some((start, end))
        });

        match found {
            Some((start, end)) => {
                matches.push((start, end));
                from = end;
            }
            None => break,
        }
    }

    matches
}

// Runs one phrase over all Text segments
fn apply_phrase<'a>(segments: Vec<Segment<'a>>, phrase: &FilterPhrase) -> Vec<Segment<'a>> {
    let mut out = Vec::with_capacity(segments.len());

    for seg in segments {
        let Segment::Text(haystack) = seg else {
            out.push(seg);
            continue;
        };

        let mut last = 0;
        for (start, end) in find_matches(haystack, phrase) {
            if start > last {
                out.push(Segment::Text(&haystack[last..start]));
            }
            out.push(Segment::Claimed(phrase.render(&haystack[start..end])));
            last = end;
        }
        if last < haystack.len() {
            out.push(Segment::Text(&haystack[last..]));
        }
    }

    out
}

/// Wraps every occurrence of each phrase in its markup.
///
/// `phrases` must already be ordered longest first; the first phrase to
/// claim a span of text keeps it. Returns the input borrowed when nothing
/// matched.
pub fn filter_phrases<'a, P: Borrow<FilterPhrase>>(text: &'a str, phrases: &[P]) -> Cow<'a, str> {
    if text.is_empty() || phrases.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut segments = segment(text, phrases);
    for phrase in phrases.iter().map(Borrow::<FilterPhrase>::borrow) {
        if phrase.phrase.is_empty() {
            continue;
        }
        segments = apply_phrase(segments, phrase);
    }

    if !segments.iter().any(|s| matches!(s, Segment::Claimed(_))) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() * 2);
    for seg in &segments {
        match seg {
            Segment::Text(s) | Segment::Markup(s) => out.push_str(s),
            Segment::Claimed(s) => out.push_str(s),
        }
    }
    Cow::Owned(out)
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why not a regex?
//    - "Not inside a tag" and "not inside something we already replaced" are
//      both easy to say as segment kinds and awkward to say as lookarounds
//    - The regex crate has no lookaround anyway
//
// 2. Why Cow?
//    - Most text has no activity names in it; borrowing the input back
//      avoids a copy and tells the caller nothing changed
//
// 3. Why is case-insensitive matching char by char?
//    - Lowercasing can change byte lengths (e.g. 'İ'), so we can't lowercase
//      the whole text and reuse byte offsets
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(phrase: &str, open: &str, close: &str) -> FilterPhrase {
        FilterPhrase::new(phrase, open, close)
    }

    #[test]
    fn test_longest_phrase_wins() {
        let phrases = vec![tag("Intro Quiz", "<a>", "</a>"), tag("Quiz", "<b>", "</b>")];
        let out = filter_phrases("Take the Intro Quiz now", &phrases);
        assert_eq!(out, "Take the <a>Intro Quiz</a> now");
    }

    #[test]
    fn test_shorter_phrase_still_matches_elsewhere() {
        let phrases = vec![tag("Intro Quiz", "<a>", "</a>"), tag("Quiz", "<b>", "</b>")];
        let out = filter_phrases("Intro Quiz, then the Quiz", &phrases);
        assert_eq!(out, "<a>Intro Quiz</a>, then the <b>Quiz</b>");
    }

    #[test]
    fn test_empty_list_is_noop() {
        let phrases: Vec<FilterPhrase> = Vec::new();
        let out = filter_phrases("Hello & welcome", &phrases);
        assert!(matches!(out, Cow::Borrowed("Hello & welcome")));
    }

    #[test]
    fn test_empty_text_is_noop() {
        let phrases = vec![tag("Quiz", "<b>", "</b>")];
        assert_eq!(filter_phrases("", &phrases), "");
    }

    #[test]
    fn test_no_match_borrows_input() {
        let phrases = vec![tag("Quiz", "<b>", "</b>")];
        assert!(matches!(filter_phrases("nothing here", &phrases), Cow::Borrowed(_)));
    }

    #[test]
    fn test_every_occurrence_is_replaced() {
        let phrases = vec![tag("Quiz", "[", "]")];
        assert_eq!(filter_phrases("Quiz Quiz Quiz", &phrases), "[Quiz] [Quiz] [Quiz]");
    }

    #[test]
    fn test_skips_attribute_values() {
        let phrases = vec![tag("Quiz", "[", "]")];
        let out = filter_phrases(r#"<img alt="Quiz" title="Quiz"> Quiz"#, &phrases);
        assert_eq!(out, r#"<img alt="Quiz" title="Quiz"> [Quiz]"#);
    }

    #[test]
    fn test_skips_inside_links_and_nolink() {
        let phrases = vec![tag("Quiz", "[", "]")];
        let text = r#"<a href="/x">Quiz</a> <nolink>Quiz</nolink> <span class="nolink">Quiz</span> Quiz"#;
        let expected = r#"<a href="/x">Quiz</a> <nolink>Quiz</nolink> <span class="nolink">Quiz</span> [Quiz]"#;
        assert_eq!(filter_phrases(text, &phrases), expected);
    }

    #[test]
    fn test_ignored_region_close_is_case_insensitive() {
        let phrases = vec![tag("Quiz", "[", "]")];
        let out = filter_phrases("<TEXTAREA>Quiz</TextArea>Quiz", &phrases);
        assert_eq!(out, "<TEXTAREA>Quiz</TextArea>[Quiz]");
    }

    #[test]
    fn test_unclosed_ignored_region_runs_to_end() {
        let phrases = vec![tag("Quiz", "[", "]")];
        assert_eq!(filter_phrases("Quiz <select>Quiz", &phrases), "[Quiz] <select>Quiz");
    }

    #[test]
    fn test_existing_embeds_are_left_alone() {
        // Markup from another phrase list still counts as an embed
        let phrases = vec![tag("Jerry", "[", "]")];
        let text = concat!(
            r#"<iframe class="h5p-content" src="/embed.php?id=1">Tom &amp; Jerry</iframe> "#,
            r#"<div class="h5p-content" data-content-id="4">Jerry</div> Jerry"#
        );
        let expected = concat!(
            r#"<iframe class="h5p-content" src="/embed.php?id=1">Tom &amp; Jerry</iframe> "#,
            r#"<div class="h5p-content" data-content-id="4">Jerry</div> [Jerry]"#
        );
        assert_eq!(filter_phrases(text, &phrases), expected);
    }

    #[test]
    fn test_div_embed_closed_by_iframe_tag() {
        let phrases = vec![tag("Jerry", "[", "]")];
        let text = r#"<div class="h5p-content" data-content-id="4">Tom &amp; Jerry</iframe> Jerry</div>"#;
        let expected = r#"<div class="h5p-content" data-content-id="4">Tom &amp; Jerry</iframe> [Jerry]</div>"#;
        assert_eq!(filter_phrases(text, &phrases), expected);
    }

    #[test]
    fn test_plain_div_is_not_protected() {
        let phrases = vec![tag("Jerry", "[", "]")];
        assert_eq!(filter_phrases("<div>Jerry</div>", &phrases), "<div>[Jerry]</div>");
    }

    #[test]
    fn test_many_links_each_end_at_own_close() {
        let phrases = vec![tag("Quiz", "[", "]")];
        let text = r#"<a href="/1">Quiz</A> Quiz <a href="/2">Quiz</a> Quiz"#.repeat(500);
        let out = filter_phrases(&text, &phrases);
        assert_eq!(out.matches("[Quiz]").count(), 1000);
        assert_eq!(out.matches(">Quiz</").count(), 1000);
    }

    #[test]
    fn test_find_ascii_ci() {
        assert_eq!(find_ascii_ci("ab</A>cd</a>", 0, "</a>"), Some(2));
        assert_eq!(find_ascii_ci("ab</A>cd</a>", 3, "</a>"), Some(8));
        assert_eq!(find_ascii_ci("é</SELECT>", 0, "</select>"), Some(2));
        assert_eq!(find_ascii_ci("ab", 0, "</a>"), None);
    }

    #[test]
    fn test_does_not_span_tags() {
        let phrases = vec![tag("Intro Quiz", "[", "]")];
        let text = "Intro <b>Quiz</b>";
        assert_eq!(filter_phrases(text, &phrases), text);
    }

    #[test]
    fn test_lone_lt_is_text() {
        let phrases = vec![tag("Quiz", "[", "]")];
        assert_eq!(filter_phrases("1 < 2 Quiz", &phrases), "1 < 2 [Quiz]");
    }

    #[test]
    fn test_rerun_does_not_rewrap() {
        let phrases = vec![tag("Intro Quiz", "<a>", "</a>"), tag("Quiz", "<b>", "</b>")];
        let once = filter_phrases("Take the Intro Quiz now", &phrases).into_owned();
        let twice = filter_phrases(&once, &phrases);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_case_insensitive() {
        let phrases = vec![tag("quiz", "[", "]").case_insensitive()];
        assert_eq!(filter_phrases("QUIZ and Quiz", &phrases), "[QUIZ] and [Quiz]");
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let phrases = vec![tag("quiz", "[", "]")];
        assert_eq!(filter_phrases("QUIZ", &phrases), "QUIZ");
    }

    #[test]
    fn test_case_insensitive_non_ascii() {
        let phrases = vec![tag("ÉTUDE", "[", "]").case_insensitive()];
        assert_eq!(filter_phrases("une étude!", &phrases), "une [étude]!");
    }

    #[test]
    fn test_full_words_only() {
        let phrases = vec![tag("Quiz", "[", "]").full_words()];
        assert_eq!(
            filter_phrases("Quizzes, Quiz. PopQuiz (Quiz)", &phrases),
            "Quizzes, [Quiz]. PopQuiz ([Quiz])"
        );
    }

    #[test]
    fn test_full_words_at_tag_edges() {
        let phrases = vec![tag("Quiz", "[", "]").full_words()];
        assert_eq!(filter_phrases("<p>Quiz</p>", &phrases), "<p>[Quiz]</p>");
    }

    #[test]
    fn test_full_words_retries_later_overlap() {
        let phrases = vec![tag("ab", "[", "]").full_words()];
        assert_eq!(filter_phrases("xab ab", &phrases), "xab [ab]");
    }

    #[test]
    fn test_replacement_text() {
        let phrases = vec![tag("Quiz", "<i>", "</i>").with_replacement(" ")];
        assert_eq!(filter_phrases("a Quiz b", &phrases), "a <i> </i> b");
    }

    #[test]
    fn test_empty_phrase_is_ignored() {
        let phrases = vec![tag("", "[", "]")];
        assert_eq!(filter_phrases("abc", &phrases), "abc");
    }

    #[test]
    fn test_accepts_borrowed_phrases() {
        let owned = [tag("Quiz", "[", "]")];
        let borrowed: Vec<&FilterPhrase> = owned.iter().collect();
        assert_eq!(filter_phrases("Quiz", &borrowed), "[Quiz]");
    }

    #[test]
    fn test_segment_kinds() {
        let phrases: Vec<FilterPhrase> = Vec::new();
        let segs = segment("a<b>c<!-- > -->d", &phrases);
        assert_eq!(
            segs,
            vec![
                Segment::Text("a"),
                Segment::Markup("<b>"),
                Segment::Text("c"),
                Segment::Markup("<!-- > -->"),
                Segment::Text("d"),
            ]
        );
    }
}
