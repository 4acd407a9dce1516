// src/filter/text.rs
// =============================================================================
// Small HTML text helpers shared by the phrase filter and the index builder.
//
// - strip_tags: drops markup from an activity name so we can tell whether
//   anything visible is left
// - escape: entity-encodes a name the same way the LMS escapes text it
//   prints, so we can also match names inside already-escaped content
//
// Neither of these is an HTML parser. They work on the same "a tag is a
// `<` up to the next `>`" rule the phrase scanner uses.
// =============================================================================

// Finds where a tag that opens at `start` ends
//
// Parameters:
//   text: the whole text
//   start: byte index of a '<' in text
//
// Returns: Some(end) where text[start..end] is the whole tag (including '>'),
//          or None if the '<' is never closed (then it's just a character)
//
// Comments are special: `<!-- a > b -->` is one tag, not `<!-- a >`.
pub(crate) fn tag_end(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start..];
    debug_assert!(rest.starts_with('<'));

    if rest.starts_with("<!--") {
        return rest[4..].find("-->").map(|i| start + 4 + i + 3);
    }

    rest.find('>').map(|i| start + i + 1)
}

/// Removes every `<...>` tag and HTML comment, keeping the text between them.
///
/// A `<` that is never closed is kept as-is.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        out.push_str(&text[pos..start]);

        match tag_end(text, start) {
            Some(end) => pos = end,
            None => {
                // Unclosed: keep the rest verbatim
                out.push_str(&text[start..]);
                return out;
            }
        }
    }

    out.push_str(&text[pos..]);
    out
}

/// Escapes `& < > " '` for safe output in HTML text and attribute values.
///
/// Numeric character references already present in the input (`&#38;`,
/// `&#x26;`) are left alone instead of becoming `&amp;#38;`.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);

    for (i, c) in raw.char_indices() {
        match c {
            '&' if numeric_entity_len(&raw[i..]).is_some() => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }

    out
}

// Length of a numeric character reference at the start of `s`, if any
//
// Accepts `&#<digits>;` and `&#x<hex digits>;` (x in any case).
fn numeric_entity_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix("&#")?;

    let (digits, prefix_len) = match body.strip_prefix(['x', 'X']) {
        Some(hex) => (
            hex.bytes().take_while(|b| b.is_ascii_hexdigit()).count(),
            3,
        ),
        None => (body.bytes().take_while(|b| b.is_ascii_digit()).count(), 2),
    };

    if digits == 0 {
        return None;
    }

    let len = prefix_len + digits;
    (s.as_bytes().get(len) == Some(&b';')).then_some(len + 1)
}
