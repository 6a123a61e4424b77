//! HTML utility functions.
//!
//! - `escape_attr()` - attribute value escaping
//! - `unescape_attr()` - character reference decoding

use std::borrow::Cow;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters that require escaping inside a quoted attribute value.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Longest entity name worth looking for (`#x10FFFF`).
const MAX_ENTITY_LEN: usize = 8;

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape an attribute value.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(ESCAPE_CHARS) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Decode character references in an attribute value as written in source.
///
/// Handles the common named entities and numeric references. Anything
/// unrecognized is kept as written.
pub fn unescape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .get(1..=MAX_ENTITY_LEN + 1)
            .unwrap_or(&rest[1..])
            .find(';')
            .and_then(|semi| decode_entity(&rest[1..=semi]).map(|c| (c, semi + 2)));
        match decoded {
            Some((c, len)) => {
                result.push(c);
                rest = &rest[len..];
            }
            None => {
                result.push('&');
                rest = &rest[1..];
            }
        }
    }
    result.push_str(rest);
    Cow::Owned(result)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("a.webp"), "a.webp");
        assert!(matches!(escape_attr("a.webp"), Cow::Borrowed(_)));
        assert_eq!(escape_attr(r#"a"b&c.webp"#), "a&quot;b&amp;c.webp");
    }

    #[test]
    fn test_unescape_attr() {
        assert!(matches!(unescape_attr("a.png"), Cow::Borrowed(_)));
        assert_eq!(unescape_attr("a&amp;b.png"), "a&b.png");
        assert_eq!(unescape_attr("&quot;x&#39;&#x41;"), "\"x'A");
        assert_eq!(unescape_attr("caf&#233;.png"), "café.png");
    }

    #[test]
    fn test_unescape_keeps_unknown() {
        assert_eq!(unescape_attr("a & b"), "a & b");
        assert_eq!(unescape_attr("a&bogus;b"), "a&bogus;b");
        assert_eq!(unescape_attr("trailing&"), "trailing&");
        assert_eq!(unescape_attr("&#xZZ;"), "&#xZZ;");
    }

    #[test]
    fn test_escape_roundtrip() {
        let raw = r#"it's <"a"> & b"#;
        assert_eq!(unescape_attr(&escape_attr(raw)), raw);
    }
}
