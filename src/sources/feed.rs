//! Text helpers shared by the XML feed sources (arXiv Atom, Medium RSS).

use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `s` to at most `max` characters, ending in `...` when shortened.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Unescaped value of the attribute with local name `name`.
pub(crate) fn attribute(tag: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| decode_text(&a.value))
}

pub(crate) fn decode_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match unescape(&text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.into_owned(),
    }
}

/// Resolve an entity reference such as `amp` or `#x27`.
pub(crate) fn resolve_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x', hex @ ..] => u32::from_str_radix(std::str::from_utf8(hex).ok()?, 16)
            .ok()
            .and_then(char::from_u32),
        [b'#', dec @ ..] => std::str::from_utf8(dec).ok()?.parse().ok().and_then(char::from_u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        let long = "word ".repeat(200);
        let out = truncate_chars(&collapse_whitespace(&long), 500);
        assert_eq!(out.chars().count(), 500);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[test]
    fn test_entity_resolution() {
        assert_eq!(resolve_entity(b"amp"), Some('&'));
        assert_eq!(resolve_entity(b"#x27"), Some('\''));
        assert_eq!(resolve_entity(b"#233"), Some('é'));
        assert_eq!(resolve_entity(b"nbsp"), None);
    }

    #[test]
    fn test_decode_text_unescapes() {
        assert_eq!(decode_text(b"Q&amp;A &lt;3"), "Q&A <3");
        assert_eq!(decode_text(b"broken &bogus; text"), "broken &bogus; text");
    }
}
