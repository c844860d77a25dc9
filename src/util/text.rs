//! Text cleaning for feed output and filenames.

use std::borrow::Cow;

fn is_xml_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}' | '\u{fffe}' | '\u{ffff}')
}

/// Removes characters that are not allowed in XML 1.0 documents.
///
/// Tab, newline and carriage return are preserved. Upstream titles and
/// descriptions occasionally carry stray control bytes, and a single one makes
/// the whole feed unparseable for strict podcast clients.
pub fn xml_safe(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_illegal) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_xml_illegal(c)).collect())
}

/// Derives a filename-safe stem from a display title.
///
/// ASCII letters and digits are lowercased and kept; every other run of
/// characters collapses into a single `-`. Falls back to `"podcast"` when
/// nothing usable remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "podcast".to_string()
    } else {
        slug
    }
}
