//! File name and XML id sanitization for packaged assets

use crate::patterns::UNSAFE_NAME_CHARS_RE;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::Path;

/// ASCII characters kept verbatim in packaged file names
const NAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-').remove(b'.');

/// Folders of the book whose files land at the top of the package
const FLATTENED_FOLDERS: &[&str] = &["audio/", "video/"];

/// Path of `source` relative to `book_folder` with forward slashes, or just the file name
/// when the source lives elsewhere
pub fn relative_reference(source: &Path, book_folder: &Path) -> String {
    match source.strip_prefix(book_folder) {
        Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
        Err(_) => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Sanitize a book-relative reference into a flat package file name.
///
/// `a b.png`, `a+b.png` and `a&b.png` all become `a_b.png`; other unsafe ASCII
/// characters are percent-encoded with `%` then replaced by `_`, so `a#b.png`
/// becomes `a_23b.png`. Non-ASCII characters are kept.
pub fn adjusted_file_name(reference: &str) -> String {
    let mut name = reference.replace('\\', "/");
    for folder in FLATTENED_FOLDERS {
        if let Some(rest) = name.strip_prefix(folder) {
            name = rest.to_string();
            break;
        }
    }
    let name = name.trim_start_matches('/').replace('/', "_");
    let name = UNSAFE_NAME_CHARS_RE.replace_all(&name, "_");

    let mut encoded = String::with_capacity(name.len());
    let mut buf = [0u8; 4];
    for ch in name.chars() {
        if ch.is_ascii() {
            encoded.extend(utf8_percent_encode(ch.encode_utf8(&mut buf), NAME_SAFE));
        } else {
            encoded.push(ch);
        }
    }
    encoded.replace('%', "_")
}

/// Insert `n` between the stem and the extension: `a_b.png` -> `a_b1.png`
pub fn numbered_name(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], n, &name[dot..]),
        _ => format!("{}{}", name, n),
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Turn a file stem into a valid XML id (an NCName, so `:` is replaced as well).
///
/// Spaces are removed, other invalid characters become `_`, and an `f` is prefixed
/// when the result does not start with a name-start character.
pub fn to_valid_xml_id(stem: &str) -> String {
    let id: String = stem
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect();
    match id.chars().next() {
        Some(first) if is_name_start_char(first) => id,
        _ => format!("f{}", id),
    }
}

/// Whether `id` could have been produced by [`to_valid_xml_id`]
pub fn is_valid_xml_id(id: &str) -> bool {
    let mut chars = id.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

/// File stem used for id generation: the name up to its last dot
pub fn stem_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}
