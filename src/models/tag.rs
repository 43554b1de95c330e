use serde::{Deserialize, Serialize};

/// A tasting tag such as "Peat" or "Sherry Cask"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Normalize a tag name to title case.
///
/// A letter is upper-cased when it follows a non-letter (or starts the
/// string) and lower-cased otherwise, so `smoky-peat` becomes `Smoky-Peat`.
/// Tags are stored and indexed in this form, which makes `@peat` and
/// `@PEAT` select the same documents.
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_is_letter = false;

    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }

    out
}
