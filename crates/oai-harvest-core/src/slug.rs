//! Identifier and tag normalization.
//!
//! Dataset names are derived from free-text titles and must be stable: the
//! same title always produces the same name, so re-harvesting a record
//! updates the existing dataset instead of creating a new one.

use unicode_normalization::UnicodeNormalization;

/// Dataset names are cut to this many characters before filtering.
pub const MAX_SLUG_LEN: usize = 35;

pub const MIN_TAG_LEN: usize = 2;
pub const MAX_TAG_LEN: usize = 100;

/// Fold to ASCII: compatibility decomposition, then drop every non-ASCII
/// code point (combining marks included, so diacritics vanish).
fn fold_ascii(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// Derive a dataset name from a title.
///
/// Folds to ASCII, lower-cases, turns spaces into underscores, keeps the
/// first 35 characters and then drops everything but ASCII letters and `_`.
/// Digits and punctuation are removed, so the result may be empty.
///
/// ```
/// use oai_harvest_core::slug::slugify;
///
/// assert_eq!(slugify("Hello World!!"), "hello_world");
/// assert_eq!(slugify("Café Société"), "cafe_societe");
/// assert_eq!(slugify("2021"), "");
/// ```
pub fn slugify(title: &str) -> String {
    fold_ascii(title)
        .to_ascii_lowercase()
        .replace(' ', "_")
        .chars()
        .take(MAX_SLUG_LEN)
        .filter(|c| c.is_ascii_alphabetic() || *c == '_')
        .collect()
}

/// Dataset name for a record: the slug of its title, or the raw record
/// identifier when the slug comes out empty.
pub fn dataset_name(title: &str, identifier: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        identifier.to_string()
    } else {
        slug
    }
}

/// Sanitize a free-text subject into a tag name.
///
/// Short results, including empty ones, are padded with `_`.
pub fn munge_tag(value: &str) -> String {
    let capped: String = value.chars().take(MAX_TAG_LEN).collect();
    let folded = fold_ascii(&capped).to_ascii_lowercase();
    let mut tag: String = folded
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ' ')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect();

    while tag.len() < MIN_TAG_LEN {
        tag.push('_');
    }
    tag.truncate(MAX_TAG_LEN);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_title() {
        assert_eq!(slugify("Hello World!!"), "hello_world");
    }

    #[test]
    fn test_deterministic() {
        let title = "Über die Natur der Dinge (1999)";
        assert_eq!(slugify(title), slugify(title));
        assert_eq!(slugify(title), "uber_die_natur_der_dinge_");
    }

    #[test]
    fn test_empty_and_punctuation() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!! ... ???"), "__");
        assert_eq!(slugify("?!.,;"), "");
    }

    #[test]
    fn test_truncates_before_filtering() {
        let title = "a".repeat(30) + " 12345 bcdef";
        // first 35 chars: 30 a's, '_', "1234"
        assert_eq!(slugify(&title), "a".repeat(30) + "_");

        let long = "The Quick Brown Fox Jumps Over The Lazy Dog";
        let slug = slugify(long);
        assert_eq!(slug, "the_quick_brown_fox_jumps_over_the_");
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
    }

    #[test]
    fn test_non_latin_scripts_drop_out() {
        assert_eq!(slugify("日本語"), "");
        assert_eq!(slugify("ﬁnal report"), "final_report");
    }

    #[test]
    fn test_dataset_name_falls_back_to_identifier() {
        assert_eq!(dataset_name("2020", "oai:repo:42"), "oai:repo:42");
        assert_eq!(dataset_name("Maps", "oai:repo:42"), "maps");
    }

    #[test]
    fn test_munge_tag() {
        assert_eq!(munge_tag("Physics"), "physics");
        assert_eq!(munge_tag("  Quantum Field Theory "), "quantum-field-theory");
        assert_eq!(munge_tag("Résumé & C.V."), "resume--cv");
        assert_eq!(munge_tag("x"), "x_");
    }

    #[test]
    fn test_munge_tag_pads_empty_result() {
        assert_eq!(munge_tag("!!!"), "__");
        assert_eq!(munge_tag("日本語"), "__");
    }

    #[test]
    fn test_munge_tag_caps_length() {
        let long = "b".repeat(250);
        assert_eq!(munge_tag(&long).len(), MAX_TAG_LEN);
    }
}
