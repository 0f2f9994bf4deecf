//! Text canonicalization shared by the converter and the completeness audit.
//!
//! Both sides of every comparison go through [`canonicalize`], so any
//! normalization added here must stay symmetric.

use unicode_normalization::UnicodeNormalization;

/// Options for [`canonicalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalOptions {
    /// Fold to lower case before comparison.
    pub lowercase: bool,
}

impl CanonicalOptions {
    pub fn lowercase() -> Self {
        Self { lowercase: true }
    }
}

/// Normalize text for comparison: typographic punctuation mapped to ASCII,
/// Unicode NFC, whitespace runs collapsed to one space, edges trimmed.
///
/// Total over valid Unicode and idempotent.
pub fn canonicalize(text: &str, opts: CanonicalOptions) -> String {
    let mapped = map_punctuation(text);
    let cased = if opts.lowercase {
        mapped.to_lowercase()
    } else {
        mapped
    };
    let composed: String = cased.nfc().collect();
    collapse_whitespace(&composed, true)
}

/// Same normalization as [`canonicalize`] without trimming or case folding.
///
/// Used on individual inline text nodes, where edge whitespace separates
/// words from neighbouring runs.
pub fn normalize_inline(text: &str) -> String {
    let composed: String = map_punctuation(text).nfc().collect();
    collapse_whitespace(&composed, false)
}

/// Length of the canonical form in Unicode scalar values.
pub fn canonical_len(text: &str) -> usize {
    canonicalize(text, CanonicalOptions::default()).chars().count()
}

fn map_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
            | '\u{00BB}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => out.push(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' => {}
            _ => out.push(c),
        }
    }
    out
}

fn collapse_whitespace(text: &str, trim: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_space = true;
            continue;
        }
        if in_space && !(trim && out.is_empty()) {
            out.push(' ');
        }
        in_space = false;
        out.push(c);
    }
    if in_space && !trim {
        out.push(' ');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn maps_typographic_punctuation() {
        let input = "\u{201C}Don\u{2019}t\u{201D} \u{2014} wait\u{2026}";
        assert_eq!(
            canonicalize(input, CanonicalOptions::default()),
            "\"Don't\" - wait..."
        );
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(
            canonicalize("  a\t\n b\u{00A0}\u{00A0}c  ", CanonicalOptions::default()),
            "a b c"
        );
    }

    #[test]
    fn composes_to_nfc() {
        let decomposed = "Cafe\u{0301}";
        assert_eq!(canonicalize(decomposed, CanonicalOptions::default()), "Café");
    }

    #[test]
    fn lowercase_is_optional() {
        assert_eq!(canonicalize("Hello World", CanonicalOptions::lowercase()), "hello world");
        assert_eq!(canonicalize("Hello World", CanonicalOptions::default()), "Hello World");
    }

    #[test]
    fn removes_invisible_characters() {
        assert_eq!(canonicalize("sys\u{200B}_id", CanonicalOptions::default()), "sys_id");
    }

    #[test]
    fn inline_keeps_edge_space() {
        assert_eq!(normalize_inline("  Hello\n\nthere "), " Hello there ");
        assert_eq!(normalize_inline(""), "");
    }

    proptest! {
        #[test]
        fn canonicalize_is_idempotent(
            s in "[a-zA-Z0-9 \t\n.,'\"\u{2018}\u{2019}\u{201C}\u{201D}\u{2013}\u{2014}\u{2026}\u{00A0}\u{200B}é\u{0301}]{0,64}",
            lowercase in any::<bool>(),
        ) {
            let opts = CanonicalOptions { lowercase };
            let once = canonicalize(&s, opts);
            prop_assert_eq!(canonicalize(&once, opts), once);
        }

        #[test]
        fn inline_normalization_agrees_with_canonical_form(
            s in "[a-zA-Z \t\n\u{2019}\u{2014}]{0,48}",
        ) {
            let inline = normalize_inline(&s);
            prop_assert_eq!(
                canonicalize(&inline, CanonicalOptions::default()),
                canonicalize(&s, CanonicalOptions::default())
            );
        }
    }
}
