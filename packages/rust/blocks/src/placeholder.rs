//! Protection of literal angle-bracket tokens such as `<plugin name>`.
//!
//! Documentation prose often uses bracketed fill-in tokens that an HTML
//! parser would otherwise swallow as unknown elements. Before parsing, every
//! bracket token that is not real markup is swapped for an opaque
//! private-use token; run text restores the original after all inline
//! processing is done.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::canonical::normalize_inline;

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9_.:-]*)([^<>]*)>").expect("valid regex")
});

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}(\\d+)\u{E001}").expect("valid regex"));

/// Element names treated as markup. Anything else in brackets is text.
const KNOWN_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "big", "blockquote", "body", "br", "button", "canvas", "caption", "center", "cite", "code",
    "col", "colgroup", "data", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em",
    "embed", "fieldset", "figcaption", "figure", "font", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input",
    "ins", "kbd", "label", "legend", "li", "link", "main", "map", "mark", "menu", "meta",
    "meter", "nav", "noscript", "object", "ol", "optgroup", "option", "output", "p", "param",
    "picture", "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp", "script", "section",
    "select", "small", "source", "span", "strike", "strong", "style", "sub", "summary", "sup",
    "svg", "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "time",
    "title", "tr", "track", "tt", "u", "ul", "var", "video", "wbr",
];

/// Attributes that may legitimately appear without a value.
const BOOLEAN_ATTRS: &[&str] = &[
    "allowfullscreen", "async", "autofocus", "checked", "compact", "controls", "default",
    "defer", "disabled", "download", "hidden", "ismap", "itemscope", "multiple", "noshade",
    "novalidate", "nowrap", "open", "readonly", "required", "reversed", "selected",
];

/// Original text of every protected token, indexed by token number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    originals: Vec<String>,
}

impl Placeholders {
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    /// Replace tokens with their original text, whitespace-normalized
    /// like the surrounding inline text.
    pub fn restore_inline(&self, text: &str) -> String {
        self.restore_with(text, normalize_inline)
    }

    /// Replace tokens with their original text verbatim (code blocks).
    pub fn restore_raw(&self, text: &str) -> String {
        self.restore_with(text, str::to_string)
    }

    fn restore_with(&self, text: &str, render: impl Fn(&str) -> String) -> String {
        if !text.contains(OPEN) {
            return text.to_string();
        }
        TOKEN_RE
            .replace_all(text, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.originals.get(i))
                    .map(|original| render(original))
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Swap every non-markup bracket token in `html` for an opaque token.
pub fn protect(html: &str) -> (String, Placeholders) {
    let mut placeholders = Placeholders::default();
    let protected = TAG_RE.replace_all(html, |caps: &Captures| {
        let whole = &caps[0];
        if is_markup(&caps[1], &caps[2], &caps[3]) {
            return whole.to_string();
        }
        let index = placeholders.originals.len();
        placeholders.originals.push(whole.to_string());
        format!("{OPEN}{index}{CLOSE}")
    });
    (protected.into_owned(), placeholders)
}

fn is_markup(closing: &str, name: &str, attrs: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if !KNOWN_TAGS.contains(&name.as_str()) {
        return false;
    }
    let attrs = attrs.trim().trim_end_matches('/').trim();
    if attrs.is_empty() {
        return true;
    }
    if !closing.is_empty() {
        return false;
    }
    if attrs.contains('=') || attrs.contains('"') || attrs.contains('\'') {
        return true;
    }
    // `<table name>` is prose; `<td nowrap>` is markup.
    attrs
        .split_whitespace()
        .all(|word| BOOLEAN_ATTRS.contains(&word.to_ascii_lowercase().as_str()))
}
