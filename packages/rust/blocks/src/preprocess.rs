//! HTML-level passes that run before the DOM walk.
//!
//! Both the converter and the completeness audit parse the output of
//! [`prepare`], so the two sides always see the same document.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::placeholder::{Placeholders, protect};

/// Separator marker used while splitting a menu cascade into labels.
const SEPARATOR: char = '\u{E002}';

static CASCADE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<span\b[^>]*\bclass\s*=\s*["'][^"']*\bmenucascade\b[^"']*["'][^>]*>"#)
        .expect("valid regex")
});

static SPAN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)span\b[^>]*?(/?)>").expect("valid regex"));

static CASCADE_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<abbr\b[^>]*>.*?</abbr>|<span\b[^>]*\bclass\s*=\s*["'][^"']*\bsep\b[^"']*["'][^>]*>.*?</span>"#,
    )
    .expect("valid regex")
});

static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

// ---------------------------------------------------------------------------
// Prepared document
// ---------------------------------------------------------------------------

/// Page HTML after placeholder protection and menu-cascade normalization.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub html: String,
    pub placeholders: Placeholders,
    pub menu_cascades: usize,
}

impl Prepared {
    /// Parse the prepared HTML into a DOM.
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Run all string-level passes over raw page HTML.
pub fn prepare(html: &str) -> Prepared {
    let (protected, placeholders) = protect(html);
    let (html, menu_cascades) = normalize_menu_cascades(&protected);
    Prepared {
        html,
        placeholders,
        menu_cascades,
    }
}

/// The element whose children are the page content.
pub fn content_root(doc: &Html) -> ElementRef<'_> {
    doc.select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| doc.root_element())
}

// ---------------------------------------------------------------------------
// Menu cascades
// ---------------------------------------------------------------------------

/// Rewrite every `menucascade` span into a single UI-control span holding
/// `Label > Label > Label`. Returns the new HTML and the number rewritten.
pub fn normalize_menu_cascades(html: &str) -> (String, usize) {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut count = 0;

    while let Some(open) = CASCADE_OPEN_RE.find(rest) {
        out.push_str(&rest[..open.start()]);
        let after = &rest[open.end()..];
        match matching_close(after) {
            Some((inner_end, close_end)) => {
                out.push_str(&render_cascade(&after[..inner_end]));
                rest = &after[close_end..];
                count += 1;
            }
            None => {
                // Unclosed cascade: leave it for the parser.
                out.push_str(open.as_str());
                rest = after;
            }
        }
    }
    out.push_str(rest);
    (out, count)
}

/// Offsets of the `</span>` closing the span whose body starts at `s`.
fn matching_close(s: &str) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for caps in SPAN_TAG_RE.captures_iter(s) {
        let Some(tag) = caps.get(0) else { continue };
        if &caps[1] == "/" {
            depth -= 1;
            if depth == 0 {
                return Some((tag.start(), tag.end()));
            }
        } else if caps[2].is_empty() {
            depth += 1;
        }
    }
    None
}

fn render_cascade(inner: &str) -> String {
    let marked = CASCADE_SEPARATOR_RE.replace_all(inner, SEPARATOR.to_string());
    let text = ANY_TAG_RE.replace_all(&marked, "");
    let pieces: Vec<&str> = if text.contains(SEPARATOR) {
        text.split(SEPARATOR).collect()
    } else {
        text.split("&gt;").collect()
    };
    let labels: Vec<String> = pieces
        .iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect();
    format!(r#"<span class="ph uicontrol">{}</span>"#, labels.join(" &gt; "))
}
