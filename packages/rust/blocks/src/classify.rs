//! One-step classification of DOM nodes.
//!
//! Every tag-name decision the converter makes goes through [`classify`];
//! the audit reuses [`is_chrome`] and [`detect_callout`] so both sides agree
//! on what is content and what is a callout.

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

use sn2n_shared::{Annotations, CalloutStyle, Highlight};

/// What a node means to the block converter.
#[derive(Debug, Clone, Copy)]
pub enum NodeClass<'a> {
    /// A text node.
    Text(&'a str),
    /// Inline markup whose text belongs to the surrounding paragraph.
    Inline(ElementRef<'a>),
    LineBreak,
    /// Never content (scripts, navigation, hidden elements, comments).
    Skip,
    /// Transparent block wrapper; its children are converted in place.
    Container(ElementRef<'a>),
    Heading(ElementRef<'a>, u8),
    List(ElementRef<'a>, ListKind),
    DefinitionList(ElementRef<'a>),
    Table(ElementRef<'a>),
    Figure(ElementRef<'a>),
    Image(ElementRef<'a>),
    Code(ElementRef<'a>),
    Callout(ElementRef<'a>, CalloutStyle),
    Quote(ElementRef<'a>),
    Divider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bulleted,
    Numbered,
}

impl NodeClass<'_> {
    /// Whether the node is part of running text.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Self::Text(_) | Self::Inline(_) | Self::LineBreak | Self::Image(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tag tables
// ---------------------------------------------------------------------------

const CHROME_TAGS: &[&str] = &[
    "area", "audio", "button", "canvas", "embed", "head", "iframe", "input", "link", "map",
    "meta", "nav", "noscript", "object", "script", "select", "style", "svg", "template",
    "textarea", "title", "video", "wbr",
];

const CHROME_CLASSES: &[&str] = &["minitoc", "zdocsminitoccollapsebutton"];

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "big", "cite", "code", "data", "del", "dfn", "em", "font",
    "i", "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strike", "strong",
    "sub", "sup", "time", "tt", "u", "var",
];

const CONTAINER_TAGS: &[&str] = &[
    "address", "article", "aside", "body", "caption", "center", "dd", "details", "dialog",
    "div", "dt", "fieldset", "figcaption", "footer", "form", "header", "hgroup", "html", "legend",
    "li", "main", "p", "picture", "section", "summary", "tbody", "td", "tfoot", "th", "thead",
    "tr",
];

/// Tags that always start a new block.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "menu", "ol", "p", "pre", "section", "table", "ul",
];

const TECHNICAL_CLASSES: &[&str] = &[
    "apiname", "cmdname", "filepath", "keyword", "option", "parmname", "systemoutput",
    "userinput", "varname",
];

const CALLOUT_TITLE_CLASSES: &[&str] = &["notetitle", "note__title", "callout-title", "title"];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify any DOM node.
pub fn classify(node: NodeRef<'_, Node>) -> NodeClass<'_> {
    match node.value() {
        Node::Text(text) => NodeClass::Text(text),
        Node::Element(_) => ElementRef::wrap(node).map_or(NodeClass::Skip, classify_element),
        _ => NodeClass::Skip,
    }
}

/// Classify an element.
pub fn classify_element(el: ElementRef<'_>) -> NodeClass<'_> {
    if is_chrome(el) {
        return NodeClass::Skip;
    }
    let name = el.value().name();
    match name {
        "br" => NodeClass::LineBreak,
        "img" => NodeClass::Image(el),
        "h1" => NodeClass::Heading(el, 1),
        "h2" => NodeClass::Heading(el, 2),
        "h3" | "h4" | "h5" | "h6" => NodeClass::Heading(el, 3),
        "ul" | "menu" => NodeClass::List(el, ListKind::Bulleted),
        "ol" => NodeClass::List(el, ListKind::Numbered),
        "dl" => NodeClass::DefinitionList(el),
        "table" => NodeClass::Table(el),
        "figure" => NodeClass::Figure(el),
        "pre" => NodeClass::Code(el),
        "blockquote" => NodeClass::Quote(el),
        "hr" => NodeClass::Divider,
        _ if INLINE_TAGS.contains(&name) => {
            if has_block_descendant(el) {
                NodeClass::Container(el)
            } else {
                NodeClass::Inline(el)
            }
        }
        _ => {
            if let Some(style) = detect_callout(el) {
                NodeClass::Callout(el, style)
            } else if CONTAINER_TAGS.contains(&name) || has_block_descendant(el) {
                NodeClass::Container(el)
            } else {
                // Unknown element without block content: keep its text.
                NodeClass::Inline(el)
            }
        }
    }
}

/// Elements that are never page content.
pub fn is_chrome(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if CHROME_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("hidden").is_some() {
        return true;
    }
    if value
        .attr("aria-hidden")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    value.classes().any(|class| {
        let class = class.to_ascii_lowercase();
        CHROME_CLASSES.contains(&class.as_str()) || class.contains("contentplaceholder")
    })
}

/// Whether any descendant element starts a block.
pub fn has_block_descendant(el: ElementRef<'_>) -> bool {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|d| BLOCK_TAGS.contains(&d.value().name()) && !is_chrome(d))
}

/// Whether `el` sits inside a table cell.
pub fn inside_table_cell(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "td" | "th"))
}

// ---------------------------------------------------------------------------
// Inline styles
// ---------------------------------------------------------------------------

/// Annotations in effect inside `el`, given those of its parent.
pub fn inline_annotations(el: ElementRef<'_>, base: Annotations) -> Annotations {
    let mut ann = base;
    match el.value().name() {
        "b" | "strong" => ann.bold = true,
        "i" | "em" | "cite" | "dfn" | "var" => ann.italic = true,
        "u" | "ins" => ann.underline = true,
        "s" | "strike" | "del" => ann.strikethrough = true,
        "code" | "kbd" | "samp" | "tt" => ann.code = true,
        _ => {}
    }
    for class in el.value().classes() {
        let class = class.to_ascii_lowercase();
        match class.as_str() {
            "uicontrol" | "menucascade" => {
                ann.bold = true;
                ann.highlight = Some(Highlight::UiControl);
            }
            "wintitle" => ann.bold = true,
            "codeph" => ann.code = true,
            c if TECHNICAL_CLASSES.contains(&c) => ann.highlight = Some(Highlight::Technical),
            _ => {}
        }
    }
    ann.normalized()
}

/// Whether `el` is a UI-control label span.
pub fn is_ui_control(el: ElementRef<'_>) -> bool {
    el.value()
        .classes()
        .any(|c| c.eq_ignore_ascii_case("uicontrol"))
}

// ---------------------------------------------------------------------------
// Callouts
// ---------------------------------------------------------------------------

/// Decide whether `el` is a callout and which style it carries.
///
/// A callout is a `div`/`section`/`aside` with a callout class token, outside
/// any table cell, that is not merely a wrapper grouping other callouts.
/// Class tokens are matched whole (`sidenote` is not a note). A
/// `note_warning`-style token wins over the generic family token.
pub fn detect_callout(el: ElementRef<'_>) -> Option<CalloutStyle> {
    let style = callout_class_style(el)?;
    if inside_table_cell(el) || is_grouping_container(el) {
        return None;
    }
    Some(style)
}

fn callout_class_style(el: ElementRef<'_>) -> Option<CalloutStyle> {
    if !matches!(el.value().name(), "div" | "section" | "aside") {
        return None;
    }
    let mut specific = None;
    let mut generic = None;
    for class in el.value().classes() {
        let token = class.to_ascii_lowercase();
        if let Some(rest) = token
            .strip_prefix("note_")
            .or_else(|| token.strip_prefix("note-"))
        {
            if specific.is_none() {
                specific = CalloutStyle::from_token(rest);
            }
            continue;
        }
        match CalloutStyle::from_token(&token) {
            Some(CalloutStyle::Note) if generic.is_none() => generic = Some(CalloutStyle::Note),
            Some(CalloutStyle::Note) | None => {}
            Some(style) => generic = Some(style),
        }
    }
    specific.or(generic)
}

/// A callout-classed wrapper with no title and no prose of its own whose
/// real content is one or more nested callouts.
fn is_grouping_container(el: ElementRef<'_>) -> bool {
    let wraps_callout = el
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|d| callout_class_style(d).is_some());
    if !wraps_callout {
        return false;
    }
    let has_title = el.children().filter_map(ElementRef::wrap).any(|c| {
        c.value().classes().any(|class| {
            CALLOUT_TITLE_CLASSES.contains(&class.to_ascii_lowercase().as_str())
        })
    });
    !has_title && !has_own_prose(el)
}

fn has_own_prose(el: ElementRef<'_>) -> bool {
    el.children().any(|child| match classify(child) {
        NodeClass::Text(text) => !text.trim().is_empty(),
        NodeClass::Inline(inline) => inline.text().any(|t| !t.trim().is_empty()),
        NodeClass::Container(c) if c.value().name() == "p" => {
            c.text().any(|t| !t.trim().is_empty())
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, selector: &str) -> ElementRef<'a> {
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel).next().unwrap()
    }

    #[test]
    fn classifies_block_tags() {
        let doc = Html::parse_document("<ul><li>a</li></ul><h5>t</h5><pre>x</pre><hr>");
        assert!(matches!(
            classify_element(first(&doc, "ul")),
            NodeClass::List(_, ListKind::Bulleted)
        ));
        assert!(matches!(classify_element(first(&doc, "h5")), NodeClass::Heading(_, 3)));
        assert!(matches!(classify_element(first(&doc, "pre")), NodeClass::Code(_)));
        assert!(matches!(classify_element(first(&doc, "hr")), NodeClass::Divider));
    }

    #[test]
    fn span_with_block_content_is_container() {
        let doc = Html::parse_document("<span id=a><b>x</b></span><span id=b><div>y</div></span>");
        assert!(matches!(classify_element(first(&doc, "#a")), NodeClass::Inline(_)));
        assert!(matches!(classify_element(first(&doc, "#b")), NodeClass::Container(_)));
    }

    #[test]
    fn chrome_is_skipped() {
        let doc = Html::parse_document(
            r#"<div class="miniTOC">toc</div><div aria-hidden="true">x</div><p hidden>y</p>
               <div class="zDocsContentPlaceholder">z</div><div class="body">ok</div>"#,
        );
        assert!(is_chrome(first(&doc, ".miniTOC")));
        assert!(is_chrome(first(&doc, "[aria-hidden]")));
        assert!(is_chrome(first(&doc, "p")));
        assert!(is_chrome(first(&doc, ".zDocsContentPlaceholder")));
        assert!(!is_chrome(first(&doc, ".body")));
    }

    #[test]
    fn callout_tokens_match_whole_words() {
        let doc = Html::parse_document(
            r#"<div id=a class="note note_warning">w</div><div id=b class="sidenote">s</div>
               <div id=c class="note tip">t</div><div id=d class="note">n</div>"#,
        );
        assert_eq!(detect_callout(first(&doc, "#a")), Some(CalloutStyle::Warning));
        assert_eq!(detect_callout(first(&doc, "#b")), None);
        assert_eq!(detect_callout(first(&doc, "#c")), Some(CalloutStyle::Tip));
        assert_eq!(detect_callout(first(&doc, "#d")), Some(CalloutStyle::Note));
    }

    #[test]
    fn callout_in_table_cell_is_not_a_callout() {
        let doc = Html::parse_document(
            r#"<table><tr><td><div class="note">in cell</div></td></tr></table>"#,
        );
        assert_eq!(detect_callout(first(&doc, ".note")), None);
    }

    #[test]
    fn grouping_wrapper_is_not_a_callout() {
        let doc = Html::parse_document(
            r#"<div id=wrap class="note"><div id=inner class="note note_note">Real</div></div>"#,
        );
        assert_eq!(detect_callout(first(&doc, "#wrap")), None);
        assert_eq!(detect_callout(first(&doc, "#inner")), Some(CalloutStyle::Note));
    }

    #[test]
    fn callout_with_prose_and_nested_callout_stays_a_callout() {
        let doc = Html::parse_document(
            r#"<div id=outer class="note">Outer <div class="note">Inner</div></div>"#,
        );
        assert_eq!(detect_callout(first(&doc, "#outer")), Some(CalloutStyle::Note));
    }

    #[test]
    fn wrapper_with_title_is_a_callout() {
        let doc = Html::parse_document(
            r#"<div id=outer class="important"><span class="notetitle">Important:</span><div class="note">Inner</div></div>"#,
        );
        assert_eq!(detect_callout(first(&doc, "#outer")), Some(CalloutStyle::Important));
    }

    #[test]
    fn semantic_spans_map_to_annotations() {
        let doc = Html::parse_document(
            r#"<span class="ph uicontrol">Save</span><span class="ph keyword">incident</span><code class="ph codeph"><b>x</b></code>"#,
        );
        let ui = inline_annotations(first(&doc, ".uicontrol"), Annotations::plain());
        assert!(ui.bold);
        assert_eq!(ui.highlight, Some(Highlight::UiControl));

        let kw = inline_annotations(first(&doc, ".keyword"), Annotations::plain());
        assert_eq!(kw.highlight, Some(Highlight::Technical));

        let code = inline_annotations(first(&doc, "code"), Annotations::bold());
        assert!(code.code);
        assert!(!code.bold);
    }
}
