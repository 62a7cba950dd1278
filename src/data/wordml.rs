// ============================================================
// Layer 4 — WordprocessingML Helpers
// ============================================================
// Knows just enough of the w: vocabulary to work with runs:
//
//   <w:p>                       paragraph
//     <w:pPr>…</w:pPr>          paragraph properties
//     <w:r>                     run
//       <w:rPr>…</w:rPr>        run properties (FormatProps)
//       <w:t>text</w:t>         text payload
//     </w:r>
//     <w:r><w:drawing>…</w:drawing></w:r>   non-text run
//   </w:p>
//
// The prefix bound to the main namespace is read from the root
// element once and reused for every element we create, so a
// document that says "w:" keeps saying "w:".

use crate::data::xml::{XmlElement, XmlNode};
use crate::domain::span::HighlightColor;

pub const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// rPr children that must come AFTER <w:highlight> (CT_RPr order)
const AFTER_HIGHLIGHT: &[&str] = &[
    "u", "effect", "bdr", "shd", "fitText", "vertAlign", "rtl", "cs", "em",
    "lang", "eastAsianLayout", "specVanish", "oMath", "rPrChange",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordNamespace {
    prefix: String,
}

impl WordNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Find the prefix bound to the WordprocessingML namespace on the
    /// root element. Falls back to "w" when the binding is missing.
    pub fn detect(root: &XmlElement) -> Self {
        for (key, value) in &root.attributes {
            if value != WORDML_NS {
                continue;
            }
            if key == "xmlns" {
                return Self::new("");
            }
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                return Self::new(prefix);
            }
        }
        tracing::warn!("No WordprocessingML namespace binding on <{}>; assuming 'w'", root.name);
        Self::default()
    }

    #[cfg(test)]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// "r" → "w:r"
    pub fn qname(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{}", self.prefix, local)
        }
    }

    pub fn is(&self, el: &XmlElement, local: &str) -> bool {
        match el.name.split_once(':') {
            Some((p, l)) => p == self.prefix && l == local,
            None         => self.prefix.is_empty() && el.name == local,
        }
    }

    fn local_name<'a>(&self, el: &'a XmlElement) -> Option<&'a str> {
        match el.name.split_once(':') {
            Some((p, l)) if p == self.prefix => Some(l),
            None if self.prefix.is_empty()   => Some(el.name.as_str()),
            _ => None,
        }
    }
}

impl Default for WordNamespace {
    fn default() -> Self {
        Self::new("w")
    }
}

// ─── Paragraph traversal ──────────────────────────────────────────────────────

/// Subtrees that are never searched for paragraphs
const OPAQUE_CONTAINERS: &[&str] = &["drawing", "pict", "object"];

/// Visit every top-level paragraph in document order.
///
/// Descends through body, tables, rows, cells and content controls,
/// but never into a paragraph (no nested text boxes) and never into
/// drawing content. The callback gets the paragraph's index in
/// visiting order.
pub fn for_each_paragraph_mut<F>(ns: &WordNamespace, root: &mut XmlElement, f: &mut F)
where
    F: FnMut(usize, &mut XmlElement),
{
    let mut index = 0usize;
    visit(ns, root, &mut index, f);
}

fn visit<F>(ns: &WordNamespace, el: &mut XmlElement, index: &mut usize, f: &mut F)
where
    F: FnMut(usize, &mut XmlElement),
{
    for child in el.children.iter_mut() {
        let XmlNode::Element(e) = child else { continue };
        if ns.is(e, "p") {
            f(*index, e);
            *index += 1;
        } else if !OPAQUE_CONTAINERS.iter().any(|name| ns.is(e, name)) {
            visit(ns, e, index, f);
        }
    }
}

// ─── Run scopes ───────────────────────────────────────────────────────────────
//
// Runs are not always direct children of the paragraph:
//
//   <w:p>
//     <w:r>…</w:r>                          scope []
//     <w:hyperlink>
//       <w:r>…</w:r>                        scope [1]
//     </w:hyperlink>
//     <w:sdt><w:sdtPr/><w:sdtContent>
//       <w:r>…</w:r>                        scope [2, 1]
//     </w:sdtContent></w:sdt>
//   </w:p>
//
// Each scope is laid out and rewritten on its own. A scope is
// addressed by the child indices leading to it from the paragraph.

/// Inline wrappers whose runs are part of the paragraph's text
const INLINE_CONTAINERS: &[&str] = &[
    "hyperlink", "ins", "moveTo", "smartTag", "customXml", "fldSimple", "sdt", "sdtContent",
];

/// Every scope of `paragraph` that holds runs, innermost first.
/// The paragraph itself (the empty path) is always last.
pub fn run_scopes(ns: &WordNamespace, paragraph: &XmlElement) -> Vec<Vec<usize>> {
    let mut scopes = Vec::new();
    collect_scopes(ns, paragraph, &mut Vec::new(), &mut scopes);
    scopes
}

fn collect_scopes(ns: &WordNamespace, el: &XmlElement, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, child) in el.children.iter().enumerate() {
        let XmlNode::Element(e) = child else { continue };
        if INLINE_CONTAINERS.iter().any(|name| ns.is(e, name)) {
            path.push(i);
            collect_scopes(ns, e, path, out);
            path.pop();
        }
    }
    if path.is_empty() || el.elements().any(|e| ns.is(e, "r")) {
        out.push(path.clone());
    }
}

pub fn scope<'a>(paragraph: &'a XmlElement, path: &[usize]) -> Option<&'a XmlElement> {
    path.iter()
        .try_fold(paragraph, |el, &i| el.children.get(i).and_then(XmlNode::as_element))
}

pub fn scope_mut<'a>(paragraph: &'a mut XmlElement, path: &[usize]) -> Option<&'a mut XmlElement> {
    path.iter()
        .try_fold(paragraph, |el, &i| el.children.get_mut(i).and_then(XmlNode::as_element_mut))
}

// ─── Run inspection ───────────────────────────────────────────────────────────

/// Paragraph-level elements with no width in the text
const ZERO_WIDTH_MARKERS: &[&str] = &[
    "proofErr", "bookmarkStart", "bookmarkEnd", "commentRangeStart",
    "commentRangeEnd", "permStart", "permEnd",
];

pub fn is_zero_width_marker(ns: &WordNamespace, el: &XmlElement) -> bool {
    ZERO_WIDTH_MARKERS.iter().any(|name| ns.is(el, name))
}

/// A run is mergeable when it carries at least one <w:t> and
/// nothing but <w:t> besides its <w:rPr>. Tabs, breaks, drawings,
/// pictures, field codes, symbols … all make it non-mergeable.
pub fn is_mergeable_run(ns: &WordNamespace, run: &XmlElement) -> bool {
    let mut has_text = false;
    for child in &run.children {
        match child {
            XmlNode::Element(e) if ns.is(e, "rPr") => {}
            XmlNode::Element(e) if ns.is(e, "t")   => has_text = true,
            XmlNode::Element(_)                    => return false,
            n if n.is_blank_text()                 => {}
            XmlNode::Raw(_)                        => {}
            _                                      => return false,
        }
    }
    has_text
}

pub fn run_props<'a>(ns: &WordNamespace, run: &'a XmlElement) -> Option<&'a XmlElement> {
    run.elements().find(|e| ns.is(e, "rPr"))
}

/// Concatenated text of every <w:t> in the run
pub fn run_text(ns: &WordNamespace, run: &XmlElement) -> String {
    run.elements()
        .filter(|e| ns.is(e, "t"))
        .map(XmlElement::text)
        .collect()
}

// ─── Run construction ─────────────────────────────────────────────────────────

/// Build a fresh text run.
///
/// `source` is the original run the text came from: its attributes
/// (rsid markers) and its <w:rPr> are copied verbatim. With a
/// highlight, the copied rPr gains <w:highlight w:val="…"/> and
/// nothing else changes.
pub fn make_text_run(
    ns:        &WordNamespace,
    source:    &XmlElement,
    text:      &str,
    highlight: Option<HighlightColor>,
) -> XmlElement {
    let mut run = XmlElement::new(ns.qname("r"));
    run.attributes = source.attributes.clone();

    let props = run_props(ns, source).cloned();
    match (props, highlight) {
        (Some(mut rpr), Some(color)) => {
            apply_highlight(ns, &mut rpr, color);
            run.children.push(XmlNode::Element(rpr));
        }
        (Some(rpr), None) => run.children.push(XmlNode::Element(rpr)),
        (None, Some(color)) => {
            let mut rpr = XmlElement::new(ns.qname("rPr"));
            apply_highlight(ns, &mut rpr, color);
            run.children.push(XmlNode::Element(rpr));
        }
        (None, None) => {}
    }

    let t = XmlElement::new(ns.qname("t"))
        .with_attr("xml:space", "preserve")
        .with_text(text);
    run.children.push(XmlNode::Element(t));
    run
}

/// Set the highlight on an rPr element.
/// An existing <w:highlight> is overwritten in place; otherwise the
/// new element goes to its schema position (before <w:u>, <w:shd>,
/// <w:lang> …) so Word accepts the result.
pub fn apply_highlight(ns: &WordNamespace, rpr: &mut XmlElement, color: HighlightColor) {
    let val_key = ns.qname("val");

    for child in rpr.children.iter_mut() {
        if let XmlNode::Element(e) = child {
            if ns.is(e, "highlight") {
                e.set_attr(val_key, color.as_word_value());
                return;
            }
        }
    }

    let highlight = XmlElement::new(ns.qname("highlight"))
        .with_attr(val_key, color.as_word_value());

    let insert_at = rpr
        .children
        .iter()
        .position(|n| match n {
            XmlNode::Element(e) => ns
                .local_name(e)
                .map(|l| AFTER_HIGHLIGHT.contains(&l))
                .unwrap_or(false),
            _ => false,
        })
        .unwrap_or(rpr.children.len());

    rpr.children.insert(insert_at, XmlNode::Element(highlight));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::xml::XmlDocument;

    fn ns() -> WordNamespace {
        WordNamespace::default()
    }

    fn parse_el(xml: &str) -> XmlElement {
        XmlDocument::parse(xml).unwrap().root
    }

    #[test]
    fn test_detect_prefix_from_root() {
        let root = parse_el(&format!(r#"<x:document xmlns:x="{WORDML_NS}"/>"#));
        let ns = WordNamespace::detect(&root);
        assert_eq!(ns.prefix(), "x");
        assert_eq!(ns.qname("r"), "x:r");
    }

    #[test]
    fn test_detect_default_namespace() {
        let root = parse_el(&format!(r#"<document xmlns="{WORDML_NS}"/>"#));
        let ns = WordNamespace::detect(&root);
        assert_eq!(ns.qname("r"), "r");
        assert!(ns.is(&XmlElement::new("r"), "r"));
    }

    #[test]
    fn test_paragraph_walk_covers_tables_but_not_drawings() {
        let mut root = parse_el(concat!(
            "<w:document><w:body>",
            "<w:p><w:r><w:t>一</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>二</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:drawing><w:txbxContent><w:p><w:r><w:t>x</w:t></w:r></w:p></w:txbxContent></w:drawing></w:r></w:p>",
            "</w:body></w:document>"
        ));
        let mut seen = Vec::new();
        for_each_paragraph_mut(&ns(), &mut root, &mut |i, p| {
            seen.push((i, p.elements().count()));
        });
        assert_eq!(seen, vec![(0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_text_run_is_mergeable() {
        let run = parse_el("<w:r><w:rPr><w:b/></w:rPr><w:t>時</w:t></w:r>");
        assert!(is_mergeable_run(&ns(), &run));
    }

    #[test]
    fn test_tab_drawing_and_empty_runs_are_not_mergeable() {
        assert!(!is_mergeable_run(&ns(), &parse_el("<w:r><w:tab/></w:r>")));
        assert!(!is_mergeable_run(&ns(), &parse_el("<w:r><w:t>a</w:t><w:br w:type=\"page\"/></w:r>")));
        assert!(!is_mergeable_run(&ns(), &parse_el("<w:r><w:drawing><wp:inline/></w:drawing></w:r>")));
        assert!(!is_mergeable_run(&ns(), &parse_el("<w:r><w:rPr><w:b/></w:rPr></w:r>")));
    }

    #[test]
    fn test_make_plain_run_copies_props_verbatim() {
        let src = parse_el(r#"<w:r w:rsidR="00AB"><w:rPr><w:b/><w:sz w:val="24"/></w:rPr><w:t>x</w:t></w:r>"#);
        let run = make_text_run(&ns(), &src, "いざ", None);
        assert_eq!(
            run.to_xml(),
            r#"<w:r w:rsidR="00AB"><w:rPr><w:b/><w:sz w:val="24"/></w:rPr><w:t xml:space="preserve">いざ</w:t></w:r>"#
        );
    }

    #[test]
    fn test_highlight_goes_before_underline_and_lang() {
        let src = parse_el(r#"<w:r><w:rPr><w:b/><w:u w:val="single"/><w:lang w:eastAsia="ja-JP"/></w:rPr><w:t>x</w:t></w:r>"#);
        let run = make_text_run(&ns(), &src, "とき", Some(HighlightColor::Red));
        let rpr = run.first_child("w:rPr").unwrap();
        let names: Vec<&str> = rpr.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:b", "w:highlight", "w:u", "w:lang"]);
        assert_eq!(rpr.first_child("w:highlight").unwrap().attr("w:val"), Some("red"));
    }

    #[test]
    fn test_existing_highlight_is_replaced_not_duplicated() {
        let mut rpr = parse_el(r#"<w:rPr><w:highlight w:val="cyan"/></w:rPr>"#);
        apply_highlight(&ns(), &mut rpr, HighlightColor::Yellow);
        assert_eq!(rpr.elements().count(), 1);
        assert_eq!(rpr.first_child("w:highlight").unwrap().attr("w:val"), Some("yellow"));
    }

    #[test]
    fn test_highlight_without_source_props_creates_rpr() {
        let src = parse_el("<w:r><w:t>x</w:t></w:r>");
        let run = make_text_run(&ns(), &src, "ほか", Some(HighlightColor::Yellow));
        assert_eq!(
            run.to_xml(),
            r#"<w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t xml:space="preserve">ほか</w:t></w:r>"#
        );
    }

    #[test]
    fn test_inline_containers_are_scopes_innermost_first() {
        let mut p = parse_el(concat!(
            "<w:p>",
            "<w:r><w:t>a</w:t></w:r>",
            "<w:hyperlink r:id=\"rId4\"><w:r><w:t>b</w:t></w:r></w:hyperlink>",
            "<w:sdt><w:sdtPr/><w:sdtContent>",
            "<w:ins w:id=\"1\"><w:r><w:t>c</w:t></w:r></w:ins>",
            "<w:r><w:t>d</w:t></w:r>",
            "</w:sdtContent></w:sdt>",
            "<w:del w:id=\"2\"><w:r><w:delText>e</w:delText></w:r></w:del>",
            "</w:p>"
        ));
        let scopes = run_scopes(&ns(), &p);
        assert_eq!(scopes, vec![vec![1], vec![2, 1, 0], vec![2, 1], vec![]]);

        let ins = scope(&p, &[2, 1, 0]).unwrap();
        assert_eq!(ins.name, "w:ins");
        scope_mut(&mut p, &[1]).unwrap().children.clear();
        assert!(p.to_xml().contains("<w:hyperlink r:id=\"rId4\"/>"));
        assert!(scope(&p, &[0, 0]).is_some());
        assert!(scope(&p, &[9]).is_none());
    }
}
