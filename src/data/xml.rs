// ============================================================
// Layer 4 — Minimal XML Tree
// ============================================================
// An owned element tree over quick-xml's event reader.
//
// WordprocessingML needs more than streaming: a paragraph's
// children are collected, reshaped, and written back, and a
// run's <w:rPr> must be deep-copied verbatim into every run we
// generate from it. So the document is read once into this
// tree, edited in memory, and serialised once at the end.
//
// What is kept:
//   - element names exactly as written ("w:r", not "{ns}r"),
//     so namespace prefixes survive the round trip
//   - attribute order
//   - all text, including whitespace between elements
//   - comments / processing instructions / declarations as raw
//     source text
//
// Reference: quick-xml Reader (event API)

use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::domain::error::ReviewError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    CData(String),
    /// Declarations, comments, processing instructions, kept as source text
    Raw(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whitespace-only text between elements (pretty-printing)
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text(t) if t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written in the source ("w:rPr")
    pub name:       String,
    /// (qualified name, unescaped value) in source order
    pub attributes: Vec<(String, String)>,
    pub children:   Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:       name.into(),
            attributes: Vec::new(),
            children:   Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    #[cfg(test)]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite an existing attribute in place, or append it
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key   = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None       => self.attributes.push((key, value)),
        }
    }

    /// Child elements, skipping text and raw nodes
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    pub fn first_child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenation of the direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Depth-first search for any descendant with the given name
    pub fn contains_descendant(&self, name: &str) -> bool {
        self.elements()
            .any(|e| e.name == name || e.contains_descendant(name))
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape(v.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            write_node(child, out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Serialise this element (and its subtree) on its own
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Element(e) => e.write_into(out),
        XmlNode::Text(t)    => out.push_str(&partial_escape(t.as_str())),
        XmlNode::CData(t)   => {
            out.push_str("<![CDATA[");
            out.push_str(t);
            out.push_str("]]>");
        }
        XmlNode::Raw(r)     => out.push_str(r),
    }
}

// ─── XmlDocument ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Everything before the root element (declaration, comments)
    pub prolog: Vec<XmlNode>,
    pub root:   XmlElement,
    /// Everything after the root element
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse a complete XML document.
    /// Any reader error is a MalformedDocument, fatal for the run.
    pub fn parse(xml: &str) -> Result<Self, ReviewError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack:  Vec<XmlElement> = Vec::new();
        let mut prolog: Vec<XmlNode>    = Vec::new();
        let mut epilog: Vec<XmlNode>    = Vec::new();
        let mut root:   Option<XmlElement> = None;

        loop {
            let before = reader.buffer_position() as usize;
            let event  = reader
                .read_event()
                .map_err(|e| malformed(format!("at byte {before}: {e}")))?;
            let after  = reader.buffer_position() as usize;
            let raw    = xml.get(before..after).unwrap_or("");

            let node = match event {
                Event::Start(ref e) => {
                    stack.push(element_from_start(e)?);
                    continue;
                }
                Event::Empty(ref e) => XmlNode::Element(element_from_start(e)?),
                Event::End(_) => {
                    let done = stack
                        .pop()
                        .ok_or_else(|| malformed(format!("unbalanced end tag at byte {before}")))?;
                    XmlNode::Element(done)
                }
                Event::Eof => break,
                Event::CData(_) => {
                    let inner = raw
                        .strip_prefix("<![CDATA[")
                        .and_then(|s| s.strip_suffix("]]>"))
                        .unwrap_or(raw);
                    XmlNode::CData(inner.to_string())
                }
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {
                    XmlNode::Raw(raw.to_string())
                }
                // Character data and entity references: unescape the
                // source slice so "&amp;" and "&#x6642;" come out as text
                _ => {
                    let text = unescape(raw)
                        .map_err(|e| malformed(format!("bad escape at byte {before}: {e}")))?;
                    XmlNode::Text(text.into_owned())
                }
            };

            match stack.last_mut() {
                Some(parent) => append_node(parent, node),
                None => match node {
                    XmlNode::Element(e) if root.is_none() => root = Some(e),
                    XmlNode::Element(_) => {
                        return Err(malformed("more than one root element".to_string()))
                    }
                    other if root.is_none() => prolog.push(other),
                    other => epilog.push(other),
                },
            }
        }

        if !stack.is_empty() {
            return Err(malformed(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
        }
        let root = root.ok_or_else(|| malformed("document has no root element".to_string()))?;
        Ok(Self { prolog, root, epilog })
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for n in &self.prolog {
            write_node(n, &mut out);
        }
        self.root.write_into(&mut out);
        for n in &self.epilog {
            write_node(n, &mut out);
        }
        out
    }
}

/// Adjacent text pieces (text + entity reference + text) are
/// merged into one node so callers see whole strings.
fn append_node(parent: &mut XmlElement, node: XmlNode) {
    if let XmlNode::Text(t) = &node {
        if let Some(XmlNode::Text(prev)) = parent.children.last_mut() {
            prev.push_str(t);
            return;
        }
    }
    parent.children.push(node);
}

fn element_from_start(e: &BytesStart) -> Result<XmlElement, ReviewError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| malformed(format!("tag name is not UTF-8: {err}")))?
        .to_string();

    let mut el = XmlElement::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(format!("bad attribute on <{}>: {err}", el.name)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| malformed(format!("attribute name is not UTF-8: {err}")))?
            .to_string();
        let raw = std::str::from_utf8(attr.value.as_ref())
            .map_err(|err| malformed(format!("attribute value is not UTF-8: {err}")))?;
        let value = unescape(raw)
            .map_err(|err| malformed(format!("bad escape in attribute {key}: {err}")))?
            .into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn malformed(msg: String) -> ReviewError {
    ReviewError::MalformedDocument(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        r#"<w:body><w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">A &amp; B </w:t></w:r></w:p></w:body>"#,
        r#"</w:document>"#
    );

    #[test]
    fn test_round_trip_keeps_prefixes_and_declaration() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root.name, "w:document");
        assert_eq!(doc.to_xml(), SAMPLE);
    }

    #[test]
    fn test_text_is_unescaped_in_tree() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let t = doc.root
            .first_child("w:body").unwrap()
            .first_child("w:p").unwrap()
            .first_child("w:r").unwrap()
            .first_child("w:t").unwrap();
        assert_eq!(t.text(), "A & B ");
        assert_eq!(t.attr("xml:space"), Some("preserve"));
    }

    #[test]
    fn test_character_references_become_text() {
        let doc = XmlDocument::parse("<a>&#x6642;&lt;</a>").unwrap();
        assert_eq!(doc.root.text(), "時<");
    }

    #[test]
    fn test_unclosed_document_is_malformed() {
        let err = XmlDocument::parse("<a><b></b>").unwrap_err();
        assert!(matches!(err, ReviewError::MalformedDocument(_)));
    }

    #[test]
    fn test_mismatched_end_tag_is_malformed() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
    }

    #[test]
    fn test_set_attr_overwrites_in_place() {
        let mut e = XmlElement::new("w:highlight").with_attr("w:val", "yellow");
        e.set_attr("w:val", "red");
        assert_eq!(e.attributes, vec![("w:val".to_string(), "red".to_string())]);
    }
}
