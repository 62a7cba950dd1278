// ============================================================
// Layer 4 — Run Collection
// ============================================================
// Reads one paragraph and splits its children into segments:
//
//   <w:pPr/> <w:r>いざ</w:r> <w:r>という時</w:r> <w:r><w:tab/></w:r> <w:r>外</w:r>
//   └ pass ┘ └────────── group 0 ───────────┘ └──── pass ─────┘ └ group 1 ┘
//
// A group is a maximal run of adjacent mergeable runs. Its
// combined text is what the classifiers see; its boundary list
// remembers which byte range came from which original run so
// the reconciler can give every piece of text back its own
// formatting. Anything that is not a mergeable run (paragraph
// properties, tabs, drawings, hyperlinks …) is a passthrough
// segment and breaks the group.
//
// Zero-width markers between two member runs do not break it:
//
//   <w:r>いざという</w:r> <w:proofErr/> <w:r>時</w:r>
//   └─────────────────── group 0 ─────────────────┘
//                          marker at offset 15
//
// The group remembers each marker's offset so the rebuilt runs
// can put it back at the same place in the text.

use crate::data::wordml::{is_mergeable_run, is_zero_width_marker, run_text, WordNamespace};
use crate::data::xml::{XmlElement, XmlNode};
use crate::domain::error::ReviewError;

/// Byte range of a group's combined text contributed by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSlice {
    pub start:       usize,
    pub end:         usize,
    /// Index of the run among the paragraph's children
    pub child_index: usize,
}

/// A zero-width marker kept inside a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSlot {
    /// Byte offset in the group's text the marker sits at
    pub offset:      usize,
    pub child_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunGroup {
    pub text:        String,
    pub runs:        Vec<RunSlice>,
    /// Markers between member runs, in document order
    pub markers:     Vec<MarkerSlot>,
    /// First and last paragraph child covered by the group.
    /// Whitespace-only text and markers between member runs are
    /// inside this range.
    pub first_child: usize,
    pub last_child:  usize,
}

impl RunGroup {
    /// The run that contributed the byte at `offset`.
    /// Offsets at (or past) the end resolve to the last run.
    pub fn run_at(&self, offset: usize) -> &RunSlice {
        self.runs
            .iter()
            .find(|r| r.start <= offset && offset < r.end)
            .or_else(|| self.runs.iter().rev().find(|r| r.end > r.start))
            .unwrap_or(&self.runs[0])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Group(RunGroup),
    /// A child left exactly where it is
    Passthrough(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub segments: Vec<Segment>,
    /// Child names at collection time ("w:r", "#text" …)
    pub shape:    Vec<String>,
}

impl RunLayout {
    pub fn groups(&self) -> impl Iterator<Item = &RunGroup> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Group(g) => Some(g),
            Segment::Passthrough(_) => None,
        })
    }

    /// Concatenation of every group's text, in document order
    pub fn combined_text(&self) -> String {
        self.groups().map(|g| g.text.as_str()).collect()
    }
}

/// Shape signature of a paragraph's children
pub fn child_shape(paragraph: &XmlElement) -> Vec<String> {
    paragraph
        .children
        .iter()
        .map(|n| match n {
            XmlNode::Element(e) => e.name.clone(),
            XmlNode::Text(_)    => "#text".to_string(),
            XmlNode::CData(_)   => "#cdata".to_string(),
            XmlNode::Raw(_)     => "#raw".to_string(),
        })
        .collect()
}

struct GroupBuilder {
    group:   RunGroup,
    /// Blanks and markers seen since the last member run
    pending: Vec<usize>,
}

/// Collect the mergeable runs of a paragraph.
///
/// Returns EmptyParagraph when no run carries any text; callers
/// treat that as "skip", not as a failure.
pub fn collect_mergeable_runs(
    ns:        &WordNamespace,
    paragraph: &XmlElement,
) -> Result<RunLayout, ReviewError> {
    let mut segments: Vec<Segment>          = Vec::new();
    let mut current:  Option<GroupBuilder>  = None;

    for (index, child) in paragraph.children.iter().enumerate() {
        match child {
            XmlNode::Element(run) if ns.is(run, "r") && is_mergeable_run(ns, run) => {
                let text = run_text(ns, run);
                let b = current.get_or_insert_with(|| GroupBuilder {
                    group: RunGroup {
                        text:        String::new(),
                        runs:        Vec::new(),
                        markers:     Vec::new(),
                        first_child: index,
                        last_child:  index,
                    },
                    pending: Vec::new(),
                });
                let start = b.group.text.len();
                for i in b.pending.drain(..) {
                    if matches!(paragraph.children.get(i), Some(XmlNode::Element(_))) {
                        b.group.markers.push(MarkerSlot { offset: start, child_index: i });
                    }
                }
                b.group.text.push_str(&text);
                b.group.runs.push(RunSlice {
                    start,
                    end: b.group.text.len(),
                    child_index: index,
                });
                b.group.last_child = index;
            }
            node if current.is_some() && (node.is_blank_text() || is_marker_node(ns, node)) => {
                if let Some(b) = current.as_mut() {
                    b.pending.push(index);
                }
            }
            _ => {
                close_group(&mut current, &mut segments);
                segments.push(Segment::Passthrough(index));
            }
        }
    }
    close_group(&mut current, &mut segments);

    let layout = RunLayout { segments, shape: child_shape(paragraph) };
    if layout.groups().all(|g| g.text.is_empty()) {
        return Err(ReviewError::EmptyParagraph);
    }
    Ok(layout)
}

fn is_marker_node(ns: &WordNamespace, node: &XmlNode) -> bool {
    matches!(node, XmlNode::Element(e) if is_zero_width_marker(ns, e))
}

fn close_group(current: &mut Option<GroupBuilder>, segments: &mut Vec<Segment>) {
    if let Some(b) = current.take() {
        segments.push(Segment::Group(b.group));
        // whitespace and markers after the last member run stay outside
        segments.extend(b.pending.into_iter().map(Segment::Passthrough));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::xml::XmlDocument;

    fn para(xml: &str) -> XmlElement {
        XmlDocument::parse(xml).unwrap().root
    }

    #[test]
    fn test_adjacent_text_runs_form_one_group() {
        let p = para("<w:p><w:pPr/><w:r><w:rPr><w:b/></w:rPr><w:t>いざ</w:t></w:r><w:r><w:t>という時</w:t></w:r></w:p>");
        let layout = collect_mergeable_runs(&WordNamespace::default(), &p).unwrap();

        assert_eq!(layout.segments.len(), 2);
        assert_eq!(layout.segments[0], Segment::Passthrough(0));
        let g = layout.groups().next().unwrap();
        assert_eq!(g.text, "いざという時");
        assert_eq!(g.runs.len(), 2);
        assert_eq!(g.runs[0], RunSlice { start: 0, end: 6, child_index: 1 });
        assert_eq!(g.runs[1].child_index, 2);
        assert_eq!((g.first_child, g.last_child), (1, 2));
    }

    #[test]
    fn test_tab_and_drawing_break_groups() {
        let p = para(concat!(
            "<w:p>",
            "<w:r><w:t>他の</w:t></w:r>",
            "<w:r><w:tab/></w:r>",
            "<w:r><w:t>時</w:t></w:r>",
            "<w:r><w:drawing/></w:r>",
            "<w:r><w:t>外</w:t></w:r>",
            "</w:p>"
        ));
        let layout = collect_mergeable_runs(&WordNamespace::default(), &p).unwrap();

        let texts: Vec<&str> = layout.groups().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["他の", "時", "外"]);
        assert_eq!(layout.combined_text(), "他の時外");
        assert!(layout.segments.contains(&Segment::Passthrough(1)));
        assert!(layout.segments.contains(&Segment::Passthrough(3)));
    }

    #[test]
    fn test_whitespace_between_runs_does_not_break_group() {
        let p = para("<w:p>\n  <w:r><w:t>いざ</w:t></w:r>\n  <w:r><w:t>時</w:t></w:r>\n</w:p>");
        let layout = collect_mergeable_runs(&WordNamespace::default(), &p).unwrap();

        assert_eq!(layout.groups().count(), 1);
        let g = layout.groups().next().unwrap();
        assert_eq!((g.first_child, g.last_child), (1, 3));
        // leading and trailing whitespace are passthrough
        assert_eq!(layout.segments.first(), Some(&Segment::Passthrough(0)));
        assert_eq!(layout.segments.last(), Some(&Segment::Passthrough(4)));
    }

    #[test]
    fn test_zero_width_markers_stay_inside_group() {
        let p = para(concat!(
            "<w:p>",
            "<w:bookmarkStart w:id=\"0\" w:name=\"a\"/>",
            "<w:r><w:t>いざという</w:t></w:r>",
            "<w:proofErr w:type=\"spellStart\"/>",
            "<w:r><w:t>時</w:t></w:r>",
            "<w:proofErr w:type=\"spellEnd\"/>",
            "<w:r><w:t>は頼りになる</w:t></w:r>",
            "<w:bookmarkEnd w:id=\"0\"/>",
            "</w:p>"
        ));
        let layout = collect_mergeable_runs(&WordNamespace::default(), &p).unwrap();

        assert_eq!(layout.groups().count(), 1);
        let g = layout.groups().next().unwrap();
        assert_eq!(g.text, "いざという時は頼りになる");
        assert_eq!((g.first_child, g.last_child), (1, 5));
        assert_eq!(
            g.markers,
            vec![
                MarkerSlot { offset: 15, child_index: 2 },
                MarkerSlot { offset: 18, child_index: 4 },
            ]
        );
        // markers outside the first and last run are passthrough
        assert_eq!(layout.segments.first(), Some(&Segment::Passthrough(0)));
        assert_eq!(layout.segments.last(), Some(&Segment::Passthrough(6)));
    }

    #[test]
    fn test_paragraph_without_text_is_empty() {
        let p = para("<w:p><w:pPr/><w:r><w:drawing/></w:r></w:p>");
        let err = collect_mergeable_runs(&WordNamespace::default(), &p).unwrap_err();
        assert_eq!(err, ReviewError::EmptyParagraph);
    }

    #[test]
    fn test_run_at_resolves_boundaries() {
        let p = para("<w:p><w:r><w:t>ab</w:t></w:r><w:r><w:t></w:t></w:r><w:r><w:t>cd</w:t></w:r></w:p>");
        let layout = collect_mergeable_runs(&WordNamespace::default(), &p).unwrap();
        let g = layout.groups().next().unwrap();

        assert_eq!(g.run_at(0).child_index, 0);
        assert_eq!(g.run_at(1).child_index, 0);
        assert_eq!(g.run_at(2).child_index, 2);
        assert_eq!(g.run_at(4).child_index, 2);
    }
}
