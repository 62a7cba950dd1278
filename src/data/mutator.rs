// ============================================================
// Layer 4 — Paragraph Mutator
// ============================================================
// Writes a reconciled paragraph back into the document tree.
//
// Two steps, and only the second one touches the tree:
//
//   1. assemble_children  builds the complete new child list
//                         from the layout (passthrough children
//                         cloned, rewritten groups replaced)
//   2. replace_runs       checks the paragraph still looks like
//                         it did at collection time, then swaps
//                         the child list in one assignment
//
// If step 1 fails or the shape check in step 2 fails the
// paragraph is exactly as it was.

use crate::data::run_layout::{child_shape, RunLayout, Segment};
use crate::data::xml::{XmlElement, XmlNode};
use crate::domain::error::ReviewError;

/// Build the paragraph's new children.
///
/// `rewritten[i]` holds the runs for the i-th group of the layout,
/// or None when that group is kept verbatim.
pub fn assemble_children(
    paragraph: &XmlElement,
    layout:    &RunLayout,
    rewritten: &[Option<Vec<XmlElement>>],
) -> Result<Vec<XmlNode>, ReviewError> {
    let mut children  = Vec::with_capacity(paragraph.children.len());
    let mut group_idx = 0usize;

    for segment in &layout.segments {
        match segment {
            Segment::Passthrough(i) => children.push(original_child(paragraph, *i)?.clone()),
            Segment::Group(group) => {
                match rewritten.get(group_idx).and_then(Option::as_ref) {
                    Some(runs) => {
                        children.extend(runs.iter().cloned().map(XmlNode::Element));
                    }
                    None => {
                        for i in group.first_child..=group.last_child {
                            children.push(original_child(paragraph, i)?.clone());
                        }
                    }
                }
                group_idx += 1;
            }
        }
    }

    Ok(children)
}

/// Replace every child of `paragraph` with `new_children`.
///
/// `expected_shape` is the child signature recorded when the layout
/// was collected; a mismatch means the paragraph changed underneath
/// us and nothing is written.
pub fn replace_runs(
    paragraph:      &mut XmlElement,
    expected_shape: &[String],
    new_children:   Vec<XmlNode>,
) -> Result<(), ReviewError> {
    let current = child_shape(paragraph);
    if current != expected_shape {
        return Err(ReviewError::TreeInconsistency(format!(
            "paragraph has {} children, layout was collected over {}",
            current.len(),
            expected_shape.len()
        )));
    }
    paragraph.children = new_children;
    Ok(())
}

fn original_child(paragraph: &XmlElement, index: usize) -> Result<&XmlNode, ReviewError> {
    paragraph.children.get(index).ok_or_else(|| {
        ReviewError::TreeInconsistency(format!(
            "layout refers to child {index}, paragraph has {}",
            paragraph.children.len()
        ))
    })
}
