// ============================================================
// Layer 4 — Run Merger
// ============================================================
// Used by `unpack`: collapses adjacent text runs that carry the
// same formatting into one run, so a word that Word split into
// five <w:r> elements (spell-check marks, rsid churn) reads as
// one contiguous string.
//
//   <w:r><w:rPr><w:b/></w:rPr><w:t>いざ</w:t></w:r>
//   <w:r><w:rPr><w:b/></w:rPr><w:t>という</w:t></w:r>    →   <w:r><w:rPr><w:b/></w:rPr><w:t>いざという時</w:t></w:r>
//   <w:r><w:rPr><w:b/></w:rPr><w:t>時</w:t></w:r>
//
// Tabs, page breaks, drawings and pictures stay where they are
// and are never merged across. Runs with different properties
// are never merged either, so no formatting is lost.

use crate::data::run_layout::{collect_mergeable_runs, RunGroup};
use crate::data::wordml::{
    for_each_paragraph_mut, make_text_run, run_props, run_scopes, scope_mut, WordNamespace,
};
use crate::data::xml::{XmlElement, XmlNode};
use crate::data::mutator::{assemble_children, replace_runs};
use crate::domain::error::ReviewError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub paragraphs: usize,
    pub runs_before: usize,
    pub runs_after:  usize,
}

/// Merge runs in every top-level paragraph under `root`
pub fn merge_document_runs(ns: &WordNamespace, root: &mut XmlElement) -> Result<MergeStats, ReviewError> {
    let mut stats = MergeStats::default();
    let mut error = None;

    for_each_paragraph_mut(ns, root, &mut |index, paragraph| {
        if error.is_some() {
            return;
        }
        match merge_paragraph_runs(ns, paragraph) {
            Ok((before, after)) => {
                stats.paragraphs  += 1;
                stats.runs_before += before;
                stats.runs_after  += after;
            }
            Err(ReviewError::EmptyParagraph) => {}
            Err(e) => error = Some((index, e)),
        }
    });

    match error {
        Some((index, e)) => {
            tracing::warn!("Paragraph {index}: run merge aborted: {e}");
            Err(e)
        }
        None => Ok(stats),
    }
}

/// Merge one paragraph, including runs inside hyperlinks and other
/// inline containers. Returns (text runs before, text runs after).
pub fn merge_paragraph_runs(
    ns:        &WordNamespace,
    paragraph: &mut XmlElement,
) -> Result<(usize, usize), ReviewError> {
    let mut totals = None;

    for path in run_scopes(ns, paragraph) {
        let Some(el) = scope_mut(paragraph, &path) else { continue };
        match merge_scope_runs(ns, el) {
            Ok((before, after)) => {
                let (b, a) = totals.get_or_insert((0, 0));
                *b += before;
                *a += after;
            }
            Err(ReviewError::EmptyParagraph) => {}
            Err(e) => return Err(e),
        }
    }

    totals.ok_or(ReviewError::EmptyParagraph)
}

fn merge_scope_runs(
    ns:        &WordNamespace,
    paragraph: &mut XmlElement,
) -> Result<(usize, usize), ReviewError> {
    let layout = collect_mergeable_runs(ns, paragraph)?;

    let mut before    = 0;
    let mut after     = 0;
    let mut rewritten = Vec::new();

    for group in layout.groups() {
        let merged = merge_group(ns, paragraph, group);
        before += group.runs.len();
        after  += merged
            .as_ref()
            .map(|m| m.iter().filter(|e| ns.is(e, "r")).count())
            .unwrap_or(group.runs.len());
        rewritten.push(merged);
    }

    if rewritten.iter().all(Option::is_none) {
        return Ok((before, after));
    }

    let children = assemble_children(paragraph, &layout, &rewritten)?;
    replace_runs(paragraph, &layout.shape, children)?;
    Ok((before, after))
}

/// New runs for a group, or None when nothing in it can be merged.
/// Zero-width markers end a merge and keep their place.
fn merge_group(ns: &WordNamespace, paragraph: &XmlElement, group: &RunGroup) -> Option<Vec<XmlElement>> {
    let runs: Vec<&XmlElement> = group
        .runs
        .iter()
        .filter_map(|slice| paragraph.children.get(slice.child_index).and_then(XmlNode::as_element))
        .collect();
    if runs.len() != group.runs.len() {
        return None;
    }

    let mut merged:    Vec<XmlElement> = Vec::new();
    let mut run_count  = 0usize;
    let mut head:      Option<(&XmlElement, String)> = None;
    let mut markers    = group.markers.iter().peekable();

    for (run, slice) in runs.iter().zip(&group.runs) {
        let mut crossed = false;
        while let Some(m) = markers.next_if(|m| m.child_index < slice.child_index) {
            if let Some((first, acc)) = head.take() {
                merged.push(make_text_run(ns, first, &acc, None));
                run_count += 1;
            }
            merged.push(paragraph.children.get(m.child_index)?.as_element()?.clone());
            crossed = true;
        }

        let text = &group.text[slice.start..slice.end];
        let same_props = !crossed
            && head
                .as_ref()
                .map(|(first, _)| run_props(ns, first) == run_props(ns, run))
                .unwrap_or(false);

        if same_props {
            if let Some((_, acc)) = head.as_mut() {
                acc.push_str(text);
            }
            continue;
        }
        if let Some((first, acc)) = head.take() {
            merged.push(make_text_run(ns, first, &acc, None));
            run_count += 1;
        }
        head = Some((*run, text.to_string()));
    }
    if let Some((first, acc)) = head {
        merged.push(make_text_run(ns, first, &acc, None));
        run_count += 1;
    }

    (run_count < group.runs.len()).then_some(merged)
}
