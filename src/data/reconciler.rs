// ============================================================
// Layer 4 — Span Reconciler
// ============================================================
// Turns one run group's final buffer back into runs.
//
// Input:
//   buffer       the group's text after every stage has run
//   tuples       (original, replacement, category) in order
//   source map   final-buffer offset → original group offset
//   group        original run boundaries
//
// Walk:
//   cursor = 0
//   for each tuple:
//     i = buffer.find(replacement, from cursor)
//     miss → drop the tuple (reported, never fatal)
//     hit  → plain runs for [cursor, i)
//            one highlighted run for [i, i + len)
//            cursor = i + len
//   plain runs for [cursor, end)
//
// Plain text is cut wherever the contributing original run
// changes, so each piece gets exactly its own run's <w:rPr>.
// A highlighted run takes the properties of the run under its
// first character. Zero-width markers kept inside the group go
// back in front of the first run that starts at or after their
// original offset.

use crate::data::run_layout::{MarkerSlot, RunGroup};
use crate::data::source_map::SourceMap;
use crate::data::wordml::{make_text_run, WordNamespace};
use crate::data::xml::XmlElement;
use crate::domain::error::ReviewError;
use crate::domain::span::{HighlightColor, HighlightPalette, Replacement};

/// Result of reconciling one run group
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// Replacement children for the whole group, in order: new runs
    /// plus the group's zero-width markers
    pub runs:          Vec<XmlElement>,
    /// Tuples that were located and emitted
    pub applied:       Vec<Replacement>,
    /// Tuples whose replacement was not found after the cursor
    pub dropped:       Vec<Replacement>,
    /// Tuples emitted as plain text because their category has no colour
    pub unhighlighted: Vec<Replacement>,
}

pub struct SpanReconciler<'a> {
    ns:      &'a WordNamespace,
    palette: &'a HighlightPalette,
}

impl<'a> SpanReconciler<'a> {
    pub fn new(ns: &'a WordNamespace, palette: &'a HighlightPalette) -> Self {
        Self { ns, palette }
    }

    /// Rebuild the runs of `group` (children of `paragraph`) for `buffer`.
    pub fn reconcile(
        &self,
        paragraph:  &XmlElement,
        group:      &RunGroup,
        buffer:     &str,
        tuples:     &[Replacement],
        source_map: &SourceMap,
    ) -> Result<Reconciled, ReviewError> {
        let mut out    = Reconciled::default();
        let mut pieces = Vec::new();
        let mut cursor = 0usize;

        for tuple in tuples {
            let found = if tuple.replacement.is_empty() {
                None
            } else {
                buffer[cursor..].find(&tuple.replacement).map(|i| cursor + i)
            };

            let Some(at) = found else {
                tracing::debug!(
                    "'{}' -> '{}' not found after byte {}; dropped",
                    tuple.original, tuple.replacement, cursor
                );
                out.dropped.push(tuple.clone());
                continue;
            };

            self.push_plain(&mut pieces, paragraph, group, buffer, cursor, at, source_map)?;

            let end    = at + tuple.replacement.len();
            let origin = source_map.to_source(at);
            let source = self.source_run(paragraph, group, origin)?;
            let color  = self.palette.color_for(tuple.category);
            if color.is_none() {
                out.unhighlighted.push(tuple.clone());
            }
            pieces.push((origin, self.text_run(source, &buffer[at..end], color)));
            out.applied.push(tuple.clone());
            cursor = end;
        }

        self.push_plain(&mut pieces, paragraph, group, buffer, cursor, buffer.len(), source_map)?;
        out.runs = interleave_markers(paragraph, &group.markers, pieces)?;
        Ok(out)
    }

    /// Emit [from, to) as plain runs, one per contributing original run.
    /// Each piece is paired with its original offset.
    #[allow(clippy::too_many_arguments)]
    fn push_plain(
        &self,
        pieces:     &mut Vec<(usize, XmlElement)>,
        paragraph:  &XmlElement,
        group:      &RunGroup,
        buffer:     &str,
        from:       usize,
        to:         usize,
        source_map: &SourceMap,
    ) -> Result<(), ReviewError> {
        if from >= to {
            return Ok(());
        }

        let mut piece_start  = from;
        let mut piece_origin = source_map.to_source(from);
        let mut piece_owner  = group.run_at(piece_origin).child_index;

        for (offset, _) in buffer[from..to].char_indices() {
            let pos    = from + offset;
            let origin = source_map.to_source(pos);
            let owner  = group.run_at(origin).child_index;
            if owner != piece_owner {
                let source = child_run(paragraph, piece_owner)?;
                pieces.push((piece_origin, self.text_run(source, &buffer[piece_start..pos], None)));
                piece_start  = pos;
                piece_origin = origin;
                piece_owner  = owner;
            }
        }

        let source = child_run(paragraph, piece_owner)?;
        pieces.push((piece_origin, self.text_run(source, &buffer[piece_start..to], None)));
        Ok(())
    }

    fn source_run<'p>(
        &self,
        paragraph: &'p XmlElement,
        group:     &RunGroup,
        offset:    usize,
    ) -> Result<&'p XmlElement, ReviewError> {
        child_run(paragraph, group.run_at(offset).child_index)
    }

    fn text_run(&self, source: &XmlElement, text: &str, color: Option<HighlightColor>) -> XmlElement {
        make_text_run(self.ns, source, text, color)
    }
}

/// Put each marker in front of the first piece whose original offset
/// is at or after the marker's; leftovers go at the end.
fn interleave_markers(
    paragraph: &XmlElement,
    markers:   &[MarkerSlot],
    pieces:    Vec<(usize, XmlElement)>,
) -> Result<Vec<XmlElement>, ReviewError> {
    let mut out     = Vec::with_capacity(pieces.len() + markers.len());
    let mut pending = markers.iter().peekable();

    for (origin, run) in pieces {
        while let Some(m) = pending.next_if(|m| m.offset <= origin) {
            out.push(child_run(paragraph, m.child_index)?.clone());
        }
        out.push(run);
    }
    for m in pending {
        out.push(child_run(paragraph, m.child_index)?.clone());
    }
    Ok(out)
}

fn child_run(paragraph: &XmlElement, index: usize) -> Result<&XmlElement, ReviewError> {
    paragraph
        .children
        .get(index)
        .and_then(|n| n.as_element())
        .ok_or_else(|| {
            ReviewError::TreeInconsistency(format!("paragraph child {index} is not a run"))
        })
}
