// ============================================================
// Layer 4 — Source Map
// ============================================================
// Tracks where each byte of the rewritten buffer came from.
//
// Every classifier stage turns its input into an output by
// replacing a few non-overlapping spans. One stage's edits are
// enough to map an output offset back to an input offset:
//
//   input:   い ざ と い う 時 は …          ("時" at 15..18)
//   output:  い ざ と い う と き は …       ("とき" at 15..21)
//
//   out 0..15   → in 0..15       (copied, same offset)
//   out 15..21  → in 15          (inside the replacement)
//   out 21..    → in 21 - 3 ..   (copied, shifted by the growth)
//
// Stacking one layer per stage maps the final buffer all the way
// back to the paragraph's original combined text, which is what
// the reconciler needs to pick the right run's formatting.

use crate::domain::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edit {
    /// Replaced range in the stage's input
    start:           usize,
    end:             usize,
    replacement_len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    /// One layer per applied stage, oldest first
    layers: Vec<Vec<Edit>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage's spans. Spans must be sorted and non-overlapping
    /// (apply_spans guarantees both).
    pub fn push_layer(&mut self, spans: &[Span]) {
        let edits = spans
            .iter()
            .map(|s| Edit {
                start:           s.start,
                end:             s.end,
                replacement_len: s.replacement.len(),
            })
            .collect();
        self.layers.push(edits);
    }

    /// Map an offset in the final buffer to an offset in the original text
    pub fn to_source(&self, offset: usize) -> usize {
        self.layers
            .iter()
            .rev()
            .fold(offset, |pos, edits| map_back(edits, pos))
    }
}

fn map_back(edits: &[Edit], pos: usize) -> usize {
    // out_pos - in_pos for everything before the current edit
    let mut growth: isize = 0;

    for edit in edits {
        let out_start = (edit.start as isize + growth) as usize;
        if pos < out_start {
            break;
        }
        let out_end = out_start + edit.replacement_len;
        if pos < out_end {
            return edit.start;
        }
        growth += edit.replacement_len as isize - (edit.end - edit.start) as isize;
    }

    (pos as isize - growth).max(0) as usize
}

/// Map an input offset of a stage forward into that stage's output.
/// `spans` are the stage's accepted spans (sorted, non-overlapping).
/// An offset inside a replaced range lands on the replacement's start.
pub fn project_forward(spans: &[Span], pos: usize) -> usize {
    let mut growth: isize = 0;
    for s in spans {
        if pos < s.start {
            break;
        }
        if pos < s.end {
            return (s.start as isize + growth) as usize;
        }
        growth += s.replacement.len() as isize - (s.end - s.start) as isize;
    }
    (pos as isize + growth).max(0) as usize
}

/// Apply a stage's spans to its input text.
///
/// Spans that are out of bounds, not on character boundaries, do
/// not match the text they claim to replace, or overlap an earlier
/// span are rejected and returned separately so the caller can
/// trace them.
pub fn apply_spans(input: &str, mut spans: Vec<Span>) -> (String, Vec<Span>, Vec<Span>) {
    spans.sort_by_key(|s| s.start);

    let mut out      = String::with_capacity(input.len());
    let mut accepted = Vec::with_capacity(spans.len());
    let mut rejected = Vec::new();
    let mut cursor   = 0usize;

    for span in spans {
        let valid = span.start >= cursor
            && span.end <= input.len()
            && span.start <= span.end
            && input.is_char_boundary(span.start)
            && input.is_char_boundary(span.end)
            && input[span.start..span.end] == span.original;

        if !valid {
            rejected.push(span);
            continue;
        }

        out.push_str(&input[cursor..span.start]);
        out.push_str(&span.replacement);
        cursor = span.end;
        accepted.push(span);
    }
    out.push_str(&input[cursor..]);

    (out, accepted, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::span::Category;

    fn span(input: &str, original: &str, replacement: &str) -> Span {
        let start = input.find(original).unwrap();
        Span::new(start, original, replacement, Category::SyntacticCorrection)
    }

    #[test]
    fn test_apply_spans_rewrites_left_to_right() {
        let input = "他の時は他";
        let s1 = Span::new(0, "他", "ほか", Category::LexicalCorrection);
        let s2 = Span::new(input.rfind("他").unwrap(), "他", "ほか", Category::LexicalCorrection);
        let (out, accepted, rejected) = apply_spans(input, vec![s2, s1]);
        assert_eq!(out, "ほかの時はほか");
        assert_eq!(accepted.len(), 2);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_apply_spans_rejects_mismatch_and_overlap() {
        let input = "いざという時";
        let good = span(input, "時", "とき");
        let wrong_text = Span::new(0, "外", "ほか", Category::LexicalCorrection);
        let overlap = Span::new(good.start, "時", "じ", Category::NoHighlight);
        let (out, accepted, rejected) = apply_spans(input, vec![good, wrong_text, overlap]);
        assert_eq!(out, "いざというとき");
        assert_eq!(accepted.len(), 1);
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn test_source_map_through_growth() {
        let input = "いざという時は頼りになる";
        let s = span(input, "時", "とき");
        let (out, accepted, _) = apply_spans(input, vec![s]);

        let mut map = SourceMap::new();
        map.push_layer(&accepted);

        // before the edit: identity
        assert_eq!(map.to_source(3), 3);
        // inside the replacement: start of the original span
        let t = out.find("とき").unwrap();
        assert_eq!(map.to_source(t + 3), input.find("時").unwrap());
        // after the edit: shifted back by the 3 extra bytes
        let ha = out.find("は").unwrap();
        assert_eq!(map.to_source(ha), input.find("は").unwrap());
        assert_eq!(map.to_source(out.len()), input.len());
    }

    #[test]
    fn test_project_forward_shifts_later_offsets() {
        let input = "他の時";
        let (out, accepted, _) = apply_spans(input, vec![span(input, "他", "ほか")]);
        let ji = input.find("時").unwrap();
        assert_eq!(project_forward(&accepted, ji), out.find("時").unwrap());
        assert_eq!(project_forward(&accepted, 0), 0);
        assert_eq!(project_forward(&accepted, 1), 0);
    }

    #[test]
    fn test_source_map_composes_two_layers() {
        let original = "他の時";
        let (mid, a1, _) = apply_spans(original, vec![span(original, "他", "ほか")]);
        let (fin, a2, _) = apply_spans(&mid, vec![span(&mid, "時", "とき")]);
        assert_eq!(fin, "ほかのとき");

        let mut map = SourceMap::new();
        map.push_layer(&a1);
        map.push_layer(&a2);

        assert_eq!(map.to_source(fin.find("の").unwrap()), original.find("の").unwrap());
        assert_eq!(map.to_source(fin.find("とき").unwrap()), original.find("時").unwrap());
    }
}
