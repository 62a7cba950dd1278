// ============================================================
// Layer 3 — Classification Trace
// ============================================================
// Every classifier decision is written down as one entry:
//
//   (stage, input token, annotation, decision)
//
// Stages append to an in-memory ClassificationTrace while they
// work on a paragraph; the orchestrator flushes it to a
// TraceSink once the paragraph is done. Entries are for humans
// reading the log afterwards; nothing in the pipeline reads
// them back.

use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The token was rewritten to the given text
    Rewrite(String),
    /// The token was looked at and kept as is
    Keep,
    /// The oracle answered without a usable verdict
    AmbiguousVerdict,
    /// A reported replacement was no longer in the buffer
    SpanNotFound,
    /// The span's category has no highlight colour
    Unhighlighted,
    /// Informational line (text before/after, raw oracle output)
    Note,
    /// The stage failed; the paragraph stays unmodified
    Failed(String),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rewrite(to)      => write!(f, "rewrite -> {to}"),
            Self::Keep             => write!(f, "keep"),
            Self::AmbiguousVerdict => write!(f, "ambiguous verdict, no change"),
            Self::SpanNotFound     => write!(f, "span not found, dropped"),
            Self::Unhighlighted    => write!(f, "no highlight colour, emitted plain"),
            Self::Note             => write!(f, "-"),
            Self::Failed(msg)      => write!(f, "failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub stage:      String,
    pub token:      String,
    pub annotation: String,
    pub decision:   Decision,
}

impl TraceEntry {
    pub fn new(
        stage:      impl Into<String>,
        token:      impl Into<String>,
        annotation: impl Into<String>,
        decision:   Decision,
    ) -> Self {
        Self {
            stage:      stage.into(),
            token:      token.into(),
            annotation: annotation.into(),
            decision,
        }
    }
}

/// Ordered entries for one paragraph.
#[derive(Debug, Clone, Default)]
pub struct ClassificationTrace {
    pub paragraph: usize,
    entries:       Vec<TraceEntry>,
}

impl ClassificationTrace {
    pub fn new(paragraph: usize) -> Self {
        Self { paragraph, entries: Vec::new() }
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Render every entry as one human-readable line
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(move |e| {
            format!(
                "[p{}] {:<10} {} | {} | {}",
                self.paragraph, e.stage, e.token, e.annotation, e.decision
            )
        })
    }
}

// ─── TraceSink ────────────────────────────────────────────────────────────────
/// Append-only destination for paragraph traces.
///
/// Implementations:
///   - FileTraceSink   → one line per entry in a text file
///   - MemoryTraceSink → keeps lines in a Vec (tests)
///   - NullTraceSink   → drops everything
pub trait TraceSink {
    fn flush_paragraph(&mut self, trace: &ClassificationTrace) -> Result<()>;
}
