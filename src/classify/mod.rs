// ============================================================
// Layer 5 — Classifier Stages
// ============================================================
// This layer holds ALL linguistic decision code. Every stage
// has the same shape:
//
//   classify(text, trace) -> Vec<Span>
//
// where the spans are over `text` exactly as the stage got it.
// Stages are chained by the orchestrator: stage N+1 sees the
// text stage N produced, never the paragraph's original text.
//
// What's in this layer:
//
//   lexical.rs   — surface + reading + part-of-speech rules
//                  (他/外 → ほか)
//
//   syntactic.rs — dependency-label rules for the 時/とき pair,
//                  readings re-derived from the rewritten text
//
//   oracle.rs    — one few-shot query to a judgment service,
//                  last verdict marker decides
//
//   semantic.rs  — semantic-role rules (temporal / conditional)
//
// Collaborators (tokenizer, parser, labeler, oracle) come in
// as trait objects from Layer 3, so this layer never knows
// whether it is talking to MeCab, a subprocess, an HTTP
// endpoint, or a test fake.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::ReviewError;
use crate::domain::span::Span;
use crate::domain::trace::ClassificationTrace;

/// Dictionary-based rewrite of homograph nouns
pub mod lexical;

/// Dependency-label resolution of the written/kana pair
pub mod syntactic;

/// External judgment service with verdict extraction
pub mod oracle;

/// Semantic-role resolution of the written/kana pair
pub mod semantic;

/// In-memory collaborators for tests
#[cfg(test)]
pub mod fakes;

// ─── Stage contract ───────────────────────────────────────────────────────────

/// One classifier pass over a text buffer
pub trait ClassifierStage {
    /// Short name used in traces and logs
    fn name(&self) -> &'static str;

    /// Spans over `text`. Decisions go into `trace`.
    fn classify(&self, text: &str, trace: &mut ClassificationTrace) -> Result<Vec<Span>, ReviewError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Lexical,
    Syntactic,
    Oracle,
    Semantic,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lexical   => "lexical",
            Self::Syntactic => "syntactic",
            Self::Oracle    => "oracle",
            Self::Semantic  => "semantic",
        };
        f.write_str(name)
    }
}

/// Named stage orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// lexical → syntactic
    #[default]
    Rules,
    /// lexical → oracle
    Oracle,
    /// lexical → syntactic → semantic
    Semantic,
    /// the `custom_stages` list from the settings file
    Custom,
}

impl Strategy {
    pub fn stages(&self, custom: &[StageKind]) -> Vec<StageKind> {
        match self {
            Self::Rules    => vec![StageKind::Lexical, StageKind::Syntactic],
            Self::Oracle   => vec![StageKind::Lexical, StageKind::Oracle],
            Self::Semantic => vec![StageKind::Lexical, StageKind::Syntactic, StageKind::Semantic],
            Self::Custom   => custom.to_vec(),
        }
    }
}

// ─── Shared vocabulary ────────────────────────────────────────────────────────

/// The ambiguous pair the syntactic, semantic and oracle stages decide
/// between: a kanji spelling and its kana spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomographPair {
    /// "A": 時
    pub written: String,
    /// "B": とき
    pub kana:    String,
}

impl Default for HomographPair {
    fn default() -> Self {
        Self {
            written: "時".to_string(),
            kana:    "とき".to_string(),
        }
    }
}

impl HomographPair {
    pub fn contains(&self, surface: &str) -> bool {
        surface == self.written || surface == self.kana
    }

    pub fn occurs_in(&self, text: &str) -> bool {
        text.contains(&self.written) || text.contains(&self.kana)
    }
}

/// Locate token surfaces in `text` left to right.
///
/// Collaborators may drop whitespace or normalise nothing at all, so
/// tokens are searched from a running cursor instead of summing
/// lengths. A token that cannot be found maps to None and the cursor
/// stays put, so one odd token does not shift everything after it.
pub fn locate_tokens<'s, I>(text: &str, surfaces: I) -> Vec<Option<usize>>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut cursor = 0usize;
    surfaces
        .into_iter()
        .map(|surface| {
            if surface.is_empty() {
                return None;
            }
            let at = text[cursor..].find(surface).map(|i| cursor + i)?;
            cursor = at + surface.len();
            Some(at)
        })
        .collect()
}
