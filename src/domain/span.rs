// ============================================================
// Layer 3 — Spans and Highlight Vocabulary
// ============================================================
// A Span is one located rewrite reported by a classifier stage:
//
//   text:   "いざという時は頼りになる"
//   span:   start=15, end=18, "時" → "とき", SyntacticCorrection
//
// start/end are BYTE offsets into the text the stage received
// (UTF-8, always on character boundaries), not into the
// paragraph's original text. Stages compose, so every stage
// sees the previous stage's output.
//
// The Category decides which highlight colour the reconciler
// paints over the rewritten substring.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::ReviewError;

// ─── Category ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    LexicalCorrection,
    SyntacticCorrection,
    SemanticTemporal,
    SemanticConditional,
    NoHighlight,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LexicalCorrection   => "lexical-correction",
            Self::SyntacticCorrection => "syntactic-correction",
            Self::SemanticTemporal    => "semantic-temporal",
            Self::SemanticConditional => "semantic-conditional",
            Self::NoHighlight         => "no-highlight",
        };
        f.write_str(name)
    }
}

// ─── HighlightColor ───────────────────────────────────────────────────────────
/// The values WordprocessingML accepts in `<w:highlight w:val="…"/>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HighlightColor {
    Yellow,
    Red,
    Blue,
    Green,
    Cyan,
    Magenta,
    DarkBlue,
    DarkCyan,
    DarkGreen,
    DarkMagenta,
    DarkRed,
    DarkYellow,
    DarkGray,
    LightGray,
    Black,
    White,
}

impl HighlightColor {
    /// The literal written into the w:val attribute
    pub fn as_word_value(&self) -> &'static str {
        match self {
            Self::Yellow      => "yellow",
            Self::Red         => "red",
            Self::Blue        => "blue",
            Self::Green       => "green",
            Self::Cyan        => "cyan",
            Self::Magenta     => "magenta",
            Self::DarkBlue    => "darkBlue",
            Self::DarkCyan    => "darkCyan",
            Self::DarkGreen   => "darkGreen",
            Self::DarkMagenta => "darkMagenta",
            Self::DarkRed     => "darkRed",
            Self::DarkYellow  => "darkYellow",
            Self::DarkGray    => "darkGray",
            Self::LightGray   => "lightGray",
            Self::Black       => "black",
            Self::White       => "white",
        }
    }
}

// ─── HighlightPalette ─────────────────────────────────────────────────────────
/// Category → colour. Categories missing from the palette are
/// emitted without a highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightPalette(BTreeMap<Category, HighlightColor>);

impl HighlightPalette {
    pub fn new(entries: impl IntoIterator<Item = (Category, HighlightColor)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn color_for(&self, category: Category) -> Option<HighlightColor> {
        self.0.get(&category).copied()
    }

    /// `no-highlight` must never be given a colour.
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.0.contains_key(&Category::NoHighlight) {
            return Err(ReviewError::Config(
                "palette assigns a colour to 'no-highlight'".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for HighlightPalette {
    fn default() -> Self {
        Self::new([
            (Category::LexicalCorrection,   HighlightColor::Yellow),
            (Category::SyntacticCorrection, HighlightColor::Red),
            (Category::SemanticTemporal,    HighlightColor::Blue),
            (Category::SemanticConditional, HighlightColor::Green),
        ])
    }
}

// ─── Span ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start:       usize,
    pub end:         usize,
    pub original:    String,
    pub replacement: String,
    pub category:    Category,
}

impl Span {
    pub fn new(
        start:       usize,
        original:    impl Into<String>,
        replacement: impl Into<String>,
        category:    Category,
    ) -> Self {
        let original = original.into();
        Self {
            start,
            end: start + original.len(),
            original,
            replacement: replacement.into(),
            category,
        }
    }

    /// The position-free tuple the reconciler works from
    pub fn to_replacement(&self) -> Replacement {
        Replacement {
            original:    self.original.clone(),
            replacement: self.replacement.clone(),
            category:    self.category,
        }
    }
}

/// `(original, replacement, category)`, collected across all
/// stages in order and re-located in the final buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub original:    String,
    pub replacement: String,
    pub category:    Category,
}
