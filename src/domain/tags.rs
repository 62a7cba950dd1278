// ============================================================
// Layer 3 — Collaborator Tag Sets
// ============================================================
// Closed enumerations for the free-form tag strings that the
// tokenizer, dependency parser and role labeler hand back.
// Each one keeps an Unrecognized variant carrying the raw tag
// so nothing is lost in the trace.
//
//   PartOfSpeech    ← IPAdic / UniDic top-level class ("名詞-一般")
//   DependencyLabel ← Universal Dependencies relation ("obl", "ROOT")
//   SemanticRole    ← PropBank-style argument tag ("B-ARGM-TMP")

use serde::{Deserialize, Serialize};
use std::fmt;

// ─── PartOfSpeech ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Particle,
    AuxiliaryVerb,
    Conjunction,
    Adnominal,
    Interjection,
    Prefix,
    Suffix,
    Symbol,
    Unrecognized(String),
}

impl PartOfSpeech {
    /// Classify a morphological POS string by its top-level class.
    /// Sub-classes after the first '-' or ',' are ignored.
    pub fn from_tag(tag: &str) -> Self {
        let head = tag
            .split(|c: char| c == '-' || c == ',')
            .next()
            .unwrap_or("")
            .trim();

        match head {
            "名詞" | "代名詞"           => Self::Noun,
            "動詞"                      => Self::Verb,
            "形容詞" | "形状詞"         => Self::Adjective,
            "副詞"                      => Self::Adverb,
            "助詞"                      => Self::Particle,
            "助動詞"                    => Self::AuxiliaryVerb,
            "接続詞"                    => Self::Conjunction,
            "連体詞"                    => Self::Adnominal,
            "感動詞"                    => Self::Interjection,
            "接頭詞" | "接頭辞"         => Self::Prefix,
            "接尾辞"                    => Self::Suffix,
            "記号" | "補助記号"         => Self::Symbol,
            _                           => Self::Unrecognized(tag.to_string()),
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(raw) => write!(f, "?{raw}"),
            other => write!(f, "{other:?}"),
        }
    }
}

// ─── DependencyLabel ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyLabel {
    Root,
    Oblique,
    NominalSubject,
    Object,
    NominalModifier,
    AdverbialClause,
    AdverbialModifier,
    AdnominalClause,
    Case,
    Auxiliary,
    Marker,
    Copula,
    Compound,
    Punctuation,
    Unrecognized(String),
}

impl DependencyLabel {
    /// Map a UD relation (with or without a ":subtype") to a label.
    /// Matching is case-insensitive so spaCy's "ROOT" works too.
    pub fn from_tag(tag: &str) -> Self {
        let lower = tag.trim().to_ascii_lowercase();
        let base  = lower.split(':').next().unwrap_or("");

        match base {
            "root"             => Self::Root,
            "obl"              => Self::Oblique,
            "nsubj" | "csubj"  => Self::NominalSubject,
            "obj" | "iobj"     => Self::Object,
            "nmod"             => Self::NominalModifier,
            "advcl"            => Self::AdverbialClause,
            "advmod"           => Self::AdverbialModifier,
            "acl"              => Self::AdnominalClause,
            "case"             => Self::Case,
            "aux"              => Self::Auxiliary,
            "mark"             => Self::Marker,
            "cop"              => Self::Copula,
            "compound"         => Self::Compound,
            "punct"            => Self::Punctuation,
            _                  => Self::Unrecognized(tag.to_string()),
        }
    }
}

impl fmt::Display for DependencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root              => write!(f, "root"),
            Self::Oblique           => write!(f, "obl"),
            Self::NominalSubject    => write!(f, "nsubj"),
            Self::Object            => write!(f, "obj"),
            Self::NominalModifier   => write!(f, "nmod"),
            Self::AdverbialClause   => write!(f, "advcl"),
            Self::AdverbialModifier => write!(f, "advmod"),
            Self::AdnominalClause   => write!(f, "acl"),
            Self::Case              => write!(f, "case"),
            Self::Auxiliary         => write!(f, "aux"),
            Self::Marker            => write!(f, "mark"),
            Self::Copula            => write!(f, "cop"),
            Self::Compound          => write!(f, "compound"),
            Self::Punctuation       => write!(f, "punct"),
            Self::Unrecognized(raw) => write!(f, "?{raw}"),
        }
    }
}

// ─── SemanticRole ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticRole {
    /// ARGM-TMP: the token anchors a point or span in time
    Temporal,
    /// ARGM-PRP: the token frames a purpose or condition
    Conditional,
    /// "O" or an empty tag
    Outside,
    Unrecognized(String),
}

impl SemanticRole {
    /// Accepts BIO-prefixed tags ("B-ARGM-TMP", "I-TMP") as well as bare ones.
    pub fn from_tag(tag: &str) -> Self {
        let t = tag.trim().to_ascii_uppercase();
        if t.is_empty() || t == "O" {
            return Self::Outside;
        }
        let body = t
            .strip_prefix("B-")
            .or_else(|| t.strip_prefix("I-"))
            .unwrap_or(t.as_str());
        let body = body.strip_prefix("ARGM-").unwrap_or(body);

        match body {
            "TMP" => Self::Temporal,
            "PRP" => Self::Conditional,
            _     => Self::Unrecognized(tag.to_string()),
        }
    }
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporal          => write!(f, "ARGM-TMP"),
            Self::Conditional       => write!(f, "ARGM-PRP"),
            Self::Outside           => write!(f, "O"),
            Self::Unrecognized(raw) => write!(f, "?{raw}"),
        }
    }
}
