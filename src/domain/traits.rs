// ============================================================
// Layer 3 — Collaborator Traits
// ============================================================
// The linguistic backends the pipeline consumes but does not
// implement. Each is a narrow trait so the classifier stages
// only ever see these signatures:
//
//   Tokenizer           text → [(surface, reading, POS)]
//   DependencyParser    text → [(surface, dependency label)]
//   SemanticRoleLabeler text → [(surface, semantic role)]
//   Oracle              prompt → raw response text
//
// Concrete backends live in Layer 6 (infra); tests use the
// in-memory fakes in classify::fakes.

use anyhow::Result;
use std::fmt;

use crate::domain::tags::{DependencyLabel, PartOfSpeech, SemanticRole};

// ─── Tokenizer ────────────────────────────────────────────────────────────────
/// One morpheme from a morphological analyser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morpheme {
    /// Surface form as it appears in the text
    pub surface: String,
    /// Katakana reading ("トキ", "ジ", "ホカ")
    pub reading: String,
    pub pos:     PartOfSpeech,
}

impl Morpheme {
    pub fn new(surface: impl Into<String>, reading: impl Into<String>, pos: PartOfSpeech) -> Self {
        Self {
            surface: surface.into(),
            reading: reading.into(),
            pos,
        }
    }
}

pub trait Tokenizer {
    /// Split text into morphemes, in order
    fn tokenize(&self, text: &str) -> Result<Vec<Morpheme>>;
}

// ─── DependencyParser ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyToken {
    pub surface: String,
    pub label:   DependencyLabel,
}

pub trait DependencyParser {
    fn parse(&self, text: &str) -> Result<Vec<DependencyToken>>;
}

// ─── SemanticRoleLabeler ──────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleToken {
    pub surface: String,
    pub role:    SemanticRole,
}

pub trait SemanticRoleLabeler {
    fn label(&self, text: &str) -> Result<Vec<RoleToken>>;
}

// ─── Oracle ───────────────────────────────────────────────────────────────────
/// How the oracle should sample its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// temperature 0 / greedy decoding; the same prompt must
    /// give the same answer
    Deterministic,
    Sampled,
}

#[derive(Debug)]
pub enum OracleError {
    /// The service did not answer within the configured timeout
    TimedOut,
    /// Transport-level failure (connection refused, DNS, TLS …)
    Transport(String),
    /// The service answered, but not with something we can read
    BadResponse(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut         => write!(f, "oracle timed out"),
            Self::Transport(msg)   => write!(f, "oracle transport error: {msg}"),
            Self::BadResponse(msg) => write!(f, "oracle returned an unreadable response: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}

pub trait Oracle {
    fn query(&self, prompt: &str, mode: SamplingMode) -> std::result::Result<String, OracleError>;
}
