// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the review
// pipeline talks about: spans, highlight categories, tag sets,
// traces, errors, and the collaborator contracts.
//
// Rules for this layer:
//   - NO XML or file I/O
//   - NO subprocess or HTTP calls
//   - Only plain structs, enums and traits

/// Named review conditions (EmptyParagraph, ClassificationFailed …)
pub mod error;

/// Span, Replacement, Category and the highlight palette
pub mod span;

/// PartOfSpeech / DependencyLabel / SemanticRole enumerations
pub mod tags;

/// Per-paragraph classification trace and the sink trait
pub mod trace;

/// Tokenizer, DependencyParser, SemanticRoleLabeler, Oracle
pub mod traits;
