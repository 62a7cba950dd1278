// ============================================================
// Layer 3 — Review Errors
// ============================================================
// The named conditions a review run can hit.
//
// Only MalformedDocument is fatal for the whole run. Everything
// else is scoped to one paragraph: the orchestrator records a
// diagnostic, leaves the paragraph as it was, and moves on.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    /// The paragraph has no mergeable text. A no-op, not a failure.
    EmptyParagraph,
    /// The document XML could not be parsed.
    MalformedDocument(String),
    /// A classifier stage (or one of its collaborators) failed.
    ClassificationFailed { stage: String, message: String },
    /// The paragraph no longer has the shape its layout was collected from.
    TreeInconsistency(String),
    /// Settings or pipeline wiring are invalid.
    Config(String),
}

impl ReviewError {
    pub fn classification(stage: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::ClassificationFailed {
            stage:   stage.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyParagraph => write!(f, "paragraph has no mergeable text"),
            Self::MalformedDocument(msg) => write!(f, "malformed document: {msg}"),
            Self::ClassificationFailed { stage, message } => {
                write!(f, "{stage} stage failed: {message}")
            }
            Self::TreeInconsistency(msg) => write!(f, "paragraph tree changed underneath: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ReviewError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_message_names_stage() {
        let e = ReviewError::classification("syntactic", "parser exited with status 1");
        assert_eq!(e.to_string(), "syntactic stage failed: parser exited with status 1");
    }
}
