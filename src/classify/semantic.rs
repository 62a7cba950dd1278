// ============================================================
// Layer 5 — Semantic Stage
// ============================================================
// Uses a semantic-role labeler on the written/kana pair:
//
//   ARGM-TMP  (temporal)     時 → とき   semantic-temporal
//   ARGM-PRP  (purpose/cond) 時 → とき   semantic-conditional
//
// A token already in kana form is left alone; the role is still
// traced so the decision is visible.

use serde::{Deserialize, Serialize};

use crate::classify::{locate_tokens, ClassifierStage, HomographPair};
use crate::domain::error::ReviewError;
use crate::domain::span::{Category, Span};
use crate::domain::tags::SemanticRole;
use crate::domain::trace::{ClassificationTrace, Decision, TraceEntry};
use crate::domain::traits::SemanticRoleLabeler;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticRule {
    pub pair: HomographPair,
}

pub struct SemanticStage<'a> {
    labeler: &'a dyn SemanticRoleLabeler,
    rule:    &'a SemanticRule,
}

impl<'a> SemanticStage<'a> {
    pub fn new(labeler: &'a dyn SemanticRoleLabeler, rule: &'a SemanticRule) -> Self {
        Self { labeler, rule }
    }
}

fn category_for(role: &SemanticRole) -> Option<Category> {
    match role {
        SemanticRole::Temporal    => Some(Category::SemanticTemporal),
        SemanticRole::Conditional => Some(Category::SemanticConditional),
        _ => None,
    }
}

impl ClassifierStage for SemanticStage<'_> {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn classify(&self, text: &str, trace: &mut ClassificationTrace) -> Result<Vec<Span>, ReviewError> {
        if !self.rule.pair.occurs_in(text) {
            return Ok(Vec::new());
        }

        let tokens = self
            .labeler
            .label(text)
            .map_err(|e| ReviewError::classification(self.name(), e))?;
        let offsets = locate_tokens(text, tokens.iter().map(|t| t.surface.as_str()));
        let kana    = &self.rule.pair.kana;

        let mut spans = Vec::new();
        for (token, at) in tokens.iter().zip(offsets) {
            if !self.rule.pair.contains(&token.surface) {
                continue;
            }
            let Some(category) = category_for(&token.role) else {
                trace.push(TraceEntry::new(self.name(), token.surface.clone(), token.role.to_string(), Decision::Keep));
                continue;
            };

            let decision = match at {
                _ if token.surface == *kana => Decision::Keep,
                Some(start) => {
                    spans.push(Span::new(start, token.surface.clone(), kana.clone(), category));
                    Decision::Rewrite(kana.clone())
                }
                None => Decision::SpanNotFound,
            };
            trace.push(TraceEntry::new(self.name(), token.surface.clone(), token.role.to_string(), decision));
        }

        Ok(spans)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::fakes::{DictionaryTokenizer, TableRoleLabeler};

    fn classify(roles: &[(&str, &str)], text: &str) -> (Vec<Span>, ClassificationTrace) {
        let labeler = TableRoleLabeler::new(DictionaryTokenizer::japanese(), roles);
        let rule = SemanticRule::default();
        let mut trace = ClassificationTrace::new(0);
        let spans = SemanticStage::new(&labeler, &rule).classify(text, &mut trace).unwrap();
        (spans, trace)
    }

    #[test]
    fn test_temporal_role_gets_temporal_category() {
        let (spans, _) = classify(&[("時", "B-TMP")], "いざという時は頼りになる");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].replacement, "とき");
        assert_eq!(spans[0].category, Category::SemanticTemporal);
    }

    #[test]
    fn test_purpose_role_gets_conditional_category() {
        let (spans, _) = classify(&[("時", "I-ARGM-PRP")], "時は頼りになる");
        assert_eq!(spans[0].category, Category::SemanticConditional);
    }

    #[test]
    fn test_kana_and_unlabelled_tokens_are_kept() {
        let (spans, trace) = classify(&[("とき", "B-TMP")], "いざというときは");
        assert!(spans.is_empty());
        assert_eq!(trace.entries()[0].decision, Decision::Keep);

        let (spans, _) = classify(&[], "いざという時は");
        assert!(spans.is_empty());
    }
}
