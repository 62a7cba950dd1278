// ============================================================
// Layer 5 — Lexical Stage
// ============================================================
// Morphological rules: a token is rewritten when
//
//   surface ∈ rule.surfaces
//   AND part of speech matches rule.part_of_speech (if set)
//   AND reading ∉ rule.excluded_readings
//
// The default rule turns the noun 他/外 into ほか unless the
// tokenizer reads it ソト ("outside") or ガイ (外国, 外科 …).
//
// Example (MeCab, -Ochasen):
//   他	ホカ	他	名詞-一般      → ほか  (lexical-correction)
//   外	ソト	外	名詞-一般      → keep (excluded reading)

use serde::{Deserialize, Serialize};

use crate::classify::{locate_tokens, ClassifierStage};
use crate::domain::error::ReviewError;
use crate::domain::span::{Category, Span};
use crate::domain::tags::PartOfSpeech;
use crate::domain::trace::{ClassificationTrace, Decision, TraceEntry};
use crate::domain::traits::Tokenizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalRule {
    pub surfaces:          Vec<String>,
    /// None matches any part of speech
    pub part_of_speech:    Option<PartOfSpeech>,
    pub excluded_readings: Vec<String>,
    pub replacement:       String,
    pub category:          Category,
}

impl Default for LexicalRule {
    fn default() -> Self {
        Self {
            surfaces:          vec!["他".to_string(), "外".to_string()],
            part_of_speech:    Some(PartOfSpeech::Noun),
            excluded_readings: vec!["ソト".to_string(), "ガイ".to_string()],
            replacement:       "ほか".to_string(),
            category:          Category::LexicalCorrection,
        }
    }
}

impl LexicalRule {
    fn matches_surface(&self, surface: &str) -> bool {
        self.surfaces.iter().any(|s| s == surface)
    }
}

pub struct LexicalStage<'a> {
    tokenizer: &'a dyn Tokenizer,
    rules:     &'a [LexicalRule],
}

impl<'a> LexicalStage<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, rules: &'a [LexicalRule]) -> Self {
        Self { tokenizer, rules }
    }
}

impl ClassifierStage for LexicalStage<'_> {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn classify(&self, text: &str, trace: &mut ClassificationTrace) -> Result<Vec<Span>, ReviewError> {
        let morphemes = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| ReviewError::classification(self.name(), e))?;

        let offsets = locate_tokens(text, morphemes.iter().map(|m| m.surface.as_str()));
        let mut spans = Vec::new();

        for (m, at) in morphemes.iter().zip(offsets) {
            let Some(rule) = self.rules.iter().find(|r| r.matches_surface(&m.surface)) else {
                continue;
            };
            let annotation = format!("{}/{}", m.reading, m.pos);

            let pos_ok     = rule.part_of_speech.as_ref().map_or(true, |p| *p == m.pos);
            let reading_ok = !rule.excluded_readings.iter().any(|r| *r == m.reading);
            let changes    = m.surface != rule.replacement;

            let decision = match at {
                Some(start) if pos_ok && reading_ok && changes => {
                    spans.push(Span::new(start, m.surface.clone(), rule.replacement.clone(), rule.category));
                    Decision::Rewrite(rule.replacement.clone())
                }
                None if pos_ok && reading_ok && changes => Decision::SpanNotFound,
                _ => Decision::Keep,
            };
            trace.push(TraceEntry::new(self.name(), m.surface.clone(), annotation, decision));
        }

        Ok(spans)
    }
}
