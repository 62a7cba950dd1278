// ============================================================
// Layer 5 — Syntactic Stage
// ============================================================
// Decides 時 vs とき from the dependency parse:
//
//   いざという 時 は 頼りになる
//              └── obl ──┘        時 as an oblique → とき
//
//   …呼んだ とき                  とき as the root → 時
//              (root rule, off by default)
//
// Only tokens the tokenizer reads トキ are candidates, so 15時
// (ジ) and 時間 never move. The parser gives no readings, so
// the text this stage received is tokenized again and each
// parser token takes the reading of the morpheme that starts at
// the same offset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classify::{locate_tokens, ClassifierStage, HomographPair};
use crate::domain::error::ReviewError;
use crate::domain::span::{Category, Span};
use crate::domain::tags::DependencyLabel;
use crate::domain::trace::{ClassificationTrace, Decision, TraceEntry};
use crate::domain::traits::{DependencyParser, Tokenizer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntacticRule {
    pub pair:         HomographPair,
    /// Reading a token must have to be considered at all
    pub reading:      String,
    /// Also rewrite a root-labelled kana form to the written form
    pub rewrite_root: bool,
    pub category:     Category,
}

impl Default for SyntacticRule {
    fn default() -> Self {
        Self {
            pair:         HomographPair::default(),
            reading:      "トキ".to_string(),
            rewrite_root: false,
            category:     Category::SyntacticCorrection,
        }
    }
}

pub struct SyntacticStage<'a> {
    parser:    &'a dyn DependencyParser,
    tokenizer: &'a dyn Tokenizer,
    rule:      &'a SyntacticRule,
}

impl<'a> SyntacticStage<'a> {
    pub fn new(parser: &'a dyn DependencyParser, tokenizer: &'a dyn Tokenizer, rule: &'a SyntacticRule) -> Self {
        Self { parser, tokenizer, rule }
    }

    /// offset → (surface, reading) for every located morpheme
    fn readings(&self, text: &str) -> Result<HashMap<usize, (String, String)>, ReviewError> {
        let morphemes = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| ReviewError::classification(self.name(), e))?;
        let offsets = locate_tokens(text, morphemes.iter().map(|m| m.surface.as_str()));

        Ok(morphemes
            .into_iter()
            .zip(offsets)
            .filter_map(|(m, at)| at.map(|at| (at, (m.surface, m.reading))))
            .collect())
    }

    fn target_for(&self, surface: &str, label: &DependencyLabel) -> Option<&str> {
        let pair = &self.rule.pair;
        match label {
            DependencyLabel::Oblique if surface == pair.written => Some(pair.kana.as_str()),
            DependencyLabel::Root if self.rule.rewrite_root && surface == pair.kana => {
                Some(pair.written.as_str())
            }
            _ => None,
        }
    }
}

impl ClassifierStage for SyntacticStage<'_> {
    fn name(&self) -> &'static str {
        "syntactic"
    }

    fn classify(&self, text: &str, trace: &mut ClassificationTrace) -> Result<Vec<Span>, ReviewError> {
        if !self.rule.pair.occurs_in(text) {
            return Ok(Vec::new());
        }

        let tokens = self
            .parser
            .parse(text)
            .map_err(|e| ReviewError::classification(self.name(), e))?;
        let readings = self.readings(text)?;
        let offsets  = locate_tokens(text, tokens.iter().map(|t| t.surface.as_str()));

        let mut spans = Vec::new();
        for (token, at) in tokens.iter().zip(offsets) {
            if !self.rule.pair.contains(&token.surface) {
                continue;
            }

            let reading = at
                .and_then(|at| readings.get(&at))
                .filter(|(surface, _)| *surface == token.surface)
                .map(|(_, reading)| reading.as_str())
                .unwrap_or("");
            let annotation = format!("{}/{}", reading, token.label);

            let decision = if reading != self.rule.reading {
                Decision::Keep
            } else {
                match (self.target_for(&token.surface, &token.label), at) {
                    (Some(target), Some(start)) => {
                        spans.push(Span::new(start, token.surface.clone(), target, self.rule.category));
                        Decision::Rewrite(target.to_string())
                    }
                    (Some(_), None) => Decision::SpanNotFound,
                    (None, _) => Decision::Keep,
                }
            };
            trace.push(TraceEntry::new(self.name(), token.surface.clone(), annotation, decision));
        }

        Ok(spans)
    }
}
