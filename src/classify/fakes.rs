// In-memory collaborators for tests. No subprocesses, no network.

use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::domain::tags::{DependencyLabel, PartOfSpeech, SemanticRole};
use crate::domain::traits::{
    DependencyParser, DependencyToken, Morpheme, Oracle, OracleError, RoleToken, SamplingMode,
    SemanticRoleLabeler, Tokenizer,
};

/// Greedy longest-match tokenizer over a small word list.
/// Unknown characters become one-character tokens read as themselves.
#[derive(Debug, Clone, Default)]
pub struct DictionaryTokenizer {
    entries: Vec<(String, String, PartOfSpeech)>,
}

impl DictionaryTokenizer {
    pub fn new(entries: &[(&str, &str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(s, r, p)| (s.to_string(), r.to_string(), PartOfSpeech::from_tag(p)))
                .collect(),
        }
    }

    /// Words used across the pipeline tests
    pub fn japanese() -> Self {
        Self::new(&[
            ("いざ",   "イザ",   "副詞"),
            ("という", "トイウ", "助詞"),
            ("時",     "トキ",   "名詞"),
            ("とき",   "トキ",   "名詞"),
            ("は",     "ハ",     "助詞"),
            ("頼り",   "タヨリ", "名詞"),
            ("に",     "ニ",     "助詞"),
            ("なる",   "ナル",   "動詞"),
            ("他",     "ホカ",   "名詞"),
            ("ほか",   "ホカ",   "名詞"),
            ("の",     "ノ",     "助詞"),
            ("人",     "ヒト",   "名詞"),
            ("外",     "ソト",   "名詞"),
            ("へ",     "ヘ",     "助詞"),
            ("出る",   "デル",   "動詞"),
            ("時間",   "ジカン", "名詞"),
        ])
    }
}

impl Tokenizer for DictionaryTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Morpheme>> {
        let mut out  = Vec::new();
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            let best = self
                .entries
                .iter()
                .filter(|(s, _, _)| rest.starts_with(s.as_str()))
                .max_by_key(|(s, _, _)| s.len());
            match best {
                Some((s, r, p)) => {
                    out.push(Morpheme::new(s.clone(), r.clone(), p.clone()));
                    rest = &rest[s.len()..];
                }
                None => {
                    if !c.is_whitespace() {
                        out.push(Morpheme::new(c.to_string(), c.to_string(), PartOfSpeech::Symbol));
                    }
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        Ok(out)
    }
}

/// Always fails, to exercise stage error paths
pub struct BrokenTokenizer;

impl Tokenizer for BrokenTokenizer {
    fn tokenize(&self, _text: &str) -> Result<Vec<Morpheme>> {
        Err(anyhow!("mecab exited with status 1"))
    }
}

/// Segments with a DictionaryTokenizer and labels by surface
pub struct TableParser {
    tokenizer: DictionaryTokenizer,
    labels:    HashMap<String, DependencyLabel>,
}

impl TableParser {
    pub fn new(tokenizer: DictionaryTokenizer, labels: &[(&str, &str)]) -> Self {
        Self {
            tokenizer,
            labels: labels
                .iter()
                .map(|(s, l)| (s.to_string(), DependencyLabel::from_tag(l)))
                .collect(),
        }
    }
}

impl DependencyParser for TableParser {
    fn parse(&self, text: &str) -> Result<Vec<DependencyToken>> {
        Ok(self
            .tokenizer
            .tokenize(text)?
            .into_iter()
            .map(|m| DependencyToken {
                label:   self.labels.get(&m.surface).cloned().unwrap_or(DependencyLabel::Case),
                surface: m.surface,
            })
            .collect())
    }
}

/// Segments with a DictionaryTokenizer and assigns roles by surface
pub struct TableRoleLabeler {
    tokenizer: DictionaryTokenizer,
    roles:     HashMap<String, SemanticRole>,
}

impl TableRoleLabeler {
    pub fn new(tokenizer: DictionaryTokenizer, roles: &[(&str, &str)]) -> Self {
        Self {
            tokenizer,
            roles: roles
                .iter()
                .map(|(s, r)| (s.to_string(), SemanticRole::from_tag(r)))
                .collect(),
        }
    }
}

impl SemanticRoleLabeler for TableRoleLabeler {
    fn label(&self, text: &str) -> Result<Vec<RoleToken>> {
        Ok(self
            .tokenizer
            .tokenize(text)?
            .into_iter()
            .map(|m| RoleToken {
                role:    self.roles.get(&m.surface).cloned().unwrap_or(SemanticRole::Outside),
                surface: m.surface,
            })
            .collect())
    }
}

/// Answers every query with the same canned response
pub struct CannedOracle {
    response: std::result::Result<String, fn() -> OracleError>,
    pub prompts: RefCell<Vec<(String, SamplingMode)>>,
}

impl CannedOracle {
    pub fn answering(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            prompts:  RefCell::new(Vec::new()),
        }
    }

    pub fn failing(err: fn() -> OracleError) -> Self {
        Self {
            response: Err(err),
            prompts:  RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Oracle for CannedOracle {
    fn query(&self, prompt: &str, mode: SamplingMode) -> std::result::Result<String, OracleError> {
        self.prompts.borrow_mut().push((prompt.to_string(), mode));
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }
}
