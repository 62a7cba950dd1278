// ============================================================
// Layer 2 — Review Settings and Pipeline Config
// ============================================================
// ReviewSettings is the behavioural configuration: which
// stages run, what they look for, which colours they paint.
// It is plain data, serialisable to JSON so a run can be
// reproduced from a file (`word-doc-proofread config` prints
// the defaults).
//
// PipelineConfig is built once per run from the settings. It
// owns the collaborator handles (tokenizer, parser, labeler,
// oracle), so nothing in the pipeline reaches for a global.
// Tests build their own PipelineConfig around fakes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classify::lexical::{LexicalRule, LexicalStage};
use crate::classify::oracle::{OracleRule, OracleStage, TEXT_PLACEHOLDER};
use crate::classify::semantic::{SemanticRule, SemanticStage};
use crate::classify::syntactic::{SyntacticRule, SyntacticStage};
use crate::classify::{ClassifierStage, StageKind, Strategy};
use crate::domain::error::ReviewError;
use crate::domain::span::HighlightPalette;
use crate::domain::traits::{DependencyParser, Oracle, SemanticRoleLabeler, Tokenizer};
use crate::infra::command::{CommandDependencyParser, CommandRoleLabeler, CommandSpec};
use crate::infra::http_oracle::{HttpOracle, HttpOracleSettings};
use crate::infra::mecab::MecabTokenizer;

// ─── Review Settings ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// A paragraph (and a run group) is classified only if it contains one
    pub keywords:       Vec<String>,
    pub strategy:       Strategy,
    /// Stage order for the `custom` strategy
    pub custom_stages:  Vec<StageKind>,
    pub lexical_rules:  Vec<LexicalRule>,
    pub syntactic:      SyntacticRule,
    pub semantic:       SemanticRule,
    pub oracle:         OracleRule,
    pub oracle_http:    HttpOracleSettings,
    pub palette:        HighlightPalette,
    /// MeCab executable name or path
    pub mecab_program:  String,
    /// Dependency parser command (stdin text → JSON lines)
    pub parser_command: Option<String>,
    /// Semantic-role labeler command (stdin text → JSON lines)
    pub srl_command:    Option<String>,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            keywords:       ["とき", "時", "他", "外"].iter().map(|k| k.to_string()).collect(),
            strategy:       Strategy::default(),
            custom_stages:  Vec::new(),
            lexical_rules:  vec![LexicalRule::default()],
            syntactic:      SyntacticRule::default(),
            semantic:       SemanticRule::default(),
            oracle:         OracleRule::default(),
            oracle_http:    HttpOracleSettings::default(),
            palette:        HighlightPalette::default(),
            mecab_program:  "mecab".to_string(),
            parser_command: None,
            srl_command:    None,
        }
    }
}

impl ReviewSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings '{}'", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings in '{}'", path.display()))?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Cannot serialise settings")
    }

    pub fn stages(&self) -> Vec<StageKind> {
        self.strategy.stages(&self.custom_stages)
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        self.palette.validate()?;

        if self.keywords.iter().all(|k| k.is_empty()) {
            return Err(ReviewError::Config("keyword list is empty".to_string()));
        }
        if self.stages().is_empty() {
            return Err(ReviewError::Config(
                "strategy 'custom' needs a non-empty custom_stages list".to_string(),
            ));
        }
        if let Some(prompt) = &self.oracle.prompt {
            if !prompt.contains(TEXT_PLACEHOLDER) {
                return Err(ReviewError::Config(format!(
                    "oracle prompt has no {TEXT_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(())
    }
}

// ─── Pipeline Config ──────────────────────────────────────────────────────────
pub struct PipelineConfig {
    pub settings:  ReviewSettings,
    pub tokenizer: Box<dyn Tokenizer>,
    pub parser:    Option<Box<dyn DependencyParser>>,
    pub labeler:   Option<Box<dyn SemanticRoleLabeler>>,
    pub oracle:    Option<Box<dyn Oracle>>,
}

impl PipelineConfig {
    /// Build the concrete collaborators the selected stages need
    pub fn connect(settings: ReviewSettings) -> Result<Self> {
        settings.validate()?;
        let stages = settings.stages();

        let tokenizer = MecabTokenizer::new(&settings.mecab_program)
            .context("MeCab is required for the lexical and syntactic stages")?;

        let parser: Option<Box<dyn DependencyParser>> = if stages.contains(&StageKind::Syntactic) {
            let cmd = settings
                .parser_command
                .as_deref()
                .ok_or_else(|| ReviewError::Config("the syntactic stage needs --parser-cmd".to_string()))?;
            Some(Box::new(CommandDependencyParser::new(CommandSpec::parse(cmd)?)))
        } else {
            None
        };

        let labeler: Option<Box<dyn SemanticRoleLabeler>> = if stages.contains(&StageKind::Semantic) {
            let cmd = settings
                .srl_command
                .as_deref()
                .ok_or_else(|| ReviewError::Config("the semantic stage needs --srl-cmd".to_string()))?;
            Some(Box::new(CommandRoleLabeler::new(CommandSpec::parse(cmd)?)))
        } else {
            None
        };

        let oracle: Option<Box<dyn Oracle>> = if stages.contains(&StageKind::Oracle) {
            Some(Box::new(HttpOracle::new(&settings.oracle_http)?))
        } else {
            None
        };

        tracing::info!(
            "Pipeline: {}",
            stages.iter().map(ToString::to_string).collect::<Vec<_>>().join(" → ")
        );

        Ok(Self {
            settings,
            tokenizer: Box::new(tokenizer),
            parser,
            labeler,
            oracle,
        })
    }

    /// Instantiate the stage objects in configured order
    pub fn build_stages(&self) -> Result<Vec<Box<dyn ClassifierStage + '_>>, ReviewError> {
        let s = &self.settings;
        s.validate()?;

        s.stages()
            .into_iter()
            .map(|kind| -> Result<Box<dyn ClassifierStage + '_>, ReviewError> {
                Ok(match kind {
                    StageKind::Lexical => {
                        Box::new(LexicalStage::new(self.tokenizer.as_ref(), &s.lexical_rules))
                    }
                    StageKind::Syntactic => {
                        let parser = self.parser.as_deref().ok_or_else(|| missing("dependency parser"))?;
                        Box::new(SyntacticStage::new(parser, self.tokenizer.as_ref(), &s.syntactic))
                    }
                    StageKind::Semantic => {
                        let labeler = self.labeler.as_deref().ok_or_else(|| missing("semantic-role labeler"))?;
                        Box::new(SemanticStage::new(labeler, &s.semantic))
                    }
                    StageKind::Oracle => {
                        let oracle = self.oracle.as_deref().ok_or_else(|| missing("oracle"))?;
                        Box::new(OracleStage::new(oracle, &s.oracle))
                    }
                })
            })
            .collect()
    }
}

fn missing(what: &str) -> ReviewError {
    ReviewError::Config(format!("no {what} configured for the selected strategy"))
}
