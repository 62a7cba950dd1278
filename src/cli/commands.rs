// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `review`, `unpack` and `config`.
//
// Every flag of `review` is optional on top of the settings
// file: a flag that is given wins, one that is left out falls
// back to the file (or to the built-in default).
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::review_use_case::ReviewConfig;
use crate::application::unpack_use_case::UnpackConfig;
use crate::classify::Strategy;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite ambiguous homographs in a .docx (or document.xml) and highlight each change
    Review(ReviewArgs),

    /// Extract a .docx into a directory, merging split text runs
    Unpack(UnpackArgs),

    /// Print the default settings as JSON
    Config(ConfigArgs),
}

/// All arguments for the `review` command.
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// .docx archive or an unpacked word/document.xml
    pub input: PathBuf,

    /// Where to write the result
    /// (default: <name>_reviewed.docx, or the XML file itself)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// JSON settings file (see `config`)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Append one line per classification decision to this file
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Which stage chain to run
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// MeCab executable
    #[arg(long)]
    pub mecab_cmd: Option<String>,

    /// Dependency parser command: text on stdin, {"text","dep"} JSON lines out
    #[arg(long)]
    pub parser_cmd: Option<String>,

    /// Semantic-role labeler command: text on stdin, {"text","role"} JSON lines out
    #[arg(long)]
    pub srl_cmd: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint, e.g. http://localhost:8000/v1
    #[arg(long)]
    pub oracle_url: Option<String>,

    #[arg(long)]
    pub oracle_model: Option<String>,

    /// Seconds before an oracle request gives up (the text is then kept)
    #[arg(long)]
    pub oracle_timeout: Option<u64>,
}

/// Boundary between Layer 1 and Layer 2: the application layer
/// never sees clap types.
impl From<ReviewArgs> for ReviewConfig {
    fn from(a: ReviewArgs) -> Self {
        ReviewConfig {
            input:          a.input,
            output:         a.output,
            settings_path:  a.settings,
            trace_path:     a.trace,
            strategy:       a.strategy,
            mecab_program:  a.mecab_cmd,
            parser_command: a.parser_cmd,
            srl_command:    a.srl_cmd,
            oracle_url:     a.oracle_url,
            oracle_model:   a.oracle_model,
            oracle_timeout: a.oracle_timeout,
        }
    }
}

#[derive(Args, Debug)]
pub struct UnpackArgs {
    /// .docx archive to extract
    pub input: PathBuf,

    /// Target directory (default: input path without extension)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Extract as is, without merging runs
    #[arg(long)]
    pub raw: bool,
}

impl From<UnpackArgs> for UnpackConfig {
    fn from(a: UnpackArgs) -> Self {
        UnpackConfig {
            input:   a.input,
            out_dir: a.out_dir,
            raw:     a.raw,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Start from this settings file instead of the defaults
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_review_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "word-doc-proofread", "review", "memo.docx",
            "--strategy", "oracle",
            "--oracle-url", "http://gpu:8000/v1",
            "--oracle-timeout", "30",
            "--trace", "trace.log",
        ])
        .unwrap();

        let Commands::Review(args) = cli.command else { panic!("expected review") };
        let cfg: ReviewConfig = args.into();
        assert_eq!(cfg.input, PathBuf::from("memo.docx"));
        assert_eq!(cfg.strategy, Some(Strategy::Oracle));
        assert_eq!(cfg.oracle_url.as_deref(), Some("http://gpu:8000/v1"));
        assert_eq!(cfg.oracle_timeout, Some(30));
        assert_eq!(cfg.trace_path, Some(PathBuf::from("trace.log")));
        assert_eq!(cfg.mecab_program, None);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let parsed = Cli::try_parse_from(["word-doc-proofread", "review", "a.docx", "--strategy", "magic"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unpack_defaults() {
        let cli = Cli::try_parse_from(["word-doc-proofread", "unpack", "memo.docx"]).unwrap();
        let Commands::Unpack(args) = cli.command else { panic!("expected unpack") };
        let cfg: UnpackConfig = args.into();
        assert!(!cfg.raw);
        assert_eq!(cfg.out_dir(), PathBuf::from("memo"));
    }
}
