// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// `clap` and hands everything else to Layer 2 (application).
//
// Three commands are supported:
//   1. `review` — rewrite and highlight homographs in a document
//   2. `unpack` — extract a .docx, pre-merging split text runs
//   3. `config` — print the settings the review would use
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs, ReviewArgs, UnpackArgs};

#[derive(Parser, Debug)]
#[command(
    name = "word-doc-proofread",
    version = "0.1.0",
    about = "Resolve 時/とき and 他/外 spellings in .docx files and highlight every rewrite."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case; this layer never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Review(args) => Self::run_review(args),
            Commands::Unpack(args) => Self::run_unpack(args),
            Commands::Config(args) => Self::run_config(args),
        }
    }

    fn run_review(args: ReviewArgs) -> Result<()> {
        use crate::application::review_use_case::ReviewUseCase;

        let config   = args.into();
        let use_case = ReviewUseCase::new(config);
        let summary  = use_case.execute()?;

        println!("{summary}");
        Ok(())
    }

    fn run_unpack(args: UnpackArgs) -> Result<()> {
        use crate::application::unpack_use_case::UnpackUseCase;

        let use_case = UnpackUseCase::new(args.into());
        let stats    = use_case.execute()?;

        println!(
            "Unpacked. {} paragraphs merged: {} text runs → {}",
            stats.paragraphs, stats.runs_before, stats.runs_after
        );
        Ok(())
    }

    fn run_config(args: ConfigArgs) -> Result<()> {
        use crate::application::pipeline_config::ReviewSettings;

        let settings = match &args.settings {
            Some(path) => ReviewSettings::from_file(path)?,
            None => ReviewSettings::default(),
        };
        settings.validate()?;
        println!("{}", settings.to_json()?);
        Ok(())
    }
}
