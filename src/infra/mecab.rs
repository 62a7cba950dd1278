// ============================================================
// Layer 6 — MeCab Tokenizer
// ============================================================
// Runs the `mecab` binary in ChaSen output mode:
//
//   $ echo 他の人 | mecab -Ochasen
//   他	ホカ	他	名詞-一般
//   の	ノ	の	助詞-連体化
//   人	ヒト	人	名詞-一般
//   EOS
//
// Columns: surface, reading (katakana), base form, part of
// speech, then conjugation columns we do not use.

use anyhow::Result;

use crate::domain::tags::PartOfSpeech;
use crate::domain::traits::{Morpheme, Tokenizer};
use crate::infra::command::CommandSpec;

pub struct MecabTokenizer {
    command: CommandSpec,
}

impl MecabTokenizer {
    /// `program` is looked up on PATH ("mecab" unless configured)
    pub fn new(program: &str) -> Result<Self> {
        let command = CommandSpec::parse(&format!("{program} -Ochasen"))?;
        tracing::debug!("Using MeCab: {:?}", command);
        Ok(Self { command })
    }
}

impl Tokenizer for MecabTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Morpheme>> {
        Ok(parse_chasen(&self.command.run(text)?))
    }
}

/// Parse ChaSen-format output. EOS markers and short lines are skipped.
pub fn parse_chasen(output: &str) -> Vec<Morpheme> {
    output
        .lines()
        .filter(|line| *line != "EOS")
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 4 {
                return None;
            }
            Some(Morpheme::new(cols[0], cols[1], PartOfSpeech::from_tag(cols[3])))
        })
        .collect()
}
