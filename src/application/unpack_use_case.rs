// ============================================================
// Layer 2 — UnpackUseCase
// ============================================================
// Extracts a .docx into a directory so its parts can be edited
// or reviewed one by one:
//
//   Step 1: Open the archive                     (Layer 4 - data)
//   Step 2: Merge adjacent same-format text runs (Layer 4 - data)
//   Step 3: Write every entry under out_dir      (Layer 4 - data)
//
// Word often splits one word over several runs (spell-check,
// revision ids). Merging them first means later review passes
// see longer contiguous text. Tabs, breaks, drawings and
// pictures stay where they are and end a merge.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::package::DocxPackage;
use crate::data::run_merger::{merge_document_runs, MergeStats};
use crate::data::wordml::WordNamespace;
use crate::data::xml::XmlDocument;

#[derive(Debug, Clone)]
pub struct UnpackConfig {
    pub input:   PathBuf,
    /// Defaults to the input path without its extension
    pub out_dir: Option<PathBuf>,
    /// Skip the run merge and extract the archive byte for byte
    pub raw:     bool,
}

impl UnpackConfig {
    pub fn out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .unwrap_or_else(|| self.input.with_extension(""))
    }
}

pub struct UnpackUseCase {
    config: UnpackConfig,
}

impl UnpackUseCase {
    pub fn new(config: UnpackConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<MergeStats> {
        let cfg = &self.config;
        let out = cfg.out_dir();

        // ── Step 1: Open ──────────────────────────────────────────────────────
        let mut package = DocxPackage::open(&cfg.input)?;

        // ── Step 2: Merge runs in word/document.xml ───────────────────────────
        let mut stats = MergeStats::default();
        if !cfg.raw {
            let xml     = package.document_xml()?;
            let mut doc = XmlDocument::parse(&xml)
                .with_context(|| format!("Cannot parse the document part of '{}'", cfg.input.display()))?;
            let ns = WordNamespace::detect(&doc.root);

            stats = merge_document_runs(&ns, &mut doc.root)?;
            tracing::info!(
                "Merged runs in {} paragraphs: {} → {}",
                stats.paragraphs,
                stats.runs_before,
                stats.runs_after
            );
            package.set_document_xml(doc.to_xml())?;
        }

        // ── Step 3: Extract ───────────────────────────────────────────────────
        package.extract_to(&out)?;
        tracing::info!("Unpacked '{}' into '{}'", cfg.input.display(), out.display());
        Ok(stats)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::package::tests::write_docx;

    const DOC: &str = concat!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        "<w:p><w:r><w:t>いざと</w:t></w:r><w:r><w:t>いう時</w:t></w:r>",
        "<w:r><w:tab/></w:r><w:r><w:t>は</w:t></w:r></w:p>",
        "</w:body></w:document>"
    );

    #[test]
    fn test_unpack_merges_runs_in_document_part() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("memo.docx");
        write_docx(&src, DOC);

        let stats = UnpackUseCase::new(UnpackConfig { input: src, out_dir: None, raw: false })
            .execute()
            .unwrap();
        assert_eq!((stats.paragraphs, stats.runs_before, stats.runs_after), (1, 3, 2));

        let xml = std::fs::read_to_string(dir.path().join("memo/word/document.xml")).unwrap();
        assert!(xml.contains(">いざという時</w:t>"));
        assert!(xml.contains("<w:tab/>"));
        assert!(dir.path().join("memo/word/media/image1.png").exists());
    }

    #[test]
    fn test_raw_unpack_keeps_document_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("memo.docx");
        let out = dir.path().join("raw");
        write_docx(&src, DOC);

        UnpackUseCase::new(UnpackConfig { input: src, out_dir: Some(out.clone()), raw: true })
            .execute()
            .unwrap();
        assert_eq!(std::fs::read_to_string(out.join("word/document.xml")).unwrap(), DOC);
    }
}
