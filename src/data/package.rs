// ============================================================
// Layer 4 — Document Package
// ============================================================
// Reads and writes the .docx container with the zip crate.
//
// How .docx files work:
//   A .docx file is a ZIP archive of XML parts. The one we edit
//   is word/document.xml:
//
//     [Content_Types].xml
//     _rels/.rels
//     word/document.xml      ← paragraphs and runs live here
//     word/styles.xml
//     word/media/image1.png
//     …
//
// Every entry is read into memory in archive order. Only the
// main document part is replaced; every other entry is written
// back byte for byte, in the same order, with the same
// compression method.
//
// Reference: zip crate documentation (ZipArchive / ZipWriter)

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Path of the main document part inside the archive
pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone)]
struct Entry {
    name:        String,
    data:        Vec<u8>,
    compression: CompressionMethod,
    is_dir:      bool,
}

/// An in-memory copy of a .docx archive
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<Entry>,
}

impl DocxPackage {
    /// Read every entry of the archive at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("'{}' is not a ZIP archive", path.display()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut item = archive
                .by_index(i)
                .with_context(|| format!("Cannot read entry {i} of '{}'", path.display()))?;

            let mut data = Vec::with_capacity(item.size() as usize);
            item.read_to_end(&mut data)
                .with_context(|| format!("Cannot decompress '{}'", item.name()))?;

            entries.push(Entry {
                name:        item.name().to_string(),
                data,
                compression: item.compression(),
                is_dir:      item.is_dir(),
            });
        }

        tracing::debug!("Opened '{}' ({} entries)", path.display(), entries.len());
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// The main document part as text
    pub fn document_xml(&self) -> Result<String> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == DOCUMENT_PART)
            .ok_or_else(|| anyhow!("archive has no {DOCUMENT_PART}"))?;
        String::from_utf8(entry.data.clone())
            .with_context(|| format!("{DOCUMENT_PART} is not UTF-8"))
    }

    /// Replace the main document part, keeping its position
    pub fn set_document_xml(&mut self, xml: String) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == DOCUMENT_PART)
            .ok_or_else(|| anyhow!("archive has no {DOCUMENT_PART}"))?;
        entry.data = xml.into_bytes();
        Ok(())
    }

    /// Write the archive to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        let mut writer = ZipWriter::new(file);

        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                writer
                    .add_directory(entry.name.as_str(), options)
                    .with_context(|| format!("Cannot add directory '{}'", entry.name))?;
                continue;
            }
            writer
                .start_file(entry.name.as_str(), options)
                .with_context(|| format!("Cannot add '{}'", entry.name))?;
            writer
                .write_all(&entry.data)
                .with_context(|| format!("Cannot write '{}'", entry.name))?;
        }

        writer
            .finish()
            .with_context(|| format!("Cannot finish '{}'", path.display()))?;
        tracing::info!("Saved {}", path.display());
        Ok(())
    }

    /// Extract every entry below `dir`
    pub fn extract_to(&self, dir: &Path) -> Result<()> {
        for entry in &self.entries {
            // Entry names come from the archive; refuse anything that
            // would escape the target directory.
            let relative = Path::new(&entry.name);
            if relative.is_absolute()
                || relative.components().any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(anyhow!("refusing to extract unsafe entry '{}'", entry.name));
            }

            let target = dir.join(relative);
            if entry.is_dir {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Cannot create '{}'", target.display()))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create '{}'", parent.display()))?;
            }
            fs::write(&target, &entry.data)
                .with_context(|| format!("Cannot write '{}'", target.display()))?;
        }
        Ok(())
    }
}

/// True when `path` looks like a .docx archive rather than bare XML
pub fn is_docx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write a minimal .docx with the given document part
    pub(crate) fn write_docx(path: &Path, document_xml: &str) {
        let file = File::create(path).unwrap();
        let mut w = ZipWriter::new(file);
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        w.start_file("[Content_Types].xml", opts).unwrap();
        w.write_all(b"<Types/>").unwrap();
        w.start_file(DOCUMENT_PART, opts).unwrap();
        w.write_all(document_xml.as_bytes()).unwrap();
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        w.start_file("word/media/image1.png", stored).unwrap();
        w.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
        w.finish().unwrap();
    }

    #[test]
    fn test_replacing_document_keeps_other_entries_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.docx");
        let dst = dir.path().join("out.docx");
        write_docx(&src, "<w:document/>");

        let mut pkg = DocxPackage::open(&src).unwrap();
        assert_eq!(pkg.document_xml().unwrap(), "<w:document/>");
        pkg.set_document_xml("<w:document><w:body/></w:document>".to_string()).unwrap();
        pkg.save(&dst).unwrap();

        let again = DocxPackage::open(&dst).unwrap();
        let names: Vec<&str> = again.entry_names().collect();
        assert_eq!(names, vec!["[Content_Types].xml", DOCUMENT_PART, "word/media/image1.png"]);
        assert_eq!(again.document_xml().unwrap(), "<w:document><w:body/></w:document>");

        let png = again.entries.iter().find(|e| e.name.ends_with(".png")).unwrap();
        assert_eq!(png.data, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(png.compression, CompressionMethod::Stored);
    }

    #[test]
    fn test_extract_writes_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.docx");
        write_docx(&src, "<w:document/>");

        let out = dir.path().join("unpacked");
        DocxPackage::open(&src).unwrap().extract_to(&out).unwrap();
        assert_eq!(fs::read_to_string(out.join(DOCUMENT_PART)).unwrap(), "<w:document/>");
        assert!(out.join("word/media/image1.png").exists());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = DocxPackage::open(Path::new("/nonexistent/x.docx")).unwrap_err();
        assert!(err.to_string().contains("Cannot open"));
    }

    #[test]
    fn test_is_docx_by_extension() {
        assert!(is_docx(Path::new("report.DOCX")));
        assert!(!is_docx(Path::new("word/document.xml")));
    }
}
