// ============================================================
// Layer 6 — Trace Sinks
// ============================================================
// Writes classification traces to an append-only text file,
// one line per decision, after each paragraph.
//
// Example output:
//   # review input=report.docx strategy=rules
//   [p3] lexical    他 | ホカ/Noun | rewrite -> ほか
//   [p3] syntactic  時 | トキ/obl | rewrite -> とき
//   [p7] oracle     時は金なり | no marker | ambiguous verdict, no change
//
// The file is opened in append mode so traces from several runs
// accumulate; each run starts with a header line.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::trace::{ClassificationTrace, TraceSink};

/// Appends trace lines to a file
pub struct FileTraceSink {
    path:   PathBuf,
    writer: BufWriter<File>,
}

impl FileTraceSink {
    /// Open (or create) the trace file and write a run header
    pub fn open(path: impl AsRef<Path>, header: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create trace directory '{}'", dir.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open trace file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# {header}")?;

        tracing::debug!("Tracing classification decisions to '{}'", path.display());
        Ok(Self { path, writer })
    }
}

impl TraceSink for FileTraceSink {
    fn flush_paragraph(&mut self, trace: &ClassificationTrace) -> Result<()> {
        for line in trace.lines() {
            writeln!(self.writer, "{line}")
                .with_context(|| format!("Cannot write to '{}'", self.path.display()))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every line in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    pub lines: Vec<String>,
}

#[cfg(test)]
impl TraceSink for MemoryTraceSink {
    fn flush_paragraph(&mut self, trace: &ClassificationTrace) -> Result<()> {
        self.lines.extend(trace.lines());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn flush_paragraph(&mut self, _trace: &ClassificationTrace) -> Result<()> {
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trace::{Decision, TraceEntry};

    fn sample(paragraph: usize) -> ClassificationTrace {
        let mut t = ClassificationTrace::new(paragraph);
        t.push(TraceEntry::new("lexical", "他", "ホカ/Noun", Decision::Rewrite("ほか".into())));
        t
    }

    #[test]
    fn test_file_sink_appends_across_runs() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/trace.log");

        {
            let mut sink = FileTraceSink::open(&path, "run 1").unwrap();
            sink.flush_paragraph(&sample(0)).unwrap();
        }
        {
            let mut sink = FileTraceSink::open(&path, "run 2").unwrap();
            sink.flush_paragraph(&sample(5)).unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "# run 1");
        assert!(lines[1].starts_with("[p0] lexical"));
        assert_eq!(lines[2], "# run 2");
        assert!(lines[3].starts_with("[p5]"));
    }

    #[test]
    fn test_memory_sink_collects_lines() {
        let mut sink = MemoryTraceSink::default();
        sink.flush_paragraph(&sample(1)).unwrap();
        sink.flush_paragraph(&ClassificationTrace::new(2)).unwrap();
        assert_eq!(sink.lines.len(), 1);
    }
}
