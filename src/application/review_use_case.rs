// ============================================================
// Layer 2 — ReviewUseCase
// ============================================================
// Runs the review pipeline over one document:
//
//   Step 1: Load settings, apply CLI overrides
//   Step 2: Connect collaborators               (Layer 6 - infra)
//   Step 3: Open the trace file                 (Layer 6 - infra)
//   Step 4: Read document.xml (.docx or bare)   (Layer 4 - data)
//   Step 5: Review every paragraph              (see below)
//   Step 6: Write the result                    (Layer 4 - data)
//
// Per paragraph, in document order:
//
//   Scan ──► no text / no keyword ──► Skip
//     │
//     ▼
//   for each run scope (hyperlinks, insertions … then the paragraph),
//   for each run group containing a keyword:
//     stage 1 ─► stage 2 ─► …   (each sees the previous output)
//     reconcile final buffer against the tuples
//     │
//     ▼
//   Mutate (only when some group actually changed) ──► Done
//
// A failing stage or an inconsistent tree leaves that paragraph
// untouched; the run carries on with the next one. Only a
// malformed document stops the run, and then nothing is written.
//
// Reference: Rust Book §10 (Traits and trait objects)
//            Rust Book §13 (Iterators and Closures)

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::application::pipeline_config::{PipelineConfig, ReviewSettings};
use crate::classify::{ClassifierStage, Strategy};
use crate::data::mutator::{assemble_children, replace_runs};
use crate::data::package::{is_docx, DocxPackage};
use crate::data::reconciler::SpanReconciler;
use crate::data::run_layout::{collect_mergeable_runs, RunLayout};
use crate::data::source_map::{apply_spans, project_forward, SourceMap};
use crate::data::wordml::{for_each_paragraph_mut, run_scopes, scope, scope_mut, WordNamespace};
use crate::data::xml::{XmlDocument, XmlElement};
use crate::domain::error::ReviewError;
use crate::domain::span::Replacement;
use crate::domain::trace::{ClassificationTrace, Decision, TraceEntry, TraceSink};
use crate::infra::trace_sink::{FileTraceSink, NullTraceSink};

// ─── Review Summary ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub paragraphs:    usize,
    pub skipped:       usize,
    pub unchanged:     usize,
    pub rewritten:     usize,
    pub failed:        usize,
    pub spans_applied: usize,
    pub spans_dropped: usize,
}

impl fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} paragraphs: {} rewritten, {} unchanged, {} skipped, {} failed ({} spans applied, {} dropped)",
            self.paragraphs,
            self.rewritten,
            self.unchanged,
            self.skipped,
            self.failed,
            self.spans_applied,
            self.spans_dropped,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Skipped,
    Unchanged,
    Rewritten { applied: usize, dropped: usize },
    Failed,
}

impl ReviewSummary {
    fn record(&mut self, outcome: Outcome) {
        self.paragraphs += 1;
        match outcome {
            Outcome::Skipped   => self.skipped += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Failed    => self.failed += 1,
            Outcome::Rewritten { applied, dropped } => {
                self.rewritten     += 1;
                self.spans_applied += applied;
                self.spans_dropped += dropped;
            }
        }
    }
}

// ─── Review Pipeline ──────────────────────────────────────────────────────────
/// One group's text after every stage, plus what it takes to
/// rebuild its runs.
struct GroupEdit {
    buffer:     String,
    tuples:     Vec<Replacement>,
    source_map: SourceMap,
    rejected:   usize,
}

/// The stage chain built from a PipelineConfig. Holds no state
/// between paragraphs.
pub struct ReviewPipeline<'a> {
    config: &'a PipelineConfig,
    stages: Vec<Box<dyn ClassifierStage + 'a>>,
}

impl<'a> ReviewPipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self, ReviewError> {
        let stages = config.build_stages()?;
        Ok(Self { config, stages })
    }

    fn has_keyword(&self, text: &str) -> bool {
        self.config
            .settings
            .keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(k.as_str()))
    }

    /// Parse, review and re-serialise a document part
    pub fn review_xml(&self, xml: &str, sink: &mut dyn TraceSink) -> Result<(String, ReviewSummary)> {
        let mut doc = XmlDocument::parse(xml)?;
        let summary = self.review_document(&mut doc, sink)?;
        Ok((doc.to_xml(), summary))
    }

    /// Review every paragraph of a parsed document in place
    pub fn review_document(&self, doc: &mut XmlDocument, sink: &mut dyn TraceSink) -> Result<ReviewSummary> {
        let ns = WordNamespace::detect(&doc.root);
        let mut summary    = ReviewSummary::default();
        let mut sink_error = None;

        for_each_paragraph_mut(&ns, &mut doc.root, &mut |index, paragraph| {
            if sink_error.is_some() {
                return;
            }
            match self.review_paragraph(&ns, index, paragraph, sink) {
                Ok(outcome) => summary.record(outcome),
                Err(e) => sink_error = Some(e),
            }
        });

        if let Some(e) = sink_error {
            return Err(e.context("Cannot write the classification trace"));
        }
        tracing::info!("{summary}");
        Ok(summary)
    }

    fn review_paragraph(
        &self,
        ns:        &WordNamespace,
        index:     usize,
        paragraph: &mut XmlElement,
        sink:      &mut dyn TraceSink,
    ) -> Result<Outcome> {
        let mut scopes = Vec::new();
        for path in run_scopes(ns, paragraph) {
            let Some(el) = scope(paragraph, &path) else { continue };
            match collect_mergeable_runs(ns, el) {
                Ok(layout) => scopes.push((path, layout)),
                Err(ReviewError::EmptyParagraph) => {}
                Err(e) => {
                    tracing::warn!("Paragraph {index}: {e}");
                    return Ok(Outcome::Failed);
                }
            }
        }
        let text: String = scopes.iter().map(|(_, layout)| layout.combined_text()).collect();
        if !self.has_keyword(&text) {
            return Ok(Outcome::Skipped);
        }

        let mut trace = ClassificationTrace::new(index);
        let outcome = match self.rewrite_paragraph(ns, paragraph, &scopes, &mut trace) {
            Ok(Some((applied, dropped))) => Outcome::Rewritten { applied, dropped },
            Ok(None) => Outcome::Unchanged,
            Err(e) => {
                tracing::warn!("Paragraph {index} left unchanged: {e}");
                trace.push(TraceEntry::new("pipeline", "", "", Decision::Failed(e.to_string())));
                Outcome::Failed
            }
        };
        tracing::debug!("Paragraph {index}: {outcome:?}");

        sink.flush_paragraph(&trace)?;
        Ok(outcome)
    }

    /// Rewrite every run scope of the paragraph on a working copy,
    /// innermost first, and swap the copy in only if all of them
    /// succeed. Returns (applied, dropped) or None when nothing changed.
    fn rewrite_paragraph(
        &self,
        ns:        &WordNamespace,
        paragraph: &mut XmlElement,
        scopes:    &[(Vec<usize>, RunLayout)],
        trace:     &mut ClassificationTrace,
    ) -> Result<Option<(usize, usize)>, ReviewError> {
        let mut working = paragraph.clone();
        let mut changed = false;
        let mut applied = 0usize;
        let mut dropped = 0usize;

        for (path, layout) in scopes {
            let el = scope_mut(&mut working, path).ok_or_else(|| {
                ReviewError::TreeInconsistency(format!("no run container at {path:?}"))
            })?;
            if let Some((a, d)) = self.rewrite_scope(ns, el, layout, trace)? {
                changed  = true;
                applied += a;
                dropped += d;
            }
        }

        if !changed {
            return Ok(None);
        }
        *paragraph = working;
        Ok(Some((applied, dropped)))
    }

    /// Classify and reconcile every keyword group of one scope, then
    /// swap the scope's children in one go.
    fn rewrite_scope(
        &self,
        ns:     &WordNamespace,
        el:     &mut XmlElement,
        layout: &RunLayout,
        trace:  &mut ClassificationTrace,
    ) -> Result<Option<(usize, usize)>, ReviewError> {
        let reconciler    = SpanReconciler::new(ns, &self.config.settings.palette);
        let mut rewritten = Vec::new();
        let mut applied   = 0usize;
        let mut dropped   = 0usize;

        for group in layout.groups() {
            if !self.has_keyword(&group.text) {
                rewritten.push(None);
                continue;
            }
            trace.push(TraceEntry::new("input", group.text.clone(), "before", Decision::Note));

            let edit = self.classify_group(&group.text, trace)?;
            dropped += edit.rejected;
            if edit.buffer == group.text {
                rewritten.push(None);
                continue;
            }

            let r = reconciler.reconcile(el, group, &edit.buffer, &edit.tuples, &edit.source_map)?;
            for t in &r.dropped {
                trace.push(TraceEntry::new(
                    "reconcile",
                    t.replacement.clone(),
                    format!("{} -> {}", t.original, t.replacement),
                    Decision::SpanNotFound,
                ));
            }
            for t in &r.unhighlighted {
                trace.push(TraceEntry::new(
                    "reconcile",
                    t.replacement.clone(),
                    t.category.to_string(),
                    Decision::Unhighlighted,
                ));
            }
            trace.push(TraceEntry::new("output", edit.buffer.clone(), "after", Decision::Note));

            applied += r.applied.len();
            dropped += r.dropped.len();
            rewritten.push(Some(r.runs));
        }

        if rewritten.iter().all(Option::is_none) {
            return Ok(None);
        }

        let children = assemble_children(el, layout, &rewritten)?;
        replace_runs(el, &layout.shape, children)?;
        Ok(Some((applied, dropped)))
    }

    /// Run the stage chain over one group's text.
    ///
    /// Tuples are kept with their position in the current buffer
    /// and carried forward after each stage, so the list handed to
    /// the reconciler is ordered by final-buffer position.
    fn classify_group(&self, text: &str, trace: &mut ClassificationTrace) -> Result<GroupEdit, ReviewError> {
        let mut buffer     = text.to_string();
        let mut source_map = SourceMap::new();
        let mut positioned: Vec<(usize, Replacement)> = Vec::new();
        let mut rejected   = 0usize;

        for stage in &self.stages {
            let spans = stage.classify(&buffer, trace)?;
            if spans.is_empty() {
                continue;
            }

            let (next, accepted, refused) = apply_spans(&buffer, spans);
            for s in &refused {
                tracing::debug!("{} span {}..{} '{}' rejected", stage.name(), s.start, s.end, s.original);
                trace.push(TraceEntry::new(
                    stage.name(),
                    s.original.clone(),
                    "overlaps or does not match the text",
                    Decision::SpanNotFound,
                ));
            }
            rejected += refused.len();

            for (pos, _) in positioned.iter_mut() {
                *pos = project_forward(&accepted, *pos);
            }
            let mut growth: isize = 0;
            for s in &accepted {
                positioned.push(((s.start as isize + growth) as usize, s.to_replacement()));
                growth += s.replacement.len() as isize - s.original.len() as isize;
            }

            source_map.push_layer(&accepted);
            buffer = next;
        }

        // Final-buffer order, not collection order: the reconciler's
        // cursor search needs an earlier rewrite before a later one
        // whichever stage produced it.
        positioned.sort_by_key(|(pos, _)| *pos);
        Ok(GroupEdit {
            buffer,
            tuples: positioned.into_iter().map(|(_, t)| t).collect(),
            source_map,
            rejected,
        })
    }

    /// Review `input` (.docx or bare document.xml) and write `output`.
    /// Nothing is written if the document cannot be parsed.
    pub fn review_file(&self, input: &Path, output: &Path, sink: &mut dyn TraceSink) -> Result<ReviewSummary> {
        if is_docx(input) {
            let mut package = DocxPackage::open(input)?;
            let xml = package.document_xml()?;
            let (reviewed, summary) = self
                .review_xml(&xml, sink)
                .with_context(|| format!("Cannot review '{}'", input.display()))?;
            package.set_document_xml(reviewed)?;
            package.save(output)?;
            Ok(summary)
        } else {
            let xml = std::fs::read_to_string(input)
                .with_context(|| format!("Cannot read '{}'", input.display()))?;
            let (reviewed, summary) = self
                .review_xml(&xml, sink)
                .with_context(|| format!("Cannot review '{}'", input.display()))?;
            std::fs::write(output, reviewed)
                .with_context(|| format!("Cannot write '{}'", output.display()))?;
            Ok(summary)
        }
    }
}

// ─── Review Configuration ─────────────────────────────────────────────────────
// Per-invocation options. Everything here either points at a file
// or overrides one field of ReviewSettings.
#[derive(Debug, Clone, Default)]
pub struct ReviewConfig {
    pub input:          PathBuf,
    /// Defaults to `<stem>_reviewed.docx` next to a .docx input,
    /// and to the input itself for bare XML
    pub output:         Option<PathBuf>,
    pub settings_path:  Option<PathBuf>,
    pub trace_path:     Option<PathBuf>,
    pub strategy:       Option<Strategy>,
    pub mecab_program:  Option<String>,
    pub parser_command: Option<String>,
    pub srl_command:    Option<String>,
    pub oracle_url:     Option<String>,
    pub oracle_model:   Option<String>,
    pub oracle_timeout: Option<u64>,
}

impl ReviewConfig {
    pub fn output_path(&self) -> PathBuf {
        if let Some(out) = &self.output {
            return out.clone();
        }
        if !is_docx(&self.input) {
            return self.input.clone();
        }
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.input.with_file_name(format!("{stem}_reviewed.docx"))
    }

    /// Settings file (or defaults) with the command-line overrides on top
    pub fn settings(&self) -> Result<ReviewSettings> {
        let mut s = match &self.settings_path {
            Some(path) => ReviewSettings::from_file(path)?,
            None => ReviewSettings::default(),
        };
        if let Some(v) = self.strategy {
            s.strategy = v;
        }
        if let Some(v) = &self.mecab_program {
            s.mecab_program = v.clone();
        }
        if let Some(v) = &self.parser_command {
            s.parser_command = Some(v.clone());
        }
        if let Some(v) = &self.srl_command {
            s.srl_command = Some(v.clone());
        }
        if let Some(v) = &self.oracle_url {
            s.oracle_http.base_url = v.clone();
        }
        if let Some(v) = &self.oracle_model {
            s.oracle_http.model = v.clone();
        }
        if let Some(v) = self.oracle_timeout {
            s.oracle_http.timeout_secs = v;
        }
        Ok(s)
    }
}

// ─── ReviewUseCase ────────────────────────────────────────────────────────────
pub struct ReviewUseCase {
    config: ReviewConfig,
}

impl ReviewUseCase {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ReviewSummary> {
        let cfg = &self.config;

        // ── Step 1: Settings ──────────────────────────────────────────────────
        let settings = cfg.settings()?;
        settings.validate()?;

        // ── Step 2: Collaborators and stage chain ─────────────────────────────
        let pipeline_config = PipelineConfig::connect(settings)?;
        let pipeline        = ReviewPipeline::new(&pipeline_config)?;

        // ── Step 3: Trace file ────────────────────────────────────────────────
        let mut sink: Box<dyn TraceSink> = match &cfg.trace_path {
            Some(path) => {
                let header = format!(
                    "review input={} strategy={:?}",
                    cfg.input.display(),
                    pipeline_config.settings.strategy
                );
                Box::new(FileTraceSink::open(path, &header)?)
            }
            None => Box::new(NullTraceSink),
        };

        // ── Steps 4–6: Read, review, write ────────────────────────────────────
        let output = cfg.output_path();
        tracing::info!("Reviewing '{}' → '{}'", cfg.input.display(), output.display());
        pipeline.review_file(&cfg.input, &output, sink.as_mut())
    }
}
