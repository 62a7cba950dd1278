// ============================================================
// Layer 4 — Document Data
// ============================================================
// This layer handles everything between the .docx file on
// disk and the runs of a single paragraph.
//
// Reading a paragraph and writing it back flows like this:
//
//   .docx archive
//       │
//       ▼
//   DocxPackage        → reads word/document.xml, keeps every other part
//       │
//       ▼
//   XmlDocument        → owned element tree (prefixes, order, whitespace kept)
//       │
//       ▼
//   RunLayout          → paragraph split into run groups + passthrough children
//       │
//       ▼
//   (classifier stages run on each group's text; SourceMap follows the edits)
//       │
//       ▼
//   SpanReconciler     → final text back into formatted, highlighted runs
//       │
//       ▼
//   replace_runs       → new children swapped into the paragraph
//
// Each module is responsible for exactly one step.
//
// Reference: ECMA-376 Part 1 §17.3 (Paragraphs and Runs)

/// Owned XML element tree over quick-xml
pub mod xml;

/// WordprocessingML vocabulary: namespace prefix, runs, highlight
pub mod wordml;

/// Paragraph → run groups and passthrough children
pub mod run_layout;

/// Offset bookkeeping across classifier stages
pub mod source_map;

/// Final buffer + replacement tuples → formatted runs
pub mod reconciler;

/// Builds and swaps a paragraph's new children
pub mod mutator;

/// Same-format run merging for `unpack`
pub mod run_merger;

/// .docx (ZIP) container read/write
pub mod package;
