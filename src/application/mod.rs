// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer wires the other layers together to accomplish one
// goal (reviewing a document, unpacking an archive).
//
// Rules for this layer:
//   - No linguistic decisions here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - No XML or ZIP handling here (that's Layer 4)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Settings file and the collaborator handles built from it
pub mod pipeline_config;

// The review workflow: scan, classify, reconcile, mutate
pub mod review_use_case;

// The unpack workflow
pub mod unpack_use_case;
