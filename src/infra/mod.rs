// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Concrete collaborators behind the Layer 3 traits, plus the
// trace file:
//
//   mecab.rs       — Tokenizer
//                    Runs `mecab -Ochasen` and reads surface,
//                    reading and part of speech per token.
//
//   command.rs     — DependencyParser / SemanticRoleLabeler
//                    Any external program that reads text on
//                    stdin and prints JSON lines.
//
//   http_oracle.rs — Oracle
//                    OpenAI-compatible chat endpoint over
//                    blocking HTTP with a request timeout.
//
//   trace_sink.rs  — TraceSink
//                    Append-only trace file, plus in-memory and
//                    no-op sinks.
//
// Nothing above this layer knows which of these is plugged in;
// tests use in-memory fakes instead.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// MeCab subprocess tokenizer
pub mod mecab;

/// stdin → JSON-lines collaborators
pub mod command;

/// OpenAI-compatible judgment service
pub mod http_oracle;

/// Classification trace writers
pub mod trace_sink;
