/// HL7 message tree types.
pub mod ast;
/// Delimiter resolution from the `MSH` header.
pub mod delimiters;
/// Re-exports from the diagnostics crate.
pub mod diag;
/// JSON serialization helpers for the message tree.
pub mod dump;
/// Immutable edits on a message tree.
pub mod edit;
/// HL7 generator: converts a message tree back to wire text.
pub mod emit;
/// Segment line splitting.
pub mod lexer;
/// HL7 parser: converts raw text into a message tree.
pub mod parser;
