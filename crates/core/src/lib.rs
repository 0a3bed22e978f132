//! HL7 toolchain core library.
//!
//! Lossless parsing and generation of HL7 v2.x messages, plus the template
//! variable layer used to fill placeholder fields. The main entry points are
//! [`parse_str`] for parsing, [`generate`] for output, and
//! [`apply_variable_editability`] / [`compute_instance_output`] for
//! templates.

#![warn(missing_docs)]

/// Escape sequence transcoding for field values.
pub mod escape;
/// HL7 grammar: line splitting, delimiters, parser, tree, and generator.
pub mod grammar;
/// Template placeholders and instances.
pub mod variables;

// ── Convenience re-exports ──────────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Parser
pub use grammar::parser::{ParseResult, is_valid_segment_name, parse_str};

// Tree
pub use grammar::ast::{Component, Field, FieldShape, Message, Segment};

// Delimiters
pub use grammar::delimiters::{Delimiters, resolve_delimiters, resolve_field_separator};

// Escaping
pub use escape::{Transcoder, escape, unescape};

// Generator
pub use grammar::emit::{delimiters_of, field_to_string, generate};

// Edits
pub use grammar::edit::{
    EditError, set_component_value, set_field_value, set_repetition_value, set_subcomponent_value,
};

// Diagnostics (re-exported from the diagnostics crate)
pub use grammar::diag::{Diagnostic, Severity, Span, codes};

// Variables
pub use variables::{
    DEFAULT_MARKER, FieldLocation, Instance, InstanceError, InstanceOutput, InstanceSet,
    MarkerError, VariableMatcher, VariableSummary, apply_variable_editability, compute_instance_output,
    contains_variable, extract_group_id, extract_unique_variables, field_contains_variable,
    substitute_variables,
};

// Serialization helpers
pub use grammar::dump::{from_json, to_pretty_json};
