//! HL7 generator: converts a message tree back into wire text.
//!
//! Unedited content comes back byte-for-byte, except that segments are
//! always terminated with `\r`. MSH-2 is written verbatim; every other leaf
//! is escaped.

use crate::escape::Transcoder;
use crate::grammar::ast::{Component, Field, FieldShape, Message, Segment};
use crate::grammar::delimiters::{Delimiters, is_valid_separator};

/// Segment terminator used on output.
pub const SEGMENT_TERMINATOR: char = '\r';

// ── Public API ──────────────────────────────────────────────────────────

/// Generate HL7 wire text from a message tree.
///
/// Delimiters are re-derived from the tree's own `MSH` header, so editing
/// MSH-1 changes the separator for the whole output.
pub fn generate(message: &Message) -> String {
    let transcoder = Transcoder::new(delimiters_of(message));
    let mut out = String::new();
    for (i, segment) in message.segments.iter().enumerate() {
        if i > 0 {
            out.push(SEGMENT_TERMINATOR);
        }
        emit_segment(&mut out, segment, &transcoder);
    }
    out
}

/// Serialize a single field (or repetition) with the given delimiters.
pub fn field_to_string(field: &Field, delimiters: Delimiters) -> String {
    let mut out = String::new();
    emit_field(&mut out, field, &Transcoder::new(delimiters));
    out
}

/// Delimiters declared by the message's first `MSH` segment.
///
/// Falls back to the standard set when there is no header, and applies the
/// same validity rules as the parser to MSH-1 and MSH-2.
pub fn delimiters_of(message: &Message) -> Delimiters {
    let Some(header) = message.header() else {
        return Delimiters::default();
    };
    let field = header
        .field(1)
        .and_then(|f| single_char(&f.value))
        .filter(|&c| is_valid_separator(c))
        .unwrap_or(Delimiters::default().field);
    header
        .field(2)
        .and_then(|f| Delimiters::from_encoding_characters(field, &f.value))
        .unwrap_or_else(|| Delimiters::with_field(field))
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

// ── Segment emission ────────────────────────────────────────────────────

fn emit_segment(out: &mut String, segment: &Segment, transcoder: &Transcoder) {
    let sep = transcoder.delimiters().field;
    out.push_str(&segment.name);

    if segment.is_header() {
        out.push(sep);
        // Skip the synthetic MSH-1; MSH-2 goes out untouched.
        let mut fields = segment.fields.iter().skip(1);
        if let Some(encoding) = fields.next() {
            out.push_str(&encoding.value);
        }
        for field in fields {
            out.push(sep);
            emit_field(out, field, transcoder);
        }
        return;
    }

    for field in &segment.fields {
        out.push(sep);
        emit_field(out, field, transcoder);
    }
}

// ── Field emission ──────────────────────────────────────────────────────

fn emit_field(out: &mut String, field: &Field, transcoder: &Transcoder) {
    let d = transcoder.delimiters();
    match &field.shape {
        FieldShape::Repeating { repetitions } => {
            for (i, rep) in repetitions.iter().enumerate() {
                if i > 0 {
                    out.push(d.repetition);
                }
                emit_occurrence(out, rep, transcoder);
            }
        }
        _ => emit_occurrence(out, field, transcoder),
    }
}

/// Emit one occurrence: components when present, else the escaped value.
fn emit_occurrence(out: &mut String, field: &Field, transcoder: &Transcoder) {
    match &field.shape {
        FieldShape::Composite { components } if !components.is_empty() => {
            emit_components(out, components, transcoder);
        }
        // Nested repetitions are never produced by the parser; flatten them.
        FieldShape::Repeating { repetitions } if !repetitions.is_empty() => {
            emit_field(out, field, transcoder);
        }
        _ => out.push_str(&transcoder.escape(&field.value)),
    }
}

fn emit_components(out: &mut String, components: &[Component], transcoder: &Transcoder) {
    let d = transcoder.delimiters();
    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            out.push(d.component);
        }
        if component.sub_components.is_empty() {
            out.push_str(&transcoder.escape(&component.value));
            continue;
        }
        for (j, sub) in component.sub_components.iter().enumerate() {
            if j > 0 {
                out.push(d.subcomponent);
            }
            out.push_str(&transcoder.escape(&sub.value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parser::parse_str;

    #[test]
    fn header_only_message() {
        let msg = parse_str("MSH|^~\\&").message;
        assert_eq!(generate(&msg), "MSH|^~\\&");
    }

    #[test]
    fn segment_without_fields_is_bare_name() {
        let msg = parse_str("EVN").message;
        assert_eq!(generate(&msg), "EVN");
    }

    #[test]
    fn delimiters_follow_edited_header() {
        let mut msg = parse_str("MSH|^~\\&|A^B\rPID|1|x^y").message;
        msg.segments[0].fields[0].value = "#".into();
        assert_eq!(generate(&msg), "MSH#^~\\&#A^B\rPID#1#x^y");
    }

    #[test]
    fn invalid_header_separator_falls_back() {
        let mut msg = parse_str("MSH|^~\\&|A").message;
        msg.segments[0].fields[0].value = "ab".into();
        assert_eq!(generate(&msg), "MSH|^~\\&|A");
    }

    #[test]
    fn field_to_string_repeating() {
        let msg = parse_str("PID|1|a^b~c").message;
        let field = msg.segments[0].field(2).unwrap();
        assert_eq!(field_to_string(field, Delimiters::default()), "a^b~c");
    }

    #[test]
    fn simple_value_with_separator_is_escaped() {
        let msg = crate::grammar::ast::Message {
            segments: vec![crate::grammar::ast::Segment {
                id: "seg-0".into(),
                name: "NTE".into(),
                fields: vec![Field::simple(1, "a|b^c")],
            }],
        };
        assert_eq!(generate(&msg), r"NTE|a\F\b\S\c");
    }
}
