use super::{
    ast::{Component, Field, Message, Segment},
    delimiters::{Delimiters, resolve_delimiters},
    diag::{Diagnostic, Span, codes},
    lexer::{Line, split_lines},
};
use crate::escape::Transcoder;

/// Shorthand for building a `BTreeMap<String, String>` context from key-value pairs.
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        std::collections::BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}

/// Result of parsing an HL7 message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParseResult {
    /// The parsed message tree.
    pub message: Message,
    /// Delimiters the message was split with.
    pub delimiters: Delimiters,
    /// Recoverable problems found while parsing.
    pub diagnostics: Vec<Diagnostic>,
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Parse raw HL7 text into a message tree.
///
/// Never fails: malformed segment names, ragged fields, and a missing header
/// are reported as diagnostics and the best-effort tree is still returned.
pub fn parse_str(input: &str) -> ParseResult {
    Parser::new(input).parse()
}

// ─── Parser Implementation ─────────────────────────────────────────────────

struct Parser<'a> {
    input: &'a str,
    lines: Vec<Line<'a>>,
    transcoder: Transcoder,
    diags: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let resolution = resolve_delimiters(input);
        let lines = split_lines(input);
        let mut diags = Vec::new();

        if resolution.header_found {
            let header = lines.iter().find(|l| l.text.starts_with("MSH"));
            let header_span = header.map(|l| Span::new(l.start, l.end));
            if resolution.field_fallback {
                diags.push(
                    Diagnostic::from_code(
                        codes::PARSER_INVALID_FIELD_SEPARATOR,
                        "MSH field separator is missing or invalid; using '|'",
                        header_span,
                    )
                    .with_context(ctx!("assumed" => "|")),
                );
            }
            if resolution.encoding_fallback {
                diags.push(
                    Diagnostic::from_code(
                        codes::PARSER_INVALID_ENCODING_CHARACTERS,
                        "MSH-2 encoding characters are unusable; using '^~\\&'",
                        header_span,
                    )
                    .with_context(ctx!("assumed" => "^~\\&")),
                );
            }
        }
        log::debug!("resolved delimiters: {:?}", resolution.delimiters);

        Self {
            input,
            lines,
            transcoder: Transcoder::new(resolution.delimiters),
            diags,
        }
    }

    fn delimiters(&self) -> Delimiters {
        *self.transcoder.delimiters()
    }

    // ── Main parse loop ─────────────────────────────────────────────────

    fn parse(mut self) -> ParseResult {
        let lines = std::mem::take(&mut self.lines);
        let segments: Vec<Segment> = lines
            .iter()
            .enumerate()
            .map(|(index, line)| self.parse_segment(index, line))
            .collect();

        if segments.is_empty() {
            let span = if self.input.is_empty() {
                Span::empty(0)
            } else {
                Span::new(0, self.input.len())
            };
            self.diags.push(Diagnostic::from_code(
                codes::PARSER_NO_SEGMENTS,
                "no segments detected",
                Some(span),
            ));
        } else if !segments.iter().any(Segment::is_header) {
            log::warn!("message has no MSH segment; assuming standard delimiters");
            self.diags.push(Diagnostic::from_code(
                codes::PARSER_MISSING_HEADER,
                "message has no MSH header segment",
                Some(Span::empty(0)),
            ));
        }

        ParseResult {
            message: Message { segments },
            delimiters: self.delimiters(),
            diagnostics: self.diags,
        }
    }

    // ── Segments ────────────────────────────────────────────────────────

    fn parse_segment(&mut self, index: usize, line: &Line<'a>) -> Segment {
        let d = self.delimiters();
        let mut tokens = line.text.split(d.field);
        let name = tokens.next().unwrap_or_default();

        if !is_valid_segment_name(name) {
            log::warn!("segment {} has invalid name {:?}", index, name);
            self.diags.push(
                Diagnostic::from_code(
                    codes::PARSER_INVALID_SEGMENT_NAME,
                    format!("invalid segment name '{name}'"),
                    Some(Span::new(line.start, line.start + name.len())),
                )
                .with_context(ctx!("segment" => name, "line" => (index + 1).to_string())),
            );
        }

        let mut fields = Vec::new();
        let first_position = if name == "MSH" {
            // MSH-1 is implied by the split and MSH-2 is kept verbatim.
            fields.push(Field::simple(1, d.field.to_string()).read_only());
            fields.push(Field::simple(2, tokens.next().unwrap_or_default()).read_only());
            3
        } else {
            1
        };

        fields.extend(
            tokens
                .enumerate()
                .map(|(i, raw)| self.parse_field(first_position + i, raw)),
        );

        Segment {
            id: format!("seg-{index}"),
            name: name.to_string(),
            fields,
        }
    }

    // ── Fields ──────────────────────────────────────────────────────────

    fn parse_field(&self, position: usize, raw: &str) -> Field {
        let d = self.delimiters();
        if raw.contains(d.repetition) {
            let repetitions = raw
                .split(d.repetition)
                .enumerate()
                .map(|(i, rep)| self.parse_occurrence(i + 1, rep))
                .collect();
            Field::repeating(position, raw, repetitions)
        } else {
            self.parse_occurrence(position, raw)
        }
    }

    /// One occurrence of a field: composite when it contains a component or
    /// subcomponent separator, simple otherwise.
    fn parse_occurrence(&self, position: usize, raw: &str) -> Field {
        let d = self.delimiters();
        if raw.contains(d.component) || raw.contains(d.subcomponent) {
            let components = raw
                .split(d.component)
                .enumerate()
                .map(|(i, token)| self.parse_component(i + 1, token))
                .collect();
            Field::composite(position, raw, components)
        } else {
            Field::simple(position, self.transcoder.unescape(raw))
        }
    }

    fn parse_component(&self, position: usize, raw: &str) -> Component {
        let d = self.delimiters();
        if raw.contains(d.subcomponent) {
            Component {
                position,
                value: raw.to_string(),
                sub_components: raw
                    .split(d.subcomponent)
                    .enumerate()
                    .map(|(i, sub)| Component::leaf(i + 1, self.transcoder.unescape(sub)))
                    .collect(),
            }
        } else {
            Component::leaf(position, self.transcoder.unescape(raw))
        }
    }
}

/// Whether `name` has the shape of a segment code: `[A-Z][A-Z0-9]{2}`.
pub fn is_valid_segment_name(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() == 3
        && b[0].is_ascii_uppercase()
        && b[1..]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
