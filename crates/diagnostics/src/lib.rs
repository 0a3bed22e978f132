//! Problem reports for HL7 v2 parsing.
//!
//! The parser always returns a tree. Anything odd it finds along the way,
//! such as a missing `MSH` header, becomes a [`Diagnostic`] keyed by a
//! catalog code from [`codes`]. [`LineIndex`] turns its [`Span`] into line
//! and column numbers for display.

#![warn(missing_docs)]

/// Diagnostic ID constants generated from the catalog.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

// ── LineIndex ────────────────────────────────────────────────────────────

/// Maps byte offsets in a source string to line and column positions.
///
/// HL7 segments are terminated by `\r` on the wire but files on disk often
/// use `\n` or `\r\n`; all three count as one line break here, so line
/// numbers agree with segment indices for messages without blank lines.
///
/// Both numbers start at 0.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    /// `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a `LineIndex` from source text.
    pub fn new(text: &str) -> Self {
        let b = text.as_bytes();
        let mut line_starts = vec![0usize];
        let mut i = 0usize;
        while i < b.len() {
            match b[i] {
                b'\r' if b.get(i + 1) == Some(&b'\n') => {
                    i += 2;
                    line_starts.push(i);
                }
                b'\r' | b'\n' => {
                    i += 1;
                    line_starts.push(i);
                }
                _ => i += 1,
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    ///
    /// If `offset` is past the end of the source, the last line is returned
    /// and the column is not clamped.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line, col)
    }

    /// Byte offset of the start of the given 0-indexed line.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Total number of lines (at least 1, even for empty input).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// How serious a diagnostic is. Serialized in lowercase (`"warn"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// The message cannot be used as written.
    Error,
    /// Accepted here, but a receiving system would probably reject it.
    Warn,
    /// A fallback was applied; nothing to fix.
    Info,
}

impl Severity {
    /// Lowercase label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open byte range `start..end` into the parsed text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    #[allow(missing_docs)]
    pub start: usize,
    #[allow(missing_docs)]
    pub end: usize,
}

impl Span {
    /// # Panics
    /// When `end` is before `start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "inverted span {start}..{end}");
        Self { start, end }
    }

    /// Zero-width span, used for problems that have no text to point at.
    pub fn empty(at: usize) -> Self {
        Self::new(at, at)
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One recoverable problem found in a message.
///
/// The parser collects these instead of failing. `id` is an `HL7NNNN` code
/// from the catalog; [`Diagnostic::explain`] looks up its long description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Catalog code such as `"HL71001"`.
    pub id: Cow<'static, str>,
    #[allow(missing_docs)]
    pub severity: Severity,
    /// One-line description of this occurrence.
    pub message: String,
    /// Where in the input, when the problem has a location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Structured details (`segment`, `line`, `value`) for tools that filter
    /// or group diagnostics. Sorted keys keep JSON output stable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Diagnostic {
    /// A diagnostic with an explicit severity and no context.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        severity: Severity,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            span,
            context: None,
        }
    }

    /// A diagnostic whose severity is read from the catalog.
    ///
    /// Codes missing from the catalog become warnings.
    pub fn from_code(id: &'static str, message: impl Into<String>, span: Option<Span>) -> Self {
        let severity = default_severity(id).unwrap_or(Severity::Warn);
        Self::new(id, severity, message, span)
    }

    /// Replace the context map.
    pub fn with_context(self, context: BTreeMap<String, String>) -> Self {
        Self {
            context: Some(context),
            ..self
        }
    }

    /// Catalog explanation for `self.id`.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.id)
    }

    #[allow(missing_docs)]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// `warn[HL71001]: message`, with ` (at start..end)` appended when located.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.id, self.message)?;
        match self.span {
            Some(span) => write!(f, " (at {span})"),
            None => Ok(()),
        }
    }
}

/// Long-form explanation of a catalog code.
pub fn explain(id: &str) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_explain.rs"))
}

/// Severity the catalog assigns to a code.
pub fn default_severity(id: &str) -> Option<Severity> {
    include!(concat!(env!("OUT_DIR"), "/generated_severity.rs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── LineIndex ────────────────────────────────────────────────────────

    #[test]
    fn line_index_single_line() {
        let idx = LineIndex::new("PID|1");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.line_col(0), (0, 0));
        assert_eq!(idx.line_col(4), (0, 4));
    }

    #[test]
    fn line_index_carriage_return_terminators() {
        let idx = LineIndex::new("MSH|\rPID|");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line_col(3), (0, 3));
        assert_eq!(idx.line_col(5), (1, 0));
    }

    #[test]
    fn line_index_crlf_counts_once() {
        let idx = LineIndex::new("ab\r\ncd");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line_start(1), Some(4));
        assert_eq!(idx.line_col(5), (1, 1));
    }

    #[test]
    fn line_index_mixed_terminators() {
        let idx = LineIndex::new("a\nb\rc\r\nd");
        assert_eq!(idx.line_count(), 4);
        assert_eq!(idx.line_start(1), Some(2));
        assert_eq!(idx.line_start(2), Some(4));
        assert_eq!(idx.line_start(3), Some(7));
        assert_eq!(idx.line_start(4), None);
    }

    #[test]
    fn line_index_empty_input() {
        let idx = LineIndex::new("");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.line_col(0), (0, 0));
    }

    #[test]
    fn line_index_multibyte_utf8() {
        // 'é' is 2 bytes in UTF-8
        let idx = LineIndex::new("é\ra");
        assert_eq!(idx.line_col(2), (0, 2));
        assert_eq!(idx.line_col(3), (1, 0));
    }

    // ── Span ────────────────────────────────────────────────────────────

    #[test]
    fn span_len_and_empty() {
        assert_eq!(Span::new(5, 10).len(), 5);
        assert!(Span::empty(7).is_empty());
        assert!(!Span::new(0, 1).is_empty());
    }

    #[test]
    #[should_panic(expected = "inverted span 5..3")]
    fn span_new_inverted_panics() {
        Span::new(5, 3);
    }

    // ── Severity / Display ──────────────────────────────────────────────

    #[test]
    fn severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warn), "warn");
        assert_eq!(format!("{}", Severity::Info), "info");
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::from_code(codes::PARSER_INVALID_SEGMENT_NAME, "bad name 'pid'", None);
        assert_eq!(d.to_string(), "warn[HL71001]: bad name 'pid'");
        let located = Diagnostic {
            span: Some(Span::new(9, 12)),
            ..d
        };
        assert_eq!(located.to_string(), "warn[HL71001]: bad name 'pid' (at 9..12)");
    }

    // ── Catalog lookups ─────────────────────────────────────────────────

    #[test]
    fn from_code_uses_catalog_severity() {
        let d = Diagnostic::from_code(codes::PARSER_NO_SEGMENTS, "empty", None);
        assert_eq!(d.severity, Severity::Info);
        let d = Diagnostic::from_code(codes::PARSER_MISSING_HEADER, "no MSH", None);
        assert_eq!(d.severity, Severity::Warn);
        assert!(!d.is_error());
    }

    #[test]
    fn unknown_code_has_no_severity_or_explanation() {
        assert!(default_severity("HL79999").is_none());
        let d = Diagnostic::new("HL79999", Severity::Error, "test", None);
        assert!(d.explain().is_none());
        assert!(d.is_error());
    }

    #[test]
    fn all_codes_have_explanations() {
        let all = [
            codes::PARSER_INVALID_SEGMENT_NAME,
            codes::PARSER_NO_SEGMENTS,
            codes::PARSER_MISSING_HEADER,
            codes::PARSER_INVALID_FIELD_SEPARATOR,
            codes::PARSER_INVALID_ENCODING_CHARACTERS,
        ];
        for code in &all {
            assert!(
                explain(code).is_some(),
                "diagnostic code {code} has no explain() entry"
            );
            assert!(
                default_severity(code).is_some(),
                "diagnostic code {code} has no default severity"
            );
        }
    }

    #[test]
    fn explanation_mentions_subject() {
        let text = explain(codes::PARSER_MISSING_HEADER).unwrap();
        assert!(text.contains("MSH"), "unexpected explanation: {text}");
    }

    // ── Serde ───────────────────────────────────────────────────────────

    #[test]
    fn diagnostic_serde_roundtrip() {
        let d = Diagnostic::from_code(
            codes::PARSER_INVALID_SEGMENT_NAME,
            "test message",
            Some(Span::new(10, 13)),
        )
        .with_context(BTreeMap::from([("segment".into(), "pi1".into())]));
        let json = serde_json::to_string(&d).unwrap();
        let d2: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn diagnostic_serde_omits_none_span_and_context() {
        let d = Diagnostic::from_code(codes::PARSER_NO_SEGMENTS, "test", None);
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("span"), "None span should be omitted: {json}");
        assert!(
            !json.contains("context"),
            "None context should be omitted: {json}"
        );
        assert!(json.contains("\"severity\":\"info\""), "{json}");
    }

    #[test]
    fn diagnostic_context_deterministic_order() {
        let d = Diagnostic::from_code(codes::PARSER_INVALID_SEGMENT_NAME, "test", None).with_context(
            BTreeMap::from([
                ("z_last".into(), "1".into()),
                ("a_first".into(), "2".into()),
            ]),
        );
        let json = serde_json::to_string(&d).unwrap();
        let a_pos = json.find("a_first").unwrap();
        let z_pos = json.find("z_last").unwrap();
        assert!(a_pos < z_pos, "keys should serialize sorted: {json}");
    }
}
