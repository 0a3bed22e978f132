//! HL7 escape sequence transcoding.
//!
//! Literal delimiter characters inside a value are written as escape
//! sequences framed by the escape character:
//!
//! | sequence | literal                |
//! |----------|------------------------|
//! | `\F\`    | field separator        |
//! | `\S\`    | component separator    |
//! | `\R\`    | repetition separator   |
//! | `\T\`    | subcomponent separator |
//! | `\E\`    | escape character       |
//!
//! Other sequences (`\H\`, `\X0D\`, ...) are not interpreted and pass
//! through [`unescape`] as literal text.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::grammar::delimiters::Delimiters;

static STANDARD_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([FSRTE])\\").expect("escape sequence regex is valid"));

/// Converts values between wire form and literal form for one set of
/// delimiters.
///
/// Building one compiles a regex only when the escape character is not `\`.
#[derive(Debug, Clone)]
pub struct Transcoder {
    delimiters: Delimiters,
    sequence: Cow<'static, Regex>,
}

impl Transcoder {
    /// Create a transcoder for `delimiters`.
    pub fn new(delimiters: Delimiters) -> Self {
        let sequence = if delimiters.escape == '\\' {
            Cow::Borrowed(&*STANDARD_SEQUENCE)
        } else {
            let esc = regex::escape(&delimiters.escape.to_string());
            let pattern = format!("{esc}([FSRTE]){esc}");
            Cow::Owned(Regex::new(&pattern).expect("escaped delimiter always forms a valid regex"))
        };
        Self {
            delimiters,
            sequence,
        }
    }

    /// The delimiters this transcoder maps.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Replace recognized escape sequences with their literal characters.
    ///
    /// One regex pass over the input, so an escaped escape followed by an
    /// escaped separator (`\E\\F\`) decodes to `\|` rather than being
    /// re-scanned.
    pub fn unescape<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains(self.delimiters.escape) {
            return Cow::Borrowed(text);
        }
        let d = &self.delimiters;
        self.sequence.replace_all(text, |caps: &Captures<'_>| {
            let literal = match &caps[1] {
                "F" => d.field,
                "S" => d.component,
                "R" => d.repetition,
                "T" => d.subcomponent,
                _ => d.escape,
            };
            literal.to_string()
        })
    }

    /// Replace literal delimiter characters with escape sequences.
    ///
    /// The escape character is encoded in the same pass as the separators,
    /// so sequences inserted here are never escaped a second time.
    pub fn escape<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let d = &self.delimiters;
        let special = |c: char| {
            c == d.escape || c == d.field || c == d.component || c == d.repetition || c == d.subcomponent
        };
        if !text.contains(special) {
            return Cow::Borrowed(text);
        }

        let mut out = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            let code = if c == d.escape {
                'E'
            } else if c == d.field {
                'F'
            } else if c == d.component {
                'S'
            } else if c == d.repetition {
                'R'
            } else if c == d.subcomponent {
                'T'
            } else {
                out.push(c);
                continue;
            };
            out.push(d.escape);
            out.push(code);
            out.push(d.escape);
        }
        Cow::Owned(out)
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(Delimiters::default())
    }
}

/// Unescape `text` using the standard encoding characters and the given
/// field separator.
pub fn unescape(text: &str, field_separator: char) -> String {
    Transcoder::new(Delimiters::with_field(field_separator))
        .unescape(text)
        .into_owned()
}

/// Escape `text` using the standard encoding characters and the given field
/// separator.
pub fn escape(text: &str, field_separator: char) -> String {
    Transcoder::new(Delimiters::with_field(field_separator))
        .escape(text)
        .into_owned()
}
