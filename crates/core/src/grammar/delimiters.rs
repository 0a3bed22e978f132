//! Delimiter resolution from the `MSH` header.
//!
//! The character right after `MSH` is the field separator; MSH-2 lists the
//! component, repetition, escape and subcomponent characters in that order.
//! Anything unusable falls back to the standard `|^~\&` set.

use serde::{Deserialize, Serialize};

use super::lexer::BOM;

/// Default field separator.
pub const DEFAULT_FIELD_SEPARATOR: char = '|';
/// Default MSH-2 encoding characters.
pub const DEFAULT_ENCODING_CHARACTERS: &str = "^~\\&";

/// The five structural characters of an HL7 v2 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    /// Separates fields (`|`).
    pub field: char,
    /// Separates components (`^`).
    pub component: char,
    /// Separates repetitions (`~`).
    pub repetition: char,
    /// Starts and ends escape sequences (`\`).
    pub escape: char,
    /// Separates subcomponents (`&`).
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD_SEPARATOR,
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Standard delimiters with a custom field separator.
    pub fn with_field(field: char) -> Self {
        Self {
            field,
            ..Self::default()
        }
    }

    /// Build delimiters from a field separator and an MSH-2 value.
    ///
    /// Returns `None` when the encoding characters are unusable: fewer than
    /// four, an invalid character, or a collision with another delimiter.
    /// Characters after the fourth are ignored.
    pub fn from_encoding_characters(field: char, encoding: &str) -> Option<Self> {
        let mut chars = encoding.chars();
        let component = chars.next()?;
        let repetition = chars.next()?;
        let escape = chars.next()?;
        let subcomponent = chars.next()?;

        let all = [field, component, repetition, escape, subcomponent];
        if !all.iter().all(|&c| is_valid_separator(c)) {
            return None;
        }
        for (i, a) in all.iter().enumerate() {
            if all[i + 1..].contains(a) {
                return None;
            }
        }
        Some(Self {
            field,
            component,
            repetition,
            escape,
            subcomponent,
        })
    }

    /// The MSH-2 text these delimiters would be declared with.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    /// Whether these are the standard `|^~\&` delimiters.
    pub fn is_standard(&self) -> bool {
        *self == Self::default()
    }
}

/// Whether `c` may serve as a structural separator.
///
/// Rejects line terminators, C0 control characters, and alphanumerics (an
/// alphanumeric in that position usually means the separator is missing and
/// we are looking at the next segment-name character).
pub fn is_valid_separator(c: char) -> bool {
    !(c == '\r' || c == '\n' || c.is_control() || c.is_alphanumeric())
}

/// Outcome of resolving delimiters from raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The delimiters to use.
    pub delimiters: Delimiters,
    /// Whether an `MSH` line was found at all.
    pub header_found: bool,
    /// Whether the header's field separator was rejected.
    pub field_fallback: bool,
    /// Whether the header's encoding characters were rejected.
    pub encoding_fallback: bool,
}

/// Return the field separator used by `text`.
///
/// Looks at the first line starting with `MSH` and takes the character at
/// index 3. Falls back to `|` when there is no such line or the character
/// fails [`is_valid_separator`].
pub fn resolve_field_separator(text: &str) -> char {
    header_line(text)
        .and_then(|line| line.chars().nth(3))
        .filter(|&c| is_valid_separator(c))
        .unwrap_or(DEFAULT_FIELD_SEPARATOR)
}

/// Resolve all five delimiters from `text`.
pub fn resolve_delimiters(text: &str) -> Resolution {
    let Some(line) = header_line(text) else {
        return Resolution {
            delimiters: Delimiters::default(),
            header_found: false,
            field_fallback: false,
            encoding_fallback: false,
        };
    };

    let candidate = line.chars().nth(3);
    let field = resolve_field_separator(text);
    let field_fallback = candidate != Some(field);

    // MSH-2 runs from just after the separator up to the next separator.
    let rest = &line[3 + candidate.map_or(0, char::len_utf8)..];
    let encoding = rest.split(field).next().unwrap_or_default();
    let (delimiters, encoding_fallback) = match Delimiters::from_encoding_characters(field, encoding) {
        Some(d) => (d, false),
        None => (Delimiters::with_field(field), true),
    };

    Resolution {
        delimiters,
        header_found: true,
        field_fallback,
        encoding_fallback,
    }
}

fn header_line(text: &str) -> Option<&str> {
    text.strip_prefix(BOM)
        .unwrap_or(text)
        .split(['\r', '\n'])
        .find(|line| line.starts_with("MSH"))
}
