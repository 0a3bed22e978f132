/// UTF-8 byte order mark some editors prepend to saved files.
pub const BOM: char = '\u{feff}';

/// A segment line that borrows its text directly from the source input.
///
/// `text` is always exactly `&input[start..end]`, without the terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Borrowed slice of the source input for this line.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// Split raw message text into non-blank segment lines.
///
/// Accepts `\r\n`, bare `\n`, or bare `\r` as terminators; `\r\n` is one
/// terminator, not two. Lines that are empty or whitespace-only are dropped.
///
/// The terminators are ASCII, and UTF-8 continuation bytes never match
/// them, so scanning bytes is safe for multi-byte input. A leading byte
/// order mark is skipped; spans stay offsets into `input`.
pub fn split_lines(input: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let b = input.as_bytes();
    let mut start = if input.starts_with(BOM) { BOM.len_utf8() } else { 0 };
    let mut i = start;
    while i < b.len() {
        let c = b[i];
        if c == b'\r' || c == b'\n' {
            push_line(&mut lines, input, start, i);
            i += if c == b'\r' && b.get(i + 1) == Some(&b'\n') {
                2
            } else {
                1
            };
            start = i;
        } else {
            i += 1;
        }
    }
    push_line(&mut lines, input, start, b.len());
    lines
}

fn push_line<'a>(lines: &mut Vec<Line<'a>>, input: &'a str, start: usize, end: usize) {
    let text = &input[start..end];
    if !text.trim().is_empty() {
        lines.push(Line { text, start, end });
    }
}
