//! Shared test helpers for `hl7_toolchain_core` integration tests.

#![allow(unreachable_pub)]

use std::path::PathBuf;

use hl7_toolchain_core::grammar::ast::{Field, Message};
use hl7_toolchain_core::grammar::parser::ParseResult;
use hl7_toolchain_diagnostics::Severity;

/// Route `log` output through the test harness (`RUST_LOG=debug` to see it).
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ─── Sample files ────────────────────────────────────────────────────────────

/// Path to the repository's `samples/` directory.
#[allow(dead_code)]
pub fn samples_dir() -> PathBuf {
    let mut root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // crates/core -> repo root
    root.pop();
    root.pop();
    root.join("samples")
}

/// Read one sample file by name.
#[allow(dead_code)]
pub fn read_sample(name: &str) -> String {
    let path = samples_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

/// Normalize line endings to `\r` and drop blank lines, the form the
/// generator writes.
#[allow(dead_code)]
pub fn canonical(input: &str) -> String {
    input
        .split(['\r', '\n'])
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\r")
}

// ─── Parse-result helpers ────────────────────────────────────────────────────

/// Collect diagnostic codes from parser diagnostics.
#[allow(dead_code)]
pub fn extract_diag_codes(result: &ParseResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .map(|d| d.id.to_string())
        .collect()
}

/// Segment names in order.
#[allow(dead_code)]
pub fn segment_names(message: &Message) -> Vec<&str> {
    message.segments.iter().map(|s| s.name.as_str()).collect()
}

/// Look up a field by segment name and position, panicking when absent.
#[allow(dead_code)]
pub fn field<'a>(message: &'a Message, segment: &str, position: usize) -> &'a Field {
    message
        .segments_named(segment)
        .next()
        .and_then(|s| s.field(position))
        .unwrap_or_else(|| panic!("{segment}-{position} not found"))
}

/// Check if a severity is Warn.
#[allow(dead_code)]
pub fn is_severity_warn(s: &Severity) -> bool {
    matches!(s, Severity::Warn)
}

/// Check if a severity is Info.
#[allow(dead_code)]
pub fn is_severity_info(s: &Severity) -> bool {
    matches!(s, Severity::Info)
}
