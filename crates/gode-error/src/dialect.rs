//! Script-stack-trace line dialects.
//!
//! Different script engines format `Error.stack` lines differently. This
//! module recognizes the four dialects spec'd for the core and falls back
//! to an `<unknown>` frame for anything else, per the invariant that
//! parsing never fails.

use crate::stack::StackFrame;

/// Maps a handful of well-known implementation-internal native symbols to
/// friendly names, e.g. a QuickJS builtin's mangled name to `JSON.parse`.
/// Unrecognized native symbols get a generic "native" label instead of
/// being dropped.
const NATIVE_SYMBOL_MAP: &[(&str, &str)] = &[
    ("js_json_parse", "JSON.parse"),
    ("js_json_stringify", "JSON.stringify"),
    ("js_array_sort", "Array.prototype.sort"),
    ("js_promise_then", "Promise.prototype.then"),
];

fn friendly_native_name(dotted: &str) -> String {
    for (symbol, friendly) in NATIVE_SYMBOL_MAP {
        if dotted.ends_with(symbol) {
            return (*friendly).to_string();
        }
    }
    "native".to_string()
}

/// Parse a single line of a script stack trace into a [`StackFrame`].
///
/// Tries, in order:
/// 1. `at FUNC (FILE:LINE:COL)`
/// 2. `at FILE:LINE:COL` (function defaults to `<anonymous>`)
/// 3. `FUNC@FILE:LINE:COL`
/// 4. `at <dotted-native-path> (native)`
///
/// Any other non-empty line becomes an `<unknown>` frame retaining the
/// raw text. Never fails.
pub fn parse_stack_frame(line: &str) -> StackFrame {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StackFrame::unknown(line);
    }

    if let Some(rest) = trimmed.strip_prefix("at ") {
        if let Some(frame) = parse_at_func_paren(rest) {
            return frame;
        }
        if let Some(frame) = parse_native_marker(rest) {
            return frame;
        }
        if let Some(frame) = parse_file_line_col(rest, "<anonymous>") {
            return frame;
        }
        return StackFrame::unknown(line);
    }

    if let Some(frame) = parse_func_at_location(trimmed) {
        return frame;
    }

    StackFrame::unknown(line)
}

/// `at FUNC (FILE:LINE:COL)`
fn parse_at_func_paren(rest: &str) -> Option<StackFrame> {
    let paren_start = rest.find('(')?;
    let paren_end = rest.rfind(')')?;
    if paren_end <= paren_start {
        return None;
    }
    let function = rest[..paren_start].trim();
    if function.is_empty() {
        return None;
    }
    let location = &rest[paren_start + 1..paren_end];
    parse_file_line_col(location, function)
}

/// `at <dotted-native-path> (native)`
fn parse_native_marker(rest: &str) -> Option<StackFrame> {
    let paren_start = rest.find('(')?;
    let paren_end = rest.rfind(')')?;
    let inside = rest[paren_start + 1..paren_end].trim();
    if inside != "native" {
        return None;
    }
    let dotted = rest[..paren_start].trim();
    if dotted.is_empty() {
        return None;
    }
    Some(StackFrame::native(friendly_native_name(dotted), "native"))
}

/// `at FILE:LINE:COL` (no function / parens)
fn parse_file_line_col(location: &str, function: &str) -> Option<StackFrame> {
    let parts: Vec<&str> = location.rsplitn(3, ':').collect();
    if parts.len() < 3 {
        return None;
    }
    let column: u32 = parts[0].parse().ok()?;
    let line: u32 = parts[1].parse().ok()?;
    let file = parts[2];
    Some(StackFrame {
        file: file.to_string(),
        function: function.to_string(),
        line: Some(line),
        column: Some(column),
        module_name: None,
        package_name: None,
        native: false,
        raw: None,
    })
}

/// `FUNC@FILE:LINE:COL`
fn parse_func_at_location(trimmed: &str) -> Option<StackFrame> {
    let at_pos = trimmed.find('@')?;
    let function = &trimmed[..at_pos];
    if function.is_empty() {
        return None;
    }
    let location = &trimmed[at_pos + 1..];
    parse_file_line_col(location, function)
}

/// Parse a full multi-line stack trace string into frames, one per line.
/// Empty lines are skipped.
pub fn parse_stack_trace_text(text: &str) -> Vec<StackFrame> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(parse_stack_frame)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_one_func_paren() {
        let f = parse_stack_frame("at funcC (/module_a.js:15:12)");
        assert_eq!(f.function, "funcC");
        assert_eq!(f.file, "/module_a.js");
        assert_eq!(f.line, Some(15));
        assert_eq!(f.column, Some(12));
        assert!(!f.native);
    }

    #[test]
    fn dialect_two_file_only() {
        let f = parse_stack_frame("at /module_b.js:17:22");
        assert_eq!(f.function, "<anonymous>");
        assert_eq!(f.file, "/module_b.js");
        assert_eq!(f.line, Some(17));
        assert_eq!(f.column, Some(22));
    }

    #[test]
    fn dialect_three_at_sign() {
        let f = parse_stack_frame("funcC@/module_a.js:15:12");
        assert_eq!(f.function, "funcC");
        assert_eq!(f.line, Some(15));
        assert_eq!(f.column, Some(12));
    }

    #[test]
    fn dialect_four_native_mapped() {
        let f = parse_stack_frame("at internal.js_json_parse (native)");
        assert!(f.native);
        assert_eq!(f.function, "JSON.parse");
    }

    #[test]
    fn dialect_four_native_unmapped() {
        let f = parse_stack_frame("at internal.js_weird_symbol (native)");
        assert!(f.native);
        assert_eq!(f.function, "native");
    }

    #[test]
    fn unrecognized_line_is_unknown_but_keeps_raw() {
        let f = parse_stack_frame("   this is garbage not a frame   ");
        assert_eq!(f.file, "<unknown>");
        assert_eq!(f.function, "<unknown>");
        assert_eq!(f.raw.as_deref(), Some("   this is garbage not a frame   "));
    }

    #[test]
    fn empty_line_is_unknown() {
        let f = parse_stack_frame("");
        assert_eq!(f.file, "<unknown>");
    }
}
