//! `ModuleError`: the primary error type surfaced by the core.

use std::collections::HashMap;
use std::fmt;

use crate::dialect::parse_stack_trace_text;
use crate::stack::{capture_native_stack, StackFrame, StackTrace};

/// Coarse classification of a failure, per the taxonomy in the core's
/// error handling design. Not a distinct Rust error type per kind —
/// `ModuleError` is one record type, matching the host-facing contract
/// that every failure looks the same shape regardless of where it
/// originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    Io,
    Format,
    Interface,
    Initialization,
    Invocation,
    Script,
    Scheduling,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Resolution => "Resolution",
            ErrorKind::Io => "Io",
            ErrorKind::Format => "Format",
            ErrorKind::Interface => "Interface",
            ErrorKind::Initialization => "Initialization",
            ErrorKind::Invocation => "Invocation",
            ErrorKind::Script => "Script",
            ErrorKind::Scheduling => "Scheduling",
        };
        f.write_str(s)
    }
}

/// A composed error carrying module/path/operation context plus a
/// captured native stack trace. The primary error type surfaced by the
/// core across every boundary crossing.
#[derive(Debug, Clone)]
pub struct ModuleError {
    kind: ErrorKind,
    module: String,
    path: String,
    operation: String,
    message: String,
    line: Option<u32>,
    column: Option<u32>,
    source_excerpt: Option<String>,
    script_stack: Option<String>,
    native_stack: StackTrace,
}

impl ModuleError {
    /// Construct a new `ModuleError`, capturing a native stack trace at
    /// the call site.
    pub fn new(
        kind: ErrorKind,
        module: impl Into<String>,
        path: impl Into<String>,
        operation: impl Into<String>,
        underlying: impl fmt::Display,
    ) -> Self {
        let message = underlying.to_string();
        let native_stack = capture_native_stack(message.clone());
        ModuleError {
            kind,
            module: module.into(),
            path: path.into(),
            operation: operation.into(),
            message,
            line: None,
            column: None,
            source_excerpt: None,
            script_stack: None,
            native_stack,
        }
    }

    pub fn with_line(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_source_context(mut self, excerpt: impl Into<String>) -> Self {
        self.source_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_script_stack(mut self, text: impl Into<String>) -> Self {
        self.script_stack = Some(text.into());
        self
    }

    /// Replace the captured native stack. Used by [`crate::safe_operation`]
    /// to attach the trace captured at the point of the unwind rather than
    /// at error construction time.
    pub fn with_native_stack(mut self, stack: StackTrace) -> Self {
        self.native_stack = stack;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn column(&self) -> Option<u32> {
        self.column
    }

    pub fn source_excerpt(&self) -> Option<&str> {
        self.source_excerpt.as_deref()
    }

    pub fn script_stack(&self) -> Option<&str> {
        self.script_stack.as_deref()
    }

    pub fn native_stack(&self) -> &StackTrace {
        &self.native_stack
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format(self))
    }
}

impl std::error::Error for ModuleError {}

/// Produce the human-readable multi-section report: header, location,
/// source excerpt, script stack, native stack.
pub fn format(error: &ModuleError) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} error in module '{}' ({}): {}\n",
        error.kind, error.module, error.operation, error.message
    ));
    out.push_str(&format!("  path: {}\n", error.path));

    if let (Some(line), Some(column)) = (error.line, error.column) {
        out.push_str(&format!("  location: line {}, column {}\n", line, column));
    }

    if let Some(excerpt) = &error.source_excerpt {
        out.push_str("  source:\n");
        out.push_str(&format!("    > {}\n", excerpt));
    }

    if let Some(stack) = &error.script_stack {
        out.push_str("  script stack:\n");
        for line in stack.lines() {
            out.push_str(&format!("    {}\n", line));
        }
    }

    if !error.native_stack.is_empty() {
        out.push_str("  native stack:\n");
        for frame in &error.native_stack.frames {
            out.push_str(&format!("    {}\n", frame));
        }
    }

    out
}

/// Normalized representation of a script-side error, produced by
/// [`parse_script_error`].
#[derive(Debug, Clone, Default)]
pub struct ParsedScriptError {
    pub error_type: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub frames: Vec<StackFrame>,
    pub extra: HashMap<String, String>,
}

/// Input accepted by [`parse_script_error`]: the underlying error value
/// (as text, since the core must stay agnostic of any one engine's error
/// type), a plain string, or a key-value property bag (as some engines
/// expose `{name, message, stack, ...}` as a plain object).
#[derive(Debug, Clone)]
pub enum ScriptErrorInput {
    Underlying(String),
    Text(String),
    Properties(HashMap<String, String>),
}

/// Parse any of the three accepted input shapes into a normalized
/// [`ParsedScriptError`]. Never fails: unrecognized stack lines become
/// `<unknown>` frames (see [`crate::dialect::parse_stack_frame`]).
pub fn parse_script_error(input: ScriptErrorInput) -> ParsedScriptError {
    match input {
        ScriptErrorInput::Underlying(text) | ScriptErrorInput::Text(text) => {
            parse_script_error_text(&text)
        }
        ScriptErrorInput::Properties(props) => parse_script_error_properties(props),
    }
}

fn parse_script_error_text(text: &str) -> ParsedScriptError {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    let (error_type, message) = split_header(header);

    let frames = parse_stack_trace_text(&text[header.len()..]);
    let (file, line, column) = first_frame_location(&frames);

    ParsedScriptError {
        error_type,
        message,
        file,
        line,
        column,
        frames,
        extra: HashMap::new(),
    }
}

fn parse_script_error_properties(mut props: HashMap<String, String>) -> ParsedScriptError {
    let error_type = props.remove("name").unwrap_or_else(|| "Error".to_string());
    let message = props.remove("message").unwrap_or_default();
    let stack_text = props.remove("stack").unwrap_or_default();
    let frames = parse_stack_trace_text(&stack_text);
    let (file, line, column) = first_frame_location(&frames);

    ParsedScriptError {
        error_type,
        message,
        file,
        line,
        column,
        frames,
        extra: props,
    }
}

fn split_header(header: &str) -> (String, String) {
    match header.split_once(": ") {
        Some((name, msg)) => (name.to_string(), msg.to_string()),
        None => ("Error".to_string(), header.to_string()),
    }
}

fn first_frame_location(frames: &[StackFrame]) -> (Option<String>, Option<u32>, Option<u32>) {
    match frames.first() {
        Some(frame) if frame.file != "<unknown>" && frame.file != "native" => {
            (Some(frame.file.clone()), frame.line, frame.column)
        }
        _ => (None, None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_contains_core_fields() {
        let err = ModuleError::new(ErrorKind::Script, "module_a", "/module_a.js", "eval", "boom");
        let rendered = format(&err);
        assert!(rendered.contains("module_a"));
        assert!(rendered.contains("/module_a.js"));
        assert!(rendered.contains("eval"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn new_module_error_has_nonempty_native_stack() {
        let err = ModuleError::new(ErrorKind::Io, "m", "/p", "read", "disk full");
        assert!(!err.native_stack().is_empty());
    }

    #[test]
    fn parse_cross_module_stack() {
        let text = "ReferenceError: x is not defined\n  at funcC (/module_a.js:15:12)\n  at /module_b.js:17:22\n";
        let parsed = parse_script_error(ScriptErrorInput::Text(text.to_string()));
        assert_eq!(parsed.error_type, "ReferenceError");
        assert_eq!(parsed.message, "x is not defined");
        assert_eq!(parsed.frames.len(), 2);
        assert_eq!(parsed.frames[0].function, "funcC");
        assert_eq!(parsed.frames[1].file, "/module_b.js");
        assert_eq!(parsed.frames[1].line, Some(17));
    }

    #[test]
    fn parse_properties_bag() {
        let mut props = HashMap::new();
        props.insert("name".to_string(), "TypeError".to_string());
        props.insert("message".to_string(), "not a function".to_string());
        props.insert(
            "stack".to_string(),
            "at foo (/x.js:1:2)".to_string(),
        );
        let parsed = parse_script_error(ScriptErrorInput::Properties(props));
        assert_eq!(parsed.error_type, "TypeError");
        assert_eq!(parsed.message, "not a function");
        assert_eq!(parsed.frames.len(), 1);
    }
}
