//! Frame and trace types shared by script and native stacks.

use std::fmt;

/// A single frame of a [`StackTrace`].
///
/// Native and script frames share this shape; [`crate::format`]
/// distinguishes them via `native`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub function: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Module-level classification tag (e.g. a script module specifier).
    pub module_name: Option<String>,
    /// Package-level classification tag (e.g. a plugin canonical name).
    pub package_name: Option<String>,
    /// Whether this frame originates from native code rather than script.
    pub native: bool,
    /// The raw source line this frame was parsed from, kept for frames
    /// that could not be fully parsed.
    pub raw: Option<String>,
}

impl StackFrame {
    pub fn unknown(raw: impl Into<String>) -> Self {
        StackFrame {
            file: "<unknown>".to_string(),
            function: "<unknown>".to_string(),
            line: None,
            column: None,
            module_name: None,
            package_name: None,
            native: false,
            raw: Some(raw.into()),
        }
    }

    pub fn native(function: impl Into<String>, file: impl Into<String>) -> Self {
        StackFrame {
            file: file.into(),
            function: function.into(),
            line: None,
            column: None,
            module_name: None,
            package_name: None,
            native: true,
            raw: None,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => {
                write!(f, "at {} ({}:{}:{})", self.function, self.file, line, col)
            }
            (Some(line), None) => write!(f, "at {} ({}:{})", self.function, self.file, line),
            _ => write!(f, "at {} ({})", self.function, self.file),
        }
    }
}

/// An ordered sequence of frames plus a top-level error message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackTrace {
    pub message: String,
    pub frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn new(message: impl Into<String>) -> Self {
        StackTrace {
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn with_frames(message: impl Into<String>, frames: Vec<StackFrame>) -> Self {
        StackTrace {
            message: message.into(),
            frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        for frame in &self.frames {
            writeln!(f, "    {}", frame)?;
        }
        Ok(())
    }
}

/// Capture the current native call stack using frame symbolication.
///
/// Used at the point a [`crate::ModuleError`] is constructed, and by
/// [`crate::safe_operation`] when a panic unwinds through a guarded
/// region. The top frame is always the caller of this function.
pub fn capture_native_stack(message: impl Into<String>) -> StackTrace {
    let mut frames = Vec::new();
    backtrace::trace(|frame| {
        let ip = frame.ip();
        backtrace::resolve(ip, |symbol| {
            let function = symbol
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let file = symbol
                .filename()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<native>".to_string());
            let line = symbol.lineno();
            let column = symbol.colno();
            frames.push(StackFrame {
                file,
                function,
                line,
                column,
                module_name: None,
                package_name: None,
                native: true,
                raw: None,
            });
        });
        // Cap depth: a runaway recursive panic shouldn't produce an
        // unbounded trace.
        frames.len() < 128
    });

    StackTrace::with_frames(message, frames)
}
