//! Diagnostics sink: collects findings of the parse and validation passes.
//!
//! Every finding is stored, counted, forwarded to an optional user callback and
//! mirrored to `tracing`. Errors never stop the pass; the caller inspects
//! [`Diagnostics::has_errors`] once the whole document has been visited.

use std::fmt;

/// Severity of a diagnostic, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single finding with location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub source: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}: {}", self.source, self.line, self.message)
        } else {
            write!(f, "{}: {}", self.source, self.message)
        }
    }
}

/// User callback receiving `(severity, formatted message)`.
pub type ReportFn = Box<dyn FnMut(Severity, &str)>;

#[derive(Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    sink: Option<ReportFn>,
    source: String,
    warn_as_error: bool,
    errors: usize,
    warnings: usize,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("messages", &self.messages)
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn set_sink(&mut self, sink: ReportFn) {
        self.sink = Some(sink);
    }

    pub fn set_warn_as_error(&mut self, value: bool) {
        self.warn_as_error = value;
    }

    /// Name of the document currently being processed, used as location prefix.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn report(&mut self, severity: Severity, line: usize, message: impl Into<String>) {
        let severity = if self.warn_as_error && severity == Severity::Warning {
            Severity::Error
        } else {
            severity
        };
        let diagnostic = Diagnostic {
            severity,
            source: self.source.clone(),
            line,
            message: message.into(),
        };
        let text = diagnostic.to_string();
        match severity {
            Severity::Debug => tracing::debug!("{}", text),
            Severity::Info => tracing::info!("{}", text),
            Severity::Warning => {
                self.warnings += 1;
                tracing::warn!("{}", text);
            }
            Severity::Error => {
                self.errors += 1;
                tracing::error!("{}", text);
            }
        }
        if let Some(sink) = self.sink.as_mut() {
            sink(severity, &text);
        }
        self.messages.push(diagnostic);
    }

    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        self.report(Severity::Error, line, message);
    }

    pub fn warning(&mut self, line: usize, message: impl Into<String>) {
        self.report(Severity::Warning, line, message);
    }

    pub fn info(&mut self, line: usize, message: impl Into<String>) {
        self.report(Severity::Info, line, message);
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.errors = 0;
        self.warnings = 0;
    }
}
