//! Structured template compile errors.
//!
//! A [`CompileError`] is always a typed error value carrying the failing file
//! and, when Tera reports one, a line number. Downstream consumers (the stream
//! transform, the bundler, CLI error display) rely on this being a proper
//! error object rather than a bare string so they can tell compile faults
//! apart from other failures.

use std::path::{Path, PathBuf};

use regex::Regex;
use std::sync::LazyLock;

/// A failed template compilation: bad syntax, an unresolved include, or a
/// rejected directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Template file the compile was invoked for.
    pub file: PathBuf,
    /// 1-indexed source line, when the engine reported one.
    pub line: Option<usize>,
}

impl CompileError {
    /// Error with a message and no source location.
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            line: None,
        }
    }

    /// Attach a 1-indexed source line.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Build a `CompileError` from a Tera error, collapsing its source chain
    /// into one message and recovering the line number when present.
    pub fn from_tera(file: &Path, error: &tera::Error) -> Self {
        Self {
            message: flatten_tera_message(error),
            file: file.to_path_buf(),
            line: extract_line(error),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Walk the Tera error chain and join the useful messages.
///
/// Tera nests the real cause a few sources deep and prefixes messages with the
/// registered template name, which for us is a full file path already shown in
/// the error header. Keep each distinct message once, innermost last.
fn flatten_tera_message(error: &tera::Error) -> String {
    use std::error::Error as _;

    let mut messages: Vec<String> = Vec::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        let msg = err.to_string();
        if !msg.is_empty() && !messages.contains(&msg) {
            messages.push(msg);
        }
        current = err.source();
    }

    if messages.is_empty() {
        "template compilation failed".to_string()
    } else {
        messages.join(": ")
    }
}

static LINE_COL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Tera parse errors embed "line:column" pairs like "3:14".
    Regex::new(r"(\d+):(\d+)").expect("line/column pattern is valid")
});

fn extract_line(error: &tera::Error) -> Option<usize> {
    let debug = format!("{error:?}");
    LINE_COL_RE
        .captures(&debug)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_file_and_line() {
        let err = CompileError::new("views/index.tera", "unexpected end of input").with_line(4);
        let shown = err.to_string();
        assert!(shown.contains("views/index.tera"));
        assert!(shown.contains("unexpected end of input"));
        assert!(shown.contains("line 4"));
    }

    #[test]
    fn display_omits_line_when_unknown() {
        let err = CompileError::new("a.tera", "boom");
        assert!(!err.to_string().contains("line"));
    }

    #[test]
    fn from_tera_recovers_line_for_parse_errors() {
        let mut tera = tera::Tera::default();
        let result = tera.add_raw_template("broken.tera", "line one\n{% if %}\n");
        let tera_err = result.expect_err("template should be rejected");

        let err = CompileError::from_tera(Path::new("broken.tera"), &tera_err);
        assert_eq!(err.line, Some(2));
        assert!(!err.message.is_empty());
    }

    #[test]
    fn from_tera_flattens_source_chain() {
        let mut tera = tera::Tera::default();
        tera.add_raw_template("t.tera", "{{ missing }}").unwrap();
        let tera_err = tera
            .render("t.tera", &tera::Context::new())
            .expect_err("undefined variable should fail");

        let err = CompileError::from_tera(Path::new("t.tera"), &tera_err);
        assert!(err.message.contains("missing"), "got: {}", err.message);
    }
}
