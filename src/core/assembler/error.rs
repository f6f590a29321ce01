// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::core::parser::ParseError;
use crate::core::text_utils::highlight_line;
use crate::core::tokenizer::Span;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsmErrorKind {
    Syntax,
    SymbolRedefinition,
    SymbolNotFound,
    IllegalQuantity,
    TypeMismatch,
    ModeNotSupported,
    ProgramOverflow,
    TooManyPasses,
    Directive,
    Io,
    Cli,
    User,
    Unreferenced,
    Internal,
}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AsmErrorKind::Syntax => "syntax error",
            AsmErrorKind::SymbolRedefinition => "symbol redefinition",
            AsmErrorKind::SymbolNotFound => "symbol not found",
            AsmErrorKind::IllegalQuantity => "illegal quantity",
            AsmErrorKind::TypeMismatch => "type mismatch",
            AsmErrorKind::ModeNotSupported => "mode not supported",
            AsmErrorKind::ProgramOverflow => "program overflow",
            AsmErrorKind::TooManyPasses => "too many passes",
            AsmErrorKind::Directive => "directive error",
            AsmErrorKind::Io => "i/o error",
            AsmErrorKind::Cli => "command line error",
            AsmErrorKind::User => "user error",
            AsmErrorKind::Unreferenced => "unreferenced symbol",
            AsmErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// An assembler error with a kind, message and optional position.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
    span: Option<Span>,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
            span: None,
        }
    }

    pub fn at(kind: AsmErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }
}

impl From<ParseError> for AsmError {
    fn from(err: ParseError) -> Self {
        AsmError::at(AsmErrorKind::Syntax, err.message, err.span)
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) line: u32,
    pub(crate) column: Option<usize>,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) file: Option<String>,
    pub(crate) source: Option<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        let column = error.span().map(|span| span.col_start);
        Self {
            line,
            column,
            severity,
            error,
            file: None,
            source: None,
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {} - {}",
            self.line,
            self.severity.label(),
            self.error.message()
        )
    }

    pub fn format_with_context(&self, use_color: bool) -> String {
        let sev = self.severity.label();
        let position = match self.column {
            Some(col) => format!("{}:{col}", self.line),
            None => self.line.to_string(),
        };
        let header = match &self.file {
            Some(file) => format!("{file}:{position}: {sev}"),
            None => format!("{position}: {sev}"),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');

        for line in build_context_lines(self.line, self.column, self.source.as_deref(), use_color)
        {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("{sev}: {}", self.error.message()));
        out
    }

    fn identity(&self) -> (Option<String>, u32, Option<usize>, String) {
        (
            self.file.clone(),
            self.line,
            self.column,
            self.error.message().to_string(),
        )
    }
}

/// Diagnostics collected across all passes of a run.
///
/// The same construct is revisited on every pass, so entries are keyed by
/// source, line, column and message and recorded once.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
    seen: HashSet<(Option<String>, u32, Option<usize>, String)>,
    warnings_as_errors: bool,
}

impl DiagnosticLog {
    pub fn new(warnings_as_errors: bool) -> Self {
        Self {
            warnings_as_errors,
            ..Self::default()
        }
    }

    /// Record a diagnostic. Returns false if it was already present.
    pub fn push(&mut self, mut diagnostic: Diagnostic) -> bool {
        if self.warnings_as_errors && diagnostic.severity == Severity::Warning {
            diagnostic.severity = Severity::Error;
        }
        if !self.seen.insert(diagnostic.identity()) {
            return false;
        }
        self.entries.push(diagnostic);
        true
    }

    pub fn error_count(&self) -> usize {
        count(&self.entries, Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Report from a successful assembly run.
#[derive(Debug)]
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
    passes: u32,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, passes: u32) -> Self {
        Self {
            diagnostics,
            passes,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn error_count(&self) -> usize {
        count(&self.diagnostics, Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        count(&self.diagnostics, Severity::Warning)
    }
}

/// Error from a failed assembly run.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Build context lines for error display.
pub fn build_context_lines(
    line_num: u32,
    column: Option<usize>,
    source: Option<&str>,
    use_color: bool,
) -> Vec<String> {
    match source {
        Some(source) => {
            let highlighted = highlight_line(source, column, use_color);
            vec![format!("{:>5} | {}", line_num, highlighted)]
        }
        None => vec![format!("{:>5} | <source unavailable>", line_num)],
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_line_and_severity() {
        let err = AsmError::new(AsmErrorKind::Syntax, "Bad thing", None);
        let diag = Diagnostic::new(12, Severity::Error, err);
        assert_eq!(diag.format(), "12: ERROR - Bad thing");
    }

    #[test]
    fn format_with_context_shows_caret() {
        let err = AsmError::at(
            AsmErrorKind::SymbolNotFound,
            "Symbol not found: foo",
            Span {
                line: 3,
                col_start: 9,
                col_end: 12,
            },
        );
        let diag = Diagnostic::new(3, Severity::Error, err)
            .with_file(Some("main.asm".to_string()))
            .with_source(Some("    lda foo".to_string()));
        let text = diag.format_with_context(false);
        assert!(text.starts_with("main.asm:3:9: ERROR\n"));
        assert!(text.contains("    3 |     lda foo\n      |         ^"));
        assert!(text.ends_with("ERROR: Symbol not found: foo"));
    }

    #[test]
    fn log_deduplicates_repeated_diagnostics() {
        let mut log = DiagnosticLog::new(false);
        let make = || {
            Diagnostic::new(
                4,
                Severity::Error,
                AsmError::new(AsmErrorKind::IllegalQuantity, "Illegal quantity", None),
            )
        };
        assert!(log.push(make()));
        assert!(!log.push(make()));
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn log_promotes_warnings_when_configured() {
        let mut log = DiagnosticLog::new(true);
        log.push(Diagnostic::new(
            1,
            Severity::Warning,
            AsmError::new(AsmErrorKind::User, "careful", None),
        ));
        assert!(log.has_errors());
    }

    #[test]
    fn parse_error_converts_to_syntax_error() {
        let err: AsmError = ParseError {
            message: "Missing ')'".to_string(),
            span: Span::default(),
        }
        .into();
        assert_eq!(err.kind(), AsmErrorKind::Syntax);
        assert_eq!(err.to_string(), "Missing ')'");
    }
}
