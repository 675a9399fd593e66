use std::fmt;

use serde::Serialize;

use crate::ast::SourceSpan;

/// Which validation stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Lexical,
    Syntax,
    BusinessRule,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    InvalidCharacter,
    IdentifierLeadingDigit,
    IdentifierDoubleUnderscore,
    MalformedNumber,
    ConsecutiveOperators,
    UnterminatedString,
    UnmatchedClosingParen,
    UnclosedParen,

    MissingStatementSeparator,
    MalformedFunctionCall,
    BracketMismatch,
    MalformedAssignment,
    SyntaxError,

    EmptyScript,
    NoExpression,
    TrailingAssignment,

    UnknownOperator,
    UnknownField,
    TooFewArguments,
    TooManyArguments,
    ArgumentTypeMismatch,
    UnknownKeyword,
    KeywordTypeMismatch,
    InvalidChoice,
    InvalidName,
    OperatorNameConflict,
    FieldNameConflict,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::InvalidCharacter => "invalid-character",
            DiagnosticCode::IdentifierLeadingDigit => "identifier-leading-digit",
            DiagnosticCode::IdentifierDoubleUnderscore => "identifier-double-underscore",
            DiagnosticCode::MalformedNumber => "malformed-number",
            DiagnosticCode::ConsecutiveOperators => "consecutive-operators",
            DiagnosticCode::UnterminatedString => "unterminated-string",
            DiagnosticCode::UnmatchedClosingParen => "unmatched-closing-paren",
            DiagnosticCode::UnclosedParen => "unclosed-paren",
            DiagnosticCode::MissingStatementSeparator => "missing-statement-separator",
            DiagnosticCode::MalformedFunctionCall => "malformed-function-call",
            DiagnosticCode::BracketMismatch => "bracket-mismatch",
            DiagnosticCode::MalformedAssignment => "malformed-assignment",
            DiagnosticCode::SyntaxError => "syntax-error",
            DiagnosticCode::EmptyScript => "empty-script",
            DiagnosticCode::NoExpression => "no-expression",
            DiagnosticCode::TrailingAssignment => "trailing-assignment",
            DiagnosticCode::UnknownOperator => "unknown-operator",
            DiagnosticCode::UnknownField => "unknown-field",
            DiagnosticCode::TooFewArguments => "too-few-arguments",
            DiagnosticCode::TooManyArguments => "too-many-arguments",
            DiagnosticCode::ArgumentTypeMismatch => "argument-type-mismatch",
            DiagnosticCode::UnknownKeyword => "unknown-keyword",
            DiagnosticCode::KeywordTypeMismatch => "keyword-type-mismatch",
            DiagnosticCode::InvalidChoice => "invalid-choice",
            DiagnosticCode::InvalidName => "invalid-name",
            DiagnosticCode::OperatorNameConflict => "operator-name-conflict",
            DiagnosticCode::FieldNameConflict => "field-name-conflict",
        }
    }

    pub fn category(self) -> Category {
        use DiagnosticCode::*;
        match self {
            InvalidCharacter
            | IdentifierLeadingDigit
            | IdentifierDoubleUnderscore
            | MalformedNumber
            | ConsecutiveOperators
            | UnterminatedString
            | UnmatchedClosingParen
            | UnclosedParen => Category::Lexical,
            MissingStatementSeparator
            | MalformedFunctionCall
            | BracketMismatch
            | MalformedAssignment
            | SyntaxError => Category::Syntax,
            EmptyScript | NoExpression | TrailingAssignment => Category::BusinessRule,
            UnknownOperator
            | UnknownField
            | TooFewArguments
            | TooManyArguments
            | ArgumentTypeMismatch
            | UnknownKeyword
            | KeywordTypeMismatch
            | InvalidChoice
            | InvalidName
            | OperatorNameConflict
            | FieldNameConflict => Category::Semantic,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub code: DiagnosticCode,
    /// Always `code.category()`.
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
    /// Text of the offending source line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(code: DiagnosticCode, message: S, span: Option<SourceSpan>) -> Self {
        Self {
            message: message.into(),
            code,
            category: code.category(),
            span,
            snippet: None,
            suggestion: None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.span.map(|span| span.line)
    }

    pub fn column(&self) -> Option<usize> {
        self.span.map(|span| span.column)
    }

    pub fn with_suggestion<S: Into<String>>(&mut self, suggestion: S) -> &mut Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_snippet<S: Into<String>>(&mut self, snippet: S) -> &mut Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Renders `line L column C: message (suggestion)`; the position prefix is
/// omitted when the location is unknown.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = self.span {
            write!(f, "line {} column {}: ", span.line, span.column)?;
        }
        f.write_str(&self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) -> &mut Diagnostic {
        self.entries.push(diagnostic);
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn error<S: Into<String>>(
        &mut self,
        code: DiagnosticCode,
        message: S,
        span: Option<SourceSpan>,
    ) -> &mut Diagnostic {
        self.push(Diagnostic::new(code, message, span))
    }

    pub fn error_at<S: Into<String>>(
        &mut self,
        code: DiagnosticCode,
        message: S,
        line: usize,
        column: usize,
    ) -> &mut Diagnostic {
        self.error(code, message, Some(SourceSpan::single_point(line, column)))
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
