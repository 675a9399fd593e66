use tracing::debug;

use crate::ast::{Ast, NodeKind};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::source::SourceFile;

/// Splits text on semicolons that sit outside string literals and outside
/// parentheses. Blank pieces are dropped and the rest are trimmed.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for ch in text.chars() {
        match quote {
            Some(open) => {
                if ch == open || ch == '\n' {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => {
                    push_trimmed(&mut statements, &current);
                    current.clear();
                    continue;
                }
                _ => {}
            },
        }
        current.push(ch);
    }
    push_trimmed(&mut statements, &current);
    statements
}

fn push_trimmed(statements: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        statements.push(piece.to_string());
    }
}

/// Text-level rules: the script must not be empty and must contain at least
/// one statement once comments are removed.
pub fn check_script(source: &SourceFile) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    if source.contents.trim().is_empty() {
        diagnostics
            .error(
                DiagnosticCode::EmptyScript,
                "expression must not be empty",
                None,
            )
            .with_suggestion("provide an expression");
    }

    if split_statements(source.code()).is_empty() {
        diagnostics
            .error(
                DiagnosticCode::NoExpression,
                "no expression found",
                None,
            )
            .with_suggestion("provide at least one expression outside comments");
    }

    diagnostics
}

/// Tree-level rules. The last statement of the program produces the
/// script's value, so it may not be an assignment.
pub fn check_program(ast: &Ast, source: &SourceFile) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    if let Some(&last) = ast.statements().last() {
        if let NodeKind::Assignment(assignment) = ast.kind(last) {
            let span = ast.span(last);
            let diagnostic = diagnostics
                .error(
                    DiagnosticCode::TrailingAssignment,
                    format!(
                        "the final statement cannot assign to '{}'",
                        assignment.target.name
                    ),
                    Some(span),
                )
                .with_suggestion("end the script with an expression, not an assignment");
            if let Some(text) = source.line(span.line) {
                diagnostic.with_snippet(text);
            }
        }
    }

    debug!(count = diagnostics.len(), "business rules finished");
    diagnostics
}
