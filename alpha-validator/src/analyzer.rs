use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::ast::*;
use crate::catalog::{OperatorCatalog, OperatorSignature};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::parser::MAX_TREE_DEPTH;
use crate::source::SourceFile;
use crate::types::{arithmetic_result, TypeKind};

const BOOLEAN_WORDS: [&str; 4] = ["true", "false", "True", "False"];

/// Type state of a script variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Resolved(TypeKind),
    /// The defining expression did not yield a type when the assignment was
    /// analyzed; it is re-walked when the variable is used.
    Pending(NodeId),
}

/// Walks a parsed program, inferring a [`TypeKind`] for every expression and
/// checking each call against its operator signature.
///
/// Variables live in one flat scope for the whole script. A variable may
/// only be used after its assignment.
pub struct SemanticAnalyzer<'a> {
    ast: &'a Ast,
    source: &'a SourceFile,
    operators: &'a OperatorCatalog,
    fields: &'a BTreeSet<String>,
    scope: HashMap<String, Binding>,
    diagnostics: Diagnostics,
}

pub fn analyze(
    ast: &Ast,
    source: &SourceFile,
    operators: &OperatorCatalog,
    fields: &BTreeSet<String>,
) -> Diagnostics {
    let mut analyzer = SemanticAnalyzer::new(ast, source, operators, fields);
    analyzer.analyze_program();
    analyzer.into_diagnostics()
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(
        ast: &'a Ast,
        source: &'a SourceFile,
        operators: &'a OperatorCatalog,
        fields: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            ast,
            source,
            operators,
            fields,
            scope: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn analyze_program(&mut self) {
        let ast = self.ast;
        for &statement in ast.statements() {
            match ast.kind(statement) {
                NodeKind::Assignment(assignment) => self.analyze_assignment(assignment),
                _ => {
                    self.infer(statement);
                }
            }
        }
        debug!(
            count = self.diagnostics.len(),
            variables = self.scope.len(),
            "semantic analysis finished"
        );
    }

    /// Type of a variable bound so far, resolving it if it is still pending.
    pub fn variable_type(&self, name: &str) -> Option<TypeKind> {
        match self.scope.get(name)? {
            Binding::Resolved(kind) => Some(*kind),
            Binding::Pending(node) => {
                let mut visiting = HashSet::from([name.to_string()]);
                Some(self.resolve_silently(*node, &mut visiting, 0))
            }
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn analyze_assignment(&mut self, assignment: &'a Assignment) {
        let target = &assignment.target;
        self.check_name(&target.name, "variable", target.span);

        let conflict = if self.operators.contains(&target.name) {
            Some((
                DiagnosticCode::OperatorNameConflict,
                format!("variable name '{}' conflicts with an operator", target.name),
            ))
        } else if self.fields.contains(&target.name) {
            Some((
                DiagnosticCode::FieldNameConflict,
                format!("field name '{}' cannot be used as a variable name", target.name),
            ))
        } else {
            None
        };

        if let Some((code, message)) = conflict {
            self.report(code, message, target.span)
                .with_suggestion("choose a different variable name");
            self.infer(assignment.value);
            return;
        }

        let binding = match self.infer(assignment.value) {
            TypeKind::Unknown => Binding::Pending(assignment.value),
            kind => Binding::Resolved(kind),
        };
        debug!(variable = %target.name, ?binding, "bound variable");
        self.scope.insert(target.name.clone(), binding);
    }

    fn infer(&mut self, id: NodeId) -> TypeKind {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Literal(literal) => literal_type(literal),
            NodeKind::FieldRef(identifier) => self.infer_name(identifier),
            NodeKind::Call(call) => self.infer_call(call, ast.span(id)),
            NodeKind::Binary(binary) => {
                let left = self.infer(binary.left);
                let right = self.infer(binary.right);
                binary_type(binary.operator, left, right)
            }
            NodeKind::Unary(unary) => {
                let operand = self.infer(unary.operand);
                unary_type(unary.operator, operand)
            }
            NodeKind::Grouping(inner) => self.infer(*inner),
            NodeKind::Kwarg(keyword) => self.infer(keyword.value),
            NodeKind::Assignment(assignment) => self.infer(assignment.value),
            NodeKind::Program(_) => TypeKind::Unknown,
        }
    }

    fn infer_name(&mut self, identifier: &Identifier) -> TypeKind {
        let name = identifier.name.as_str();
        self.check_name(name, "field", identifier.span);

        if BOOLEAN_WORDS.contains(&name) {
            return TypeKind::Boolean;
        }

        match self.scope.get(name).copied() {
            Some(Binding::Resolved(kind)) => return kind,
            Some(Binding::Pending(node)) => {
                let mut visiting = HashSet::from([name.to_string()]);
                let kind = self.resolve_silently(node, &mut visiting, 0);
                if kind != TypeKind::Unknown {
                    self.scope
                        .insert(name.to_string(), Binding::Resolved(kind));
                }
                return kind;
            }
            None => {}
        }

        if self.fields.contains(name) {
            return TypeKind::Field;
        }

        self.report(
            DiagnosticCode::UnknownField,
            format!("unknown field: {name}"),
            identifier.span,
        );
        TypeKind::Unknown
    }

    fn infer_call(&mut self, call: &'a CallExpression, span: SourceSpan) -> TypeKind {
        let ast = self.ast;
        let callee = &call.callee;
        self.check_name(&callee.name, "operator", callee.span);

        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        for &argument in &call.arguments {
            match ast.kind(argument) {
                NodeKind::Kwarg(keyword) => {
                    let kind = self.infer(keyword.value);
                    keywords.push((keyword, kind));
                }
                _ => {
                    let kind = self.infer(argument);
                    positional.push((argument, kind));
                }
            }
        }

        let operators = self.operators;
        let Some(signature) = operators.get(&callee.name) else {
            self.report(
                DiagnosticCode::UnknownOperator,
                format!("unknown operator: {}", callee.name),
                callee.span,
            );
            return TypeKind::Unknown;
        };

        self.check_arity(signature, positional.len(), span);

        for (index, &(argument, actual)) in positional.iter().enumerate() {
            if actual == TypeKind::Unknown {
                continue;
            }
            let Some(expected) = signature.expected_positional(index) else {
                continue;
            };
            if expected.is_unconstrained() || expected.accepts(actual) {
                continue;
            }
            self.report(
                DiagnosticCode::ArgumentTypeMismatch,
                format!(
                    "argument {} of '{}' should be {expected}, found {actual}",
                    index + 1,
                    signature.name
                ),
                ast.span(argument),
            );
        }

        for &(keyword, actual) in &keywords {
            self.check_keyword(signature, keyword, actual);
        }

        signature.return_type
    }

    fn check_arity(&mut self, signature: &OperatorSignature, count: usize, span: SourceSpan) {
        if count < signature.min_args {
            self.report(
                DiagnosticCode::TooFewArguments,
                format!(
                    "'{}' expects at least {} positional arguments but got {count}",
                    signature.name, signature.min_args
                ),
                span,
            )
            .with_suggestion(format!(
                "'{}' takes {} positional arguments",
                signature.name,
                signature.describe_arity()
            ));
        }
        if let Some(max) = signature.max_args {
            if count > max {
                self.report(
                    DiagnosticCode::TooManyArguments,
                    format!(
                        "'{}' expects at most {max} positional arguments but got {count}",
                        signature.name
                    ),
                    span,
                )
                .with_suggestion(format!(
                    "'{}' takes {} positional arguments",
                    signature.name,
                    signature.describe_arity()
                ));
            }
        }
    }

    fn check_keyword(
        &mut self,
        signature: &OperatorSignature,
        keyword: &KeywordArgument,
        actual: TypeKind,
    ) {
        let key = keyword.name.name.as_str();

        match signature.keywords.get(key) {
            Some(expected) => {
                if actual != TypeKind::Unknown
                    && !expected.is_unconstrained()
                    && !expected.accepts(actual)
                {
                    self.report(
                        DiagnosticCode::KeywordTypeMismatch,
                        format!(
                            "keyword `{key}` of '{}' should be {expected}, found {actual}",
                            signature.name
                        ),
                        self.ast.span(keyword.value),
                    );
                }
            }
            None => {
                let valid = signature
                    .keywords
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>();
                let diagnostic = self.report(
                    DiagnosticCode::UnknownKeyword,
                    format!("`{key}` is not a valid keyword argument of '{}'", signature.name),
                    keyword.name.span,
                );
                if !valid.is_empty() {
                    diagnostic.with_suggestion(format!("valid keywords: {}", valid.join(", ")));
                }
            }
        }

        if let Some(allowed) = signature.choices.get(key) {
            let value = self.choice_text(keyword.value);
            if !value.as_ref().is_some_and(|text| allowed.contains(text)) {
                let listed = allowed.iter().cloned().collect::<Vec<_>>().join(", ");
                self.report(
                    DiagnosticCode::InvalidChoice,
                    format!(
                        "invalid value for `{key}` of '{}': {}, expected one of [{listed}]",
                        signature.name,
                        value.as_deref().unwrap_or("a computed expression")
                    ),
                    self.ast.span(keyword.value),
                );
            }
        }
    }

    /// Literal text of a keyword value, or `None` when it is computed.
    fn choice_text(&self, id: NodeId) -> Option<String> {
        match self.ast.kind(id) {
            NodeKind::Literal(literal) => Some(literal.text().into_owned()),
            NodeKind::FieldRef(identifier) => Some(identifier.name.clone()),
            NodeKind::Grouping(inner) => self.choice_text(*inner),
            NodeKind::Unary(UnaryExpression {
                operator: UnaryOperator::Negate,
                operand,
            }) => match self.ast.kind(*operand) {
                NodeKind::Literal(Literal::Number(text)) => Some(format!("-{text}")),
                _ => None,
            },
            _ => None,
        }
    }

    /// Same typing rules as [`Self::infer`] without reporting anything.
    /// `visiting` holds the variables on the current resolution path and
    /// `depth` counts nodes walked along it, across variable hops.
    fn resolve_silently(
        &self,
        id: NodeId,
        visiting: &mut HashSet<String>,
        depth: usize,
    ) -> TypeKind {
        if depth > MAX_TREE_DEPTH {
            return TypeKind::Unknown;
        }
        let depth = depth + 1;
        match self.ast.kind(id) {
            NodeKind::Literal(literal) => literal_type(literal),
            NodeKind::FieldRef(identifier) => {
                let name = identifier.name.as_str();
                if BOOLEAN_WORDS.contains(&name) {
                    return TypeKind::Boolean;
                }
                match self.scope.get(name) {
                    Some(Binding::Resolved(kind)) => *kind,
                    Some(Binding::Pending(node)) => {
                        if !visiting.insert(name.to_string()) {
                            return TypeKind::Unknown;
                        }
                        let kind = self.resolve_silently(*node, visiting, depth);
                        visiting.remove(name);
                        kind
                    }
                    None if self.fields.contains(name) => TypeKind::Field,
                    None => TypeKind::Unknown,
                }
            }
            NodeKind::Call(call) => self
                .operators
                .get(&call.callee.name)
                .map_or(TypeKind::Unknown, |signature| signature.return_type),
            NodeKind::Binary(binary) => {
                let left = self.resolve_silently(binary.left, visiting, depth);
                let right = self.resolve_silently(binary.right, visiting, depth);
                binary_type(binary.operator, left, right)
            }
            NodeKind::Unary(unary) => {
                let operand = self.resolve_silently(unary.operand, visiting, depth);
                unary_type(unary.operator, operand)
            }
            NodeKind::Grouping(inner) => self.resolve_silently(*inner, visiting, depth),
            NodeKind::Kwarg(keyword) => self.resolve_silently(keyword.value, visiting, depth),
            NodeKind::Assignment(assignment) => {
                self.resolve_silently(assignment.value, visiting, depth)
            }
            NodeKind::Program(_) => TypeKind::Unknown,
        }
    }

    fn check_name(&mut self, name: &str, role: &str, span: SourceSpan) {
        if name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return;
        }
        self.report(
            DiagnosticCode::InvalidName,
            format!("{role} name '{name}' contains unsupported characters"),
            span,
        )
        .with_suggestion("use only ASCII letters, digits and '_'");
    }

    fn report(&mut self, code: DiagnosticCode, message: String, span: SourceSpan) -> &mut Diagnostic {
        let snippet = self.source.line(span.line).map(str::to_string);
        let diagnostic = self.diagnostics.error(code, message, Some(span));
        if let Some(snippet) = snippet {
            diagnostic.with_snippet(snippet);
        }
        diagnostic
    }
}

fn literal_type(literal: &Literal) -> TypeKind {
    match literal {
        Literal::Number(_) => TypeKind::Number,
        Literal::String(_) => TypeKind::String,
        Literal::Boolean(_) => TypeKind::Boolean,
    }
}

fn binary_type(operator: BinaryOperator, left: TypeKind, right: TypeKind) -> TypeKind {
    match operator.class() {
        OperatorClass::Logical | OperatorClass::Comparison => TypeKind::Boolean,
        OperatorClass::Additive | OperatorClass::Multiplicative => arithmetic_result(left, right),
    }
}

fn unary_type(operator: UnaryOperator, operand: TypeKind) -> TypeKind {
    match operator {
        UnaryOperator::Negate => operand,
        UnaryOperator::Not => TypeKind::Boolean,
    }
}
