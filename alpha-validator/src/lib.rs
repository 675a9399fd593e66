mod analyzer;
mod ast;
mod catalog;
mod diagnostics;
mod lexer;
mod lexical;
mod parser;
mod rules;
mod source;
mod types;
mod validator;

pub use crate::analyzer::{analyze, SemanticAnalyzer};
pub use crate::ast::{
    Assignment, Ast, BinaryExpression, BinaryOperator, CallExpression, Identifier,
    KeywordArgument, Literal, Node, NodeId, NodeKind, OperatorClass, SourceSpan,
    UnaryExpression, UnaryOperator,
};
pub use crate::catalog::{
    parse_definition, CatalogError, CatalogKind, CombinationKey, FieldCatalog, OperatorCatalog,
    OperatorSignature,
};
pub use crate::diagnostics::{Category, Diagnostic, DiagnosticCode, Diagnostics};
pub use crate::lexer::{Lexer, LexerError, Token, TokenKind};
pub use crate::lexical::check_source as check_lexical;
pub use crate::parser::{
    parse_source, Parser, SyntaxError, SyntaxErrorKind, MAX_NESTING, MAX_TREE_DEPTH,
};
pub use crate::rules::{check_program, check_script, split_statements};
pub use crate::source::{strip_comments, SourceFile};
pub use crate::types::{arithmetic_result, ExpectedType, TypeKind};
pub use crate::validator::{
    validate_expression, ExpressionValidator, ValidationReport, ValidatorContext, FIELDS_FILE,
    OPERATORS_FILE,
};
