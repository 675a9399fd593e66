use thiserror::Error;

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::lexer::{Lexer, LexerError, Token, TokenKind};
use crate::source::SourceFile;

/// Which production a parse failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    MissingSeparator,
    MalformedCall,
    BracketMismatch,
    MalformedAssignment,
    Generic,
}

impl SyntaxErrorKind {
    pub fn code(self) -> DiagnosticCode {
        match self {
            SyntaxErrorKind::MissingSeparator => DiagnosticCode::MissingStatementSeparator,
            SyntaxErrorKind::MalformedCall => DiagnosticCode::MalformedFunctionCall,
            SyntaxErrorKind::BracketMismatch => DiagnosticCode::BracketMismatch,
            SyntaxErrorKind::MalformedAssignment => DiagnosticCode::MalformedAssignment,
            SyntaxErrorKind::Generic => DiagnosticCode::SyntaxError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub suggestion: Option<String>,
}

impl SyntaxError {
    fn new(kind: SyntaxErrorKind, message: String, token: &Token) -> Self {
        Self {
            kind,
            message,
            line: token.line,
            column: token.column,
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }

    pub fn to_diagnostic(&self, source: &SourceFile) -> Diagnostic {
        let mut diagnostic = Diagnostic::new(
            self.kind.code(),
            format!("syntax error: {}", self.message),
            Some(SourceSpan::single_point(self.line, self.column)),
        );
        if let Some(text) = source.line(self.line) {
            diagnostic.with_snippet(text);
        }
        if let Some(suggestion) = &self.suggestion {
            diagnostic.with_suggestion(suggestion.clone());
        }
        diagnostic
    }
}

impl From<LexerError> for SyntaxError {
    fn from(error: LexerError) -> Self {
        let suggestion = match error {
            LexerError::UnexpectedCharacter { .. } => "remove the character",
            LexerError::UnterminatedString { .. } => "close the string on the same line",
        };
        Self {
            kind: SyntaxErrorKind::Generic,
            message: error.to_string(),
            line: error.line(),
            column: error.column(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

/// Tokenizes and parses a whole source.
pub fn parse_source(source: &SourceFile) -> Result<Ast, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

/// Open parentheses, calls and negations the parser will descend into.
pub const MAX_NESTING: usize = 128;

/// Longest root-to-leaf path allowed in a parsed tree. Long operator chains
/// grow the tree without nesting, so they are bounded separately.
pub const MAX_TREE_DEPTH: usize = 512;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    nesting: usize,
    ast: Ast,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|token| &token.kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens
                .last()
                .map(|token| (token.line, token.column + token.lexeme.chars().count()))
                .unwrap_or((1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                column,
            });
        }
        Self {
            tokens,
            current: 0,
            nesting: 0,
            ast: Ast::new(),
        }
    }

    pub fn parse(mut self) -> Result<Ast, SyntaxError> {
        let mut statements = Vec::new();

        loop {
            if self.check(&TokenKind::Semicolon) {
                return Err(self
                    .error_here(
                        SyntaxErrorKind::Generic,
                        "empty statement: unexpected ';'".to_string(),
                    )
                    .suggest("remove the extra ';'"));
            }

            let statement = self.parse_statement()?;
            statements.push(statement);

            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    if self.is_at_end() {
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => return Err(self.separator_error(statement)),
            }
        }

        let span = match (statements.first(), statements.last()) {
            (Some(first), Some(last)) => {
                SourceSpan::union(&self.ast.span(*first), &self.ast.span(*last))
            }
            _ => SourceSpan::default(),
        };
        let root = self.ast.alloc(span, NodeKind::Program(statements));
        self.ast.set_root(root);
        Ok(self.ast)
    }

    fn separator_error(&self, statement: NodeId) -> SyntaxError {
        let token = self.peek();
        match &token.kind {
            TokenKind::Equal => {
                let message = if matches!(self.ast.kind(statement), NodeKind::Assignment(_)) {
                    "chained assignment is not allowed".to_string()
                } else {
                    "only a variable name may appear on the left of '='".to_string()
                };
                SyntaxError::new(SyntaxErrorKind::MalformedAssignment, message, token)
                    .suggest("assign to a single variable name, e.g. `x = close`")
            }
            TokenKind::RParen => SyntaxError::new(
                SyntaxErrorKind::BracketMismatch,
                "unmatched ')'".to_string(),
                token,
            )
            .suggest("remove the extra ')' or add a matching '('"),
            kind if comparison_operator(kind).is_some() => SyntaxError::new(
                SyntaxErrorKind::Generic,
                format!("comparison operators cannot be chained, found {}", describe(token)),
                token,
            )
            .suggest("combine comparisons with `and`"),
            _ => SyntaxError::new(
                SyntaxErrorKind::MissingSeparator,
                format!("expected ';' between statements, found {}", describe(token)),
                token,
            )
            .suggest("separate statements with ';'"),
        }
    }

    fn parse_statement(&mut self) -> Result<NodeId, SyntaxError> {
        if self.check(&TokenKind::Equal) {
            return Err(self
                .error_here(
                    SyntaxErrorKind::MalformedAssignment,
                    "missing variable name before '='".to_string(),
                )
                .suggest("write `name = expression`"));
        }

        if self.check(&TokenKind::Identifier) && self.peek_kind_at(1) == Some(&TokenKind::Equal) {
            let target = self.parse_identifier();
            self.advance(); // '='
            if !starts_expression(self.peek_kind()) {
                return Err(self
                    .error_here(
                        SyntaxErrorKind::MalformedAssignment,
                        format!(
                            "expected an expression after '{} =', found {}",
                            target.name,
                            describe(self.peek())
                        ),
                    )
                    .suggest("write `name = expression`"));
            }
            let value = self.parse_expression()?;
            let span = SourceSpan::union(&target.span, &self.ast.span(value));
            return self.alloc(span, NodeKind::Assignment(Assignment { target, value }));
        }

        self.parse_expression()
    }

    fn parse_expression(&mut self) -> Result<NodeId, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.peek().is_word("or") {
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(BinaryOperator::Or, left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.peek().is_word("and") {
            self.advance();
            let right = self.parse_not()?;
            left = self.binary(BinaryOperator::And, left, right)?;
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<NodeId, SyntaxError> {
        if self.at_logical_not() {
            let operator_span = self.advance().span();
            let operand = self.parse_comparison()?;
            let span = SourceSpan::union(&operator_span, &self.ast.span(operand));
            return self.alloc(
                span,
                NodeKind::Unary(UnaryExpression {
                    operator: UnaryOperator::Not,
                    operand,
                }),
            );
        }
        self.parse_comparison()
    }

    /// `!` always negates; the word `not` does so unless it names a call.
    fn at_logical_not(&self) -> bool {
        if self.check(&TokenKind::Bang) {
            return true;
        }
        self.peek().is_word("not")
            && self
                .peek_kind_at(1)
                .is_some_and(|next| starts_expression(next) && *next != TokenKind::LParen)
    }

    fn parse_comparison(&mut self) -> Result<NodeId, SyntaxError> {
        let left = self.parse_additive()?;
        if let Some(operator) = comparison_operator(self.peek_kind()) {
            self.advance();
            let right = self.parse_additive()?;
            return self.binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(operator, left, right)?;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let operator = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(operator, left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<NodeId, SyntaxError> {
        if self.check(&TokenKind::Minus) {
            let operator_span = self.advance().span();
            let operand = self.nested(Self::parse_atom)?;
            let span = SourceSpan::union(&operator_span, &self.ast.span(operand));
            return self.alloc(
                span,
                NodeKind::Unary(UnaryExpression {
                    operator: UnaryOperator::Negate,
                    operand,
                }),
            );
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<NodeId, SyntaxError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::NumberLiteral(text) => {
                self.advance();
                Ok(self
                    .ast
                    .alloc(token.span(), NodeKind::Literal(Literal::Number(text.clone()))))
            }
            TokenKind::StringLiteral(value) => {
                self.advance();
                Ok(self
                    .ast
                    .alloc(token.span(), NodeKind::Literal(Literal::String(value.clone()))))
            }
            TokenKind::BooleanLiteral(value) => {
                self.advance();
                Ok(self
                    .ast
                    .alloc(token.span(), NodeKind::Literal(Literal::Boolean(*value))))
            }
            TokenKind::Identifier => {
                if self.peek_kind_at(1) == Some(&TokenKind::LParen) {
                    self.nested(Self::parse_call)
                } else {
                    let identifier = self.parse_identifier();
                    Ok(self
                        .ast
                        .alloc(identifier.span, NodeKind::FieldRef(identifier)))
                }
            }
            TokenKind::LParen => self.nested(Self::parse_grouping),
            TokenKind::RParen => Err(SyntaxError::new(
                SyntaxErrorKind::BracketMismatch,
                "unexpected ')'".to_string(),
                &token,
            )
            .suggest("remove the extra ')' or add a matching '('")),
            TokenKind::Eof => Err(SyntaxError::new(
                SyntaxErrorKind::Generic,
                "unexpected end of input, expected an expression".to_string(),
                &token,
            )
            .suggest("complete the expression")),
            _ => Err(SyntaxError::new(
                SyntaxErrorKind::Generic,
                format!("expected an expression, found {}", describe(&token)),
                &token,
            )),
        }
    }

    fn parse_grouping(&mut self) -> Result<NodeId, SyntaxError> {
        let open = self.advance().clone();
        let inner = self.parse_expression()?;
        if !self.check(&TokenKind::RParen) {
            return Err(self
                .error_here(
                    SyntaxErrorKind::BracketMismatch,
                    format!(
                        "expected ')' to close '(' at line {} column {}, found {}",
                        open.line,
                        open.column,
                        describe(self.peek())
                    ),
                )
                .suggest("add the missing ')'"));
        }
        let close = self.advance().span();
        let span = SourceSpan::union(&open.span(), &close);
        self.alloc(span, NodeKind::Grouping(inner))
    }

    fn parse_call(&mut self) -> Result<NodeId, SyntaxError> {
        let callee = self.parse_identifier();
        self.advance(); // '('

        let mut arguments = Vec::new();
        let close = if self.check(&TokenKind::RParen) {
            self.advance().span()
        } else {
            loop {
                arguments.push(self.parse_argument(&callee)?);
                match self.peek_kind() {
                    TokenKind::Comma => {
                        self.advance();
                    }
                    TokenKind::RParen => break self.advance().span(),
                    _ => {
                        return Err(self
                            .error_here(
                                SyntaxErrorKind::MalformedCall,
                                format!(
                                    "expected ',' or ')' in call to '{}', found {}",
                                    callee.name,
                                    describe(self.peek())
                                ),
                            )
                            .suggest("separate arguments with ',' and close the call with ')'"));
                    }
                }
            }
        };

        let span = SourceSpan::union(&callee.span, &close);
        self.alloc(span, NodeKind::Call(CallExpression { callee, arguments }))
    }

    fn parse_argument(&mut self, callee: &Identifier) -> Result<NodeId, SyntaxError> {
        if self.check(&TokenKind::Identifier) && self.peek_kind_at(1) == Some(&TokenKind::Equal) {
            let name = self.parse_identifier();
            self.advance(); // '='
            if !starts_expression(self.peek_kind()) {
                return Err(self
                    .error_here(
                        SyntaxErrorKind::MalformedCall,
                        format!(
                            "expected a value for keyword '{}' in call to '{}', found {}",
                            name.name,
                            callee.name,
                            describe(self.peek())
                        ),
                    )
                    .suggest("write `keyword=value`"));
            }
            let value = self.parse_expression()?;
            let span = SourceSpan::union(&name.span, &self.ast.span(value));
            return self.alloc(span, NodeKind::Kwarg(KeywordArgument { name, value }));
        }

        if !starts_expression(self.peek_kind()) {
            return Err(self
                .error_here(
                    SyntaxErrorKind::MalformedCall,
                    format!(
                        "expected an argument in call to '{}', found {}",
                        callee.name,
                        describe(self.peek())
                    ),
                )
                .suggest("remove the stray ',' or supply the missing argument"));
        }
        self.parse_expression()
    }

    fn parse_identifier(&mut self) -> Identifier {
        let token = self.advance();
        Identifier {
            name: token.lexeme.clone(),
            span: token.span(),
        }
    }

    fn binary(
        &mut self,
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> Result<NodeId, SyntaxError> {
        let span = SourceSpan::union(&self.ast.span(left), &self.ast.span(right));
        self.alloc(
            span,
            NodeKind::Binary(BinaryExpression {
                operator,
                left,
                right,
            }),
        )
    }

    fn alloc(&mut self, span: SourceSpan, kind: NodeKind) -> Result<NodeId, SyntaxError> {
        let id = self.ast.alloc(span, kind);
        if self.ast.depth(id) > MAX_TREE_DEPTH {
            return Err(self.too_deep());
        }
        Ok(id)
    }

    /// Runs a production that may recurse back into `parse_expression`.
    fn nested<T>(
        &mut self,
        production: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.nesting >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = production(self);
        self.nesting -= 1;
        result
    }

    fn too_deep(&self) -> SyntaxError {
        self.error_here(
            SyntaxErrorKind::Generic,
            "expression nested too deeply".to_string(),
        )
        .suggest("move inner parts into intermediate variables")
    }

    fn error_here(&self, kind: SyntaxErrorKind, message: String) -> SyntaxError {
        SyntaxError::new(kind, message, self.peek())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.current].kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens
            .get(self.current + offset)
            .map(|token| &token.kind)
    }

    fn advance(&mut self) -> &Token {
        let index = self.current;
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[index]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }
}

fn comparison_operator(kind: &TokenKind) -> Option<BinaryOperator> {
    match kind {
        TokenKind::Greater => Some(BinaryOperator::Greater),
        TokenKind::GreaterEqual => Some(BinaryOperator::GreaterEqual),
        TokenKind::Less => Some(BinaryOperator::Less),
        TokenKind::LessEqual => Some(BinaryOperator::LessEqual),
        TokenKind::DoubleEqual => Some(BinaryOperator::Equal),
        TokenKind::BangEqual => Some(BinaryOperator::NotEqual),
        _ => None,
    }
}

fn starts_expression(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::NumberLiteral(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::BooleanLiteral(_)
            | TokenKind::LParen
            | TokenKind::Minus
            | TokenKind::Bang
    )
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => token.kind.describe().to_string(),
        _ => format!("'{}'", token.lexeme),
    }
}
