use thiserror::Error;

use crate::ast::SourceSpan;
use crate::source::SourceFile;

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme,
            line,
            column,
        }
    }

    /// Tokens never span lines, so the end column follows from the lexeme.
    pub fn span(&self) -> SourceSpan {
        let width = self.lexeme.chars().count().max(1);
        SourceSpan::new(self.line, self.column, self.line, self.column + width - 1)
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme == word
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    /// Kept as source text.
    NumberLiteral(String),
    StringLiteral(String),
    BooleanLiteral(bool),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equal,
    DoubleEqual,
    Bang,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::NumberLiteral(_) => "number",
            TokenKind::StringLiteral(_) => "string",
            TokenKind::BooleanLiteral(_) => "boolean",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Equal => "'='",
            TokenKind::DoubleEqual => "'=='",
            TokenKind::Bang => "'!'",
            TokenKind::BangEqual => "'!='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Eof => "end of input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexerError {
    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter {
        ch: char,
        line: usize,
        column: usize,
    },
    #[error("unterminated string literal")]
    UnterminatedString { line: usize, column: usize },
}

impl LexerError {
    pub fn line(&self) -> usize {
        match self {
            LexerError::UnexpectedCharacter { line, .. }
            | LexerError::UnterminatedString { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            LexerError::UnexpectedCharacter { column, .. }
            | LexerError::UnterminatedString { column, .. } => *column,
        }
    }
}

/// Tokenizes the comment-stripped text of a source. `or`, `and` and `not`
/// are produced as identifiers; the parser decides whether they act as
/// logical operators.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        Self::from_code(source.code())
    }

    pub fn from_code(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            match ch {
                ch if ch.is_whitespace() => {
                    self.advance_char();
                }
                '"' | '\'' => {
                    let token = self.lex_string(ch)?;
                    tokens.push(token);
                }
                '0'..='9' => tokens.push(self.lex_number()),
                ch if ch.is_alphabetic() || ch == '_' => {
                    tokens.push(self.lex_identifier());
                }
                '(' => tokens.push(self.simple_token(TokenKind::LParen)),
                ')' => tokens.push(self.simple_token(TokenKind::RParen)),
                ',' => tokens.push(self.simple_token(TokenKind::Comma)),
                ';' => tokens.push(self.simple_token(TokenKind::Semicolon)),
                '+' => tokens.push(self.simple_token(TokenKind::Plus)),
                '-' => tokens.push(self.simple_token(TokenKind::Minus)),
                '*' => tokens.push(self.simple_token(TokenKind::Star)),
                '/' => tokens.push(self.simple_token(TokenKind::Slash)),
                '=' => {
                    let token = self.lex_pair('=', TokenKind::Equal, TokenKind::DoubleEqual);
                    tokens.push(token);
                }
                '!' => {
                    let token = self.lex_pair('=', TokenKind::Bang, TokenKind::BangEqual);
                    tokens.push(token);
                }
                '>' => {
                    let token = self.lex_pair('=', TokenKind::Greater, TokenKind::GreaterEqual);
                    tokens.push(token);
                }
                '<' => {
                    let token = self.lex_pair('=', TokenKind::Less, TokenKind::LessEqual);
                    tokens.push(token);
                }
                other => {
                    return Err(LexerError::UnexpectedCharacter {
                        ch: other,
                        line: self.line,
                        column: self.column,
                    });
                }
            }
        }

        tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        Ok(tokens)
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, LexerError> {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char(); // opening quote

        let mut value = String::new();
        while let Some(ch) = self.peek_char() {
            if ch == quote {
                self.advance_char();
                let lexeme = self.slice(start, self.position).to_string();
                return Ok(Token::new(
                    TokenKind::StringLiteral(value),
                    lexeme,
                    start_line,
                    start_column,
                ));
            }
            if ch == '\n' || (ch == '\r' && self.peek_next_char() == Some('\n')) {
                break;
            }
            value.push(ch);
            self.advance_char();
        }

        Err(LexerError::UnterminatedString {
            line: start_line,
            column: start_column,
        })
    }

    fn lex_number(&mut self) -> Token {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        self.consume_digits();
        if self.peek_char() == Some('.') && self.peek_next_char().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance_char();
            self.consume_digits();
        }

        let lexeme = self.slice(start, self.position).to_string();
        Token::new(
            TokenKind::NumberLiteral(lexeme.clone()),
            lexeme,
            start_line,
            start_column,
        )
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance_char();
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char();

        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        let kind = match lexeme.as_str() {
            "true" | "True" => TokenKind::BooleanLiteral(true),
            "false" | "False" => TokenKind::BooleanLiteral(false),
            _ => TokenKind::Identifier,
        };
        Token::new(kind, lexeme, start_line, start_column)
    }

    /// Lexes a one-character operator, or its two-character form when the
    /// next character is `second`.
    fn lex_pair(&mut self, second: char, single: TokenKind, double: TokenKind) -> Token {
        let start_line = self.line;
        let start_column = self.column;
        let start = self.position;
        self.advance_char();

        let kind = if self.peek_char() == Some(second) {
            self.advance_char();
            double
        } else {
            single
        };
        Token::new(
            kind,
            self.slice(start, self.position).to_string(),
            start_line,
            start_column,
        )
    }

    fn simple_token(&mut self, kind: TokenKind) -> Token {
        let start_line = self.line;
        let start_column = self.column;
        let start = self.position;
        self.advance_char();
        Token::new(
            kind,
            self.slice(start, self.position).to_string(),
            start_line,
            start_column,
        )
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.input[self.position..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        // Line breaks follow `str::lines`: `\n` or `\r\n`. A lone `\r` is
        // ordinary whitespace.
        match ch {
            '\n' => self.next_line(),
            '\r' if self.peek_char() == Some('\n') => {
                self.position += 1;
                self.next_line();
            }
            _ => self.column += 1,
        }
        Some(ch)
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.input[start..end]
    }
}
