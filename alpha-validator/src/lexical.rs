//! Line-oriented format checks that run before, and independently of, the
//! parser. Every check reports all of its findings on a line rather than
//! stopping at the first.

use tracing::debug;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::source::SourceFile;

const ALLOWED_PUNCTUATION: &str = "=+-*/()><!;.,\"'#";
const ARITHMETIC: &str = "+-*/";

pub fn check_source(source: &SourceFile) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for (index, text) in source.code().lines().enumerate() {
        let text = text.trim_end();
        if text.trim().is_empty() {
            continue;
        }
        LineChecker::new(index + 1, text, &mut diagnostics).run();
    }
    debug!(count = diagnostics.len(), "lexical checks finished");
    diagnostics
}

struct LineChecker<'a> {
    line: usize,
    text: &'a str,
    chars: Vec<char>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> LineChecker<'a> {
    fn new(line: usize, text: &'a str, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            line,
            text,
            chars: text.chars().collect(),
            diagnostics,
        }
    }

    fn run(mut self) {
        self.check_characters();
        self.check_identifiers();
        self.check_numbers();
        self.check_operators();
        self.check_strings();
        self.check_brackets();
    }

    /// `index` is 0-based into the line's characters.
    fn report(&mut self, code: DiagnosticCode, message: String, index: usize, suggestion: &str) {
        self.diagnostics
            .error_at(code, message, self.line, index + 1)
            .with_snippet(self.text)
            .with_suggestion(suggestion);
    }

    fn check_characters(&mut self) {
        for index in 0..self.chars.len() {
            let ch = self.chars[index];
            if !is_allowed(ch) {
                self.report(
                    DiagnosticCode::InvalidCharacter,
                    format!("invalid character '{ch}'"),
                    index,
                    "use standard ASCII characters",
                );
            }
        }
    }

    fn check_identifiers(&mut self) {
        let words = runs(&self.chars, is_word_char);
        for (start, end) in words {
            let word: String = self.chars[start..end].iter().collect();
            let first = self.chars[start];
            if first.is_ascii_digit() {
                if word.chars().any(|ch| ch.is_ascii_alphabetic() || ch == '_') {
                    self.report(
                        DiagnosticCode::IdentifierLeadingDigit,
                        format!("identifier '{word}' cannot start with a digit"),
                        start,
                        "start identifiers with a letter or underscore",
                    );
                }
            } else if word.contains("__") {
                self.report(
                    DiagnosticCode::IdentifierDoubleUnderscore,
                    format!("identifier '{word}' cannot contain consecutive underscores"),
                    start,
                    "avoid consecutive underscores",
                );
            }
        }
    }

    fn check_numbers(&mut self) {
        let mut index = 0;
        while index < self.chars.len() {
            let starts_number = self.chars[index].is_ascii_digit()
                && (index == 0 || !is_word_char(self.chars[index - 1]));
            if !starts_number {
                index += 1;
                continue;
            }

            let start = index;
            let mut dots = 0;
            index = self.skip_digits(index);
            while index + 1 < self.chars.len()
                && self.chars[index] == '.'
                && self.chars[index + 1].is_ascii_digit()
            {
                dots += 1;
                index = self.skip_digits(index + 1);
            }

            if dots >= 2 {
                let number: String = self.chars[start..index].iter().collect();
                self.report(
                    DiagnosticCode::MalformedNumber,
                    format!("number '{number}' has more than one decimal point"),
                    start,
                    "a number may contain only one decimal point",
                );
            }
        }
    }

    fn skip_digits(&self, mut index: usize) -> usize {
        while index < self.chars.len() && self.chars[index].is_ascii_digit() {
            index += 1;
        }
        index
    }

    fn check_operators(&mut self) {
        let operator_runs = runs(&self.chars, |ch| ARITHMETIC.contains(ch));
        for (start, end) in operator_runs {
            if end - start < 2 {
                continue;
            }
            let run: String = self.chars[start..end].iter().collect();
            self.report(
                DiagnosticCode::ConsecutiveOperators,
                format!("consecutive operators '{run}'"),
                start,
                "check the operators between operands",
            );
        }
    }

    fn check_strings(&mut self) {
        let quotes: Vec<usize> = (0..self.chars.len())
            .filter(|&index| matches!(self.chars[index], '"' | '\''))
            .collect();
        if quotes.len() % 2 == 1 {
            if let Some(&last) = quotes.last() {
                self.report(
                    DiagnosticCode::UnterminatedString,
                    "unterminated string literal".to_string(),
                    last,
                    "check that quotes are paired",
                );
            }
        }
    }

    fn check_brackets(&mut self) {
        let mut open = Vec::new();
        for index in 0..self.chars.len() {
            match self.chars[index] {
                '(' => open.push(index),
                ')' => {
                    if open.pop().is_none() {
                        self.report(
                            DiagnosticCode::UnmatchedClosingParen,
                            "mismatched parentheses: extra ')'".to_string(),
                            index,
                            "check the number of parentheses",
                        );
                        return;
                    }
                }
                _ => {}
            }
        }

        if let Some(&innermost) = open.last() {
            self.report(
                DiagnosticCode::UnclosedParen,
                "mismatched parentheses: missing ')'".to_string(),
                innermost,
                "add the missing ')'",
            );
        }
    }
}

fn is_allowed(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch.is_whitespace() || ALLOWED_PUNCTUATION.contains(ch)
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Maximal runs of characters matching `predicate`, as half-open ranges.
fn runs(chars: &[char], predicate: impl Fn(char) -> bool) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = None;
    for (index, &ch) in chars.iter().enumerate() {
        match (predicate(ch), start) {
            (true, None) => start = Some(index),
            (false, Some(begin)) => {
                ranges.push((begin, index));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        ranges.push((begin, chars.len()));
    }
    ranges
}
