use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: String,
    code: String,
}

impl SourceFile {
    pub fn new(path: PathBuf, contents: String) -> Self {
        let code = strip_comments(&contents);
        Self {
            path,
            contents,
            code,
        }
    }

    /// Creates a source for an expression that did not come from a file.
    pub fn inline(contents: impl Into<String>) -> Self {
        Self::new(PathBuf::from("<expression>"), contents.into())
    }

    /// The contents with every comment blanked out. Line and column positions
    /// match `contents` exactly.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the 1-based `line` of the original contents.
    pub fn line(&self, line: usize) -> Option<&str> {
        self.contents.lines().nth(line.checked_sub(1)?)
    }

    /// True when nothing but whitespace remains once comments are removed.
    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CommentState {
    Code,
    Line,
    Block,
}

/// Replaces `# ...` line comments and `/* ... */` block comments with spaces.
///
/// Newlines are kept so positions reported against the stripped text are
/// valid positions in the original text.
pub fn strip_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state = CommentState::Code;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            CommentState::Code => match ch {
                '#' => {
                    state = CommentState::Line;
                    output.push(' ');
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = CommentState::Block;
                    output.push_str("  ");
                }
                other => output.push(other),
            },
            CommentState::Line => {
                if ch == '\n' {
                    state = CommentState::Code;
                    output.push('\n');
                } else {
                    output.push(' ');
                }
            }
            CommentState::Block => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = CommentState::Code;
                    output.push_str("  ");
                } else if ch == '\n' || ch == '\r' {
                    output.push(ch);
                } else {
                    output.push(' ');
                }
            }
        }
    }

    output
}
