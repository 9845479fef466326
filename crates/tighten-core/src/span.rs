/*!
# Statement Spans

Line-range detection for declarations that continue across several lines.

A declaration starts on the line carrying its keyword and runs until the
bracket depth has returned to zero and the line does not end in a
continuation comma. Both the matcher and the rewriter go through
[`span_at`], so they always agree on where a declaration ends.
*/

use std::ops::RangeInclusive;

/// Inclusive line range occupied by one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} is after end {end}");
        Self { start, end }
    }

    /// Span covering exactly one line
    pub fn single(line: usize) -> Self {
        Self::new(line, line)
    }

    pub fn lines(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// How a character counts towards statement structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexeme {
    /// Ordinary code, brackets and commas included
    Code,
    /// Inside a string or regex literal, delimiters included
    Literal,
    /// Inside a comment running to the end of the line
    Comment,
}

/// Characters after which a `/` opens a regex literal rather than dividing
const REGEX_PRECEDERS: [char; 11] = [':', '(', ',', '=', '~', '[', '{', '|', '&', '!', ';'];

/// Character-level literal and comment tracking
///
/// A `#` only opens a comment at the start of a line or after whitespace, so
/// `#` inside `/\A#\h{6}\z/` or `"#{name}"` is never taken for one. A `/`
/// opens a regex literal when it follows an operator, an opening bracket, a
/// comma or a hash key's colon. A string left open at the end of the line it
/// started on carries over to the next line; any other unclosed literal is
/// dropped at the line break.
#[derive(Debug, Clone)]
pub(crate) struct LiteralTracker {
    open: Option<char>,
    opened_on_line: bool,
    escaped: bool,
    in_comment: bool,
    previous: Option<char>,
    after_space: bool,
}

impl Default for LiteralTracker {
    fn default() -> Self {
        Self {
            open: None,
            opened_on_line: false,
            escaped: false,
            in_comment: false,
            previous: None,
            after_space: true,
        }
    }
}

impl LiteralTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether a string literal is still open
    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Classify the next character; a `\n` ends the current line
    pub(crate) fn step(&mut self, ch: char) -> Lexeme {
        if ch == '\n' {
            self.end_line();
            return if self.is_open() { Lexeme::Literal } else { Lexeme::Code };
        }
        if self.in_comment {
            return Lexeme::Comment;
        }

        if let Some(delimiter) = self.open {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == delimiter {
                self.open = None;
                self.previous = Some(ch);
                self.after_space = false;
            }
            return Lexeme::Literal;
        }

        let lexeme = match ch {
            '#' if self.after_space => {
                self.in_comment = true;
                return Lexeme::Comment;
            }
            '"' | '\'' | '`' => self.open_literal(ch),
            '/' if self.regex_may_start() => self.open_literal(ch),
            _ => Lexeme::Code,
        };

        self.after_space = ch.is_whitespace();
        if !ch.is_whitespace() {
            self.previous = Some(ch);
        }
        lexeme
    }

    /// Close the current line
    pub(crate) fn end_line(&mut self) {
        let carries = self.opened_on_line && self.open != Some('/');
        if !carries {
            self.open = None;
        }
        self.opened_on_line = false;
        self.escaped = false;
        self.in_comment = false;
        self.previous = None;
        self.after_space = true;
    }

    fn open_literal(&mut self, delimiter: char) -> Lexeme {
        self.open = Some(delimiter);
        self.opened_on_line = true;
        Lexeme::Literal
    }

    fn regex_may_start(&self) -> bool {
        self.previous.map_or(true, |c| REGEX_PRECEDERS.contains(&c))
    }
}

/// Incremental statement-boundary scanner
///
/// Carries the state needed to decide, line by line, whether a statement
/// continues: the bracket depth, an open string literal and whether the last
/// line ended in a continuation comma. Text inside string and regex
/// literals and comments never changes the depth.
#[derive(Debug, Clone, Default)]
pub struct SpanScanner {
    depth: i32,
    literals: LiteralTracker,
    continuation: bool,
}

impl SpanScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bracket depth (parentheses, square brackets and braces)
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Whether the last fed line asked for a continuation line
    pub fn is_continuing(&self) -> bool {
        self.continuation
    }

    /// Consume one line and report whether the statement closes on it
    pub fn feed(&mut self, line: &str) -> bool {
        let code_end = self.scan(line);
        let code = line[..code_end].trim_end();
        self.continuation = code.ends_with(',') || self.literals.is_open();
        self.depth <= 0 && !self.continuation
    }

    /// Update depth and literal state; returns the byte offset where code ends
    fn scan(&mut self, line: &str) -> usize {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut code_end = line.len();

        for (index, ch) in line.char_indices() {
            match self.literals.step(ch) {
                Lexeme::Comment => {
                    code_end = index;
                    break;
                }
                Lexeme::Literal => {}
                Lexeme::Code => match ch {
                    '(' | '[' | '{' => self.depth += 1,
                    ')' | ']' | '}' => self.depth -= 1,
                    _ => {}
                },
            }
        }

        self.literals.end_line();
        code_end
    }
}

/// Compute the span of the statement that starts on line `start`
///
/// When the input runs out before the statement closes, the span ends on the
/// last line.
pub fn span_at<S: AsRef<str>>(lines: &[S], start: usize) -> Span {
    let mut scanner = SpanScanner::new();

    for (index, line) in lines.iter().enumerate().skip(start) {
        if scanner.feed(line.as_ref()) {
            return Span::new(start, index);
        }
    }

    Span::new(start, lines.len().saturating_sub(1).max(start))
}
