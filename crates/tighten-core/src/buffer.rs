/*!
# Source Buffer

Line-oriented view of a source file that reproduces untouched text byte for
byte. Every line keeps its own terminator (`\n`, `\r\n` or nothing for an
unterminated last line), so editing one statement never disturbs the line
endings of the rest of the file.
*/

use crate::declaration::Keyword;
use crate::span::{span_at, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    lines: Vec<String>,
}

impl SourceBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line content without its terminator
    pub fn code(&self, index: usize) -> &str {
        self.lines
            .get(index)
            .map(|line| line.trim_end_matches(['\n', '\r']))
            .unwrap_or("")
    }

    fn codes(&self) -> Vec<&str> {
        (0..self.lines.len()).map(|index| self.code(index)).collect()
    }

    /// Span of the statement starting on line `start`
    pub fn span_at(&self, start: usize) -> Span {
        span_at(&self.codes(), start)
    }

    /// Spans of every statement that starts with a recognised keyword
    ///
    /// Scanning resumes after the end of each span, so a continuation line
    /// is never mistaken for the start of another declaration.
    pub fn declaration_spans(&self) -> Vec<Span> {
        let codes = self.codes();
        let mut spans = Vec::new();
        let mut index = 0;

        while index < codes.len() {
            if Keyword::starts_line(codes[index]).is_some() {
                let span = span_at(&codes, index);
                index = span.end + 1;
                spans.push(span);
            } else {
                index += 1;
            }
        }

        spans
    }

    /// Text of a span, without the terminator of its last line
    pub fn span_text(&self, span: Span) -> String {
        let mut text: String = self.lines[span.lines()].concat();
        let terminator = self.terminator(span.end).len();
        text.truncate(text.len() - terminator);
        text
    }

    /// Replace a span with new text, keeping the last line's terminator
    pub fn replace_span(&mut self, span: Span, text: &str) {
        let replacement = format!("{text}{}", self.terminator(span.end));
        let new_lines = replacement.split_inclusive('\n').map(str::to_string);
        self.lines.splice(span.lines(), new_lines);
    }

    /// Delete a span and tidy the blank lines around where it was
    pub fn delete_span(&mut self, span: Span) {
        let was_unterminated = self.terminator(span.end).is_empty();
        self.lines.drain(span.lines());

        if was_unterminated && span.start == self.lines.len() {
            if let Some(last) = self.lines.last_mut() {
                let code_len = last.trim_end_matches(['\n', '\r']).len();
                last.truncate(code_len);
            }
        }

        self.tidy_deletion_site(span.start);
    }

    /// Collapse blank lines that a deletion at `site` pushed together, and
    /// drop a blank line left directly before a block's `end`
    fn tidy_deletion_site(&mut self, site: usize) {
        while site > 0 && self.is_blank(site - 1) && self.is_blank(site) {
            self.lines.remove(site);
        }

        if site > 0 && self.is_blank(site - 1) && self.is_block_end(site) {
            self.lines.remove(site - 1);
        } else if self.is_blank(site) && self.is_block_end(site + 1) {
            self.lines.remove(site);
        }
    }

    fn is_blank(&self, index: usize) -> bool {
        index < self.lines.len() && self.code(index).trim().is_empty()
    }

    fn is_block_end(&self, index: usize) -> bool {
        if index >= self.lines.len() {
            return false;
        }
        let code = self.code(index).trim();
        code == "end"
            || code
                .strip_prefix("end")
                .is_some_and(|rest| rest.starts_with([' ', '\t', '#', ';']))
    }

    fn terminator(&self, index: usize) -> &str {
        let line = &self.lines[index];
        &line[line.trim_end_matches(['\n', '\r']).len()..]
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }
}
